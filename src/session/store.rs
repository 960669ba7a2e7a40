use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::machine::{Action, Screen};

pub type SharedScreen = Arc<Mutex<Screen>>;

struct Entry {
    owner: Uuid,
    screen: SharedScreen,
    touched: Instant,
}

impl Entry {
    /// A screen whose analysis is still running, or that someone is acting
    /// on right now, is never evicted.
    fn expired(&self, idle_ttl: Duration) -> bool {
        if self.touched.elapsed() < idle_ttl {
            return false;
        }
        match self.screen.try_lock() {
            Ok(mut s) if !s.is_busy() => {
                s.apply(Action::Teardown);
                true
            }
            _ => false,
        }
    }
}

/// In-memory screens, keyed by id and scoped to their owner. Screens nobody
/// has touched for `idle_ttl` are swept whenever a new one opens.
#[derive(Clone)]
pub struct ScreenStore {
    inner: Arc<DashMap<Uuid, Entry>>,
    idle_ttl: Duration,
}

impl ScreenStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            idle_ttl,
        }
    }

    pub fn open(&self, owner: Uuid) -> (Uuid, SharedScreen) {
        self.sweep();
        let screen = Screen::new(owner);
        let id = screen.id;
        let shared = Arc::new(Mutex::new(screen));
        self.inner.insert(
            id,
            Entry {
                owner,
                screen: shared.clone(),
                touched: Instant::now(),
            },
        );
        (id, shared)
    }

    /// Another user's screen is reported as missing.
    pub fn get(&self, id: Uuid, owner: Uuid) -> Option<SharedScreen> {
        let mut entry = self.inner.get_mut(&id).filter(|e| e.owner == owner)?;
        entry.touched = Instant::now();
        Some(entry.screen.clone())
    }

    pub fn remove(&self, id: Uuid, owner: Uuid) -> Option<SharedScreen> {
        self.inner
            .remove_if(&id, |_, e| e.owner == owner)
            .map(|(_, e)| e.screen)
    }

    /// Drops idle screens and returns how many went.
    pub fn sweep(&self) -> usize {
        let before = self.inner.len();
        let ttl = self.idle_ttl;
        self.inner.retain(|_, e| !e.expired(ttl));
        let evicted = before.saturating_sub(self.inner.len());
        if evicted > 0 {
            info!(evicted, open_screens = self.inner.len(), "idle screens evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
