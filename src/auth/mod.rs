use crate::state::AppState;
use axum::Router;

mod claims;
pub mod handlers;
pub mod jwt;

#[cfg(test)]
pub(crate) use claims::TokenKind;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::me_routes())
}
