use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{auth::jwt::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: uuid::Uuid,
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// Identity as seen by this service; profile data lives with the provider.
#[instrument(skip(auth), fields(user_id = %auth.user_id))]
pub async fn get_me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse { id: auth.user_id })
}
