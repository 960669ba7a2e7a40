use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{LibraryResponse, PickRequest, PromptRequest, ScreenView, SectionRequest};
use super::machine::{Action, Effect};
use super::services::{record_acquisition, submit};
use super::store::SharedScreen;
use crate::auth::jwt::AuthUser;
use crate::media::acquire::{capture_from_device, pick_from_library, CaptureUpload};
use crate::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;
type ViewResponse = ApiResult<(StatusCode, Json<ScreenView>)>;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/library", get(list_library))
        .route("/screens/:id", get(get_screen))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/screens", post(open_screen))
        .route("/screens/:id", delete(close_screen))
        .route("/screens/:id/capture", post(capture))
        .route("/screens/:id/library", post(pick))
        .route("/screens/:id/prompt", put(set_prompt))
        .route("/screens/:id/submit", post(submit_screen))
        .route("/screens/:id/section", put(select_section).delete(dismiss_section))
        .route("/screens/:id/notice", delete(dismiss_notice))
        .route("/screens/:id/reset", post(reset_screen))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn find(state: &AppState, id: Uuid, user_id: Uuid) -> ApiResult<SharedScreen> {
    state
        .screens
        .get(id, user_id)
        .ok_or((StatusCode::NOT_FOUND, "Screen not found".into()))
}

async fn view(screen: &SharedScreen, effect: &Effect) -> (StatusCode, Json<ScreenView>) {
    let status = match effect {
        Effect::Rejected(_) => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    let s = screen.lock().await;
    (status, Json(ScreenView::from(&*s)))
}

async fn apply(state: &AppState, id: Uuid, auth: &AuthUser, action: Action) -> ViewResponse {
    let screen = find(state, id, auth.user_id)?;
    let effect = screen.lock().await.apply(action);
    if let Effect::Rejected(reason) = &effect {
        info!(screen_id = %id, %reason, "action rejected");
    }
    Ok(view(&screen, &effect).await)
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn list_library(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<LibraryResponse>> {
    let items = state.library.list().await.map_err(|e| {
        warn!(error = %e, "list library failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Media library unavailable".to_string(),
        )
    })?;
    Ok(Json(LibraryResponse { items }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn open_screen(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<(StatusCode, HeaderMap, Json<ScreenView>)> {
    let (id, screen) = state.screens.open(auth.user_id);
    info!(screen_id = %id, open_screens = state.screens.len(), "screen opened");

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/screens/{}", id))
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "bad location".to_string()))?;
    headers.insert(header::LOCATION, location);

    let s = screen.lock().await;
    Ok((StatusCode::CREATED, headers, Json(ScreenView::from(&*s))))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn get_screen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ViewResponse {
    let screen = find(&state, id, auth.user_id)?;
    Ok(view(&screen, &Effect::None).await)
}

/// Leaving the screen: any pending analysis is cancelled and its response
/// dropped.
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn close_screen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let screen = state
        .screens
        .remove(id, auth.user_id)
        .ok_or((StatusCode::NOT_FOUND, "Screen not found".into()))?;
    screen.lock().await.apply(Action::Teardown);
    info!(screen_id = %id, "screen closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /screens/:id/capture (multipart, field `photo`). No field means the
/// camera was closed without taking a picture.
#[instrument(skip(state, auth, mp), fields(user_id = %auth.user_id))]
pub async fn capture(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> ViewResponse {
    let screen = find(&state, id, auth.user_id)?;

    let mut frame: Option<(Bytes, String)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        frame = Some((data, content_type));
        break;
    }

    let upload = frame.as_ref().map(|(body, ct)| CaptureUpload {
        body: body.clone(),
        content_type: ct.as_str(),
    });
    let acquired = capture_from_device(state.permissions.as_ref(), upload).await;
    let effect = record_acquisition(&screen, acquired).await;
    Ok(view(&screen, &effect).await)
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn pick(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PickRequest>,
) -> ViewResponse {
    let screen = find(&state, id, auth.user_id)?;
    let acquired =
        pick_from_library(state.permissions.as_ref(), &state.library, body.name.as_deref()).await;
    let effect = record_acquisition(&screen, acquired).await;
    Ok(view(&screen, &effect).await)
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn set_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PromptRequest>,
) -> ViewResponse {
    apply(&state, id, &auth, Action::SetPrompt(body.text)).await
}

/// Runs the whole analysis before answering. A second submit while one is
/// pending gets 409 and changes nothing.
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn submit_screen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ViewResponse {
    let screen = find(&state, id, auth.user_id)?;
    let effect = submit(&state, &screen, Some(auth.token.as_str())).await;
    Ok(view(&screen, &effect).await)
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn select_section(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SectionRequest>,
) -> ViewResponse {
    apply(&state, id, &auth, Action::SelectSection(body.section)).await
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn dismiss_section(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ViewResponse {
    apply(&state, id, &auth, Action::DismissSection).await
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn dismiss_notice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ViewResponse {
    apply(&state, id, &auth, Action::DismissNotice).await
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn reset_screen(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ViewResponse {
    apply(&state, id, &auth, Action::Reset).await
}
