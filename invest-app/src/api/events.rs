//! Server-sent events for the signed-in user

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use invest_common::sse::event_stream;

use super::auth::CurrentUser;
use crate::AppState;

/// GET /api/events
///
/// Workflow and job events go to everyone; a notification event only to
/// the user it addresses.
pub async fn user_event_stream(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> impl IntoResponse {
    let user_id = user.id;
    event_stream("invest-app", &state.event_bus, move |event| {
        event.target_user().map_or(true, |target| target == user_id)
    })
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/events", get(user_event_stream))
}
