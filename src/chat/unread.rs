use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde_json::{Value, json};

use crate::{AppResult, relay::Relay, session::Caller};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn unread_count(
    Caller(user_id): Caller,
    State(relay): State<Arc<Relay>>,
) -> AppResult<Json<Value>> {
    let count = relay.get_unread_count(&user_id).await?;

    Ok(Json(json!({ "userId": user_id, "unreadCount": count })))
}
