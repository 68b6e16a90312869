use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::{AppResult, relay::Relay, session::Caller};

/// Marks everything `from_id` sent to the caller as read.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    Caller(user_id): Caller,
    Path(from_id): Path<String>,
    State(relay): State<Arc<Relay>>,
) -> AppResult<Json<Value>> {
    let updated = relay.mark_as_read(&from_id, &user_id).await?;

    Ok(Json(json!({
        "fromId": from_id,
        "toId": user_id,
        "status": "success",
        "updated": updated,
    })))
}
