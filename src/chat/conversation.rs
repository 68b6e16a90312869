use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppResult, limit, relay::Relay, session::Caller};

#[derive(Deserialize)]
pub(crate) struct ConversationQuery {
    limit: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn conversation(
    Caller(user_id): Caller,
    Path(other_id): Path<String>,
    Query(ConversationQuery { limit }): Query<ConversationQuery>,
    State(relay): State<Arc<Relay>>,
) -> AppResult<Json<Value>> {
    let limit = limit::clamp(limit::parse(limit.as_deref()));
    let messages = relay.get_conversation(&user_id, &other_id, i64::from(limit)).await?;

    Ok(Json(json!({
        "messages": messages,
        "count": messages.len(),
        "limit": limit,
    })))
}
