mod conversation;
mod read;
mod unread;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/conversations/{user_id}", get(conversation::conversation))
        .route("/conversations/{user_id}/read", post(read::mark_read))
        .route("/unread", get(unread::unread_count))
}
