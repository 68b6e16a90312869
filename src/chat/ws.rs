use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use crate::{relay::Relay, session::Caller};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    Caller(user_id): Caller,
    State(relay): State<Arc<Relay>>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let connection = relay.open_connection(user_id, socket);
        relay.serve(connection).await;
    })
}
