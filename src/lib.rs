pub mod appresult;
pub mod chat;
pub mod config;
pub mod error;
pub mod health;
pub mod limit;
pub mod message;
pub mod relay;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod validate;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{
        HeaderName, HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    },
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use appresult::{AppError, AppResult};
pub use error::RelayError;
pub use message::{Message, NewMessage};
pub use relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

pub fn app(app_state: AppState, allow_origins: &[String]) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/chat", chat::router())
        .with_state(app_state)
        .layer(cors(allow_origins))
        .layer(TraceLayer::new_for_http())
}

/// `*` anywhere in the list opens CORS to every origin, without credentials.
fn cors(allow_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([ORIGIN, CONTENT_TYPE, ACCEPT, AUTHORIZATION, HeaderName::from_static(session::USER_ID)]);

    if allow_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(AllowOrigin::any()).allow_credentials(false);
    }

    let origins: Vec<HeaderValue> = allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    layer.allow_origin(AllowOrigin::list(origins)).allow_credentials(true)
}
