//! HTTP surface of the relay.
//!
//! Exposes `POST /call-api` and `GET /health`, and adapts relay events to
//! SSE or plain-text responses.

mod handlers;
mod server;
pub mod stream;
pub mod types;

pub use server::{cors_layer, create_router, run_server, AppState};
pub use stream::sse_events;
pub use types::{PromptRequest, RelayQuery};
