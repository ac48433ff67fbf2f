//! Streaming relay core.
//!
//! The pipeline, leaves first:
//! - [`normalize`]: Markdown-safe text normalization
//! - [`delta`]: content extraction from one upstream `data: ` line
//! - [`lines`]: byte chunk to line reassembly
//! - [`rechunk`]: word-boundary rechunking
//! - [`driver`]: the outbound call and read loop tying it together

pub mod delta;
pub mod driver;
pub mod lines;
pub mod normalize;
pub mod rechunk;

pub use delta::extract_delta;
pub use driver::{OutboundEvent, RelayDriver, RelayFailure, RelayMode, RelayState};
pub use lines::{LineBuffer, DEFAULT_MAX_LINE_BYTES};
pub use normalize::normalize;
pub use rechunk::Rechunker;
