//! Upstream relay driver.
//!
//! [`RelayDriver::relay`] performs the outbound call and turns the upstream
//! body into an ordered stream of [`OutboundEvent`]s:
//!
//! ```text
//! Init -> Connecting -> Failed -> Done
//!                    -> Streaming -> Flushing -> Done
//! ```
//!
//! - Connect failures and non-2xx statuses produce one `Failed` event and end the stream.
//! - Transport errors after streaming began are a soft end: buffered text is flushed, no error is emitted.
//! - Malformed lines are skipped.
//!
//! The returned stream owns the upstream response. Dropping it (e.g. when the
//! caller disconnects) closes the outbound connection.

use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::delta::extract_delta;
use super::lines::LineBuffer;
use super::rechunk::Rechunker;
use crate::config::UpstreamConfig;
use crate::error::Result;

/// How upstream fragments are turned into outbound events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Fragments concatenated into one response body.
    Aggregate,
    /// Fragments rechunked on word boundaries and normalized.
    #[default]
    #[serde(rename = "stream")]
    Incremental,
    /// Fragments forwarded unchanged, one event each.
    Raw,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Aggregate => "aggregate",
            RelayMode::Incremental => "stream",
            RelayMode::Raw => "raw",
        }
    }
}

/// Why a relay could not deliver upstream content.
///
/// The display text is the message shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayFailure {
    /// Connection could not be established or no response arrived in time.
    #[error("The request has timed out. Please try again later.")]
    Unreachable { reason: String },
    /// Upstream answered with a non-success status.
    #[error("Request failed with status code {code}")]
    Status { code: u16, details: String },
}

/// One item of the relayed stream, in upstream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Text(String),
    /// Terminal; nothing follows it.
    Failed(RelayFailure),
}

impl OutboundEvent {
    /// The event payload as sent to streaming callers.
    pub fn data(&self) -> String {
        match self {
            OutboundEvent::Text(text) => text.clone(),
            OutboundEvent::Failed(failure) => format!("[ERROR] {}", failure),
        }
    }
}

/// Lifecycle of a single relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Init,
    Connecting,
    Streaming,
    Flushing,
    Failed,
    Done,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Init => "init",
            RelayState::Connecting => "connecting",
            RelayState::Streaming => "streaming",
            RelayState::Flushing => "flushing",
            RelayState::Failed => "failed",
            RelayState::Done => "done",
        }
    }

    /// No further upstream reads or content emissions happen from here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Failed | RelayState::Done)
    }

    pub fn can_transition_to(&self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Init, Connecting)
                | (Connecting, Failed)
                | (Connecting, Streaming)
                | (Streaming, Flushing)
                | (Flushing, Done)
                | (Failed, Done)
        )
    }
}

/// Tracks and logs state transitions for one relay.
struct StateTracker {
    request_id: Uuid,
    state: RelayState,
}

impl StateTracker {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            state: RelayState::Init,
        }
    }

    fn advance(&mut self, next: RelayState) {
        debug_assert!(
            !self.state.is_terminal() || next == RelayState::Done,
            "relay left terminal state {:?}",
            self.state
        );
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid relay transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            request_id = %self.request_id,
            from = self.state.as_str(),
            to = next.as_str(),
            terminal = next.is_terminal(),
            "Relay state transition"
        );
        self.state = next;
    }
}

/// Turns fragments into event text according to the relay mode.
enum Emitter {
    Rechunk(Rechunker),
    Passthrough,
}

impl Emitter {
    fn for_mode(mode: RelayMode) -> Self {
        match mode {
            RelayMode::Incremental => Emitter::Rechunk(Rechunker::new()),
            RelayMode::Raw | RelayMode::Aggregate => Emitter::Passthrough,
        }
    }

    fn feed(&mut self, fragment: String) -> Option<String> {
        match self {
            Emitter::Rechunk(rechunker) => rechunker.feed(&fragment),
            Emitter::Passthrough => (!fragment.is_empty()).then_some(fragment),
        }
    }

    fn flush(&mut self) -> Option<String> {
        match self {
            Emitter::Rechunk(rechunker) => rechunker.flush(),
            Emitter::Passthrough => None,
        }
    }
}

/// Outbound request body.
#[derive(Serialize)]
struct PromptPayload<'a> {
    content: &'a str,
}

/// Relays prompts to the configured upstream endpoint.
///
/// Cheap to clone; clones share the HTTP client and its connection pool.
#[derive(Debug, Clone)]
pub struct RelayDriver {
    client: Client,
    url: String,
    pacing: Duration,
    max_line_bytes: usize,
}

impl RelayDriver {
    /// Build a driver with one HTTP client carrying the static header set
    /// and the configured connect/read timeouts.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .default_headers(config.header_map()?)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            pacing: config.pacing(),
            max_line_bytes: config.max_line_bytes,
        })
    }

    /// Relay `content` upstream and stream back the response as events.
    ///
    /// Nothing is sent until the stream is first polled.
    pub fn relay(
        &self,
        content: String,
        mode: RelayMode,
    ) -> impl Stream<Item = OutboundEvent> + Send + 'static {
        let driver = self.clone();

        async_stream::stream! {
            let request_id = Uuid::new_v4();
            let mut state = StateTracker::new(request_id);
            state.advance(RelayState::Connecting);

            match driver.open(&content, mode, request_id).await {
                Err(failure) => {
                    state.advance(RelayState::Failed);
                    yield OutboundEvent::Failed(failure);
                    state.advance(RelayState::Done);
                }
                Ok(response) => {
                    state.advance(RelayState::Streaming);

                    let mut lines = LineBuffer::new(driver.max_line_bytes);
                    let mut emitter = Emitter::for_mode(mode);
                    let mut body = response.bytes_stream();
                    let mut fragments = 0usize;

                    loop {
                        let chunk = match body.next().await {
                            Some(Ok(chunk)) => chunk,
                            Some(Err(e)) => {
                                tracing::warn!(
                                    request_id = %request_id,
                                    error = %e,
                                    "Stream ended unexpectedly"
                                );
                                break;
                            }
                            None => break,
                        };

                        for line in lines.push(&chunk) {
                            let Some(fragment) = extract_delta(&line) else {
                                continue;
                            };
                            fragments += 1;
                            if let Some(text) = emitter.feed(fragment) {
                                yield OutboundEvent::Text(text);
                            }
                            driver.pace(mode).await;
                        }
                    }
                    drop(body);

                    state.advance(RelayState::Flushing);
                    if let Some(fragment) = lines.finish().as_deref().and_then(extract_delta) {
                        fragments += 1;
                        if let Some(text) = emitter.feed(fragment) {
                            yield OutboundEvent::Text(text);
                        }
                    }
                    if let Some(text) = emitter.flush() {
                        yield OutboundEvent::Text(text);
                    }
                    state.advance(RelayState::Done);

                    tracing::info!(
                        request_id = %request_id,
                        mode = mode.as_str(),
                        fragments,
                        "Relay completed"
                    );
                }
            }
        }
    }

    /// Relay `content` and return the concatenated response text.
    pub async fn aggregate(&self, content: String) -> Result<String> {
        let mut events = std::pin::pin!(self.relay(content, RelayMode::Aggregate));
        let mut text = String::new();

        while let Some(event) = events.next().await {
            match event {
                OutboundEvent::Text(fragment) => text.push_str(&fragment),
                OutboundEvent::Failed(failure) => return Err(failure.into()),
            }
        }

        Ok(text)
    }

    /// Send the outbound request and check its status.
    async fn open(
        &self,
        content: &str,
        mode: RelayMode,
        request_id: Uuid,
    ) -> std::result::Result<reqwest::Response, RelayFailure> {
        tracing::info!(
            request_id = %request_id,
            url = %self.url,
            mode = mode.as_str(),
            content_len = content.len(),
            "Forwarding prompt to upstream"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&PromptPayload { content })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Request to upstream failed"
                );
                RelayFailure::Unreachable {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Only the aggregate response reports the upstream body
        let details = match mode {
            RelayMode::Aggregate => response.text().await.unwrap_or_default(),
            RelayMode::Incremental | RelayMode::Raw => String::new(),
        };
        tracing::error!(
            request_id = %request_id,
            status = %status,
            body = %details,
            "Upstream returned error"
        );

        Err(RelayFailure::Status {
            code: status.as_u16(),
            details,
        })
    }

    /// Yield between fragments so a fast upstream does not starve the caller.
    async fn pace(&self, mode: RelayMode) {
        if mode == RelayMode::Aggregate {
            return;
        }
        if self.pacing.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.pacing).await;
        }
    }
}
