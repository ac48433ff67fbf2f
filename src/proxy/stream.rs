//! SSE framing of relay events.
//!
//! Each [`OutboundEvent`] becomes one `data:` event. Failures use the same
//! framing with an `[ERROR] ` prefixed body rather than a distinct event type.
//! Multi-line text is sent as one `data:` line per line, which SSE clients
//! join back with `\n`.

use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use std::convert::Infallible;

use crate::relay::OutboundEvent;

/// Convert relay events into SSE events.
pub fn sse_events<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = OutboundEvent>,
{
    events.map(|event| Ok(Event::default().data(sse_safe(&event.data()))))
}

/// SSE fields may not carry carriage returns; fold them into line feeds.
fn sse_safe(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carriage_returns_folded() {
        assert_eq!(sse_safe("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(sse_safe("plain"), "plain");
    }
}

