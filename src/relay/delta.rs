//! Extraction of content deltas from upstream stream lines.

use serde_json::Value;

/// Prefix marking a data line in the upstream stream.
pub const DATA_PREFIX: &str = "data: ";

/// Sentinel some upstreams send after the last chunk.
const DONE_SENTINEL: &str = "[DONE]";

/// Extract the content fragment from one upstream line.
///
/// Returns `Some` only for a `data: ` line whose JSON payload carries a string
/// at `choices[0].delta.content`. Lines without the prefix, the `[DONE]`
/// sentinel, and payloads missing those fields yield `None`. Payloads that are
/// not valid JSON are logged and skipped.
pub fn extract_delta(line: &str) -> Option<String> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();

    if payload == DONE_SENTINEL {
        tracing::debug!("Upstream signalled end of stream");
        return None;
    }

    let parsed: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, line = %line, "Malformed JSON received from upstream");
            return None;
        }
    };

    content_of(&parsed).map(str::to_owned)
}

/// Walk `choices[0].delta.content` of a parsed chunk.
fn content_of(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?
        .as_str()
}
