//! Inbound request types.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::relay::RelayMode;

/// Body of `POST /call-api`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptRequest {
    pub content: String,
}

impl PromptRequest {
    /// Take the prompt, rejecting content that is blank after trimming.
    ///
    /// The prompt itself is forwarded untrimmed.
    pub fn into_content(self) -> Result<String> {
        if self.content.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(self.content)
    }
}

/// Query parameters of `POST /call-api`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayQuery {
    /// Overrides the configured output mode for this request
    pub mode: Option<RelayMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_content_rejected() {
        for content in ["", "   ", "\n\t "] {
            let request = PromptRequest {
                content: content.to_string(),
            };
            assert!(matches!(request.into_content(), Err(Error::EmptyInput)));
        }
    }

    #[test]
    fn test_content_forwarded_untrimmed() {
        let request = PromptRequest {
            content: "  Explain SSE  ".to_string(),
        };
        assert_eq!(request.into_content().unwrap(), "  Explain SSE  ");
    }

    #[test]
    fn test_request_deserialize() {
        let request: PromptRequest = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(request.content, "hi");
        assert!(serde_json::from_str::<PromptRequest>(r#"{"text":"hi"}"#).is_err());
    }
}
