//! Word-boundary rechunking of streamed text.
//!
//! Upstream fragments split words arbitrarily ("wor" + "ld"). The
//! [`Rechunker`] holds back the trailing partial word and only emits text up
//! to the last space seen, normalized for Markdown. The held-back word is
//! released by [`Rechunker::flush`] at end of stream.

use super::normalize::normalize;

/// Accumulates fragments and emits complete words.
///
/// Owned by a single relay; never shared. Between calls the buffer holds no
/// space character, i.e. at most one partial word.
#[derive(Debug, Default)]
pub struct Rechunker {
    buffer: String,
}

impl Rechunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and emit everything before the last space.
    ///
    /// Returns `None` while no space has been seen, or when the completed
    /// words normalize to nothing.
    pub fn feed(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);

        let split = self.buffer.rfind(' ')?;
        let tail = self.buffer.split_off(split + 1);
        // Drop the separating space itself
        self.buffer.truncate(split);
        let complete = std::mem::replace(&mut self.buffer, tail);

        non_empty(normalize(&complete))
    }

    /// Emit whatever is left in the buffer and clear it.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        non_empty(normalize(&rest))
    }

    /// The partial word currently held back.
    #[cfg(test)]
    fn pending(&self) -> &str {
        &self.buffer
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(fragments: &[&str]) -> Vec<String> {
        let mut rechunker = Rechunker::new();
        let mut out: Vec<String> = fragments
            .iter()
            .filter_map(|f| rechunker.feed(f))
            .collect();
        out.extend(rechunker.flush());
        out
    }

    #[test]
    fn test_hello_world_sequence() {
        let mut rechunker = Rechunker::new();

        assert_eq!(rechunker.feed("Hello "), Some("Hello".to_string()));
        assert_eq!(rechunker.pending(), "");

        assert_eq!(rechunker.feed("wor"), None);
        assert_eq!(rechunker.pending(), "wor");

        assert_eq!(rechunker.feed("ld. "), Some("world.".to_string()));
        assert_eq!(rechunker.pending(), "");

        assert_eq!(rechunker.flush(), None);
    }

    #[test]
    fn test_partial_word_released_on_flush() {
        assert_eq!(
            run(&["The quick", " brown fo", "x"]),
            vec!["The", "quick brown", "fox"]
        );
    }

    #[test]
    fn test_single_word_held_until_flush() {
        let mut rechunker = Rechunker::new();
        assert_eq!(rechunker.feed("Hel"), None);
        assert_eq!(rechunker.feed("lo"), None);
        assert_eq!(rechunker.flush(), Some("Hello".to_string()));
        assert_eq!(rechunker.pending(), "");
    }

    #[test]
    fn test_multiple_words_in_one_fragment() {
        assert_eq!(
            run(&["one two three four"]),
            vec!["one two three", "four"]
        );
    }

    #[test]
    fn test_whitespace_only_emissions_suppressed() {
        let mut rechunker = Rechunker::new();
        assert_eq!(rechunker.feed(" "), None);
        assert_eq!(rechunker.feed("  "), None);
        assert_eq!(rechunker.pending(), "");
        assert_eq!(rechunker.flush(), None);
    }

    #[test]
    fn test_heading_normalized_in_emission() {
        assert_eq!(
            run(&["Intro\n## Setup guide\nRun ", "it"]),
            vec!["Intro\n\n## Setup guide\n\nRun", "it"]
        );
    }

    #[test]
    fn test_newline_does_not_count_as_boundary() {
        let mut rechunker = Rechunker::new();
        assert_eq!(rechunker.feed("line\nnext"), None);
        assert_eq!(rechunker.pending(), "line\nnext");
    }

    #[test]
    fn test_flush_on_empty_buffer() {
        let mut rechunker = Rechunker::new();
        assert_eq!(rechunker.flush(), None);
    }

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    proptest! {
        #[test]
        fn prop_no_characters_lost_or_duplicated(
            fragments in prop::collection::vec("[a-z #\n.]{0,12}", 0..24)
        ) {
            let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
            let emitted = run(&refs).concat();
            prop_assert_eq!(strip_ws(&emitted), strip_ws(&fragments.concat()));
        }

        #[test]
        fn prop_at_most_one_partial_word_held(
            fragments in prop::collection::vec("[a-z \n]{0,12}", 0..24)
        ) {
            let mut rechunker = Rechunker::new();
            for fragment in &fragments {
                rechunker.feed(fragment);
                prop_assert!(!rechunker.pending().contains(' '));
            }
            rechunker.flush();
            prop_assert_eq!(rechunker.pending(), "");
        }

        #[test]
        fn prop_events_never_empty(
            fragments in prop::collection::vec("[a-z \t\n]{0,12}", 0..24)
        ) {
            let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
            for event in run(&refs) {
                prop_assert!(!event.is_empty());
            }
        }
    }
}
