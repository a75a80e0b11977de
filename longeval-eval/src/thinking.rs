//! Reasoning-trace splitting for thinking mode.
//!
//! The budget side of thinking mode (widening length limits, disabling the
//! newline stop) lives in [`longeval_core::GenerationConfig`]; this module
//! handles the output side, separating the trace from the final answer.

/// Delimiter closing a reasoning trace.
const THOUGHT_DELIMITER: &str = "</think>";

/// Split a raw output into (thoughts, answer).
///
/// Everything up to and including the *last* delimiter occurrence is the
/// thought trace; everything after it is the answer, both trimmed. Without
/// a delimiter the output is returned unchanged as the answer and no
/// thoughts are attached. Never fails.
pub fn split_thoughts(output: &str) -> (Option<String>, String) {
    match output.rfind(THOUGHT_DELIMITER) {
        Some(idx) => {
            let end = idx + THOUGHT_DELIMITER.len();
            (
                Some(output[..end].trim().to_string()),
                output[end..].trim().to_string(),
            )
        }
        None => (None, output.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple(
        "reasoning text</think>final answer",
        Some("reasoning text</think>"),
        "final answer"
    )]
    #[case::trims_around_delimiter(
        "  thinking...  </think>  the answer  ",
        Some("thinking...  </think>"),
        "the answer"
    )]
    #[case::multiline(
        "step 1\nstep 2</think>\n42",
        Some("step 1\nstep 2</think>"),
        "42"
    )]
    #[case::empty_answer("all thoughts</think>", Some("all thoughts</think>"), "")]
    fn test_split(
        #[case] raw: &str,
        #[case] expected_thoughts: Option<&str>,
        #[case] expected_answer: &str,
    ) {
        let (thoughts, answer) = split_thoughts(raw);
        assert_eq!(thoughts.as_deref(), expected_thoughts);
        assert_eq!(answer, expected_answer);
    }

    #[test]
    fn test_last_delimiter_wins() {
        // Greedy: the trace runs up to the final delimiter.
        let (thoughts, answer) = split_thoughts("a</think>b</think>c");
        assert_eq!(thoughts.as_deref(), Some("a</think>b</think>"));
        assert_eq!(answer, "c");
    }

    #[test]
    fn test_no_delimiter_leaves_output_unchanged() {
        let (thoughts, answer) = split_thoughts("  just an answer  ");
        assert!(thoughts.is_none());
        assert_eq!(answer, "  just an answer  ");
    }

    #[test]
    fn test_empty_output() {
        let (thoughts, answer) = split_thoughts("");
        assert!(thoughts.is_none());
        assert_eq!(answer, "");
    }
}
