//! Checking that a translated program behaves like its original.

use polyrun_types::CompareResponse;
use serde::Serialize;
use similar::TextDiff;

use crate::batch::{BatchExecutor, BatchOutcome};

/// Longest diff preview returned, in characters.
pub const DIFF_PREVIEW_CHARS: usize = 400;

/// Compare two program outputs.
///
/// Two passes: the trimmed texts must match exactly, and they must match
/// again with every space and newline removed. The outputs are `consistent`
/// only if both passes agree.
pub fn compare_outputs(original: &str, converted: &str) -> CompareResponse {
    let match_direct = original.trim() == converted.trim();
    let match_normalized = normalize(original) == normalize(converted);

    CompareResponse {
        match_direct,
        match_normalized,
        consistent: match_direct && match_normalized,
        diff_preview: diff_preview(original, converted),
    }
}

fn normalize(text: &str) -> String {
    text.chars().filter(|c| *c != ' ' && *c != '\n').collect()
}

fn diff_preview(original: &str, converted: &str) -> String {
    if original == converted {
        return String::new();
    }
    let diff = TextDiff::from_lines(original, converted);
    let unified = diff
        .unified_diff()
        .header("original", "converted")
        .to_string();
    unified.chars().take(DIFF_PREVIEW_CHARS).collect()
}

/// Both runs of a translation check plus their comparison.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub original: BatchOutcome,
    pub converted: BatchOutcome,
    pub comparison: CompareResponse,
}

impl TranslationReport {
    /// Both programs ran successfully and printed the same thing.
    pub fn verified(&self) -> bool {
        self.original.success && self.converted.success && self.comparison.consistent
    }
}

/// Run an original program and its translation on the same input and compare
/// what they print.
pub async fn verify_translation(
    batch: &BatchExecutor,
    original: (&str, &str),
    converted: (&str, &str),
    stdin: &str,
) -> TranslationReport {
    let (original_lang, original_code) = original;
    let (converted_lang, converted_code) = converted;

    let (original, converted) = tokio::join!(
        batch.run(original_lang, original_code, stdin),
        batch.run(converted_lang, converted_code, stdin)
    );
    let comparison = compare_outputs(&original.output, &converted.output);

    log::info!(
        "Translation {} -> {}: consistent={}",
        original_lang,
        converted_lang,
        comparison.consistent
    );
    TranslationReport {
        original,
        converted,
        comparison,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_outputs() {
        let result = compare_outputs("hello\n", "hello");
        assert!(result.match_direct);
        assert!(result.match_normalized);
        assert!(result.consistent);
    }

    #[test]
    fn test_whitespace_only_difference() {
        let result = compare_outputs("1 2 3\n4", "1 2 3 4");
        assert!(!result.match_direct);
        assert!(result.match_normalized);
        assert!(!result.consistent);
        assert!(result.diff_preview.contains("--- original"));
        assert!(result.diff_preview.contains("+++ converted"));
    }

    #[test]
    fn test_different_outputs() {
        let result = compare_outputs("42\n", "43\n");
        assert!(!result.match_direct);
        assert!(!result.match_normalized);
        assert!(result.diff_preview.contains("-42"));
        assert!(result.diff_preview.contains("+43"));
    }

    #[test]
    fn test_preview_is_truncated() {
        let a: String = (0..200).map(|i| format!("line {}\n", i)).collect();
        let b: String = (0..200).map(|i| format!("row {}\n", i)).collect();
        let result = compare_outputs(&a, &b);
        assert_eq!(result.diff_preview.chars().count(), DIFF_PREVIEW_CHARS);
    }
}
