//! Text normalization for recognized overlay lines.
//!
//! Pipeline (in order):
//! 1) fold full-width ASCII and the ideographic space to half-width
//! 2) fix recurring OCR misreads and unify colon/bullet glyphs
//! 3) strip timestamp fragments like `[8:21]` or a misread `8:2叼`
//! 4) drop all whitespace, then trim
//!
//! The pipeline is re-applied until the output stops changing, so
//! `normalize(normalize(x)) == normalize(x)` holds even when stripping a
//! timestamp or whitespace glues together a new misread pair.

use regex::Regex;
use std::sync::LazyLock;

/// Known misreads, applied in order.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("〔", "["),
    ("〕", "]"),
    ("【", "["),
    ("】", "]"),
    ("•", ":"),
    ("·", ":"),
    ("∶", ":"),
    ("﹕", ":"),
    ("訁", "詐"),
    ("進彳", "進行"),
    ("壬何乍", "任何操作"),
];

/// Optional bracket, 1-2 digits, colon, a digit plus one more alphanumeric
/// (OCR often corrupts the last glyph of a timestamp), optional closing bracket.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[?\s*\d{1,2}\s*:\s*\d[\d\w]?\s*\]?").expect("valid timestamp pattern")
});

const MAX_PASSES: usize = 8;

/// Fold full-width forms (U+FF01..U+FF5E) and U+3000 to their ASCII equivalents.
pub fn fold_width(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

fn apply_substitutions(input: &str) -> String {
    SUBSTITUTIONS
        .iter()
        .fold(input.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Remove timestamp-like fragments.
pub fn strip_timestamps(input: &str) -> String {
    TIMESTAMP_RE.replace_all(input, "").into_owned()
}

fn single_pass(input: &str) -> String {
    let folded = fold_width(input);
    let fixed = apply_substitutions(&folded);
    let stripped = strip_timestamps(&fixed);
    let compact: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim().to_string()
}

/// Clean one recognized line into its canonical form. Total, never fails.
pub fn normalize(raw: &str) -> String {
    let mut current = single_pass(raw);
    for _ in 1..MAX_PASSES {
        let next = single_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_full_width() {
        assert_eq!(fold_width("ＡＢＣ１２３：　！"), "ABC123: !");
    }

    #[test]
    fn test_strips_bracketed_timestamp() {
        assert_eq!(normalize("[21:05] 任務開始"), "任務開始");
    }

    #[test]
    fn test_strips_misread_timestamp_tail() {
        // The trailing glyph of "8:2x" is often garbage.
        assert_eq!(normalize("8:2叼 已進入副本"), "已進入副本");
        assert_eq!(normalize("[2:3許 討伐殲滅戰 完成"), "討伐殲滅戰完成");
    }

    #[test]
    fn test_full_width_timestamp_and_brackets() {
        assert_eq!(normalize("【１２：３４】 「極蠻神」 開始"), "「極蠻神」開始");
    }

    #[test]
    fn test_misread_table() {
        assert_eq!(normalize("請勿進彳壬何乍"), "請勿進行任何操作");
        assert_eq!(normalize("訁欺"), "詐欺");
        assert_eq!(normalize("A•B"), "A:B");
    }

    #[test]
    fn test_removes_all_whitespace() {
        assert_eq!(normalize("  Duty \t Complete \n"), "DutyComplete");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_idempotent_on_samples() {
        let samples = [
            "[2:3許 討伐殲滅戰 完成",
            "1:[2:34]5 之後",
            "進 彳 測試",
            "進[1:23]彳",
            "【１２：３４】 「極蠻神」 開始",
            "Level 50/60/70/80 Complete!",
            "壬何乍壬何乍",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_glued_fragments_are_fully_cleaned() {
        // Removing the inner timestamp exposes "1:5", which is stripped too.
        assert_eq!(normalize("1:[2:34]5 (x)"), "(x)");
        assert_eq!(normalize("進 彳"), "進行");
    }
}
