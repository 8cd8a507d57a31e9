//! Vietnamese text normalization.
//!
//! Produces the lowercase, diacritic-free comparison form used for all
//! matching: canonical (NFD) decomposition, combining-mark removal,
//! đ/Đ folding, case folding, and whitespace collapsing. The display
//! form is never touched; normalized text exists only for matching.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize text into its comparison form.
///
/// The result is lowercase, stripped of combining diacritics, with internal
/// whitespace collapsed to single spaces and no leading/trailing whitespace.
/// Idempotent: `normalize(normalize(s)) == normalize(s)`. Characters with no
/// decomposition pass through unchanged after case folding.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        // đ/Đ carry no combining mark, so NFD leaves them alone
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            _ => c,
        })
        .flat_map(char::to_lowercase)
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_vietnamese_diacritics() {
        assert_eq!(normalize("Nguyễn Văn A"), "nguyen van a");
        assert_eq!(normalize("Trần Thị Hồng"), "tran thi hong");
        assert_eq!(normalize("Đặng Hữu Phước"), "dang huu phuoc");
    }

    #[test]
    fn test_lowercases() {
        assert_eq!(normalize("MSSV"), "mssv");
        assert_eq!(normalize("HỌ VÀ TÊN"), "ho va ten");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  Nguyễn \t Văn\n\nA  "), "nguyen van a");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Nguyễn Văn A",
            "  mixed   Case\tText ",
            "đường Đông",
            "plain ascii",
            "",
            "12345",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_accented_and_plain_share_comparison_form() {
        assert_eq!(normalize("Nguyễn"), normalize("Nguyen"));
        assert_eq!(normalize("Đông"), normalize("Dong"));
    }

    #[test]
    fn test_unrecognized_chars_pass_through() {
        assert_eq!(normalize("中文 Nguyễn"), "中文 nguyen");
        assert_eq!(normalize("a@b.c"), "a@b.c");
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }
}
