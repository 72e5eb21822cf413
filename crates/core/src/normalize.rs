//! Text normalization used when naming slides and importing fonts.
//!
//! Slide ids are derived from visible text, and font families exported by
//! office suites carry an " embedded" suffix that has to go before the
//! family can match the shared font style sheet.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Suffix office exporters append to families of embedded SVG fonts.
static EMBEDDED_SUFFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" embedded$").unwrap());

/// Maximum number of characters taken from the text when naming a slide.
const ID_STEM_LEN: usize = 8;

/// Stem used when a slide has no usable text.
const EMPTY_ID_STEM: &str = "s";

/// Build the readable part of a generated slide id.
///
/// Decomposes accented letters, keeps ASCII letters and digits, and takes
/// the first few characters in lowercase.
pub fn slide_id_stem(text: &str) -> String {
    let stem: String = text
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(ID_STEM_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if stem.is_empty() {
        EMPTY_ID_STEM.to_string()
    } else {
        stem
    }
}

/// Encode a number in base 36 using lowercase digits.
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Normalize a `font-family` value from an imported SVG.
pub fn normalize_font_family(family: &str) -> String {
    EMBEDDED_SUFFIX_REGEX.replace(family, "").to_lowercase()
}

/// Whether a text node carries nothing but layout whitespace.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}
