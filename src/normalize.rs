//! Typographic cleanup shared by every format.
//!
//! Everything here is pure and total: any string in, a string out, and
//! `normalize(normalize(x)) == normalize(x)`.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static RE_ORNAMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s*\-_~#=·•]+$").unwrap());

/// Replace typographic punctuation, ligatures and exotic spaces with plain
/// ASCII. Line structure is left untouched.
pub fn desmarten(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push_str("--"),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' => out.push('*'),
            '\u{00A0}' | '\u{2007}' | '\u{2009}' | '\u{200A}' | '\u{202F}' | '\u{3000}' => {
                out.push(' ')
            }
            '\u{00AD}' | '\u{200B}' | '\u{FEFF}' => {}
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            '\r' | '\u{000B}' | '\u{000C}' | '\u{2028}' | '\u{2029}' | '\u{0085}' => out.push('\n'),
            _ => out.push(ch),
        }
    }
    out
}

/// Desmarten, then collapse whitespace inside each line, trim every line and
/// squeeze runs of blank lines down to one paragraph break.
pub fn normalize(text: &str) -> String {
    let text = desmarten(&text.replace("\r\n", "\n"));

    let mut lines: Vec<String> = Vec::new();
    let mut blank_pending = false;
    for line in text.split('\n') {
        let collapsed = RE_HORIZONTAL_WS.replace_all(line, " ");
        let trimmed = collapsed.trim();
        if trimmed.is_empty() {
            blank_pending = !lines.is_empty();
            continue;
        }
        if blank_pending {
            lines.push(String::new());
            blank_pending = false;
        }
        lines.push(trimmed.to_string());
    }

    lines.join("\n")
}

/// Sentence-final `.`, `!` or `?`, allowing closing quotes and brackets after it.
pub fn ends_with_terminal_punctuation(line: &str) -> bool {
    let trimmed = line
        .trim_end()
        .trim_end_matches(|c: char| matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}'));
    matches!(trimmed.chars().last(), Some('.' | '!' | '?' | '\u{2026}'))
}

/// Scene-break ornaments such as `* * *`, `---` or `~~~`.
pub fn is_ornamental_separator(line: &str) -> bool {
    !line.trim().is_empty() && RE_ORNAMENT.is_match(line)
}

/// True when `line` ends in a hyphen left by a line-wrap (`exam-`), not a
/// dash (`--`) or a lone hyphen.
pub fn ends_with_wrap_hyphen(line: &str) -> bool {
    let mut chars = line.trim_end().chars().rev();
    matches!(
        (chars.next(), chars.next()),
        (Some('-'), Some(prev)) if prev.is_alphabetic()
    )
}
