//! Recognising chapter numbers written as digits, words or roman numerals.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_ROMAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^M{0,3}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$").unwrap()
});
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,4})(st|nd|rd|th)?$").unwrap());

const UNITS: [(&str, u32); 20] = [
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
];

const TENS: [(&str, u32); 8] = [
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

const UNIT_ORDINALS: [(&str, u32); 19] = [
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
    ("sixth", 6),
    ("seventh", 7),
    ("eighth", 8),
    ("ninth", 9),
    ("tenth", 10),
    ("eleventh", 11),
    ("twelfth", 12),
    ("thirteenth", 13),
    ("fourteenth", 14),
    ("fifteenth", 15),
    ("sixteenth", 16),
    ("seventeenth", 17),
    ("eighteenth", 18),
    ("nineteenth", 19),
];

const TENS_ORDINALS: [(&str, u32); 8] = [
    ("twentieth", 20),
    ("thirtieth", 30),
    ("fortieth", 40),
    ("fiftieth", 50),
    ("sixtieth", 60),
    ("seventieth", 70),
    ("eightieth", 80),
    ("ninetieth", 90),
];

fn lookup(table: &[(&str, u32)], word: &str) -> Option<u32> {
    table.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
}

/// Value of a canonical roman numeral, case-insensitive.
pub fn roman_to_int(roman: &str) -> Option<u32> {
    let upper = roman.to_ascii_uppercase();
    if upper.is_empty() || !RE_ROMAN.is_match(&upper) {
        return None;
    }

    let value = |c: char| match c {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        'L' => 50,
        'C' => 100,
        'D' => 500,
        _ => 1000,
    };

    let mut total = 0;
    let mut prev = 0;
    for c in upper.chars().rev() {
        let v = value(c);
        if v < prev {
            total -= v;
        } else {
            total += v;
            prev = v;
        }
    }
    Some(total)
}

/// Value of a spelled-out number from zero to ninety-nine, cardinal or
/// ordinal. Accepts `twenty-one`, `twenty one` and `twentyone`.
pub fn word_to_num(word: &str) -> Option<u32> {
    let lower = word.trim().to_lowercase();
    let compact: String = lower.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    if compact.is_empty() {
        return None;
    }

    if let Some(n) = lookup(&UNITS, &compact).or_else(|| lookup(&UNIT_ORDINALS, &compact)) {
        return Some(n);
    }
    if let Some(n) = lookup(&TENS, &compact).or_else(|| lookup(&TENS_ORDINALS, &compact)) {
        return Some(n);
    }

    for (tens_word, tens) in TENS {
        if let Some(rest) = compact.strip_prefix(tens_word) {
            let unit = lookup(&UNITS, rest).or_else(|| lookup(&UNIT_ORDINALS, rest))?;
            return (1..=9).contains(&unit).then_some(tens + unit);
        }
    }
    None
}

/// Does `token` read as a chapter number between 1 and `max`?
///
/// Digits (optionally with an ordinal suffix), spelled-out words and roman
/// numerals qualify. One trailing `.` or `:` is tolerated; anything that looks
/// like part of a bigger numeric expression (`3.14`, `1,000`, `12:30`,
/// `2023`) does not.
pub fn is_chapter_number(token: &str, max: u32) -> bool {
    chapter_number_value(token).is_some_and(|n| n >= 1 && n <= max)
}

pub fn chapter_number_value(token: &str) -> Option<u32> {
    let token = token.trim();
    let token = token
        .strip_suffix('.')
        .or_else(|| token.strip_suffix(':'))
        .unwrap_or(token);
    if token.is_empty() {
        return None;
    }

    if token.starts_with(|c: char| c.is_ascii_digit()) {
        let lower = token.to_ascii_lowercase();
        let caps = RE_DIGITS.captures(&lower)?;
        return caps[1].parse().ok();
    }
    if token.chars().all(|c| c.is_ascii_alphabetic()) {
        if let Some(n) = roman_to_int(token) {
            return Some(n);
        }
    }
    if token.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
        return word_to_num(token);
    }
    None
}
