//! HTML content documents to text blocks, by way of markdown.
//!
//! `html2md` already knows how to flatten XHTML; the markdown it produces is
//! then read line by line. ATX and setext headings keep their structure as
//! `PotentialHeading` blocks, `![alt](src)` becomes an image block, and the
//! remaining markup is stripped.

use crate::reader::{StyleHint, TextBlock};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Image bytes keyed by bare file name.
pub type ImageMap = HashMap<String, Vec<u8>>;

static RE_ATX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+(.*?)\s*#*$").unwrap());
static RE_SETEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(=+|-+)$").unwrap());
static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"!\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static RE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(\S(?:.*?\S)?)\*|\b_(\S(?:.*?\S)?)_\b").unwrap());
static RE_STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static RE_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|~])").unwrap());
static RE_LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[*+\-]\s+").unwrap());
static RE_TABLE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|?[\s:\-|]+\|?$").unwrap());
static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

/// Map a resource href (`../Images/fig.png`) to the key used in [`ImageMap`].
pub fn clean_filename(href: &str) -> String {
    let href = href.split(['#', '?']).next().unwrap_or(href);
    Path::new(href)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| href.to_string())
}

pub fn html_to_blocks(html: &str, images: &ImageMap) -> Vec<TextBlock> {
    let md = html2md::parse_html(html, false);
    markdown_to_blocks(&md, images)
}

pub fn markdown_to_blocks(md: &str, images: &ImageMap) -> Vec<TextBlock> {
    let lines: Vec<&str> = md.lines().map(str::trim).collect();
    let mut blocks = Vec::new();
    let mut in_code_fence = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if line.starts_with("```") {
            in_code_fence = !in_code_fence;
            continue;
        }
        if line.is_empty() || (RE_SETEXT.is_match(line) && line.len() >= 3) {
            continue;
        }

        // Setext heading: text underlined by === or ---.
        let setext = !in_code_fence
            && lines
                .get(i)
                .is_some_and(|next| RE_SETEXT.is_match(next) && !RE_LIST_MARKER.is_match(line));

        let (line, atx) = match RE_ATX.captures(line) {
            Some(caps) if !in_code_fence => (caps.get(1).map_or("", |m| m.as_str()), true),
            _ => (line, false),
        };

        for caps in RE_IMAGE.captures_iter(line) {
            let src = &caps[2];
            let key = clean_filename(src);
            match images.get(&key) {
                Some(bytes) => blocks.push(TextBlock::image(src, bytes.clone())),
                None => blocks.push(TextBlock {
                    image: None,
                    ..TextBlock::image(src, Vec::new())
                }),
            }
        }

        let bold = is_fully_bold(line);
        let text = strip_inline_markup(&RE_IMAGE.replace_all(line, ""));
        if text.trim().is_empty() {
            continue;
        }

        let block = if atx || setext {
            TextBlock::heading(text)
        } else {
            TextBlock::body(text)
        };
        blocks.push(if bold { block.with_hint(StyleHint::Bold) } else { block });

        if setext {
            i += 1;
        }
    }

    blocks
}

fn is_fully_bold(line: &str) -> bool {
    let inner = line
        .strip_prefix("**")
        .and_then(|l| l.strip_suffix("**"))
        .or_else(|| line.strip_prefix("__").and_then(|l| l.strip_suffix("__")));
    inner.is_some_and(|inner| !inner.trim().is_empty() && !inner.contains("**"))
}

/// Remove markdown syntax, leaving the words a reader would see.
pub fn strip_inline_markup(line: &str) -> String {
    let mut text = line.trim();
    while let Some(rest) = text.strip_prefix('>') {
        text = rest.trim_start();
    }
    let text = RE_LIST_MARKER.replace(text, "");

    if RE_TABLE_RULE.is_match(&text) && text.contains('|') {
        return String::new();
    }
    let text = if text.starts_with('|') {
        text.trim_matches('|').replace('|', " ")
    } else {
        text.to_string()
    };

    let text = RE_HTML_TAG.replace_all(&text, "");
    let text = RE_LINK.replace_all(&text, "$1");
    let text = RE_STRONG.replace_all(&text, "$1$2");
    let text = RE_EMPHASIS.replace_all(&text, "$1$2");
    let text = RE_STRIKE.replace_all(&text, "$1");
    let text = RE_ESCAPE.replace_all(&text, "$1");
    text.replace('\u{a0}', " ").trim().to_string()
}
