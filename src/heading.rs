//! Heuristics deciding whether a block looks like a chapter heading.
//!
//! A positive answer here only makes a block a *candidate*; the engine
//! confirms it by looking at what follows.

use crate::config::HeadingConfig;
use crate::normalize::{ends_with_terminal_punctuation, is_ornamental_separator, normalize};
use crate::numerals::chapter_number_value;
use crate::reader::{BlockOrigin, Metadata, TextBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    /// Starts a new chapter.
    Chapter,
    /// Contents, copyright, appendix and similar: not a chapter, and its body
    /// is dropped.
    FrontMatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    Heading(HeadingKind),
    Body,
    Noise,
}

#[derive(Debug, Clone)]
pub struct HeadingClassifier {
    config: HeadingConfig,
    title: String,
    author: String,
}

impl HeadingClassifier {
    pub fn new(config: HeadingConfig, metadata: &Metadata) -> Self {
        Self {
            config,
            title: normalize(&metadata.title).to_lowercase(),
            author: normalize(&metadata.author).to_lowercase(),
        }
    }

    pub fn config(&self) -> &HeadingConfig {
        &self.config
    }

    /// Classify a text block. `text` is the block's already-normalized content.
    pub fn classify(&self, block: &TextBlock, text: &str) -> BlockClass {
        if block.origin == BlockOrigin::Metadata
            || text.is_empty()
            || is_ornamental_separator(text)
            || self.is_title_or_author(text)
        {
            return BlockClass::Noise;
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let short = tokens.len() <= self.config.max_heading_tokens;

        if self.config.skip_front_matter
            && short
            && self.is_front_matter_label(block, text)
            && (block.origin == BlockOrigin::PotentialHeading
                || !ends_with_terminal_punctuation(text))
        {
            return BlockClass::Heading(HeadingKind::FrontMatter);
        }
        if block.origin == BlockOrigin::PotentialHeading {
            return BlockClass::Heading(HeadingKind::Chapter);
        }
        if !short {
            return BlockClass::Body;
        }
        if self.is_keyword_heading(&tokens, text)
            || (tokens.len() == 1 && self.is_lone_numeral(block, text))
            || (block.has_heading_style() && !ends_with_terminal_punctuation(text))
        {
            return BlockClass::Heading(HeadingKind::Chapter);
        }
        BlockClass::Body
    }

    /// A short line that can sit under a heading as its title
    /// ("Chapter One" / "The Beginning"). Unstyled lines must be title-cased.
    pub fn is_subtitle(&self, block: &TextBlock, text: &str) -> bool {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty()
            || tokens.len() > self.config.max_heading_tokens
            || ends_with_terminal_punctuation(text)
            || text.ends_with([',', ';', ':'])
            || is_ornamental_separator(text)
        {
            return false;
        }
        block.origin == BlockOrigin::PotentialHeading
            || block.has_heading_style()
            || is_title_case(&tokens)
    }

    /// "Chapter 7", "PART II", "Book Three: Return", or the keyword alone.
    /// Longer lines must read like a title, not a sentence.
    fn is_keyword_heading(&self, tokens: &[&str], text: &str) -> bool {
        let Some(first) = tokens.first() else {
            return false;
        };
        let keyword = first.trim_end_matches(['.', ':']).to_lowercase();
        if !self.config.chapter_keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            return false;
        }
        if tokens.len() > 2
            && (ends_with_terminal_punctuation(text)
                || first.starts_with(|c: char| c.is_lowercase()))
        {
            return false;
        }
        match tokens.get(1) {
            None => true,
            Some(next) => self.in_bound(chapter_number_value(next)),
        }
    }

    /// Spelled-out and roman numerals alone on a line are heading-shaped
    /// unless punctuated like a sentence ("Seven."). Bare digits need a
    /// style hint unless configured otherwise.
    fn is_lone_numeral(&self, block: &TextBlock, text: &str) -> bool {
        if !self.in_bound(chapter_number_value(text)) {
            return false;
        }
        if text.starts_with(|c: char| c.is_ascii_digit()) {
            self.config.bare_digit_headings || block.has_heading_style()
        } else {
            block.has_heading_style() || !ends_with_terminal_punctuation(text)
        }
    }

    fn in_bound(&self, value: Option<u32>) -> bool {
        value.is_some_and(|n| n >= 1 && n <= self.config.max_chapter_number)
    }

    /// Unstyled lines must match a label exactly; a styled or structural
    /// heading may continue after it ("Appendix B", "Also by Jane Austen").
    fn is_front_matter_label(&self, block: &TextBlock, text: &str) -> bool {
        let lower = text
            .trim_end_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        let prefixed = block.origin == BlockOrigin::PotentialHeading || block.has_heading_style();
        self.config.front_matter_labels.iter().any(|label| {
            let label = label.to_lowercase();
            lower == label
                || (prefixed
                    && lower
                        .strip_prefix(&label)
                        .is_some_and(|rest| rest.starts_with([' ', ':'])))
        })
    }

    /// Title pages, "by <author>" lines and running headers such as
    /// "EMMA 42" or "42 | Jane Austen".
    fn is_title_or_author(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        let lower = lower.strip_prefix("by ").unwrap_or(&lower).trim();
        [&self.title, &self.author]
            .into_iter()
            .filter(|known| !known.is_empty())
            .any(|known| {
                let rest = lower
                    .strip_prefix(known.as_str())
                    .or_else(|| lower.strip_suffix(known.as_str()));
                rest.is_some_and(|rest| rest.chars().all(is_running_header_filler))
            })
    }
}

fn is_running_header_filler(c: char) -> bool {
    c.is_ascii_digit() || c.is_whitespace() || matches!(c, '|' | '-' | ':' | ',' | '/')
}

const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "nor", "of", "on", "or",
    "the", "to", "with",
];

/// "The Road to Ruin", "1914", "In Which We Meet". Minor words may stay
/// lowercase after the first word.
fn is_title_case(tokens: &[&str]) -> bool {
    let starts_capitalised = |token: &str| {
        token
            .chars()
            .find(|c| c.is_alphanumeric())
            .map_or(true, |c| c.is_uppercase() || c.is_ascii_digit())
    };
    tokens.iter().enumerate().all(|(i, token)| {
        starts_capitalised(token)
            || (i > 0 && MINOR_WORDS.contains(&token.to_lowercase().as_str()))
    })
}
