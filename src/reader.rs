use crate::error::Result;

/// Adapter-supplied hint about what a block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Ordinary text, or anything the adapter could not classify.
    BodyText,
    /// Structurally marked as a heading (EPUB `<h1>`, DOCX heading style).
    PotentialHeading,
    /// An embedded image; the payload goes through OCR.
    ImageReference,
    /// Running headers, footers, page numbers, title-page furniture.
    Metadata,
}

/// Structural cue an adapter can attach when the format exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleHint {
    Bold,
    Centered,
    LargeFont,
    /// A page boundary follows this block.
    PageBreakFollows,
    /// This block opens a new page or document (DOCX `pageBreakBefore`,
    /// an EPUB spine document).
    SectionStart,
    /// The layout, not the author, broke the line after this block.
    LineWrapped,
}

/// One atomic unit of extracted text, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub content: String,
    pub origin: BlockOrigin,
    pub style: Vec<StyleHint>,
    /// Raw image bytes for `ImageReference` blocks. `content` then holds a
    /// human-readable reference used in warnings.
    pub image: Option<Vec<u8>>,
}

impl TextBlock {
    pub fn body(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: BlockOrigin::BodyText,
            style: Vec::new(),
            image: None,
        }
    }

    pub fn heading(content: impl Into<String>) -> Self {
        Self {
            origin: BlockOrigin::PotentialHeading,
            ..Self::body(content)
        }
    }

    pub fn metadata(content: impl Into<String>) -> Self {
        Self {
            origin: BlockOrigin::Metadata,
            ..Self::body(content)
        }
    }

    pub fn image(reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content: reference.into(),
            origin: BlockOrigin::ImageReference,
            style: Vec::new(),
            image: Some(bytes),
        }
    }

    pub fn with_hint(mut self, hint: StyleHint) -> Self {
        if !self.style.contains(&hint) {
            self.style.push(hint);
        }
        self
    }

    pub fn has_hint(&self, hint: StyleHint) -> bool {
        self.style.contains(&hint)
    }

    /// True when the layout broke the text after this block.
    pub fn has_layout_break(&self) -> bool {
        self.has_hint(StyleHint::LineWrapped) || self.has_hint(StyleHint::PageBreakFollows)
    }

    pub fn has_heading_style(&self) -> bool {
        self.style
            .iter()
            .any(|h| matches!(h, StyleHint::Bold | StyleHint::Centered | StyleHint::LargeFont))
    }
}

/// Book title and author, used to recognise title pages and running headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.author.trim().is_empty()
    }

    /// Fill blank fields from `other`.
    pub fn or(self, other: Metadata) -> Metadata {
        Metadata {
            title: if self.title.trim().is_empty() { other.title } else { self.title },
            author: if self.author.trim().is_empty() { other.author } else { self.author },
        }
    }
}

/// Lazy, single-pass stream of blocks produced by an adapter.
pub type BlockStream = Box<dyn Iterator<Item = Result<TextBlock>>>;

/// Format adapter (EPUB, DOCX, PDF, TXT).
///
/// `blocks` consumes the adapter: the stream is finite, in document order
/// and cannot be restarted.
pub trait BlockSource {
    /// Title and author as recorded in the document itself.
    fn metadata(&self) -> Metadata;
    fn blocks(self: Box<Self>) -> BlockStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_are_deduplicated() {
        let block = TextBlock::body("x")
            .with_hint(StyleHint::Bold)
            .with_hint(StyleHint::Bold);
        assert_eq!(block.style, vec![StyleHint::Bold]);
        assert!(block.has_heading_style());
        assert!(!block.has_layout_break());
    }

    #[test]
    fn test_metadata_fallback() {
        let caller = Metadata::new("", "Jane Austen");
        let document = Metadata::new("Emma", "Unknown");
        assert_eq!(caller.or(document), Metadata::new("Emma", "Jane Austen"));
    }
}
