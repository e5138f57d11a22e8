use crate::error::{ConvertError, Result};
use crate::reader::{BlockSource, BlockStream, Metadata, StyleHint, TextBlock};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::iter::Peekable;
use std::path::Path;

/// Plain-text adapter. Each line is a block; a line directly followed by
/// another non-blank line is treated as wrapped, so hard-wrapped
/// paragraphs are joined back together.
pub struct TextSource<R> {
    reader: R,
}

impl TextSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            let message = format!("cannot open {}", path.display());
            ConvertError::adapter_with_source("txt", message, e)
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TextSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + 'static> BlockSource for TextSource<R> {
    fn metadata(&self) -> Metadata {
        Metadata::default()
    }

    fn blocks(self: Box<Self>) -> BlockStream {
        Box::new(TextBlocks {
            lines: self.reader.lines().peekable(),
            failed: false,
        })
    }
}

struct TextBlocks<R: BufRead> {
    lines: Peekable<Lines<R>>,
    failed: bool,
}

impl<R: BufRead> Iterator for TextBlocks<R> {
    type Item = Result<TextBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(ConvertError::adapter_with_source("txt", "read failed", e)));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let wrapped = matches!(self.lines.peek(), Some(Ok(next)) if !next.trim().is_empty());
            let block = TextBlock::body(line);
            return Some(Ok(if wrapped {
                block.with_hint(StyleHint::LineWrapped)
            } else {
                block
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blocks(text: &'static str) -> Vec<Result<TextBlock>> {
        Box::new(TextSource::new(Cursor::new(text.as_bytes()))).blocks().collect()
    }

    #[test]
    fn test_blank_lines_separate_paragraphs() {
        let blocks: Vec<TextBlock> = blocks("one\ntwo\n\nthree\n")
            .into_iter()
            .map(|b| b.unwrap())
            .collect();
        assert_eq!(
            blocks,
            vec![
                TextBlock::body("one").with_hint(StyleHint::LineWrapped),
                TextBlock::body("two"),
                TextBlock::body("three"),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_is_adapter_error() {
        let bytes: &'static [u8] = b"fine\n\xff\xfe broken\n";
        let results: Vec<_> = Box::new(TextSource::new(Cursor::new(bytes))).blocks().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ConvertError::AdapterRead { format: "txt", .. })));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        assert!(TextSource::open(Path::new("/nonexistent/book.txt")).is_err());
    }
}
