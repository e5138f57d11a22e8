use crate::error::{ConvertError, Result};
use crate::markdown::{self, clean_filename, ImageMap};
use crate::reader::{BlockSource, BlockStream, Metadata, StyleHint, TextBlock};
use rbook::prelude::Metadata as _;
use rbook::prelude::*;
use rbook::Epub;
use std::path::Path;
use tracing::{debug, warn};

/// Spine documents that never hold chapter text, by file name.
const SKIPPED_DOCUMENTS: &[&str] = &["cover", "nav", "titlepage", "toc"];

/// EPUB adapter: spine documents in reading order, each converted through
/// markdown into blocks.
pub struct EpubSource {
    epub: Epub,
    skipped_labels: Vec<String>,
}

impl EpubSource {
    pub fn open(path: &Path) -> Result<Self> {
        let epub = Epub::options()
            .strict(false)
            .open(path)
            .map_err(|e| ConvertError::adapter("epub", format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            epub,
            skipped_labels: Vec::new(),
        })
    }

    /// Also skip spine documents named after one of `labels`
    /// (`copyright.xhtml`, `acknowledgements_01.html`).
    pub fn skipping_documents(mut self, labels: &[String]) -> Self {
        self.skipped_labels = labels.iter().map(|l| l.to_lowercase()).collect();
        self
    }

    /// All manifest images, keyed by file name. An unreadable image is left
    /// out; its reference then reaches OCR without a payload.
    fn images(&self) -> ImageMap {
        let mut images = ImageMap::new();
        for entry in self.epub.manifest().images() {
            let href = entry.resource().key().value().unwrap_or("unknown").to_string();
            match entry.read_bytes() {
                Ok(bytes) => {
                    images.insert(clean_filename(&href), bytes);
                }
                Err(e) => warn!(%href, error = %e, "failed to read EPUB image"),
            }
        }
        images
    }

    fn read_blocks(&self) -> Vec<Result<TextBlock>> {
        let images = self.images();
        let mut out = Vec::new();
        let mut reader = self.epub.reader();
        let mut document = 0;

        while let Some(result) = reader.read_next() {
            let data = match result {
                Ok(data) => data,
                Err(e) => {
                    out.push(Err(ConvertError::adapter(
                        "epub",
                        format!("failed to read spine document {}: {}", document, e),
                    )));
                    break;
                }
            };
            document += 1;

            let href = data.manifest_entry().href().decode().into_owned();
            if is_skipped_document(&href, &self.skipped_labels) {
                debug!(document, %href, "skipping front matter document");
                continue;
            }
            let html = data.content().to_string();
            if html.trim().is_empty() {
                continue;
            }
            let mut blocks = markdown::html_to_blocks(&html, &images);
            if let Some(first) = blocks.first_mut() {
                first.style.push(StyleHint::SectionStart);
            }
            debug!(document, blocks = blocks.len(), "read spine document");
            out.extend(blocks.into_iter().map(Ok));
        }

        out
    }
}

impl BlockSource for EpubSource {
    fn metadata(&self) -> Metadata {
        let title = self
            .epub
            .metadata()
            .title()
            .map(|t| t.value().to_string())
            .unwrap_or_default();
        let author = self
            .epub
            .metadata()
            .creators()
            .map(|c| c.value().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Metadata::new(title, author)
    }

    fn blocks(self: Box<Self>) -> BlockStream {
        Box::new(self.read_blocks().into_iter())
    }
}

/// The file stem is a label, optionally numbered: `toc`, `copyright-2`.
/// Generated names such as `index_split_003` are kept.
fn is_skipped_document(href: &str, labels: &[String]) -> bool {
    let name = href.rsplit('/').next().unwrap_or(href);
    let stem = name
        .split_once('.')
        .map_or(name, |(stem, _)| stem)
        .to_lowercase()
        .replace(['_', '-'], " ");
    SKIPPED_DOCUMENTS
        .iter()
        .copied()
        .chain(labels.iter().map(String::as_str))
        .any(|label| {
            stem.strip_prefix(label)
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit() || c == ' '))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::BlockOrigin;
    use std::fs;

    const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container" version="1.0">
  <rootfiles>
    <rootfile full-path="content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Quiet House</dc:title>
    <dc:creator>Ada Mercer</dc:creator>
    <dc:identifier id="uid">urn:uuid:quiet-house</dc:identifier>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="copyright" href="copyright.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="chapter2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover"/>
    <itemref idref="copyright"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:quiet-house"/></head>
  <docTitle><text>The Quiet House</text></docTitle>
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="chapter1.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    fn page(body: &str) -> String {
        format!("<html xmlns=\"http://www.w3.org/1999/xhtml\"><body>{}</body></html>", body)
    }

    /// Unpacked EPUB laid out as a directory, which rbook reads like an archive.
    fn write_book(dir: &Path) {
        fs::create_dir_all(dir.join("META-INF")).unwrap();
        fs::write(dir.join("mimetype"), "application/epub+zip").unwrap();
        fs::write(dir.join("META-INF/container.xml"), CONTAINER).unwrap();
        fs::write(dir.join("content.opf"), PACKAGE).unwrap();
        fs::write(dir.join("toc.ncx"), NCX).unwrap();
        fs::write(dir.join("cover.xhtml"), page("<p>Cover art goes here.</p>")).unwrap();
        fs::write(dir.join("copyright.xhtml"), page("<p>All rights reserved.</p>")).unwrap();
        fs::write(
            dir.join("chapter1.xhtml"),
            page("<h1>Chapter One</h1><p>The house stood alone.</p>"),
        )
        .unwrap();
        fs::write(
            dir.join("chapter2.xhtml"),
            page("<h1>Chapter Two</h1><p>Nobody came.</p>"),
        )
        .unwrap();
    }

    fn front_matter() -> Vec<String> {
        vec!["copyright".to_string(), "dedication".to_string()]
    }

    #[test]
    fn test_skipped_document_names() {
        let labels = front_matter();
        assert!(is_skipped_document("OEBPS/Text/cover.xhtml", &labels));
        assert!(is_skipped_document("toc.xhtml", &labels));
        assert!(is_skipped_document("Text/Copyright-2.html", &labels));
        assert!(!is_skipped_document("chapter1.xhtml", &labels));
        assert!(!is_skipped_document("index_split_003.html", &labels));
        assert!(!is_skipped_document("copyright.xhtml", &[]));
    }

    #[test]
    fn test_reads_spine_in_order_without_front_matter_documents() {
        let dir = tempfile::tempdir().unwrap();
        write_book(dir.path());

        let source = EpubSource::open(dir.path()).unwrap().skipping_documents(&front_matter());
        assert_eq!(source.metadata(), Metadata::new("The Quiet House", "Ada Mercer"));

        let blocks: Vec<TextBlock> = Box::new(source).blocks().map(|b| b.unwrap()).collect();
        let texts: Vec<&str> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Chapter One", "The house stood alone.", "Chapter Two", "Nobody came."]
        );
        assert_eq!(blocks[0].origin, BlockOrigin::PotentialHeading);
        assert!(blocks[0].has_hint(StyleHint::SectionStart));
        assert!(!blocks[1].has_hint(StyleHint::SectionStart));
        assert!(blocks[2].has_hint(StyleHint::SectionStart));
    }

    #[test]
    fn test_open_missing_file_is_adapter_error() {
        let err = EpubSource::open(Path::new("/nonexistent/book.epub")).err().unwrap();
        assert!(matches!(err, ConvertError::AdapterRead { format: "epub", .. }));
    }

    #[test]
    fn test_open_garbage_is_adapter_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        assert!(EpubSource::open(&path).is_err());
    }
}
