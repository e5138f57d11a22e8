use crate::config::ConversionConfig;
use crate::docx_reader::DocxSource;
use crate::engine::{self, join_chapters};
use crate::epub_reader::EpubSource;
use crate::error::{ConvertError, OcrWarning, Result};
use crate::ocr::OcrGateway;
use crate::pdf_reader::PdfSource;
use crate::reader::{BlockSource, Metadata};
use crate::text_reader::TextSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Epub,
    Docx,
    Pdf,
    Text,
}

impl BookFormat {
    /// Pick the adapter from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "epub" => Ok(Self::Epub),
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" => Ok(Self::Text),
            _ => Err(ConvertError::UnsupportedFormat { extension }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    BookFormat::from_path(path).is_ok()
}

pub fn open_source(path: &Path, config: &ConversionConfig) -> Result<Box<dyn BlockSource>> {
    Ok(match BookFormat::from_path(path)? {
        BookFormat::Epub => {
            let source = EpubSource::open(path)?;
            if config.heading.skip_front_matter {
                Box::new(source.skipping_documents(&config.heading.front_matter_labels))
            } else {
                Box::new(source)
            }
        }
        BookFormat::Docx => Box::new(DocxSource::open(path)?),
        BookFormat::Pdf => Box::new(PdfSource::open(path, &config.pdf)?),
        BookFormat::Text => Box::new(TextSource::open(path)?),
    })
}

/// A converted book: chapter strings plus the images OCR could not read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    pub chapters: Vec<String>,
    pub warnings: Vec<OcrWarning>,
}

impl Conversion {
    /// The text written to disk: chapters separated by the sentinel line.
    pub fn text(&self) -> String {
        join_chapters(&self.chapters)
    }

    /// Number of confirmed chapter boundaries.
    pub fn boundaries(&self) -> usize {
        self.chapters.len().saturating_sub(1)
    }
}

/// Convert one book. Title and author given by the caller take precedence
/// over what the document declares.
pub fn convert_file(
    path: &Path,
    metadata: Option<Metadata>,
    ocr: &dyn OcrGateway,
    config: &ConversionConfig,
) -> Result<Conversion> {
    let source = open_source(path, config)?;
    let metadata = metadata.unwrap_or_default().or(source.metadata());
    info!(path = %path.display(), title = %metadata.title, author = %metadata.author, "converting");

    let mut conversion = engine::convert(source.blocks(), &metadata, ocr, &config.heading);
    let chapters = conversion.by_ref().collect::<Result<Vec<_>>>()?;
    let warnings = conversion.into_warnings();

    info!(
        chapters = chapters.len().saturating_sub(1),
        warnings = warnings.len(),
        "converted {}",
        path.display()
    );
    Ok(Conversion { chapters, warnings })
}

/// Where the output for `input` goes when no path was given: next to the
/// input, with spaces, dashes and dots in the stem replaced by underscores.
pub fn resolve_output_path(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.to_path_buf());
    }

    let stem = input
        .file_stem()
        .ok_or_else(|| {
            ConvertError::Config(format!("input has no file name: {}", input.display()))
        })?
        .to_string_lossy()
        .replace([' ', '-', '.'], "_");
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(format!("{}.txt", stem)))
}

pub fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    Ok(())
}
