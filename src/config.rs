use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, loadable from a JSON file. Every field has a
/// default, so `{}` is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub heading: HeadingConfig,
    pub ocr: OcrConfig,
    pub pdf: PdfConfig,
}

impl ConversionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.heading.validate()?;
        self.ocr.validate()?;
        self.pdf.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Lines longer than this are never heading-shaped.
    pub max_heading_tokens: usize,
    /// Largest value accepted as a chapter number.
    pub max_chapter_number: u32,
    /// Words that introduce a numbered division ("Chapter 4", "Part II").
    pub chapter_keywords: Vec<String>,
    /// Treat a line holding only digits as a heading even without a style
    /// hint. Off by default: bare digits are usually page numbers or list
    /// items.
    pub bare_digit_headings: bool,
    /// Drop the body of contents pages, dedications, appendices and the like.
    pub skip_front_matter: bool,
    pub front_matter_labels: Vec<String>,
    /// Absorb one short untitled-looking line after a heading as its subtitle.
    pub absorb_subtitles: bool,
    /// Once an adapter marks page or document starts, headings are only
    /// looked for in this many lines after each start. 0 looks everywhere.
    pub heading_window: usize,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            max_heading_tokens: 6,
            max_chapter_number: 999,
            chapter_keywords: ["chapter", "part", "book"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bare_digit_headings: false,
            skip_front_matter: true,
            front_matter_labels: default_front_matter_labels(),
            absorb_subtitles: true,
            heading_window: 6,
        }
    }
}

fn default_front_matter_labels() -> Vec<String> {
    [
        "about the author",
        "about the publisher",
        "acknowledgements",
        "acknowledgments",
        "also by",
        "appendix",
        "bibliography",
        "colophon",
        "contents",
        "copyright",
        "dedication",
        "endnotes",
        "epigraph",
        "errata",
        "footnotes",
        "foreword",
        "glossary",
        "index",
        "list of illustrations",
        "notes",
        "praise for",
        "preface",
        "table of contents",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl HeadingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_heading_tokens == 0 {
            return Err(ConvertError::Config("max_heading_tokens must be > 0".into()));
        }
        if self.max_chapter_number == 0 {
            return Err(ConvertError::Config("max_chapter_number must be > 0".into()));
        }
        if self.chapter_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConvertError::Config("chapter_keywords must not contain blanks".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OcrProviderKind {
    #[default]
    None,
    Tesseract,
    Vision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub provider: OcrProviderKind,
    pub timeout_secs: u64,
    /// Images narrower or shorter than this are decorative and skipped.
    pub min_image_dimension: u32,
    pub tesseract_binary: PathBuf,
    pub language: String,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the vision API key.
    pub api_key_env: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: OcrProviderKind::None,
            timeout_secs: 30,
            min_image_dimension: 5,
            tesseract_binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConvertError::Config("ocr.timeout_secs must be > 0".into()));
        }
        if self.provider == OcrProviderKind::Vision && self.endpoint.trim().is_empty() {
            return Err(ConvertError::Config(
                "ocr.endpoint is required for the vision provider".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub max_pages: Option<usize>,
    /// Render pages with no extractable text so they can go through OCR.
    pub rasterize_scanned_pages: bool,
    pub pdftoppm_binary: PathBuf,
    pub dpi: u32,
    /// A line repeated at a page edge on this many pages is a running header.
    pub running_header_min_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_pages: None,
            rasterize_scanned_pages: true,
            pdftoppm_binary: PathBuf::from("pdftoppm"),
            dpi: 150,
            running_header_min_pages: 3,
        }
    }
}

impl PdfConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == Some(0) {
            return Err(ConvertError::Config("pdf.max_pages must be > 0".into()));
        }
        if self.dpi < 50 {
            return Err(ConvertError::Config("pdf.dpi must be at least 50".into()));
        }
        if self.running_header_min_pages < 2 {
            return Err(ConvertError::Config("pdf.running_header_min_pages must be >= 2".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ConversionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.heading.max_heading_tokens, 6);
        assert_eq!(config.heading.heading_window, 6);
        assert_eq!(config.ocr.provider, OcrProviderKind::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config: ConversionConfig = serde_json::from_str(
            r#"{"heading": {"max_chapter_number": 99}, "ocr": {"provider": "tesseract"}}"#,
        )
        .unwrap();
        assert_eq!(config.heading.max_chapter_number, 99);
        assert!(config.heading.skip_front_matter);
        assert_eq!(config.ocr.provider, OcrProviderKind::Tesseract);
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = ConversionConfig::default();
        config.ocr.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConvertError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"pdf": {"max_pages": 25}}"#).unwrap();
        let config = ConversionConfig::load(&path).unwrap();
        assert_eq!(config.pdf.max_pages, Some(25));
    }
}
