use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use book2text::config::OcrProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrChoice {
    None,
    Tesseract,
    Vision,
}

impl From<OcrChoice> for OcrProviderKind {
    fn from(choice: OcrChoice) -> Self {
        match choice {
            OcrChoice::None => OcrProviderKind::None,
            OcrChoice::Tesseract => OcrProviderKind::Tesseract,
            OcrChoice::Vision => OcrProviderKind::Vision,
        }
    }
}

/// Convert EPUB, DOCX, PDF and text books to plain text with chapters
/// separated by `***` lines
#[derive(Parser, Debug)]
#[command(name = "book2text", version, about)]
pub struct Cli {
    /// Input books, or directories to search for them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file. Only valid with a single input book; defaults to a .txt
    /// file next to each input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the text to stdout instead of writing files
    #[arg(long, default_value_t = false)]
    pub stdout: bool,

    /// Book title, used to drop title pages and running headers
    #[arg(long)]
    pub title: Option<String>,

    /// Book author, used to drop title pages and running headers
    #[arg(long)]
    pub author: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// OCR provider for images and scanned pages (overrides the config file)
    #[arg(long, value_enum)]
    pub ocr: Option<OcrChoice>,

    /// Seconds before a single OCR call is abandoned
    #[arg(long)]
    pub ocr_timeout: Option<u64>,

    /// Log every classification decision
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
