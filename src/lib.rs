//! Ebook to plain text for training pipelines.
//!
//! Each format adapter turns a book into a stream of [`TextBlock`]s; the
//! chapter engine decides where chapters begin and joins them with a
//! `***` line. Images go through an [`OcrGateway`] and a failed image is
//! reported as a warning instead of aborting the book.

pub mod config;
pub mod converter;
pub mod docx_reader;
pub mod engine;
pub mod epub_reader;
pub mod error;
pub mod heading;
pub mod markdown;
pub mod normalize;
pub mod numerals;
pub mod ocr;
pub mod pdf_reader;
pub mod reader;
pub mod text_reader;

pub use config::{ConversionConfig, HeadingConfig, OcrConfig, PdfConfig};
pub use converter::{convert_file, BookFormat, Conversion};
pub use engine::{convert, join_chapters, split_chapters, BookConversion, CHAPTER_SENTINEL};
pub use error::{ConvertError, OcrError, OcrWarning, Result};
pub use normalize::normalize;
pub use ocr::OcrGateway;
pub use reader::{BlockOrigin, BlockSource, Metadata, StyleHint, TextBlock};
