use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Fatal conversion errors.
///
/// OCR failures are deliberately absent: they are caught where the image
/// block is handled and surface as [`OcrWarning`]s next to the output.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported file format: {extension:?}")]
    UnsupportedFormat { extension: String },

    #[error("failed to read {format} source: {message}")]
    AdapterRead {
        format: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConvertError {
    pub fn adapter(format: &'static str, message: impl Into<String>) -> Self {
        Self::AdapterRead {
            format,
            message: message.into(),
            source: None,
        }
    }

    pub fn adapter_with_source<E>(
        format: &'static str,
        message: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AdapterRead {
            format,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Recoverable failure of a single OCR call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR provider error: {0}")]
    Provider(String),

    #[error("malformed image: {0}")]
    MalformedImage(String),

    #[error("no OCR provider configured")]
    Unavailable,
}

/// An image whose text could not be recognized. The image contributed no
/// text to its chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrWarning {
    /// Zero-based position of the image block in the input stream.
    pub block_index: usize,
    /// Adapter-supplied reference for the image (file name, page, rel id).
    pub reference: String,
    pub error: OcrError,
}

impl std::fmt::Display for OcrWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "image {:?} (block {}): {}",
            self.reference, self.block_index, self.error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_message() {
        let err = ConvertError::adapter("pdf", "corrupt xref table");
        assert_eq!(err.to_string(), "failed to read pdf source: corrupt xref table");
    }

    #[test]
    fn test_warning_display() {
        let warning = OcrWarning {
            block_index: 4,
            reference: "images/map.png".to_string(),
            error: OcrError::Timeout(Duration::from_secs(30)),
        };
        assert_eq!(
            warning.to_string(),
            "image \"images/map.png\" (block 4): OCR timed out after 30s"
        );
    }
}
