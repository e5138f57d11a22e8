//! Image-to-text recognition.
//!
//! Providers are swappable behind [`OcrGateway`]. Every failure comes back
//! as an [`OcrError`] value; the engine turns it into a warning and keeps
//! converting.

use crate::config::{OcrConfig, OcrProviderKind};
use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const NO_TEXT_MARKER: &str = "No text found";

const VISION_PROMPT: &str = "Please provide the text in this image without any commentary. \
     If there is no text in the image, or it is unreadable, respond with 'No text found'";

/// Recognize the text in one image.
///
/// `Ok("")` means the image holds no text. Implementations never panic on
/// bad input and must return within their configured timeout.
pub trait OcrGateway {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Gateway used when no provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

impl OcrGateway for DisabledOcr {
    fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Unavailable)
    }
}

/// Outcome of the checks run before an image reaches a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    /// Too small to carry text (spacers, rules, bullets).
    Decorative,
    Accepted(ImageFormat),
}

/// Decode enough of the image to know its format and size.
pub fn screen_image(image: &[u8], min_dimension: u32) -> Result<Screening, OcrError> {
    if image.is_empty() {
        return Err(OcrError::MalformedImage("empty image payload".to_string()));
    }
    let format = image::guess_format(image).map_err(|e| OcrError::MalformedImage(e.to_string()))?;
    let (width, height) = image::io::Reader::with_format(Cursor::new(image), format)
        .into_dimensions()
        .map_err(|e| OcrError::MalformedImage(e.to_string()))?;

    if width < min_dimension || height < min_dimension {
        debug!(width, height, "skipping decorative image");
        return Ok(Screening::Decorative);
    }
    Ok(Screening::Accepted(format))
}

fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

fn mime_type_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Providers answer "No text found" for blank images.
fn clean_response(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.trim_matches(|c: char| c == '\'' || c == '"' || c == '.') == NO_TEXT_MARKER {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Local OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    timeout: Duration,
    min_dimension: u32,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_binary.clone(),
            language: config.language.clone(),
            timeout: config.timeout(),
            min_dimension: config.min_image_dimension,
        }
    }
}

impl OcrGateway for TesseractOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let format = match screen_image(image, self.min_dimension)? {
            Screening::Decorative => return Ok(String::new()),
            Screening::Accepted(format) => format,
        };

        let provider_err = |e: std::io::Error| OcrError::Provider(e.to_string());
        let dir = tempfile::tempdir().map_err(provider_err)?;
        let input = dir.path().join(format!("image.{}", extension_for(format)));
        let output_base = dir.path().join("ocr");
        std::fs::write(&input, image).map_err(provider_err)?;

        let mut child = Command::new(&self.binary)
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                OcrError::Provider(format!("cannot run {}: {}", self.binary.display(), e))
            })?;

        // Read stderr while waiting so a chatty binary cannot fill the pipe.
        let mut stderr_pipe = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut stderr = String::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            stderr
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait().map_err(provider_err)? {
                Some(status) => break status,
                None if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OcrError::Timeout(self.timeout));
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        };

        if !status.success() {
            let stderr = stderr_reader.join().unwrap_or_default();
            return Err(OcrError::Provider(format!(
                "tesseract exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let text =
            std::fs::read_to_string(output_base.with_extension("txt")).map_err(provider_err)?;
        Ok(clean_response(&text))
    }
}

/// Remote OCR through an OpenAI-compatible chat-completions endpoint.
pub struct VisionOcr {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    min_dimension: u32,
}

impl VisionOcr {
    /// The API key is passed in explicitly; reading it from the environment
    /// is the caller's business.
    pub fn new(config: &OcrConfig, api_key: impl Into<String>) -> Result<Self, OcrError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OcrError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout: config.timeout(),
            min_dimension: config.min_image_dimension,
        })
    }

    fn payload(&self, image: &[u8], format: ImageFormat) -> serde_json::Value {
        let data_url = format!("data:{};base64,{}", mime_type_for(format), STANDARD.encode(image));
        serde_json::json!({
            "model": self.model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": VISION_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url, "detail": "low" } }
                ]
            }]
        })
    }
}

impl OcrGateway for VisionOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let format = match screen_image(image, self.min_dimension)? {
            Screening::Decorative => return Ok(String::new()),
            Screening::Accepted(format) => format,
        };

        let request_err = |e: reqwest::Error| {
            if e.is_timeout() {
                OcrError::Timeout(self.timeout)
            } else {
                OcrError::Provider(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(image, format))
            .send()
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Provider(format!("HTTP {}", status)));
        }

        let body: serde_json::Value = response.json().map_err(request_err)?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OcrError::Provider("response has no message content".to_string()))?;
        Ok(clean_response(content))
    }
}

/// Build the gateway selected in `config`.
pub fn build_gateway(
    config: &OcrConfig,
    api_key: Option<String>,
) -> Result<Box<dyn OcrGateway>, OcrError> {
    match config.provider {
        OcrProviderKind::None => Ok(Box::new(DisabledOcr)),
        OcrProviderKind::Tesseract => {
            info!(binary = %config.tesseract_binary.display(), "using tesseract OCR");
            Ok(Box::new(TesseractOcr::new(config)))
        }
        OcrProviderKind::Vision => {
            let api_key = api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| OcrError::Provider(format!("{} is not set", config.api_key_env)))?;
            info!(model = %config.model, "using vision OCR");
            Ok(Box::new(VisionOcr::new(config, api_key)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_screen_rejects_garbage() {
        assert!(matches!(screen_image(b"not an image", 5), Err(OcrError::MalformedImage(_))));
        assert!(matches!(screen_image(&[], 5), Err(OcrError::MalformedImage(_))));
    }

    #[test]
    fn test_screen_skips_tiny_images() {
        assert_eq!(screen_image(&png(1, 40), 5).unwrap(), Screening::Decorative);
        assert_eq!(screen_image(&png(40, 40), 5).unwrap(), Screening::Accepted(ImageFormat::Png));
    }

    #[test]
    fn test_no_text_marker_is_empty() {
        assert_eq!(clean_response("No text found"), "");
        assert_eq!(clean_response("'No text found'."), "");
        assert_eq!(clean_response("  CHAPTER ONE \n"), "CHAPTER ONE");
    }

    #[test]
    fn test_disabled_gateway() {
        assert_eq!(DisabledOcr.recognize(&png(40, 40)), Err(OcrError::Unavailable));
    }

    #[test]
    fn test_missing_tesseract_binary_is_provider_error() {
        let config = OcrConfig {
            tesseract_binary: PathBuf::from("/nonexistent/tesseract-binary"),
            ..OcrConfig::default()
        };
        let ocr = TesseractOcr::new(&config);
        assert!(matches!(ocr.recognize(&png(40, 40)), Err(OcrError::Provider(_))));
        // Decorative images never reach the binary.
        assert_eq!(ocr.recognize(&png(2, 2)), Ok(String::new()));
    }

    #[cfg(unix)]
    fn fake_tesseract(dir: &std::path::Path, script: &str) -> OcrConfig {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-tesseract");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        OcrConfig {
            tesseract_binary: path,
            timeout_secs: 20,
            ..OcrConfig::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_tesseract_with_noisy_stderr_completes() {
        let dir = tempfile::tempdir().unwrap();
        // Well past the pipe buffer, so an undrained stderr would block.
        let script = "#!/bin/sh\n\
                      head -c 300000 /dev/zero | tr '\\0' x >&2\n\
                      echo 'CHAPTER ONE' > \"$2.txt\"\n";
        let ocr = TesseractOcr::new(&fake_tesseract(dir.path(), script));
        assert_eq!(ocr.recognize(&png(40, 40)), Ok("CHAPTER ONE".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_tesseract_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = "#!/bin/sh\necho 'bad language pack' >&2\nexit 3\n";
        let ocr = TesseractOcr::new(&fake_tesseract(dir.path(), script));
        match ocr.recognize(&png(40, 40)) {
            Err(OcrError::Provider(message)) => assert!(message.contains("bad language pack")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_vision_requires_api_key() {
        let config = OcrConfig {
            provider: OcrProviderKind::Vision,
            ..OcrConfig::default()
        };
        assert!(build_gateway(&config, None).is_err());
        assert!(build_gateway(&config, Some("  ".to_string())).is_err());
    }
}
