use crate::config::PdfConfig;
use crate::error::{ConvertError, Result};
use crate::reader::{BlockSource, BlockStream, Metadata, StyleHint, TextBlock};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^([Pp]age\s+)?(\d{1,4}|[ivxlc]{1,7})(\s+of\s+\d{1,4})?$",
        r"|^[-–]\s*\d{1,4}\s*[-–]$",
    ))
    .unwrap()
});
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// PDF adapter. Text comes from `pdf-extract`, one form-feed separated
/// chunk per page. Pages without text are rendered with `pdftoppm` and
/// handed on as images.
pub struct PdfSource {
    path: PathBuf,
    pages: Vec<String>,
    config: PdfConfig,
}

impl PdfSource {
    pub fn open(path: &Path, config: &PdfConfig) -> Result<Self> {
        info!("Extracting text from PDF: {:?}", path);
        let text = pdf_extract::extract_text(path).map_err(|e| {
            let message = format!("failed to extract text from {}: {}", path.display(), e);
            ConvertError::adapter("pdf", message)
        })?;

        let mut pages: Vec<String> = text.split('\x0C').map(|s| s.to_string()).collect();
        // A trailing form feed leaves an empty chunk that is not a page.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        if let Some(max) = config.max_pages {
            pages.truncate(max);
        }
        info!("Extracted {} pages from PDF", pages.len());

        Ok(Self::from_pages(path, pages, config))
    }

    pub fn from_pages(path: &Path, pages: Vec<String>, config: &PdfConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            pages,
            config: config.clone(),
        }
    }
}

impl BlockSource for PdfSource {
    /// PDF info dictionaries are unreliable; callers supply title and author.
    fn metadata(&self) -> Metadata {
        Metadata::default()
    }

    fn blocks(self: Box<Self>) -> BlockStream {
        let furniture = running_headers(&self.pages, self.config.running_header_min_pages);
        let PdfSource { path, pages, config } = *self;

        Box::new(pages.into_iter().enumerate().flat_map(move |(index, page)| {
            let number = index + 1;
            if !page.trim().is_empty() {
                return page_blocks(&page, &furniture).into_iter().map(Ok).collect::<Vec<_>>();
            }
            if !config.rasterize_scanned_pages {
                debug!(page = number, "skipping page without text");
                return Vec::new();
            }
            let reference = format!("page {}", number);
            let block = match rasterize_page(&path, number, &config) {
                Ok(bytes) => TextBlock::image(reference, bytes),
                Err(e) => {
                    warn!(page = number, error = %e, "failed to render scanned page");
                    TextBlock {
                        image: None,
                        ..TextBlock::image(reference, Vec::new())
                    }
                }
            };
            vec![Ok(block)]
        }))
    }
}

/// Key under which edge lines are compared across pages: case-folded, with
/// numbers removed so "EMMA 12" and "EMMA 13" match.
fn furniture_key(line: &str) -> String {
    RE_DIGITS.replace_all(&line.to_lowercase(), "#").trim().to_string()
}

fn edge_lines(page: &str) -> Vec<&str> {
    let lines: Vec<&str> = page.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    match lines.as_slice() {
        [] => Vec::new(),
        [only] => vec![*only],
        [first, .., last] => vec![*first, *last],
    }
}

/// Keys of lines repeated at a page edge on at least `min_pages` pages.
fn running_headers(pages: &[String], min_pages: usize) -> HashSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for page in pages {
        let keys: HashSet<String> = edge_lines(page).into_iter().map(furniture_key).collect();
        for key in keys {
            *counts.entry(key).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(key, count)| *count >= min_pages && key.chars().any(|c| c.is_alphanumeric()))
        .map(|(key, _)| key)
        .collect()
}

fn page_blocks(page: &str, furniture: &HashSet<String>) -> Vec<TextBlock> {
    let lines: Vec<&str> = page.lines().map(str::trim).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());

    let is_furniture = |i: usize| {
        let line = lines[i];
        (Some(i) == first || Some(i) == last)
            && (RE_PAGE_NUMBER.is_match(line) || furniture.contains(&furniture_key(line)))
    };

    let last_content = (0..lines.len()).rev().find(|&i| !lines[i].is_empty() && !is_furniture(i));

    let mut blocks = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        if is_furniture(i) {
            blocks.push(TextBlock::metadata(*line));
            continue;
        }
        let block = TextBlock::body(*line);
        let block = if Some(i) == last_content {
            block.with_hint(StyleHint::PageBreakFollows)
        } else if lines.get(i + 1).is_some_and(|next| !next.is_empty()) {
            block.with_hint(StyleHint::LineWrapped)
        } else {
            block
        };
        blocks.push(block);
    }
    blocks
}

/// Render one page to PNG with poppler's `pdftoppm`.
fn rasterize_page(path: &Path, page: usize, config: &PdfConfig) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("page");
    let output = Command::new(&config.pdftoppm_binary)
        .arg("-f")
        .arg(page.to_string())
        .arg("-l")
        .arg(page.to_string())
        .arg("-png")
        .arg("-r")
        .arg(config.dpi.to_string())
        .arg(path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ConvertError::adapter(
                "pdf",
                format!("cannot run {}: {}", config.pdftoppm_binary.display(), e),
            )
        })?;

    if !output.status.success() {
        return Err(ConvertError::adapter(
            "pdf",
            format!(
                "pdftoppm failed on page {}: {}",
                page,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    // pdftoppm zero-pads the page suffix depending on the page count.
    for entry in std::fs::read_dir(dir.path())? {
        let entry = entry?;
        if entry.path().extension().and_then(|s| s.to_str()) == Some("png") {
            return Ok(std::fs::read(entry.path())?);
        }
    }
    Err(ConvertError::adapter("pdf", format!("pdftoppm produced no image for page {}", page)))
}
