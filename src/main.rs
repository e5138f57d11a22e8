mod cli;

use anyhow::{bail, Context, Result};
use book2text::config::ConversionConfig;
use book2text::converter::{self, write_output};
use book2text::ocr::build_gateway;
use book2text::reader::Metadata;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => ConversionConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ConversionConfig::default(),
    };
    if let Some(choice) = cli.ocr {
        config.ocr.provider = choice.into();
    }
    if let Some(secs) = cli.ocr_timeout {
        config.ocr.timeout_secs = secs;
    }
    config.validate()?;

    let api_key = std::env::var(&config.ocr.api_key_env).ok();
    let ocr = build_gateway(&config.ocr, api_key).context("Failed to set up OCR")?;

    let books = collect_books(&cli.inputs)?;
    if books.is_empty() {
        bail!("No supported books found (expected .epub, .docx, .pdf or .txt)");
    }
    if cli.output.is_some() && books.len() > 1 {
        bail!("--output can only be used with a single input book");
    }

    let metadata = match (&cli.title, &cli.author) {
        (None, None) => None,
        (title, author) => Some(Metadata::new(
            title.clone().unwrap_or_default(),
            author.clone().unwrap_or_default(),
        )),
    };

    let mut failed = 0;
    let mut warning_count = 0;
    for book in &books {
        let result = converter::convert_file(book, metadata.clone(), ocr.as_ref(), &config);
        let conversion = match result {
            Ok(conversion) => conversion,
            Err(e) => {
                error!("Failed to convert {}: {:#}", book.display(), anyhow::Error::from(e));
                failed += 1;
                continue;
            }
        };

        for warning in &conversion.warnings {
            warn!("{}: {}", book.display(), warning);
        }
        warning_count += conversion.warnings.len();

        let text = conversion.text();
        if cli.stdout {
            println!("{}", text);
            continue;
        }
        let output_path = converter::resolve_output_path(book, cli.output.as_deref())?;
        write_output(&output_path, &text)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        eprintln!(
            "Converted {} chapters to {}",
            conversion.boundaries(),
            output_path.display()
        );
    }

    if warning_count > 0 {
        warn!("{} image(s) could not be read by OCR", warning_count);
    }
    if failed == books.len() {
        bail!("All {} book(s) failed to convert", failed);
    }
    if failed > 0 {
        info!("{} of {} book(s) failed", failed, books.len());
    }
    Ok(())
}

/// Expand directories into the supported books they contain, sorted.
fn collect_books(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut books = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_type().is_file()
                        && !is_hidden(e.path())
                        && converter::is_supported(e.path())
                })
                .map(|e| e.path().to_path_buf())
                .collect();
            found.sort();
            books.extend(found);
        } else if input.exists() {
            books.push(input.clone());
        } else {
            bail!("Input not found: {}", input.display());
        }
    }
    books.dedup();
    Ok(books)
}

/// Dotfiles such as macOS `._book.epub` resource forks.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
