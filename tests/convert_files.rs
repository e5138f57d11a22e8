use book2text::config::ConversionConfig;
use book2text::converter::{convert_file, resolve_output_path, write_output};
use book2text::ocr::DisabledOcr;
use book2text::{ConvertError, Metadata};
use std::fs;

const NOVEL: &str = "\
THE QUIET HOUSE

by Ada Mercer

Contents

Chapter One ........ 1
Chapter Two ........ 9

Chapter One

The Arrival

The house stood at the end of a long and
narrow lane, where the hedges grew wild.

* * *

Nobody came to the door.

Chapter Two

\u{201C}Hello?\u{201D} she called \u{2014} twice.
";

#[test]
fn test_text_book_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("The Quiet House.txt");
    fs::write(&input, NOVEL).unwrap();

    let conversion = convert_file(
        &input,
        Some(Metadata::new("The Quiet House", "Ada Mercer")),
        &DisabledOcr,
        &ConversionConfig::default(),
    )
    .unwrap();

    assert_eq!(
        conversion.text(),
        "***\n\
         The house stood at the end of a long and narrow lane, where the hedges grew wild.\n\
         Nobody came to the door.\n\
         ***\n\
         \"Hello?\" she called -- twice."
    );
    assert!(conversion.warnings.is_empty());

    let output = resolve_output_path(&input, None).unwrap();
    assert_eq!(output.file_name().unwrap(), "The_Quiet_House.txt");
    write_output(&output, &conversion.text()).unwrap();
    assert!(fs::read_to_string(&output).unwrap().starts_with("***\n"));
}

#[test]
fn test_book_without_headings_is_one_prelude() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.TXT");
    fs::write(&input, "Just some text.\n\nAnd more of it.\n").unwrap();

    let conversion =
        convert_file(&input, None, &DisabledOcr, &ConversionConfig::default()).unwrap();
    assert_eq!(conversion.chapters, vec!["Just some text.\nAnd more of it."]);
    assert_eq!(conversion.boundaries(), 0);
}

#[test]
fn test_unsupported_extension_fails_before_reading() {
    let err = convert_file(
        std::path::Path::new("/nonexistent/book.mobi"),
        None,
        &DisabledOcr,
        &ConversionConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
}

#[test]
fn test_corrupt_pdf_is_adapter_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    fs::write(&input, b"%PDF-1.4 this is not really a pdf").unwrap();

    let err = convert_file(&input, None, &DisabledOcr, &ConversionConfig::default()).unwrap_err();
    assert!(matches!(err, ConvertError::AdapterRead { format: "pdf", .. }));
}
