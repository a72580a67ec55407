use std::fs;

use tempfile::TempDir;

use super::*;

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn text_pages_split_on_form_feed() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "corpus.txt",
        b"Welcome to Rhythm Vineyard.\x0cOur tasting room opens at ten.\x0cShipping takes five days.",
    );

    let pages = load_document(&path).unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].page, 0);
    assert_eq!(pages[0].text, "Welcome to Rhythm Vineyard.");
    assert_eq!(pages[2].page, 2);
    assert_eq!(pages[2].text, "Shipping takes five days.");
    assert!(pages.iter().all(|p| p.source == path.display().to_string()));
}

#[test]
fn blank_pages_keep_numbering() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "gaps.txt", b"First page\x0c   \n\n\x0cThird page\x0c");

    let pages = load_document(&path).unwrap();
    let numbers: Vec<usize> = pages.iter().map(|p| p.page).collect();
    assert_eq!(numbers, vec![0, 2]);
    assert_eq!(pages[1].text, "Third page");
}

#[test]
fn single_page_text_without_separator() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.text", b"Just one page of notes.\n");

    let pages = load_document(&path).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].page, 0);
    assert_eq!(pages[0].text, "Just one page of notes.");
}

#[test]
fn newlines_are_normalized() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "crlf.txt", b"Line one\r\nLine two\r\n\r\n\r\n\r\nLine three");

    let pages = load_document(&path).unwrap();
    assert_eq!(pages[0].text, "Line one\nLine two\n\nLine three");
}

#[test]
fn markdown_is_flattened() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "guide.md",
        "# Our Grapes\n\nWe grow **Cabernet Sauvignon** and `Merlot`.\n\n- Malbec\n- Petit Verdot\n"
            .as_bytes(),
    );

    let pages = load_document(&path).unwrap();
    assert_eq!(pages.len(), 1);
    let text = &pages[0].text;
    assert!(text.starts_with("Our Grapes\n\n"));
    assert!(text.contains("We grow Cabernet Sauvignon and Merlot."));
    assert!(text.contains("Malbec"));
    assert!(text.contains("Petit Verdot"));
    assert!(!text.contains('#'));
    assert!(!text.contains("**"));
    assert!(!text.contains("\n\n\n"));
}

#[test]
fn markdown_pages_split_on_form_feed() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "paged.markdown", b"## Page one\x0c## Page two");

    let pages = load_document(&path).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].text, "Page one");
    assert_eq!(pages[1].text, "Page two");
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.pdf");

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, ConciergeError::DocumentNotFound(ref p) if p == &path));
}

#[test]
fn unsupported_extension_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sheet.xlsx", b"not really a spreadsheet");

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, ConciergeError::DocumentLoad(_)));
    assert!(err.to_string().contains(".xlsx"));

    let bare = write_file(&dir, "README", b"no extension");
    assert!(matches!(
        load_document(&bare),
        Err(ConciergeError::DocumentLoad(_))
    ));
}

#[test]
fn invalid_utf8_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "binary.txt", &[0xff, 0xfe, 0x00, 0x41]);

    assert!(matches!(
        load_document(&path),
        Err(ConciergeError::DocumentLoad(_))
    ));
}

#[test]
fn document_without_text_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "empty.txt", b"  \n\x0c\n\n");

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, ConciergeError::DocumentLoad(_)));
}

#[test]
fn extension_match_ignores_case() {
    assert_eq!(
        DocumentKind::from_path(Path::new("Corpus.PDF")).unwrap(),
        DocumentKind::Pdf
    );
    assert_eq!(
        DocumentKind::from_path(Path::new("notes.TXT")).unwrap(),
        DocumentKind::Text
    );
}
