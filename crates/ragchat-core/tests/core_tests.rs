use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ragchat_core::data_processor::{DataProcessor, TextChunker};
use ragchat_core::types::SOURCE_KEY;

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::default();
    let batch = processor.process_directory(dir, None).expect("process");

    assert_eq!(batch.len(), 1, "one small file becomes one chunk");
    assert_eq!(batch.texts[0], "Short text");
    assert_eq!(batch.metadatas[0].get(SOURCE_KEY).map(String::as_str), Some("a.txt"));
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.md"), "charlie delta").unwrap();

    let processor = DataProcessor::default();
    let batch = processor.process_directory(dir, Some(1)).expect("process limited");

    let sources: std::collections::HashSet<_> =
        batch.metadatas.iter().filter_map(|m| m.get(SOURCE_KEY)).collect();
    assert_eq!(sources.len(), 1, "limited to one source document");
}

#[test]
fn skips_unsupported_extensions_and_walks_subdirs() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("nested").join("notes.md"), "nested notes").unwrap();
    fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();

    let batch = DataProcessor::default().process_directory(dir, None).expect("process");
    assert_eq!(batch.texts, vec!["nested notes".to_string()]);
    assert_eq!(batch.metadatas[0].get(SOURCE_KEY).map(String::as_str), Some("notes.md"));
}

#[test]
fn long_document_yields_aligned_texts_and_metadata() {
    let tmp = TempDir::new().unwrap();
    let paragraph = "lorem ipsum dolor sit amet ".repeat(20);
    let body = vec![paragraph; 6].join("\n\n");
    fs::write(tmp.path().join("long.txt"), &body).unwrap();

    let processor = DataProcessor::new(TextChunker::new(200, 40).unwrap());
    let batch = processor.process_directory(tmp.path(), None).expect("process");

    assert!(batch.len() > 1);
    assert_eq!(batch.texts.len(), batch.metadatas.len());
    assert!(batch.texts.iter().all(|t| t.chars().count() <= 200));
}

#[test]
fn empty_directory_yields_empty_batch() {
    let tmp = TempDir::new().unwrap();
    let batch = DataProcessor::default().process_directory(tmp.path(), None).expect("process");
    assert!(batch.is_empty());
}
