use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::IngestSettings;
use crate::error::{Error, Result};
use crate::types::{Meta, SOURCE_KEY};

const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];
const EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Texts and their metadata, aligned 1:1, ready for embedding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub texts: Vec<String>,
    pub metadatas: Vec<Meta>,
}

impl IngestBatch {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn extend(&mut self, other: IngestBatch) {
        self.texts.extend(other.texts);
        self.metadatas.extend(other.metadatas);
    }
}

/// Recursive character splitter: tries paragraph, line, sentence (`". "`),
/// word and finally character boundaries, then merges pieces back up to `chunk_size` chars
/// with `chunk_overlap` chars carried between neighbours.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(Error::InvalidInput(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn from_settings(settings: &IngestSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut rest: &[&str] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() || text.contains(s) {
                separator = s;
                rest = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).map(String::from).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(std::mem::take(&mut fitting), separator));
            }
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, rest));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(&piece);
            let joined_len = if window.is_empty() { 0 } else { sep_len };
            if total + len + joined_len > self.chunk_size && !window.is_empty() {
                out.push(join(&window, separator));
                // Drop from the front until only the overlap tail remains.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + if window.is_empty() { 0 } else { sep_len } > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else { break };
                    let front_sep = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(&front) + front_sep);
                }
            }
            if !window.is_empty() {
                total += sep_len;
            }
            total += len;
            window.push_back(piece);
        }
        if !window.is_empty() {
            out.push(join(&window, separator));
        }
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &VecDeque<String>, separator: &str) -> String {
    window.iter().map(String::as_str).collect::<Vec<_>>().join(separator).trim().to_string()
}

/// Walks a directory of plain-text documents and chunks them for ingestion.
#[derive(Default)]
pub struct DataProcessor {
    chunker: TextChunker,
}

impl DataProcessor {
    pub fn new(chunker: TextChunker) -> Self {
        Self { chunker }
    }

    /// Chunks every `.txt`/`.md` file under `data_dir`, optionally limited to
    /// the first `limit` files in path order.
    pub fn process_directory(&self, data_dir: &Path, limit: Option<usize>) -> Result<IngestBatch> {
        let mut files = list_text_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no text files found");
            return Ok(IngestBatch::default());
        }
        if let Some(limit) = limit {
            if files.len() > limit {
                files.truncate(limit);
                info!(limit, "limited to first files");
            }
        }
        let mut batch = IngestBatch::default();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), index = file_index + 1, total = files.len(), "processing file");
            batch.extend(self.process_file(file_path)?);
        }
        info!(files = files.len(), chunks = batch.len(), "processed directory");
        Ok(batch)
    }

    pub fn process_file(&self, file_path: &Path) -> Result<IngestBatch> {
        let content = read_file_content(file_path)?;
        let source = file_path
            .file_name()
            .map_or_else(|| file_path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string());
        Ok(self.process_text(&content, &source))
    }

    pub fn process_text(&self, content: &str, source: &str) -> IngestBatch {
        let texts = self.chunker.split(content);
        let metadatas = texts
            .iter()
            .map(|_| Meta::from([(SOURCE_KEY.to_string(), source.to_string())]))
            .collect();
        IngestBatch { texts, metadatas }
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => fs::read(file_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {e}", file_path.display()))),
    }
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| EXTENSIONS.contains(&ext)))
        .collect();
    files.sort();
    files
}
