use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::CorpusSettings;
use crate::error::Error;
use crate::types::{Chunk, Document};

const VCS_DIR: &str = ".git";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub window: usize,
    /// Windows with this many words or fewer are dropped. 0 keeps every non-blank window.
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window: 500, min_words: 0 }
    }
}

pub struct CorpusLoader {
    chunking: ChunkingConfig,
    excluded_extensions: Vec<String>,
}

impl Default for CorpusLoader {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl CorpusLoader {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self { chunking, excluded_extensions: CorpusSettings::default().excluded_extensions }
    }

    #[must_use]
    pub fn with_excluded_extensions(mut self, extensions: Vec<String>) -> Self {
        self.excluded_extensions = extensions;
        self
    }

    /// Walk `root` and read every eligible file, trimmed. Unreadable files are logged and skipped.
    pub fn load_documents(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("corpus directory {}", root.display())).into());
        }
        let mut documents = Vec::new();
        let walker = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != std::ffi::OsStr::new(VCS_DIR));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => { warn!("Skipping unreadable entry: {}", e); continue; }
            };
            if !entry.file_type().is_file() || !self.is_eligible(entry.path()) { continue; }
            let path = entry.path();
            match fs::read_to_string(path) {
                Ok(content) => {
                    // windows are cut from the trimmed text
                    let raw_text = content.trim();
                    if raw_text.is_empty() { info!("Skipped empty file: {}", path.display()); continue; }
                    info!("Loaded file: {} ({} characters)", path.display(), raw_text.chars().count());
                    documents.push(Document { file_path: path.to_string_lossy().to_string(), raw_text: raw_text.to_string() });
                }
                Err(e) => warn!("Error reading file {}: {}", path.display(), e),
            }
        }
        Ok(documents)
    }

    /// Split a document into consecutive, non-overlapping character windows.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        if document.raw_text.trim().is_empty() {
            debug!("Skipped chunking for empty content in: {}", document.file_path);
            return Vec::new();
        }
        let chunks: Vec<Chunk> = window_text(&document.raw_text, self.chunking.window)
            .into_iter()
            .filter(|w| self.keep_window(w))
            .map(|w| Chunk { file_path: document.file_path.clone(), text: w.to_string() })
            .collect();
        debug!("Chunked {} into {} chunks", document.file_path, chunks.len());
        chunks
    }

    /// Load and chunk the whole corpus. Fails when nothing usable remains.
    pub fn load_chunks(&self, root: &Path) -> Result<Vec<Chunk>> {
        let documents = self.load_documents(root)?;
        if documents.is_empty() {
            return Err(Error::EmptyCorpus(root.display().to_string()).into());
        }
        info!("Loaded {} files. Chunking content...", documents.len());
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunk_document(d)).collect();
        if chunks.is_empty() {
            return Err(Error::NoChunks.into());
        }
        info!("Generated {} chunks from {} files", chunks.len(), documents.len());
        Ok(chunks)
    }

    fn is_eligible(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
        if name.starts_with('.') { return false; }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => !self.excluded_extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)),
            None => true,
        }
    }

    fn keep_window(&self, window: &str) -> bool {
        if window.trim().is_empty() { return false; }
        self.chunking.min_words == 0 || window.split_whitespace().count() > self.chunking.min_words
    }
}

/// Cut `text` into windows of `window` chars; the last window may be shorter.
/// A zero window yields nothing.
pub fn window_text(text: &str, window: usize) -> Vec<&str> {
    if window == 0 { return Vec::new(); }
    let mut windows = Vec::with_capacity(text.len() / window + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == window {
            windows.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() { windows.push(&text[start..]); }
    windows
}
