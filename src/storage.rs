//! File input for keystores and wordlists.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file on disk that is read in one piece.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Loads the file as a wordlist, one candidate per line.
    ///
    /// See [`split_wordlist`] for the line rules.
    pub fn load_wordlist(&self) -> Result<Vec<String>> {
        let data = self.load()?;
        let words = split_wordlist(&data);
        debug!(path = %self.path.display(), candidates = words.len(), "wordlist loaded");
        Ok(words)
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Splits raw wordlist bytes into candidates.
///
/// Lines end at `\n`, and a `\r` right before it is dropped. A final newline
/// does not add an empty candidate, but empty lines elsewhere are kept.
/// A leading UTF-8 byte order mark is skipped. Lines that are not valid
/// UTF-8 are decoded lossily.
pub fn split_wordlist(data: &[u8]) -> Vec<String> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    if data.is_empty() {
        return Vec::new();
    }
    let data = data.strip_suffix(b"\n").unwrap_or(data);

    let mut lossy = 0usize;
    let words: Vec<String> = data
        .split(|&b| b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            match std::str::from_utf8(line) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    lossy += 1;
                    String::from_utf8_lossy(line).into_owned()
                }
            }
        })
        .collect();

    if lossy > 0 {
        warn!(lines = lossy, "wordlist lines were not valid UTF-8 and were decoded lossily");
    }
    words
}
