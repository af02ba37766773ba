//! Dictionary lookups for submitted words

use log::info;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to load word list {path}: {source}")]
pub struct DictionaryError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Dictionary membership check used by game sessions
pub trait WordValidator: Send + Sync {
    fn is_valid_word(&self, word: &str) -> bool;
}

/// In-memory word list with case-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    /// Loads a newline-separated word list. Blank lines are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| DictionaryError {
            path: path.to_path_buf(),
            source,
        })?;

        let list = Self::from_words(contents.lines());
        info!("Loaded {} words from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordValidator for WordList {
    fn is_valid_word(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_case_insensitive_lookup() {
        let list = WordList::from_words(["apple", "Elephant"]);
        assert!(list.is_valid_word("apple"));
        assert!(list.is_valid_word("APPLE"));
        assert!(list.is_valid_word("elephant"));
        assert!(!list.is_valid_word("banana"));
        assert!(!list.is_valid_word(""));
    }

    #[test]
    fn test_blank_entries_ignored() {
        let list = WordList::from_words(["", "  ", "tiger "]);
        assert_eq!(list.len(), 1);
        assert!(list.is_valid_word("tiger"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "apple\nEagle\n\nrabbit").unwrap();

        let list = WordList::load(file.path()).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.is_valid_word("eagle"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WordList::load(dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
