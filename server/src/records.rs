//! Persistent win/loss/high-score records
//!
//! The store is a plain text file with one `name,wins,losses,best_round_count`
//! line per player. Every update rewrites the whole file: the current contents
//! are loaded, modified in memory and written to a temporary sibling file that
//! is then renamed over the original. Updates are serialized through an async
//! mutex so two sessions finishing at the same time cannot lose each other's
//! results.

use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const UNKNOWN_PLAYER: &str = "Unknown";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read records from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write records to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One player's cumulative results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub best_round_count: u32,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            wins: 0,
            losses: 0,
            best_round_count: 0,
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match fields.as_slice() {
            [name, wins, losses, best] if !name.is_empty() => Some(Self {
                name: name.to_string(),
                wins: wins.parse().ok()?,
                losses: losses.parse().ok()?,
                best_round_count: best.parse().ok()?,
            }),
            _ => None,
        }
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{}\n",
            self.name, self.wins, self.losses, self.best_round_count
        )
    }

    fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    fn raise_best(&mut self, round_count: u32) {
        self.best_round_count = self.best_round_count.max(round_count);
    }
}

/// Makes a player-supplied name safe for the comma-separated format
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == ',' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN_PLAYER.to_string()
    } else {
        cleaned.to_string()
    }
}

fn find_or_insert<'a>(records: &'a mut Vec<Record>, name: &str) -> &'a mut Record {
    let index = match records.iter().position(|r| r.matches(name)) {
        Some(index) => index,
        None => {
            records.push(Record::new(name));
            records.len() - 1
        }
    };
    &mut records[index]
}

pub struct RecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record. A missing file is an empty store.
    pub async fn load(&self) -> Result<Vec<Record>, RecordError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(RecordError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Record::parse(line) {
                Some(record) => records.push(record),
                None => warn!(
                    "Skipping malformed record on line {} of {}",
                    number + 1,
                    self.path.display()
                ),
            }
        }
        Ok(records)
    }

    pub async fn lookup(&self, name: &str) -> Result<Option<Record>, RecordError> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.matches(name)))
    }

    /// Best round counts, highest first. Ties keep file order.
    pub async fn top_scores(&self, count: usize) -> Result<Vec<Record>, RecordError> {
        let mut records = self.load().await?;
        records.sort_by(|a, b| b.best_round_count.cmp(&a.best_round_count));
        records.truncate(count);
        Ok(records)
    }

    /// Adds one win for `winner_name`, one loss for `loser_name`, and raises
    /// both players' best round count to `round_count` if it is higher.
    pub async fn record_result(
        &self,
        winner_name: &str,
        loser_name: &str,
        round_count: u32,
    ) -> Result<(), RecordError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await?;
        let winner_name = sanitize_name(winner_name);
        let loser_name = sanitize_name(loser_name);

        let winner = find_or_insert(&mut records, &winner_name);
        winner.wins += 1;
        winner.raise_best(round_count);

        let loser = find_or_insert(&mut records, &loser_name);
        loser.losses += 1;
        loser.raise_best(round_count);

        self.save(&records).await?;
        debug!(
            "Recorded {} beat {} after {} rounds",
            winner_name, loser_name, round_count
        );
        Ok(())
    }

    async fn save(&self, records: &[Record]) -> Result<(), RecordError> {
        let contents: String = records.iter().map(Record::to_line).collect();
        let temp_path = self.temp_path();
        let write_err = |source| RecordError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(write_err)?;
        file.write_all(contents.as_bytes()).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(write_err)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> RecordStore {
        RecordStore::new(dir.path().join("records.txt"))
    }

    #[tokio::test]
    async fn test_new_players_get_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.record_result("Alice", "Bob", 7).await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(
            records,
            vec![
                Record {
                    name: "Alice".to_string(),
                    wins: 1,
                    losses: 0,
                    best_round_count: 7
                },
                Record {
                    name: "Bob".to_string(),
                    wins: 0,
                    losses: 1,
                    best_round_count: 7
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.record_result("Alice", "Bob", 7).await.unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, "Alice,1,0,7\nBob,0,1,7\n");
        assert!(!dir.path().join("records.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_best_round_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();

        let rising = RecordStore::new(dir.path().join("rising.txt"));
        rising.record_result("Alice", "Bob", 3).await.unwrap();
        rising.record_result("Alice", "Bob", 5).await.unwrap();

        let falling = RecordStore::new(dir.path().join("falling.txt"));
        falling.record_result("Alice", "Bob", 5).await.unwrap();
        falling.record_result("Alice", "Bob", 3).await.unwrap();

        for store in [&rising, &falling] {
            let alice = store.lookup("alice").await.unwrap().unwrap();
            assert_eq!(alice.wins, 2);
            assert_eq!(alice.best_round_count, 5);
            let bob = store.lookup("BOB").await.unwrap().unwrap();
            assert_eq!(bob.losses, 2);
            assert_eq!(bob.best_round_count, 5);
        }
    }

    #[tokio::test]
    async fn test_case_insensitive_match_preserves_first_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.record_result("Alice", "Bob", 2).await.unwrap();
        store.record_result("bob", "ALICE", 4).await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Alice");
        assert_eq!((records[0].wins, records[0].losses), (1, 1));
        assert_eq!(records[1].name, "Bob");
        assert_eq!((records[1].wins, records[1].losses), (1, 1));
        assert_eq!(records[1].best_round_count, 4);
    }

    #[tokio::test]
    async fn test_duplicate_entries_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "Alice,1,0,2\nalice,5,5,9\n").unwrap();

        store.record_result("ALICE", "Bob", 1).await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(records[0].wins, 2);
        assert_eq!(records[1].wins, 5);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "Alice,1,0,2\ngarbage\nBob,x,1,1\n\nCarol,0,3,4\n").unwrap();

        let records = store.load().await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.lookup("anyone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_location_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("no_such_dir").join("records.txt"));

        let result = store.record_result("Alice", "Bob", 1).await;
        assert!(matches!(result, Err(RecordError::Write { .. })));
    }

    #[tokio::test]
    async fn test_top_scores_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            "a,0,0,3\nb,0,0,9\nc,0,0,3\nd,0,0,1\ne,0,0,7\nf,0,0,5\n",
        )
        .unwrap();

        let top = store.top_scores(5).await.unwrap();
        let names: Vec<&str> = top.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "e", "f", "a", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));

        let mut tasks = Vec::new();
        for i in 0..10u32 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.record_result("Alice", "Bob", i).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let alice = store.lookup("Alice").await.unwrap().unwrap();
        assert_eq!(alice.wins, 10);
        assert_eq!(alice.best_round_count, 9);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Alice "), "Alice");
        assert_eq!(sanitize_name("Ali,ce"), "Ali ce");
        assert_eq!(sanitize_name(""), UNKNOWN_PLAYER);
        assert_eq!(sanitize_name(" , "), UNKNOWN_PLAYER);
    }
}
