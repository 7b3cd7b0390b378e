//! # Append-Only Stores
//!
//! The log needs two ordered, durable, appendable record sequences: leaves
//! and signed tree heads. [`LeafStore`] and [`SthStore`] are the seams;
//! two backends implement them.
//!
//! - `Memory*`: a `parking_lot::RwLock<Vec<_>>`, for tests and ephemeral runs.
//! - `Jsonl*`: one JSON object per line in `users.jsonl` / `sth.jsonl`.
//!   Each append is flushed with `sync_all` before returning. Reads parse the
//!   whole file under a read lock, so a reader never sees a half-written line.
//!   A line without its trailing newline was never acknowledged: reads skip it
//!   if it does not parse, and the next append cuts it off.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::leaf::LeafRecord;
use crate::sth::SignedTreeHead;

/// File name of the leaf store inside a data directory.
pub const LEAF_FILE: &str = "users.jsonl";
/// File name of the STH store inside a data directory.
pub const STH_FILE: &str = "sth.jsonl";

/// Ordered, append-only storage of registrations.
pub trait LeafStore: Send + Sync {
    /// Append one record at the end.
    fn append(&self, record: LeafRecord) -> Result<(), StoreError>;
    /// Every record in append order.
    fn list_all(&self) -> Result<Vec<LeafRecord>, StoreError>;
    /// Number of records.
    fn len(&self) -> Result<usize, StoreError>;
    /// Whether the store is empty.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Ordered, append-only storage of signed tree heads.
pub trait SthStore: Send + Sync {
    /// Append one STH at the end.
    fn append(&self, sth: SignedTreeHead) -> Result<(), StoreError>;
    /// The most recently appended STH.
    fn latest(&self) -> Result<Option<SignedTreeHead>, StoreError>;
    /// Up to `limit` STHs, newest first.
    fn list_recent(&self, limit: usize) -> Result<Vec<SignedTreeHead>, StoreError>;
    /// Every STH, oldest first.
    fn list_all(&self) -> Result<Vec<SignedTreeHead>, StoreError>;
    /// Number of STHs.
    fn len(&self) -> Result<usize, StoreError>;
    /// Whether the store is empty.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn newest_first<T: Clone>(records: &[T], limit: usize) -> Vec<T> {
    records.iter().rev().take(limit).cloned().collect()
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory leaf store.
#[derive(Debug, Default)]
pub struct MemoryLeafStore {
    records: RwLock<Vec<LeafRecord>>,
}

impl MemoryLeafStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeafStore for MemoryLeafStore {
    fn append(&self, record: LeafRecord) -> Result<(), StoreError> {
        self.records.write().push(record);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<LeafRecord>, StoreError> {
        Ok(self.records.read().clone())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}

/// In-memory STH store.
#[derive(Debug, Default)]
pub struct MemorySthStore {
    records: RwLock<Vec<SignedTreeHead>>,
}

impl MemorySthStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SthStore for MemorySthStore {
    fn append(&self, sth: SignedTreeHead) -> Result<(), StoreError> {
        self.records.write().push(sth);
        Ok(())
    }

    fn latest(&self) -> Result<Option<SignedTreeHead>, StoreError> {
        Ok(self.records.read().last().cloned())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<SignedTreeHead>, StoreError> {
        Ok(newest_first(&self.records.read(), limit))
    }

    fn list_all(&self) -> Result<Vec<SignedTreeHead>, StoreError> {
        Ok(self.records.read().clone())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}

// ---------------------------------------------------------------------------
// JSON Lines
// ---------------------------------------------------------------------------

/// A JSON Lines file of `T` records.
#[derive(Debug)]
struct JsonlFile<T> {
    path: PathBuf,
    lock: RwLock<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: RwLock::new(()),
            _record: PhantomData,
        }
    }

    fn append(&self, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.write();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        self.seal_tail(&mut file)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Leave the file ending on a line boundary. A complete record missing
    /// only its newline is terminated; a torn fragment is truncated away.
    fn seal_tail(&self, file: &mut File) -> Result<(), StoreError> {
        if file.metadata()?.len() == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let contents = fs::read(&self.path)?;
        let keep = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |p| p + 1);
        let tail = &contents[keep..];
        if serde_json::from_slice::<T>(tail).is_ok() {
            file.write_all(b"\n")?;
        } else {
            tracing::warn!(
                path = %self.path.display(),
                dropped_bytes = tail.len(),
                "truncating torn record at end of store"
            );
            file.set_len(keep as u64)?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.read();
        let contents = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (complete, tail) = match contents.rfind('\n') {
            Some(p) => contents.split_at(p + 1),
            None => ("", contents.as_str()),
        };

        let mut records = complete
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<T>, _>>()?;

        if !tail.trim().is_empty() {
            match serde_json::from_str(tail) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring torn record at end of store"
                ),
            }
        }
        Ok(records)
    }
}

fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Leaf store backed by `{dir}/users.jsonl`.
#[derive(Debug)]
pub struct JsonlLeafStore {
    file: JsonlFile<LeafRecord>,
}

impl JsonlLeafStore {
    /// Open (creating the directory if needed) the leaf store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        ensure_dir(dir)?;
        Ok(Self {
            file: JsonlFile::new(dir.join(LEAF_FILE)),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl LeafStore for JsonlLeafStore {
    fn append(&self, record: LeafRecord) -> Result<(), StoreError> {
        self.file.append(&record)
    }

    fn list_all(&self) -> Result<Vec<LeafRecord>, StoreError> {
        self.file.read_all()
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.file.read_all()?.len())
    }
}

/// STH store backed by `{dir}/sth.jsonl`.
#[derive(Debug)]
pub struct JsonlSthStore {
    file: JsonlFile<SignedTreeHead>,
}

impl JsonlSthStore {
    /// Open (creating the directory if needed) the STH store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        ensure_dir(dir)?;
        Ok(Self {
            file: JsonlFile::new(dir.join(STH_FILE)),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl SthStore for JsonlSthStore {
    fn append(&self, sth: SignedTreeHead) -> Result<(), StoreError> {
        self.file.append(&sth)
    }

    fn latest(&self) -> Result<Option<SignedTreeHead>, StoreError> {
        Ok(self.file.read_all()?.pop())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<SignedTreeHead>, StoreError> {
        Ok(newest_first(&self.file.read_all()?, limit))
    }

    fn list_all(&self) -> Result<Vec<SignedTreeHead>, StoreError> {
        self.file.read_all()
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.file.read_all()?.len())
    }
}
