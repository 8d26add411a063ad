//! Reference store: capacity-bounded vector memory with cosine queries.
//!
//! Entries are held in memory behind an RwLock and searched brute-force,
//! which is acceptable at the configured capacities. The store snapshots
//! itself to SQLite on a fixed interval and on graceful shutdown; a crash
//! between flushes loses only entries added since the last flush.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use tandem_core::error::{Result, TandemError};
use tandem_core::types::Reference;

/// One persisted embedding entry.
#[derive(Debug, Clone)]
struct StoredEntry {
    id: Uuid,
    /// Monotonic insertion counter; higher = more recent.
    seq: u64,
    text: String,
    embedding: Vec<f32>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: VecDeque<StoredEntry>,
    next_seq: u64,
}

/// Capacity-bounded vector memory.
///
/// Eviction is FIFO by insertion order: once `max_elements` is reached the
/// least-recently-added entry is dropped. Queries are deterministic for a
/// given stored state and query vector; ties are broken most-recent-first.
pub struct ReferenceStore {
    inner: RwLock<StoreInner>,
    max_elements: usize,
    dim: usize,
    persist_path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl ReferenceStore {
    /// Create an empty, in-memory-only store (no snapshots).
    pub fn new(max_elements: usize, dim: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            max_elements,
            dim,
            persist_path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Open a store backed by a SQLite snapshot file.
    ///
    /// Restores any previously flushed entries; a missing file starts
    /// empty. Failures here are startup failures and are returned to the
    /// caller rather than degraded.
    pub fn open(path: &Path, max_elements: usize, dim: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = open_snapshot(path)?;
        let mut entries: VecDeque<StoredEntry> = VecDeque::new();

        let mut stmt = conn
            .prepare(
                "SELECT id, seq, text, embedding, metadata, created_at
                 FROM reference_entries ORDER BY seq ASC",
            )
            .map_err(|e| TandemError::Storage(format!("prepare snapshot read: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| TandemError::Storage(format!("read snapshot: {}", e)))?;

        for row in rows {
            let (id, seq, text, embedding, metadata, created_at) =
                row.map_err(|e| TandemError::Storage(format!("snapshot row: {}", e)))?;
            let entry = StoredEntry {
                id: Uuid::parse_str(&id)
                    .map_err(|e| TandemError::Storage(format!("snapshot id '{}': {}", id, e)))?,
                seq: seq as u64,
                text,
                embedding: serde_json::from_str(&embedding)?,
                metadata: serde_json::from_str(&metadata)?,
                created_at: created_at
                    .parse()
                    .map_err(|e| TandemError::Storage(format!("snapshot timestamp: {}", e)))?,
            };
            entries.push_back(entry);
        }
        drop(stmt);

        let next_seq = entries.back().map(|e| e.seq + 1).unwrap_or(0);
        info!(
            path = %path.display(),
            entries = entries.len(),
            "Reference store restored"
        );

        Ok(Self {
            inner: RwLock::new(StoreInner { entries, next_seq }),
            max_elements,
            dim,
            persist_path: Some(path.to_path_buf()),
            dirty: AtomicBool::new(false),
        })
    }

    /// Insert a new entry, evicting the oldest past `max_elements`.
    pub fn add(&self, text: &str, embedding: Vec<f32>, metadata: Value) -> Result<Uuid> {
        if text.trim().is_empty() {
            return Err(TandemError::Validation(
                "reference text must not be empty".to_string(),
            ));
        }
        if embedding.len() != self.dim {
            return Err(TandemError::Validation(format!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dim
            )));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|e| TandemError::Storage(format!("store lock poisoned: {}", e)))?;

        let id = Uuid::new_v4();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push_back(StoredEntry {
            id,
            seq,
            text: text.to_string(),
            embedding,
            metadata,
            created_at: Utc::now(),
        });

        let mut evicted = 0usize;
        while inner.entries.len() > self.max_elements {
            inner.entries.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, "Reference store at capacity, oldest entries dropped");
        }

        self.dirty.store(true, Ordering::Relaxed);
        Ok(id)
    }

    /// Return up to k entries ranked by cosine similarity descending.
    ///
    /// Ties are broken most-recent-first. An empty store yields an empty
    /// vec. Deterministic given identical stored state and query vector.
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Reference>> {
        if embedding.len() != self.dim {
            return Err(TandemError::Retrieval(format!(
                "query dimension {} does not match store dimension {}",
                embedding.len(),
                self.dim
            )));
        }

        let inner = self
            .inner
            .read()
            .map_err(|e| TandemError::Retrieval(format!("store lock poisoned: {}", e)))?;

        let mut scored: Vec<(&StoredEntry, f64)> = inner
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(embedding, &entry.embedding)))
            .collect();

        scored.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(entry, score)| Reference {
                source_text: entry.text.clone(),
                embedding: entry.embedding.clone(),
                similarity_score: score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a full snapshot to the backing SQLite file.
    ///
    /// No-op for in-memory stores and when nothing changed since the last
    /// flush. Called by the autosave loop and on graceful shutdown.
    pub fn flush(&self) -> Result<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }

        let snapshot: Vec<StoredEntry> = {
            let inner = self.inner.read().map_err(|e| {
                self.dirty.store(true, Ordering::Relaxed);
                TandemError::Storage(format!("store lock poisoned: {}", e))
            })?;
            inner.entries.iter().cloned().collect()
        };

        if let Err(e) = write_snapshot(path, &snapshot) {
            // Keep the store marked dirty so the next flush retries.
            self.dirty.store(true, Ordering::Relaxed);
            return Err(e);
        }

        debug!(entries = snapshot.len(), path = %path.display(), "Reference store flushed");
        Ok(())
    }
}

/// Replace the on-disk snapshot with the given entries, atomically.
fn write_snapshot(path: &Path, snapshot: &[StoredEntry]) -> Result<()> {
    let mut conn = open_snapshot(path)?;
    let tx = conn
        .transaction()
        .map_err(|e| TandemError::Storage(format!("begin snapshot: {}", e)))?;
    tx.execute("DELETE FROM reference_entries", [])
        .map_err(|e| TandemError::Storage(format!("clear snapshot: {}", e)))?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO reference_entries
                 (id, seq, text, embedding, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| TandemError::Storage(format!("prepare snapshot write: {}", e)))?;
        for entry in snapshot {
            stmt.execute(rusqlite::params![
                entry.id.to_string(),
                entry.seq as i64,
                entry.text,
                serde_json::to_string(&entry.embedding)?,
                serde_json::to_string(&entry.metadata)?,
                entry.created_at.to_rfc3339(),
            ])
            .map_err(|e| TandemError::Storage(format!("write snapshot row: {}", e)))?;
        }
    }
    tx.commit()
        .map_err(|e| TandemError::Storage(format!("commit snapshot: {}", e)))?;
    Ok(())
}

/// Open (or create) the snapshot database and ensure the schema exists.
fn open_snapshot(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| TandemError::Storage(format!("open snapshot {}: {}", path.display(), e)))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         CREATE TABLE IF NOT EXISTS reference_entries (
             id         TEXT PRIMARY KEY,
             seq        INTEGER NOT NULL,
             text       TEXT NOT NULL,
             embedding  TEXT NOT NULL,
             metadata   TEXT NOT NULL,
             created_at TEXT NOT NULL
         );",
    )
    .map_err(|e| TandemError::Storage(format!("init snapshot schema: {}", e)))?;
    Ok(conn)
}

/// Cosine similarity between two vectors; 0.0 for zero-magnitude input.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

// =============================================================================
// Tests
// =============================================================================
