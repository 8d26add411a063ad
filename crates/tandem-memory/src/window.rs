//! Bounded recent-utterance window (short-term memory).

use std::collections::VecDeque;

use tandem_core::types::Utterance;

/// Ordered sequence of the last N utterances.
///
/// Invariant: `len() <= cap()`. When an append would exceed the cap, the
/// oldest entry is evicted first (FIFO).
#[derive(Clone, Debug)]
pub struct ContextWindow {
    entries: VecDeque<Utterance>,
    cap: usize,
}

impl ContextWindow {
    /// Create an empty window with the given capacity.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append an utterance, evicting from the front past the cap.
    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push_back(utterance);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Snapshot the window contents, oldest first.
    pub fn to_vec(&self) -> Vec<Utterance> {
        self.entries.iter().cloned().collect()
    }

    /// The oldest utterance still in the window.
    pub fn front(&self) -> Option<&Utterance> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Drop all entries (session boundary).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
