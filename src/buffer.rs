// Dedup Buffer - bounded staging area between the reader and the store
// Later duplicates of a key win when the buffer is flushed

use crate::company::Company;
use std::collections::HashSet;

pub const DEFAULT_BUFFER_THRESHOLD: usize = 1000;

// ============================================================================
// BATCH
// ============================================================================

/// A flushed buffer: unique records plus how many records went in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Company>,
    received: usize,
}

impl Batch {
    /// Collapse `records` to one per key, keeping the last occurrence.
    /// Survivors keep their original relative order.
    pub fn collapse(records: Vec<Company>) -> Self {
        let received = records.len();
        let mut seen = HashSet::with_capacity(received);

        let mut unique: Vec<Company> = records
            .into_iter()
            .rev()
            .filter(|company| seen.insert(company.key.clone()))
            .collect();
        unique.reverse();

        Batch {
            records: unique,
            received,
        }
    }

    pub fn records(&self) -> &[Company] {
        &self.records
    }

    /// Records that went into the buffer, duplicates included
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn unique(&self) -> usize {
        self.records.len()
    }

    pub fn duplicates(&self) -> usize {
        self.received - self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received == 0
    }
}

// ============================================================================
// DEDUP BUFFER
// ============================================================================

#[derive(Debug)]
pub struct DedupBuffer {
    records: Vec<Company>,
    threshold: usize,
}

impl DedupBuffer {
    /// Thresholds below 1 are raised to 1
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        DedupBuffer {
            records: Vec::new(),
            threshold,
        }
    }

    pub fn add(&mut self, company: Company) {
        self.records.push(company);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.threshold
    }

    /// Flush only once the threshold is reached
    pub fn flush_if_full(&mut self) -> Option<Batch> {
        if self.is_full() {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Flush whatever is buffered, leaving the buffer empty
    pub fn drain(&mut self) -> Batch {
        let records = std::mem::take(&mut self.records);
        Batch::collapse(records)
    }
}

impl Default for DedupBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_THRESHOLD)
    }
}
