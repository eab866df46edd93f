//! 🪣 Batch Buffer: where log records wait for their ride to the cluster.
//!
//! Many producers push, one flush worker reads. Pushing takes one short lock
//! and never waits on anything else. A full bucket drops the newest record on
//! the floor and says nothing; blocking the code that was just trying to log
//! would be worse.
//!
//! 🧠 Knowledge graph:
//! - `offer` → producers, any thread, tokio or not
//! - `snapshot` + `discard_front` → the flush worker only. Snapshot first, send,
//!   then discard exactly what was sent. Records that arrived mid-send stay put.
//! - Capacity is the only thing standing between a log storm and the OOM killer 🦆

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// 📦 What actually gets indexed: the formatted line under `message`.
#[derive(Debug, Serialize)]
struct BufferedRecord<'a> {
    message: &'a str,
}

/// 🔄 Formatted text → `{"message":"..."}`.
pub fn encode_record(formatted: &str) -> serde_json::Result<String> {
    serde_json::to_string(&BufferedRecord { message: formatted })
}

/// 📬 What happened to an offered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// ✅ In the bucket. `len` is the buffer length right after the insert.
    Accepted { len: usize },
    /// 🗑️ Bucket was full. The record is gone.
    Full,
}

/// 🪣 Bounded FIFO of encoded records.
#[derive(Debug)]
pub struct BatchBuffer {
    records: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl BatchBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// 📥 Try to enqueue. Never blocks beyond the lock, never grows past capacity.
    pub fn offer(&self, record: String) -> Offer {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            return Offer::Full;
        }
        records.push_back(record);
        Offer::Accepted {
            len: records.len(),
        }
    }

    /// 📸 Copy of everything buffered right now, oldest first. Leaves the buffer untouched.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// 🗑️ Drop the `count` oldest records (the ones a flush just handled).
    pub fn discard_front(&self, count: usize) {
        let mut records = self.lock();
        let count = count.min(records.len());
        records.drain(..count);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // 🔒 A producer that panicked mid-push can't leave a VecDeque half-written. Keep going.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
