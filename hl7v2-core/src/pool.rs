//! Bounded pool of reusable text buffers.
//!
//! Pools are explicit values shared through `Arc`, never globals, so two
//! parsers only share buffers when a caller hands them the same pool.
//! Pooling affects allocation counts only, never parse results.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Buffers that grew beyond this many bytes are dropped instead of pooled.
pub const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<String>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Acquisitions served from the pool.
    pub hits: u64,
    /// Acquisitions that allocated.
    pub misses: u64,
    /// Buffers handed back and kept.
    pub returns: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
}

impl PoolStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl BufferPool {
    /// A pool keeping at most `capacity` idle buffers.
    pub fn new(capacity: usize) -> Self {
        BufferPool {
            buffers: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// An empty buffer, returned to the pool when the guard drops.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let reused = self.buffers.lock().pop();
        let buffer = match reused {
            Some(buffer) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buffer
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                String::new()
            }
        };
        PooledBuffer { pool: self, buffer }
    }

    fn release(&self, mut buffer: String) {
        if buffer.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.capacity {
            buffers.push(buffer);
            self.returns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            idle: self.buffers.lock().len(),
        }
    }

    /// Drop all idle buffers. Counters are kept.
    pub fn clear(&self) {
        self.buffers.lock().clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(16)
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buffer: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buffer));
    }
}
