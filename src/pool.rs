//! Reusable byte buffers shared by the decoders and segmented fetches of one environment.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// A small free list of byte buffers.
///
/// Buffers come out empty (length zero, capacity kept from earlier use) and go back on drop of the
/// [`PooledBuffer`] guard. A buffer is never handed to two holders at once.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    initial_capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(initial_capacity: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            initial_capacity,
            max_idle,
        }
    }

    /// Take a buffer out of the pool, allocating one if none is idle.
    pub fn get(&self) -> PooledBuffer<'_> {
        let reused = self.lock().pop();
        let buffer = reused.unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));
        PooledBuffer {
            buffer,
            pool: self,
        }
    }

    /// Number of buffers waiting for reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            // The free list stays consistent even if a holder panicked.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn put_back(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(buffer);
        }
    }
}

/// Exclusive use of one pooled buffer; returns it to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'p> {
    buffer: Vec<u8>,
    pool: &'p BufferPool,
}

impl PooledBuffer<'_> {
    /// Empty the buffer while keeping its allocation.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put_back(std::mem::take(&mut self.buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused_and_cleared() {
        let pool = BufferPool::new(16, 2);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.idle_count(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 3);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::new(4, 1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
    }
}
