//! Fixed-capacity pool of reusable copy buffers.
//!
//! # Responsibilities
//! - Pre-allocate `pool_size` buffers of [`BUFFER_SIZE`] bytes at startup
//! - Lend exactly one buffer to each in-flight request
//! - Apply backpressure: `acquire` waits while every buffer is on loan
//!
//! # Design Decisions
//! - A semaphore counts free buffers; the `Vec` behind a std mutex only holds
//!   them. The mutex is never held across an await point.
//! - `PooledBuffer` returns its buffer on drop, so early returns, panics and
//!   cancelled requests all give the buffer back
//! - The buffer is pushed back before the permit is released, so a woken
//!   waiter always finds a buffer in the `Vec`

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BUFFER_SIZE;

/// Bounded set of byte buffers shared by all requests.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Box<[u8]>>>,
    available: Arc<Semaphore>,
    capacity: usize,
}

impl BufferPool {
    /// Allocate `capacity` buffers of [`BUFFER_SIZE`] bytes.
    pub fn new(capacity: usize) -> Self {
        Self::with_buffer_size(capacity, BUFFER_SIZE)
    }

    pub fn with_buffer_size(capacity: usize, buffer_size: usize) -> Self {
        let free = (0..capacity)
            .map(|_| vec![0u8; buffer_size].into_boxed_slice())
            .collect();

        tracing::debug!(capacity, buffer_size, "Buffer pool allocated");

        Self {
            free: Mutex::new(free),
            available: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Borrow a buffer, waiting until one is free.
    pub async fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let permit = self
            .available
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore closed unexpectedly");

        let buf = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .expect("permit held but no buffer free");

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(self),
            _permit: permit,
        }
    }

    /// Buffers currently free.
    pub fn available(&self) -> usize {
        self.available.available_permits()
    }

    /// Total number of buffers owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, buf: Box<[u8]>) {
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(buf);
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dereferences to the underlying byte slice. Contents are whatever the
/// previous borrower left behind.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Box<[u8]>>,
    pool: Arc<BufferPool>,
    // Dropped after `drop` has pushed the buffer back.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn buffers_have_fixed_length() {
        let pool = Arc::new(BufferPool::new(2));
        let buf = pool.acquire().await;
        assert_eq!(buf.len(), BUFFER_SIZE);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.capacity(), 2);
    }

    #[tokio::test]
    async fn acquire_waits_until_a_buffer_is_returned() {
        let pool = Arc::new(BufferPool::with_buffer_size(1, 16));
        let held = pool.acquire().await;
        assert_eq!(pool.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "acquire must wait while the pool is empty");

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.len() })
        };
        drop(held);

        let len = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert_eq!(len, 16);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn concurrent_holders_get_distinct_buffers() {
        let pool = Arc::new(BufferPool::with_buffer_size(3, 8));
        let mut a = pool.acquire().await;
        let b = pool.acquire().await;
        let c = pool.acquire().await;

        let ptrs = [a.as_ptr(), b.as_ptr(), c.as_ptr()];
        assert_ne!(ptrs[0], ptrs[1]);
        assert_ne!(ptrs[1], ptrs[2]);
        assert_ne!(ptrs[0], ptrs[2]);

        a[0] = 0xAB;
        assert_eq!(b[0], 0);
    }

    #[tokio::test]
    async fn dropped_buffers_are_reused() {
        let pool = Arc::new(BufferPool::with_buffer_size(1, 8));
        let first = pool.acquire().await.as_ptr();
        let second = pool.acquire().await.as_ptr();
        assert_eq!(first, second);
        assert_eq!(pool.available(), 1);
    }
}
