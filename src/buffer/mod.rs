//! Streaming buffer management.
//!
//! Every forwarded response body is copied through a fixed-size buffer
//! borrowed from [`BufferPool`]. Pool size bounds the number of requests the
//! gateway streams at once.

pub mod pool;

pub use pool::{BufferPool, PooledBuffer};
