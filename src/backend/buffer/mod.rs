//! Buffered persistence
//!
//! - **`writer`** - Generic accumulate-then-flush `BufferedWriter<T>`
//! - **`pool`** - One writer per tenant for a given item kind

pub mod pool;
pub mod writer;

pub use pool::WriterPool;
pub use writer::{BatchSink, BoxError, BufferedWriter, WriterBuilder};
