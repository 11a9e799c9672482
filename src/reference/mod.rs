//! Reference data: memoized table reads and in-memory reshaping.

mod cache;
mod frame;

pub use cache::TableCache;
pub use frame::Frame;
