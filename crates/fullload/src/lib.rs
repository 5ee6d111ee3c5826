//! Full-load phase of the replication engine (spec §4.3, §4.4): the
//! parallel PK-range loader pool used when the source table has a single
//! eligible integer primary key, and the key-set cursor loader used as a
//! fallback for composite or non-integer keys.

pub mod cursor;
pub mod error;
pub mod range_pool;

pub use cursor::CursorStreamingLoader;
pub use error::FullLoadError;
pub use range_pool::RangePool;
