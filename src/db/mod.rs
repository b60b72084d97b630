//! Database layer.
//!
//! This module provides the pieces behind the client facade:
//! - Driver-specific connection pools and tuning
//! - Registry builders for databases and scripts
//! - The named statement engine
//! - Parameter binding and column decoding

pub mod pool;
pub mod registry;
pub(crate) mod params;
pub(crate) mod statement;
pub(crate) mod types;

pub use pool::DbPool;
pub use registry::DsnDecryptFn;
