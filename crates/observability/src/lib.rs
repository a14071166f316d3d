//! Process-wide tracing setup shared by binaries and tests.

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{init, init_with_default};
