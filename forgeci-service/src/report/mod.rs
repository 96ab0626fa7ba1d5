// Report Module
// Raw result store model and the fixed-format report collector

pub mod collector;
pub mod store;

// Re-export key types
pub use collector::{ReportBundle, ReportCollector};
pub use store::{ResultStore, TestRecord, TestStatus};
