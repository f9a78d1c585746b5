//! Resource adaptors
//!
//! Adaptors wrap an upstream `DeviceMemoryResource` and add a policy on top
//! of it without changing how memory is obtained.

pub mod limiting;
pub mod statistics;

pub use limiting::LimitingResourceAdaptor;
pub use statistics::{AllocationStatistics, StatisticsResourceAdaptor};
