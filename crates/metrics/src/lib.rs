//! Metric definitions for ringle, recorded through the `metrics` facade.
//!
//! ```rust,ignore
//! use ringle_metrics::{counter, delivery, labels};
//!
//! counter!(delivery::CHUNKS_DELIVERED_TOTAL, labels::CHANNEL => "telegram").increment(1);
//! ```
//!
//! Nothing is exported unless the binary installs a recorder
//! (`init_prometheus`, behind the `prometheus` feature).

pub mod buckets;
mod definitions;
#[cfg(feature = "prometheus")]
mod recorder;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};

#[cfg(feature = "prometheus")]
pub use recorder::init_prometheus;
