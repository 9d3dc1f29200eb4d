//! Ferry - Multi-Tenant Stats
//!
//! Tracks per-workspace delivery health for one destination type and
//! answers the generator's question: "given capacity C and a time window,
//! how many jobs should each workspace get?"
//!
//! # Maps
//!
//! - pending counts: approximation updated on pickup (+n) and on terminal
//!   status (-1); an admission variable, not ground truth
//! - latency: exponential moving average of per-job end-to-end duration
//! - success/failure counters feeding the throttle scale-down
//!
//! Each router owns one [`TenantStats`]; nothing here is process-global.

mod moving_average;
mod quota;
mod stats;

pub use moving_average::MovingAverage;
pub use quota::{PickupQuota, QuotaParams};
pub use stats::TenantStats;
