//! Per-kind entry points over the shared [`FetchPipeline`](crate::pipeline::FetchPipeline).
//!
//! Fetchers are cheap to clone; clones share the source, cache and limiter.

mod equity;
mod fixed_income;
mod options;

pub use equity::{EquityFetcher, MultiFetch};
pub use fixed_income::FixedIncomeFetcher;
pub use options::OptionsFetcher;
