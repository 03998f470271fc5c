//! Provider adapters implementing [`crate::MarketDataSource`].

pub mod yahoo;

pub use yahoo::{YahooAuthManager, YahooSource};
