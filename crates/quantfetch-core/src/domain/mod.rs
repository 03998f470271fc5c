mod date;
mod frame;
mod interval;
mod market;
mod maturity;
mod symbol;

pub use date::{DateRange, IntoTradingDate, TradingDate};
pub use frame::{Frame, Tabular};
pub use interval::Interval;
pub use market::{OptionChain, OptionSide, RealtimeQuote, TickerInfo};
pub use maturity::Maturity;
pub use symbol::Symbol;
