//! Monthly world maps of each country's dominant import partner among the
//! USA, China and the EU, with a terminal viewer to step through them.

pub mod app;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod generate;
pub mod geo;
pub mod logging;
pub mod map;
pub mod period;
pub mod plots;
pub mod trade;
pub mod ui;

pub use config::Config;
pub use error::{Result, TradeMapError};
pub use period::Period;
