pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::AppConfig;
pub use error::{EnrichError, ExtractError};
pub use stats::{RunStats, StatsSnapshot};
pub use types::*;
