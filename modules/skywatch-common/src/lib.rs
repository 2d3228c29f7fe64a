pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentIdentity, WatchConfig, DEFAULT_BACKOFF_INTERVALS_MIN, DEFAULT_VOCABULARY};
pub use error::SkywatchError;
pub use types::*;
