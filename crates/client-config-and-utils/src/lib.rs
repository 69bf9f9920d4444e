//! Configuration, paths, and logging setup for the Lumen client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, SessionTimings, DEFAULT_DEEP_LINK_SCHEME, DEFAULT_IDENTITY_PROVIDER_HOST,
    DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
