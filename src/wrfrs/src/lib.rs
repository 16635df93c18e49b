// wrfrs/src/lib.rs

pub mod config;
pub mod dates;
pub mod namelist;

// Re-export commonly used types
pub use config::{ConfigError, ConfigStore};
pub use namelist::{NamelistDoc, NamelistError, WpsNamelist, WrfNamelist, WrfVariant};
