pub mod data;
pub mod io;

pub use data::{Config, SessionDefaults};
pub use io::ConfigError;
