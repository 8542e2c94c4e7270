pub mod config;
pub mod environment;
pub mod error;
pub mod fs;

pub use config::*;
pub use environment::*;
pub use error::*;
