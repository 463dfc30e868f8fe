//! CLI command implementations

pub mod config;
pub mod hook;
pub mod status;

pub use config::execute as config;
pub use hook::execute as hook;
pub use status::execute as status;
