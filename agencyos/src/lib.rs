pub mod cli;
pub mod dropbox;
pub mod load_config;

pub use cli::{run, Cli, Commands};
