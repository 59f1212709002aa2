pub mod cli;
pub mod credentials;
pub mod load_config;
pub mod publish;
pub mod storage;

pub use cli::{run, Cli, Commands};
