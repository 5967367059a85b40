pub mod config;
pub mod environment;
pub mod errors;
pub mod input;
pub mod process;
pub mod repl;
pub mod shell;
