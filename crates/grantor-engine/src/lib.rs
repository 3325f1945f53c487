pub mod account;
pub mod cache;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod graph;
pub mod token;

pub use error::EngineError;
