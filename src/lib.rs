pub mod api;
pub mod cli;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod session;

pub use error::{Error, Result};
