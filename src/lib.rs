pub mod checkpoint;
pub mod config;
pub mod error;
pub mod local;
pub mod logging;
pub mod mapper;
pub mod remote;

pub use error::{Error, Result};
