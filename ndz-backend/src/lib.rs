pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod logging;
pub mod owner;
pub mod publisher;
pub mod scheduled;
pub mod service;
pub mod zone;

pub use error::NdzError;
