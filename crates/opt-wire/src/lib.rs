pub mod config;
pub mod message;
pub mod rest;

pub use config::*;
pub use message::*;
pub use rest::*;
