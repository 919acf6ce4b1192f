#![forbid(unsafe_code)]

pub mod amendments;
pub mod api;
pub mod cache;
pub mod citations;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod gateway;
pub mod index;
pub mod logging;
pub mod maintenance;
pub mod registry;
pub mod render;
pub mod search;
pub mod store;
pub mod xml;

pub use error::{Error, Result};
