#![forbid(unsafe_code)]

pub mod cache;
pub mod chapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod formats;
pub mod input;
pub mod logging;
pub mod normalize;
pub mod paginate;
pub mod progress;
pub mod reader;
