pub mod auth;
pub mod catalog;
pub mod config;
pub mod content;
pub mod duplicate;
pub mod error;
pub mod generator;
pub mod images;
pub mod logger;
pub mod server;
pub mod store;
pub mod suggest;
pub mod text_utils;
pub mod util;
pub mod workflow;
#[cfg(test)]
mod test_data;
