pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod error;
pub mod extract;
pub mod logging;
pub mod media;
pub mod persist;
pub mod pipeline;
pub mod resolve;
pub mod resources;
pub mod retry;
pub mod storage;
pub mod types;
