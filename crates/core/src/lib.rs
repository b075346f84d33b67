pub mod config;
pub mod git;
pub mod models;
pub mod resolve;
pub mod util;
