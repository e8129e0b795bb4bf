pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod input;
pub mod knowledge;
pub mod output;
