pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod records;
pub mod refresh;
pub mod services;
