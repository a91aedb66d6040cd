pub mod aggregate;
pub mod app;
pub mod config;
pub mod domain;
pub mod emit;
pub mod error;
pub mod joined;
pub mod matrix;
pub mod output;
pub mod quality;
pub mod quantile;
pub mod registry;
pub mod replicates;
pub mod report;
pub mod store;
pub mod summarize;
