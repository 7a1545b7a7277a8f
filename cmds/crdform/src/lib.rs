pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod k8s;
pub mod manifest;
pub mod model;
pub mod provider;
pub mod resource;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod yaml;
