pub mod accounts;
pub mod api;
pub mod authz;
pub mod blobs;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod content;
pub mod database;
pub mod error;
pub mod events;
pub mod identity;
pub mod media;
pub mod membership;
pub mod node;
pub mod notifications;
pub mod requests;
pub mod setup;
pub mod telemetry;
pub mod utils;

#[cfg(test)]
mod test_support;
