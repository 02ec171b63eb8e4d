//! Run configuration and command handlers behind the `cytoclass` binary.
pub mod commands;
pub mod config;
