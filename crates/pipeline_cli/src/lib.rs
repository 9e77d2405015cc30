//! Command-line host for the pipeline orchestrator.
pub mod cli;
pub mod commands;
pub mod config;
pub mod render;
