//! # Cloudstore CLI
//!
//! Operator tool over the cloudstore helpers: upload, download and delete
//! objects, print public URLs, and encrypt or decrypt files with the
//! configured file encryption key.

pub mod commands;
pub mod config;

pub use config::{load_settings, SettingsError};
