//! Storage infrastructure: configuration file and JSON record stores.
//!
//! - **`config`**  – `config.toml` in the platform config directory, with
//!   defaults for every field and a generated device id on first run.
//! - **`records`** – `trusted.json` / `pages.json` and the background
//!   flusher that writes snapshots handed over by the application layer.

pub mod config;
pub mod records;
