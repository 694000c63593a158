//! Storage infrastructure: received files and the configuration file.
//!
//! - **`disk`** – [`disk::DiskFileStore`], writes received files into the
//!   download directory.
//! - **`memory`** – [`memory::MemoryFileStore`], an in-memory store for tests.
//! - **`config`** – Reads the TOML configuration file.

pub mod config;
pub mod disk;
pub mod memory;
