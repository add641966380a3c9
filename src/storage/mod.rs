//! Storage backends for the vault
//!
//! The taxonomy index and the MOC file tree both live in one vault, reached
//! through the `VaultStore` trait. `FsVault` is the production backend;
//! `MemoryVault` backs tests and supports failure injection.

mod fs;
mod memory;
mod traits;

pub use fs::FsVault;
pub use memory::MemoryVault;
pub use traits::{OpenVault, StorageError, StorageResult, VaultStore};
