//! In-process collaborators for `session-sync`: a message log with per-room
//! retention, a permission oracle with configurable write-visibility lag,
//! and deterministic wallet signers. Useful for embedding the engine
//! without a network and for integration tests.

pub mod log;
pub mod oracle;
pub mod signer;

pub use log::MemoryMessageLog;
pub use oracle::MemoryPermissionOracle;
pub use signer::{DecliningWalletSigner, StaticWalletSigner};
