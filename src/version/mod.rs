//! Versioned artifact storage

pub mod ledger;
pub mod store;

pub use ledger::{Ledger, ResourceHistory, VersionRecord};
pub use store::{AddedVersion, RestoreOutcome, VersionHistory, VersionStore};
