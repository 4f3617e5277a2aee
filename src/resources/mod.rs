//! Harvestable resources and their persistence

pub mod ledger;
pub mod persistence;

pub use ledger::{ResourceId, ResourceLedger, ResourceRecord};
pub use persistence::{LEDGER_FILENAME, LEDGER_FORMAT_VERSION};
