//! Durable storage of the harvested-id set

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use super::ledger::ResourceId;

/// Current version of the ledger file format
pub const LEDGER_FORMAT_VERSION: u32 = 1;

/// Default ledger file name
pub const LEDGER_FILENAME: &str = "harvested_resources.json";

/// On-disk ledger file
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    harvested: Vec<ResourceId>,
}

/// Write the harvested set to `path`, replacing it atomically.
///
/// Ids are written sorted so identical sets produce identical files.
pub fn save_harvested(path: &Path, harvested: &HashSet<ResourceId>) -> Result<()> {
    let mut ids: Vec<ResourceId> = harvested.iter().cloned().collect();
    ids.sort();
    let file = LedgerFile { version: LEDGER_FORMAT_VERSION, harvested: ids };
    let json = serde_json::to_string_pretty(&file)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a harvested set. A missing file is an empty set.
pub fn load_harvested(path: &Path) -> Result<HashSet<ResourceId>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let file: LedgerFile = serde_json::from_str(&json)?;
    if file.version != LEDGER_FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "unsupported ledger version {} in {}",
            file.version,
            path.display()
        )));
    }
    Ok(file.harvested.into_iter().collect())
}

/// Remove a ledger file. Missing files are fine.
pub fn delete_harvested(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
