//! Test account key file.
//!
//! The key file holds one hex-encoded private key per line. It is read in
//! file order; blank lines are ignored and a `0x` prefix is optional. When the
//! file does not exist a fresh set of keys is generated and written before
//! any identity is handed out.

use crate::error::AccountStoreError;
use chain_client::Identity;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Load the identities stored at `path`, or generate and persist `count` new ones.
///
/// # Arguments
///
/// * `path` - Key file location
/// * `count` - Number of identities to generate when the file is absent
///
/// # Errors
///
/// Any malformed line fails the whole load with
/// [`AccountStoreError::MalformedKey`]; no partial account set is returned.
pub fn load_or_create<P: AsRef<Path>>(
    path: P,
    count: usize,
) -> Result<Vec<Identity>, AccountStoreError> {
    let path = path.as_ref();
    if path.exists() {
        let identities = load(path)?;
        info!(
            "Loaded {} accounts from {}",
            identities.len(),
            path.display()
        );
        Ok(identities)
    } else {
        let identities: Vec<Identity> = (0..count).map(|_| Identity::generate()).collect();
        persist(path, &identities)?;
        info!(
            "Generated {} accounts and saved them to {}",
            identities.len(),
            path.display()
        );
        Ok(identities)
    }
}

fn load(path: &Path) -> Result<Vec<Identity>, AccountStoreError> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            Identity::from_hex(line).map_err(|e| AccountStoreError::MalformedKey {
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn persist(path: &Path, identities: &[Identity]) -> Result<(), AccountStoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for identity in identities {
        writeln!(writer, "{}", identity.to_hex())?;
    }
    writer.flush()?;
    Ok(())
}
