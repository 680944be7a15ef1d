//! Migration File Scanner
//!
//! Lists a migrations directory and turns each entry into a [`MigrationUnit`].
//! The first character of every file name must be a base-10 digit; that digit
//! is the unit's order key. One bad name fails the whole scan.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateError, Result};

/// A discoverable migration definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub path: PathBuf,
    /// Base file name; this is what gets recorded once the unit is applied.
    pub name: String,
    pub order_key: u32,
}

impl MigrationUnit {
    /// Build a unit from a path, parsing the order key from its file name.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| MigrateError::OrderKeyParse {
                name: path.display().to_string(),
            })?;
        let order_key = parse_order_key(&name)?;
        Ok(Self {
            path,
            name,
            order_key,
        })
    }
}

/// Order key of a file name: its leading character as a digit.
pub fn parse_order_key(name: &str) -> Result<u32> {
    name.chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| MigrateError::OrderKeyParse {
            name: name.to_string(),
        })
}

/// Scan `dir` and return its migration units sorted by file name.
pub fn scan(dir: &Path) -> Result<Vec<MigrationUnit>> {
    let read_err = |source| MigrateError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        paths.push(entry.map_err(read_err)?.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let units = paths
        .into_iter()
        .map(MigrationUnit::from_path)
        .collect::<Result<Vec<_>>>()?;

    debug!("scanned {} migration file(s) in {}", units.len(), dir.display());
    Ok(units)
}
