//! The clause record file format.
//!
//! ```json
//! { "B1": { "record": [
//!     { "_RCmd": "IS", "_Cl_Pncon": "B1", "_Rule_Number": 1, "_RNounStr": "door", "_RCmdStep": "NEXT" }
//! ] } }
//! ```
//!
//! Groups are read in name order. Records without a command are skipped.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{optional_scalar, scalar};
use crate::compiler::records::{RecordGroup, Step};

/// Errors that can occur when loading a clause record file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read clause records '{path}'")]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not a valid clause record file.
    #[error("failed to parse clause records '{path}'")]
    Json {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

/// Loads the record groups of a clause record file.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed.
#[instrument]
pub fn load(path: &Path) -> Result<Vec<RecordGroup>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the record groups of clause record text.
///
/// # Errors
///
/// Returns an error if the JSON is malformed.
pub fn parse(content: &str) -> Result<Vec<RecordGroup>, serde_json::Error> {
    let groups: BTreeMap<String, GroupEntry> = serde_json::from_str(content)?;
    Ok(groups
        .into_iter()
        .map(|(name, group)| {
            let steps: Vec<Step> = group
                .record
                .into_iter()
                .filter_map(Record::into_step)
                .collect();
            debug!(group = %name, steps = steps.len(), "read record group");
            RecordGroup { name, steps }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    #[serde(default)]
    record: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "_RCmd", default, deserialize_with = "optional_scalar")]
    command: Option<String>,
    #[serde(rename = "_Cl_Pncon", default, deserialize_with = "optional_scalar")]
    clause: Option<String>,
    #[serde(rename = "_Rule_Number", default, deserialize_with = "optional_scalar")]
    number: Option<String>,
    #[serde(rename = "_RNounStr", deserialize_with = "scalar", default)]
    noun: String,
    #[serde(rename = "_RCmdStep", default, deserialize_with = "optional_scalar")]
    keyword: Option<String>,
}

impl Record {
    fn into_step(self) -> Option<Step> {
        let command = self.command?;
        Some(Step {
            clause: self.clause.unwrap_or_default(),
            number: self.number.unwrap_or_default(),
            command,
            noun: self.noun,
            keyword: self.keyword,
        })
    }
}
