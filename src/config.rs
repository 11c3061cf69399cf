//! Screening configuration: which identity columns to require and how to
//! word the status column.
//!
//! Column names are matched exactly. A school whose sheets use localized
//! headers ships a config file instead of relying on fuzzy matching:
//!
//! ```json
//! {
//!   "identity_columns": { "name": "Nama", "class": "Kelas", "gender": "Jenis kelamin" },
//!   "status_labels": {
//!     "at_risk": "Siswa beresiko menjadi korban perundungan",
//!     "not_at_risk": "Siswa bukan Korban"
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseError;
use crate::risk::StatusLabels;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityColumns {
    pub name: String,
    pub class: String,
    pub gender: String,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            class: "Class".to_string(),
            gender: "Gender".to_string(),
        }
    }
}

impl IdentityColumns {
    pub fn names(&self) -> [&str; 3] {
        [&self.name, &self.class, &self.gender]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub identity_columns: IdentityColumns,
    pub status_labels: StatusLabels,
}

impl ScreeningConfig {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ScreeningConfig =
            serde_json::from_str(&raw).map_err(|source| ParseError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), ?config, "loaded screening config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"identity_columns":{"gender":"Jenis kelamin"}}"#,
        )
        .expect("write");

        let config = ScreeningConfig::load(&path).expect("load");
        assert_eq!(
            config.identity_columns.names(),
            ["Name", "Class", "Jenis kelamin"]
        );
        assert_eq!(config.status_labels, StatusLabels::default());
    }

    #[test]
    fn malformed_config_names_the_file() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");

        let err = ScreeningConfig::load(&path).unwrap_err();
        assert!(matches!(err, ParseError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
