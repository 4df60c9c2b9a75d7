use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Configuration for a compilation run.
///
/// This struct holds settings that control how sections are scoped to entities,
/// how repeated node ids are treated, and what the rendered rule file imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The object class rules are scoped to when a section has no resolved
    /// context.
    fallback_object: String,

    /// Whether a node id compiled twice aborts the run.
    ///
    /// When `false` (default): the second occurrence is skipped with a warning
    /// and the enclosing context is kept. Tabular documents repeat their title
    /// cells in every expanded data cell, so this is the usual setting.
    ///
    /// When `true`: the second occurrence is a fatal error.
    pub reject_duplicate_nodes: bool,

    /// Header lines emitted at the top of a rendered rule file.
    imports: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_object: default_fallback_object(),
            reject_duplicate_nodes: false,
            imports: default_imports(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the object class used when a section has no resolved context.
    #[must_use]
    pub fn fallback_object(&self) -> &str {
        &self.fallback_object
    }

    /// Sets the fallback object class.
    #[must_use]
    pub fn with_fallback_object(mut self, object: impl Into<String>) -> Self {
        self.fallback_object = object.into();
        self
    }

    /// Returns the header lines of a rendered rule file.
    #[must_use]
    pub fn imports(&self) -> &[String] {
        &self.imports
    }
}

fn default_fallback_object() -> String {
    "Building".to_string()
}

fn default_imports() -> Vec<String> {
    vec![
        "import org.dcom.ruleengine.core.RuleEngineComplianceObject;".to_string(),
        "import org.dcom.ruleengine.core.RuleEngineResult;".to_string(),
    ]
}

/// Errors that can occur when loading or saving a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}'")]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The config file is not valid TOML for this version.
    #[error("failed to parse config file '{path}'")]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },
    /// The config could not be serialized.
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),
    /// The config file could not be written.
    #[error("failed to write config file '{path}'")]
    Write {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_fallback_object")]
        fallback_object: String,

        #[serde(default)]
        reject_duplicate_nodes: bool,

        #[serde(default = "default_imports")]
        imports: Vec<String>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                fallback_object,
                reject_duplicate_nodes,
                imports,
            } => Self {
                fallback_object,
                reject_duplicate_nodes,
                imports,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            fallback_object: config.fallback_object,
            reject_duplicate_nodes: config.reject_duplicate_nodes,
            imports: config.imports,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nfallback_object = \"Site\"\nreject_duplicate_nodes = true\nimports = [\"import a.B;\"]\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.fallback_object(), "Site");
        assert!(config.reject_duplicate_nodes);
        assert_eq!(config.imports(), &["import a.B;".to_string()]);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
        assert!(error.to_string().starts_with("failed to read config file"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nreject_duplicate_nodes = \"yes\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(toml::from_str::<Config>(r#"_version = "2""#).is_err());
    }

    #[test]
    fn empty_file_returns_default() {
        // Tests that deserialising an empty file returns the default configuration.
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rasec.toml");
        let config = Config::default().with_fallback_object("Site");

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
