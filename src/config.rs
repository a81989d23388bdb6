// ⚙️ Load Configuration
// Database target, input extracts, decoding and batching options

use crate::entities::Entity;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// OPTION TYPES
// ============================================================================

/// How the input files are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    /// Single-byte Western (ISO-8859-1 / windows-1252), what the upstream export writes
    #[default]
    Latin1,
    Utf8,
    /// Sniff BOM / UTF-8 validity from the start of each file
    Auto,
}

impl InputEncoding {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "latin1" | "iso-8859-1" | "windows-1252" => Some(InputEncoding::Latin1),
            "utf8" | "utf-8" => Some(InputEncoding::Utf8),
            "auto" => Some(InputEncoding::Auto),
            _ => None,
        }
    }
}

/// What happens when a single row cannot be transformed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// First bad row ends the run
    #[default]
    Abort,
    /// Log, count as rejected, keep going
    Skip,
}

// ============================================================================
// CONFIG SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Use WAL journal mode
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("transactions.db"),
            wal: true,
        }
    }
}

/// Paths of the three upstream extracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFiles {
    pub associado: PathBuf,
    pub agencia: PathBuf,
    pub transacoes: PathBuf,
}

impl Default for InputFiles {
    fn default() -> Self {
        InputFiles {
            associado: PathBuf::from("db_pessoa.associado.csv"),
            agencia: PathBuf::from("db_entidade.agencia.csv"),
            transacoes: PathBuf::from("db_cartoes.transacoes.csv"),
        }
    }
}

// ============================================================================
// ETL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub database: DatabaseConfig,
    pub inputs: InputFiles,
    pub encoding: InputEncoding,
    pub delimiter: char,
    /// Rows per persisted batch (1 = commit per row)
    pub batch_size: usize,
    pub on_row_error: RowErrorPolicy,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            database: DatabaseConfig::default(),
            inputs: InputFiles::default(),
            encoding: InputEncoding::default(),
            delimiter: ';',
            batch_size: 500,
            on_row_error: RowErrorPolicy::default(),
        }
    }
}

impl EtlConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| EtlError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|e| {
            EtlError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    /// Reject settings that can only fail later
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EtlError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if !self.delimiter.is_ascii() {
            return Err(EtlError::Configuration(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }

        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }

    /// Input file for an entity
    pub fn input_path(&self, entity: Entity) -> &Path {
        match entity {
            Entity::Associate => &self.inputs.associado,
            Entity::Branch => &self.inputs.agencia,
            Entity::Transaction => &self.inputs.transacoes,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EtlConfig::default();
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.encoding, InputEncoding::Latin1);
        assert_eq!(config.on_row_error, RowErrorPolicy::Abort);
        assert_eq!(
            config.input_path(Entity::Transaction),
            Path::new("db_cartoes.transacoes.csv")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"database": {{"path": "/tmp/etl.db"}}, "encoding": "auto", "batch_size": 1, "on_row_error": "skip"}}"#
        )
        .unwrap();

        let config = EtlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/etl.db"));
        assert!(config.database.wal);
        assert_eq!(config.encoding, InputEncoding::Auto);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.on_row_error, RowErrorPolicy::Skip);
        assert_eq!(config.inputs, InputFiles::default());
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"encoding": "ebcdic"}}"#).unwrap();

        let err = EtlConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = EtlConfig {
            batch_size: 0,
            ..EtlConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_rejects_non_ascii_delimiter() {
        let config = EtlConfig {
            delimiter: '§',
            ..EtlConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(InputEncoding::parse("ISO-8859-1"), Some(InputEncoding::Latin1));
        assert_eq!(InputEncoding::parse("utf-8"), Some(InputEncoding::Utf8));
        assert_eq!(InputEncoding::parse("auto"), Some(InputEncoding::Auto));
        assert_eq!(InputEncoding::parse("utf-16"), None);
    }
}
