//! Configuration loading and validation.

mod credentials;
mod types;
mod validation;

pub use credentials::{Credentials, Role};
pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        validation::validate(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tables:\n  - name: public.users\n    chunk_size: 250").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tables[0].source_name, "public.users");
        assert_eq!(config.tables[0].chunk_size, Some(250));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
