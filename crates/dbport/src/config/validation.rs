//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{PortError, Result};
use std::collections::HashSet;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.path.as_os_str().is_empty() {
        return Err(PortError::Config("database.path is required".into()));
    }
    if config.database.max_connections == 0 {
        return Err(PortError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }

    let mut seen = HashSet::new();
    for table in &config.manifest.tables {
        validate_identifier(table).map_err(|e| PortError::Config(e.to_string()))?;
        if !seen.insert(table.as_str()) {
            return Err(PortError::Config(format!(
                "manifest.tables lists '{}' more than once",
                table
            )));
        }
        if config.manifest.exclude.contains(table) {
            return Err(PortError::Config(format!(
                "table '{}' is both listed in manifest.tables and excluded",
                table
            )));
        }
    }

    if config.transfer.identity_column.is_empty() {
        return Err(PortError::Config(
            "transfer.identity_column is required".into(),
        ));
    }
    validate_identifier(&config.transfer.identity_column)
        .map_err(|e| PortError::Config(format!("transfer.identity_column: {}", e)))?;

    if config.transfer.max_error_details == 0 {
        return Err(PortError::Config(
            "transfer.max_error_details must be at least 1".into(),
        ));
    }
    if config.transfer.export_version.trim().is_empty() {
        return Err(PortError::Config(
            "transfer.export_version cannot be empty".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::for_database("app.db")
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_path() {
        let mut config = valid_config();
        config.database.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_connections() {
        let mut config = valid_config();
        config.database.max_connections = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_manifest_table() {
        let mut config = valid_config();
        config.manifest.tables = vec!["tasks".into(), "projects".into(), "tasks".into()];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_listed_and_excluded() {
        let mut config = valid_config();
        config.manifest.tables = vec!["tasks".into()];
        config.manifest.exclude = vec!["tasks".into()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_error_cap() {
        let mut config = valid_config();
        config.transfer.max_error_details = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_identity_column_with_nul_rejected() {
        let mut config = valid_config();
        config.transfer.identity_column = "id\0".into();
        assert!(validate(&config).is_err());
    }
}
