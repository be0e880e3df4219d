//! Configuration commands.

use std::path::Path;

use crate::config::{AppConfig, ConfigError};
use crate::error::ClientResult;

/// Dump the configuration to stdout, passwords masked.
///
/// A missing file dumps the defaults, as a starting point.
pub fn dump(path: &Path) -> ClientResult<()> {
    let config = match AppConfig::load(path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            println!("# {} does not exist, showing defaults", path.display());
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration, resolving secret references.
pub fn validate(path: &Path) -> ClientResult<()> {
    let settings = AppConfig::load(path)?.validate()?;

    println!("Configuration is valid.");
    println!("  url:      {}", settings.caldav_url);
    println!("  user:     {}", settings.username);
    println!(
        "  calendar: {}",
        settings.calendar_name.as_deref().unwrap_or("(first available)")
    );
    println!("  timezone: {}", settings.timezone.name());
    println!("  days:     {}", settings.days_to_display);
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn dump_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dump(&dir.path().join("config.toml")).is_ok());
    }

    #[test]
    fn validate_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn validate_accepts_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "caldav_url = \"https://dav.example.com/\"\nusername = \"anna\"\npassword = \"pw\"\n",
        )
        .unwrap();

        assert!(validate(&path).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "caldav_url = \"https://dav.example.com/\"\nusername = \"anna\"\npassword = \"pw\"\ntimezone = \"Nowhere/Land\"\n",
        )
        .unwrap();

        let err = validate(&path).unwrap_err();
        assert!(matches!(err, ClientError::Config(ConfigError::UnknownTimezone(_))));
    }
}
