//! Export settings from the command line and an optional YAML file
//!
//! Command line values (including their environment variable fallbacks) win
//! over the file. The file uses the same names in snake case:
//!
//! ```yaml
//! url: https://octopus.example.com
//! space: Spaces-1
//! dest: ./terraform
//! projects:
//!   - Projects-1
//! strict_references: true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ExportError;
use crate::traits::FileSystem;

/// Settings as read from a config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub dest: Option<PathBuf>,
    pub console: Option<bool>,
    pub projects: Vec<String>,
    pub strict_references: Option<bool>,
}

impl ConfigFile {
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        if !fs.exists(path) {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        let content = fs
            .read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Resolved settings for one export run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportConfig {
    pub url: String,
    pub api_key: String,
    pub space: String,
    /// Output directory; always `None` in console mode
    pub dest: Option<PathBuf>,
    pub console: bool,
    /// Ids of projects to export recursively; empty exports the whole space
    pub projects: Vec<String>,
    pub strict_references: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliValues {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub dest: Option<PathBuf>,
    pub console: bool,
    pub projects: Vec<String>,
    pub strict_references: bool,
}

impl ExportConfig {
    /// Merge command line values over the config file
    pub fn merge(cli: CliValues, file: ConfigFile) -> Self {
        let console = cli.console || file.console.unwrap_or(false);

        Self {
            url: cli.url.or(file.url).unwrap_or_default(),
            api_key: cli.api_key.or(file.api_key).unwrap_or_default(),
            space: cli.space.or(file.space).unwrap_or_default(),
            dest: if console { None } else { cli.dest.or(file.dest) },
            console,
            projects: if cli.projects.is_empty() {
                file.projects
            } else {
                cli.projects
            },
            strict_references: cli.strict_references || file.strict_references.unwrap_or(false),
        }
    }

    /// Read the optional config file and merge the command line over it
    pub fn resolve(
        fs: &dyn FileSystem,
        cli: CliValues,
        config_path: Option<&Path>,
    ) -> Result<Self> {
        let file = match config_path {
            Some(path) => ConfigFile::load(fs, path)?,
            None => ConfigFile::default(),
        };

        let config = Self::merge(cli, file);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if self.url.is_empty() {
            return Err(ExportError::InvalidConfig(
                "the server URL is required (--url or OCTOPUS_CLI_SERVER)".to_string(),
            ));
        }

        Url::parse(&self.url).map_err(|err| {
            ExportError::InvalidConfig(format!("'{}' is not a valid URL: {}", self.url, err))
        })?;

        if self.api_key.is_empty() {
            return Err(ExportError::InvalidConfig(
                "the API key is required (--api-key or OCTOPUS_CLI_API_KEY)".to_string(),
            ));
        }

        if self.space.is_empty() {
            return Err(ExportError::InvalidConfig(
                "the space ID is required (--space or OCTOPUS_SPACE_ID)".to_string(),
            ));
        }

        if !self.console && self.dest.is_none() {
            return Err(ExportError::InvalidConfig(
                "an output directory is required unless --console is set".to_string(),
            ));
        }

        if self.projects.iter().any(|project| project.trim().is_empty()) {
            return Err(ExportError::InvalidConfig(
                "project IDs must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    fn cli() -> CliValues {
        CliValues {
            url: Some("https://octopus.example.com".to_string()),
            api_key: Some("API-KEY".to_string()),
            space: Some("Spaces-1".to_string()),
            dest: Some(PathBuf::from("out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_values_win_over_file() {
        let file = ConfigFile {
            url: Some("https://other.example.com".to_string()),
            space: Some("Spaces-2".to_string()),
            projects: vec!["Projects-9".to_string()],
            strict_references: Some(true),
            ..Default::default()
        };

        let config = ExportConfig::merge(
            CliValues {
                projects: vec!["Projects-1".to_string()],
                ..cli()
            },
            file,
        );

        assert_eq!(config.url, "https://octopus.example.com");
        assert_eq!(config.space, "Spaces-1");
        assert_eq!(config.projects, vec!["Projects-1".to_string()]);
        assert!(config.strict_references);
    }

    #[test]
    fn test_file_fills_missing_values() {
        let fs = MockFileSystem::new().with_file(
            "octoterra.yaml",
            "api_key: FROM-FILE\ndest: ./terraform\nprojects:\n  - Projects-3\n",
        );

        let config = ExportConfig::resolve(
            &fs,
            CliValues {
                api_key: None,
                dest: None,
                ..cli()
            },
            Some(Path::new("octoterra.yaml")),
        )
        .unwrap();

        assert_eq!(config.api_key, "FROM-FILE");
        assert_eq!(config.dest, Some(PathBuf::from("./terraform")));
        assert_eq!(config.projects, vec!["Projects-3".to_string()]);
    }

    #[test]
    fn test_console_drops_destination() {
        let config = ExportConfig::merge(
            CliValues {
                console: true,
                ..cli()
            },
            ConfigFile::default(),
        );

        assert!(config.dest.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_destination_outside_console_mode() {
        let config = ExportConfig::merge(
            CliValues {
                dest: None,
                ..cli()
            },
            ConfigFile::default(),
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output directory"));
    }

    #[test]
    fn test_missing_config_file() {
        let fs = MockFileSystem::new();

        let err = ExportConfig::resolve(&fs, cli(), Some(Path::new("absent.yaml"))).unwrap_err();

        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let fs =
            MockFileSystem::new().with_file("bad.yaml", "server: https://octopus.example.com\n");

        let result = ExportConfig::resolve(&fs, cli(), Some(Path::new("bad.yaml")));

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_connection_details() {
        let config = ExportConfig::merge(
            CliValues {
                api_key: None,
                ..cli()
            },
            ConfigFile::default(),
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ExportConfig::merge(
            CliValues {
                url: Some("not a url".to_string()),
                ..cli()
            },
            ConfigFile::default(),
        );

        assert!(matches!(config.validate(), Err(ExportError::InvalidConfig(_))));
    }
}
