use envflake_schema::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// User defaults for the CLI, read from `$ENVFLAKE_CONFIG` or
/// `~/.config/envflake/config.toml`. A missing file means no defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Descriptor used when none is given on the command line.
    #[serde(default)]
    pub descriptor: Option<PathBuf>,
    /// Platform used by `shell` when `--platform` is absent.
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl CliConfig {
    pub fn load_default() -> Result<Self, String> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                debug!("no config at {}", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    /// Command-line value first, then config, then the default file name.
    pub fn descriptor_path(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.descriptor.clone())
            .unwrap_or_else(|| PathBuf::from(crate::commands::DEFAULT_DESCRIPTOR))
    }

    /// Command-line value first, then config, then the running host.
    pub fn platform(&self, cli: Option<&str>) -> Result<Platform, String> {
        if let Some(raw) = cli {
            return raw
                .parse()
                .map_err(|e| crate::commands::descriptor_error(&e));
        }
        self.platform.or_else(Platform::host).ok_or_else(|| {
            format!(
                "unsupported platform: host {}-{} has no platform identifier (pass --platform)",
                std::env::consts::ARCH,
                std::env::consts::OS
            )
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ENVFLAKE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/envflake/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "descriptor = \"/work/envflake.toml\"\nplatform = \"aarch64-darwin\"\n",
        )
        .unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded.descriptor, Some(PathBuf::from("/work/envflake.toml")));
        assert_eq!(loaded.platform, Some(Platform::Aarch64Darwin));
    }

    #[test]
    fn config_rejects_unknown_platform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "platform = \"mips-linux\"\n").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }

    #[test]
    fn cli_values_take_precedence() {
        let config = CliConfig {
            descriptor: Some(PathBuf::from("from-config.toml")),
            platform: Some(Platform::X86_64Darwin),
        };
        assert_eq!(
            config.descriptor_path(Some(PathBuf::from("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        assert_eq!(
            config.descriptor_path(None),
            PathBuf::from("from-config.toml")
        );
        assert_eq!(
            config.platform(Some("riscv64-linux")).unwrap(),
            Platform::Riscv64Linux
        );
        assert_eq!(config.platform(None).unwrap(), Platform::X86_64Darwin);
        assert!(config
            .platform(Some("pdp11-unix"))
            .unwrap_err()
            .starts_with("unsupported platform:"));
    }

    #[test]
    fn defaults_to_descriptor_file_name() {
        assert_eq!(
            CliConfig::default().descriptor_path(None),
            PathBuf::from("envflake.toml")
        );
    }
}
