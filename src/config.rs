use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

pub const EDUCATION_DATASET_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/for_user_education.json";
pub const COUNTY_TOPOLOGY_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/counties.json";

pub const SERVER_PORT: u16 = 3000;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub layers: LayerConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

/// Dataset locations: `http(s)://` URLs or local paths.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub statistics: String,
    pub topology: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            statistics: EDUCATION_DATASET_URL.to_string(),
            topology: COUNTY_TOPOLOGY_URL.to_string(),
        }
    }
}

/// Object names inside the topology document.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayerConfig {
    pub counties: String,
    pub states: String,
    pub nation: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            counties: "counties".to_string(),
            states: "states".to_string(),
            nation: "nation".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub svg: String,
    pub html: String,
    pub geojson: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            svg: "map.svg".to_string(),
            html: "index.html".to_string(),
            geojson: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: SERVER_PORT }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise `config.toml` is used when present.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load_from_file(Path::new(DEFAULT_CONFIG_FILE)),
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[input]
statistics = "data/education.csv"

[server]
port = 8080
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input.statistics, "data/education.csv");
        assert_eq!(config.input.topology, COUNTY_TOPOLOGY_URL);
        assert_eq!(config.layers.states, "states");
        assert_eq!(config.output.svg, "map.svg");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::resolve(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"many\"").unwrap();
        assert!(AppConfig::load_from_file(file.path()).is_err());
    }
}
