use crate::config::AppConfig;
use crate::error::{MapError, MapResult};
use crate::topology::Topology;
use crate::types::{GeometryFeature, StatRecord};
use geo::MultiLineString;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Where a dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Local(PathBuf),
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Source::Remote(value.to_string())
        } else {
            Source::Local(PathBuf::from(value))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Remote(url) => f.write_str(url),
            Source::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Source {
    fn is_csv(&self) -> bool {
        let name = match self {
            Source::Remote(url) => url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase(),
            Source::Local(path) => path.to_string_lossy().to_ascii_lowercase(),
        };
        name.ends_with(".csv")
    }

    pub async fn read(&self, client: &reqwest::Client) -> MapResult<Vec<u8>> {
        let unavailable = |e: &dyn fmt::Display| MapError::unavailable(self.to_string(), e);
        match self {
            Source::Remote(url) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| unavailable(&e))?;
                let bytes = response.bytes().await.map_err(|e| unavailable(&e))?;
                Ok(bytes.to_vec())
            }
            Source::Local(path) => tokio::fs::read(path).await.map_err(|e| unavailable(&e)),
        }
    }
}

/// Decoded inputs for one map.
#[derive(Debug, Clone)]
pub struct MapData {
    pub stats: Vec<StatRecord>,
    pub counties: Vec<GeometryFeature>,
    pub state_borders: MultiLineString<f64>,
    pub nation: Vec<GeometryFeature>,
}

/// Reads both sources concurrently. Fails as a whole if either read fails.
pub async fn fetch_datasets(
    client: &reqwest::Client,
    statistics: &Source,
    topology: &Source,
) -> MapResult<(Vec<u8>, Vec<u8>)> {
    tokio::try_join!(statistics.read(client), topology.read(client))
}

pub fn decode_statistics(bytes: &[u8], source: &Source) -> MapResult<Vec<StatRecord>> {
    if source.is_csv() {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes)
            .deserialize()
            .collect::<Result<Vec<StatRecord>, _>>()
            .map_err(|e| MapError::unavailable(source.to_string(), e))
    } else {
        serde_json::from_slice(bytes).map_err(|e| MapError::unavailable(source.to_string(), e))
    }
}

pub async fn load_data(config: &AppConfig) -> MapResult<MapData> {
    let statistics = Source::from(config.input.statistics.as_str());
    let topology = Source::from(config.input.topology.as_str());
    info!(%statistics, %topology, "Fetching datasets...");

    let client = reqwest::Client::new();
    let (stat_bytes, topo_bytes) = fetch_datasets(&client, &statistics, &topology).await?;

    let stats = decode_statistics(&stat_bytes, &statistics)?;
    info!("Loaded statistics for {} regions", stats.len());

    let topology = Topology::from_slice(&topo_bytes)?;
    let layers = &config.layers;
    let counties = topology.feature(&layers.counties)?;
    let state_borders = topology.interior_mesh(&layers.states)?;
    let nation = topology.feature(&layers.nation)?;
    info!(
        counties = counties.len(),
        state_borders = state_borders.0.len(),
        nation = nation.len(),
        "Decoded topology layers"
    );

    Ok(MapData {
        stats,
        counties,
        state_borders,
        nation,
    })
}
