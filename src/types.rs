use crate::error::MapError;
use geo::Geometry;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Join key shared by the topology and the statistics (a county FIPS code).
///
/// Both datasets encode it either as a JSON number or as a string; the two
/// forms decode to the same textual key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RegionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => RegionId(s),
            Raw::Integer(n) => RegionId(n.to_string()),
            Raw::Float(f) => RegionId(f.to_string()),
        })
    }
}

/// sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Color {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MapError::InvalidColor(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| MapError::InvalidColor(s.to_string()))
        };
        Ok(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One observation per region. Field names follow the education dataset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatRecord {
    #[serde(rename = "fips")]
    pub id: RegionId,
    #[serde(rename = "bachelorsOrHigher")]
    pub value: f64,
    #[serde(rename = "area_name")]
    pub label: String,
    #[serde(rename = "state")]
    pub group_label: String,
}

/// A decoded topology shape. Features without an id (the nation outline) are valid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryFeature {
    pub id: Option<RegionId>,
    pub geometry: Geometry<f64>,
}

/// Display attributes attached to a region once its statistic is found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAttributes {
    pub value: f64,
    pub color: Color,
    pub label: String,
    pub group_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRegion {
    pub id: Option<RegionId>,
    pub geometry: Geometry<f64>,
    // None for geometry-only regions
    pub attributes: Option<RegionAttributes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_id_accepts_numbers_and_strings() {
        let ids: Vec<RegionId> = serde_json::from_str(r#"[1001, "1003", 2020.0]"#).unwrap();
        assert_eq!(ids, vec![RegionId::from("1001"), RegionId::from("1003"), RegionId::from("2020")]);
    }

    #[test]
    fn color_parses_and_prints_hex() {
        let color: Color = "#00441B".parse().unwrap();
        assert_eq!(color, Color::rgb(0, 68, 27));
        assert_eq!(color.to_string(), "#00441b");
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#00441b\"");
    }

    #[test]
    fn color_rejects_malformed_input() {
        assert!("#0441b".parse::<Color>().is_err());
        assert!("zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn stat_record_reads_education_fields() {
        let record: StatRecord = serde_json::from_str(
            r#"{"fips":1001,"state":"AL","area_name":"Autauga County","bachelorsOrHigher":21.9}"#,
        )
        .unwrap();
        assert_eq!(record.id.as_str(), "1001");
        assert_eq!(record.value, 21.9);
        assert_eq!(record.label, "Autauga County");
        assert_eq!(record.group_label, "AL");
    }
}
