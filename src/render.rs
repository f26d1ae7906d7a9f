use crate::config::AppConfig;
use crate::data::MapData;
use crate::error::{MapError, MapResult};
use crate::join::join;
use crate::legend::Legend;
use crate::projection::{svg_path, GeometryProjector, Identity, Projection};
use crate::scale::{extent, ThresholdScale, GREENS};
use crate::types::{Color, GeometryFeature, JoinedRegion, RegionAttributes, RegionId};
use anyhow::{Context, Result};
use geo::{Geometry, MultiLineString};
use std::fs;
use tracing::info;

pub const MAP_WIDTH: u32 = 975;
pub const MAP_HEIGHT: u32 = 610;
/// Fill for counties without a statistic.
pub const NO_DATA_FILL: Color = Color::rgb(0xd9, 0xd9, 0xd9);
const STATE_LINE_STROKE: Color = Color::rgb(0xff, 0xff, 0xff);
const NATION_LINE_STROKE: Color = Color::rgb(0x33, 0x33, 0x33);

#[derive(Debug, Clone, PartialEq)]
pub struct CountyPath {
    pub id: Option<RegionId>,
    pub d: String,
    pub attributes: Option<RegionAttributes>,
}

/// The three map layers, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub struct MapScene {
    pub counties: Vec<CountyPath>,
    pub state_borders: String,
    pub nation: Vec<String>,
}

impl MapScene {
    /// All inputs are already in screen space.
    pub fn build(regions: &[JoinedRegion], state_borders: &MultiLineString<f64>, nation: &[GeometryFeature]) -> Self {
        let counties = regions
            .iter()
            .map(|region| CountyPath {
                id: region.id.clone(),
                d: svg_path(&region.geometry),
                attributes: region.attributes.clone(),
            })
            .collect();

        Self {
            counties,
            state_borders: svg_path(&Geometry::MultiLineString(state_borders.clone())),
            nation: nation.iter().map(|f| svg_path(&f.geometry)).collect(),
        }
    }

    pub fn to_svg(&self, legend: &Legend) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" id="graph" width="{MAP_WIDTH}" height="{MAP_HEIGHT}" viewBox="0 0 {MAP_WIDTH} {MAP_HEIGHT}">"#
        ));
        svg.push('\n');

        svg.push_str("<g class=\"counties\">\n");
        for county in &self.counties {
            svg.push_str(&county_element(county));
        }
        svg.push_str("</g>\n");

        svg.push_str(&format!(
            r#"<path class="state-line" d="{}" fill="none" stroke="{STATE_LINE_STROKE}" stroke-linejoin="round"/>"#,
            self.state_borders
        ));
        svg.push('\n');

        svg.push_str("<g class=\"nation-line\">\n");
        for d in &self.nation {
            svg.push_str(&format!(r#"<path d="{d}" fill="none" stroke="{NATION_LINE_STROKE}"/>"#));
            svg.push('\n');
        }
        svg.push_str("</g>\n");

        svg.push_str(&legend.to_svg());
        svg.push_str("</svg>\n");
        svg
    }
}

fn county_element(county: &CountyPath) -> String {
    let fips = county.id.as_ref().map(|id| escape(id.as_str())).unwrap_or_default();
    match &county.attributes {
        Some(a) => format!(
            "<path class=\"county\" d=\"{}\" data-fips=\"{}\" data-education=\"{}\" data-state=\"{}\" data-county=\"{}\" fill=\"{}\"/>\n",
            county.d,
            fips,
            a.value,
            escape(&a.group_label),
            escape(&a.label),
            a.color
        ),
        None => format!(
            "<path class=\"county no-data\" d=\"{}\" data-fips=\"{}\" fill=\"{}\"/>\n",
            county.d, fips, NO_DATA_FILL
        ),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Everything derived from one [`MapData`]: scale, joined regions, legend and scene.
#[derive(Debug, Clone)]
pub struct ChoroplethMap {
    pub domain: (f64, f64),
    pub scale: ThresholdScale,
    pub regions: Vec<JoinedRegion>,
    pub legend: Legend,
    pub scene: MapScene,
}

impl ChoroplethMap {
    pub fn build(data: &MapData) -> MapResult<Self> {
        Self::build_with(data, &GeometryProjector::<Identity>::default())
    }

    pub fn build_with<P: Projection>(data: &MapData, projector: &GeometryProjector<P>) -> MapResult<Self> {
        let domain = extent(data.stats.iter().map(|r| r.value))
            .ok_or_else(|| MapError::EmptyDataset("statistics".to_string()))?;
        let scale = ThresholdScale::build(domain.0, domain.1, &GREENS)?;
        info!(min = domain.0, max = domain.1, "Built threshold scale");

        let project = |features: &[GeometryFeature]| -> Vec<GeometryFeature> {
            features
                .iter()
                .map(|f| GeometryFeature {
                    id: f.id.clone(),
                    geometry: projector.project(&f.geometry),
                })
                .collect()
        };
        let counties = project(&data.counties);
        let nation = project(&data.nation);
        let state_borders = match projector.project(&Geometry::MultiLineString(data.state_borders.clone())) {
            Geometry::MultiLineString(lines) => lines,
            _ => MultiLineString::new(Vec::new()),
        };

        let regions = join(&counties, &data.stats, &scale);
        let scene = MapScene::build(&regions, &state_borders, &nation);
        let legend = Legend::build(&scale, domain)?;

        Ok(Self {
            domain,
            scale,
            regions,
            legend,
            scene,
        })
    }

    pub fn svg(&self) -> String {
        self.scene.to_svg(&self.legend)
    }

    /// Standalone page hosting the map, the tooltip element and the pointer forwarding script.
    pub fn page(&self) -> String {
        let mut html = String::from(PAGE_HEAD);
        html.push_str("<div class=\"graph-container\">\n");
        html.push_str(&self.svg());
        html.push_str("<div id=\"tooltip\" style=\"opacity: 0\"></div>\n</div>\n<script>\n");
        html.push_str(PAGE_SCRIPT);
        html.push_str("</script>\n</body>\n</html>\n");
        html
    }

    /// Joined regions with their display attributes as properties.
    pub fn geojson(&self) -> geojson::FeatureCollection {
        let features = self
            .regions
            .iter()
            .map(|region| {
                let properties = region
                    .attributes
                    .as_ref()
                    .and_then(|a| serde_json::to_value(a).ok())
                    .and_then(|v| match v {
                        serde_json::Value::Object(map) => Some(map),
                        _ => None,
                    });
                geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&region.geometry))),
                    id: region.id.as_ref().map(|id| geojson::feature::Id::String(id.to_string())),
                    properties,
                    foreign_members: None,
                }
            })
            .collect();

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

pub fn write_outputs(config: &AppConfig, map: &ChoroplethMap) -> Result<()> {
    let dir = &config.output.dir;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let map_path = dir.join(&config.output.svg);
    fs::write(&map_path, map.svg()).with_context(|| format!("Failed to write {:?}", map_path))?;
    info!("Wrote {:?}", map_path);

    let html_path = dir.join(&config.output.html);
    fs::write(&html_path, map.page()).with_context(|| format!("Failed to write {:?}", html_path))?;
    info!("Wrote {:?}", html_path);

    if let Some(name) = &config.output.geojson {
        let path = dir.join(name);
        let body = serde_json::to_string(&map.geojson()).context("Failed to serialize GeoJSON")?;
        fs::write(&path, body).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    Ok(())
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>United States Educational Attainment</title>
<style>
body { font-family: sans-serif; }
.graph-container { position: relative; }
.county:hover { cursor: pointer; }
#tooltip { position: absolute; pointer-events: none; background: #fff; border: 2px solid #999; border-radius: 4px; padding: 4px 8px; font-size: 12px; }
#tooltip p { margin: 2px 0; }
</style>
</head>
<body>
<h1 id="title">United States Educational Attainment</h1>
<p id="description">Percentage of adults age 25 and older with a bachelor's degree or higher (2010-2014)</p>
"#;

const PAGE_SCRIPT: &str = r#"const svg = document.getElementById("graph");
const tooltip = document.getElementById("tooltip");
let highlighted = null;
let sentSeq = 0;
let appliedSeq = 0;

function apply(view) {
  tooltip.style.transition = `opacity ${view.fade_ms}ms`;
  tooltip.style.opacity = view.opacity;
  if (view.content) {
    tooltip.replaceChildren(...view.content.lines.map((line) => {
      const p = document.createElement("p");
      p.textContent = line;
      return p;
    }));
    tooltip.dataset.education = view.content.value;
    tooltip.style.borderColor = view.content.border_color;
  }
  if (view.left !== null) {
    tooltip.style.left = `${view.left}px`;
    tooltip.style.top = `${view.top}px`;
  }
  if (highlighted) highlighted.style.stroke = "none";
  highlighted = view.highlight ? svg.querySelector(`path[data-fips="${view.highlight}"]`) : null;
  if (highlighted) highlighted.style.stroke = view.highlight_stroke;
}

async function send(sample) {
  try {
    const response = await fetch("/api/pointer", {
      method: "POST",
      headers: { "content-type": "application/json" },
      body: JSON.stringify(sample),
    });
    if (!response.ok) return;
    const view = await response.json();
    if (view.seq < appliedSeq) return;
    appliedSeq = view.seq;
    apply(view);
  } catch (_) {}
}

svg.addEventListener("pointermove", (e) => {
  const p = new DOMPoint(e.clientX, e.clientY).matrixTransform(svg.getScreenCTM().inverse());
  send({ seq: ++sentSeq, kind: "move", page_x: e.pageX, page_y: e.pageY, map_x: p.x, map_y: p.y });
});
svg.addEventListener("pointerleave", (e) => {
  send({ seq: ++sentSeq, kind: "leave", page_x: e.pageX, page_y: e.pageY, map_x: 0, map_y: 0 });
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::map_data as fixture_data;

    #[test]
    fn layers_are_drawn_counties_then_states_then_nation() {
        let svg = ChoroplethMap::build(&fixture_data()).unwrap().svg();
        let counties = svg.find("class=\"counties\"").unwrap();
        let states = svg.find("class=\"state-line\"").unwrap();
        let nation = svg.find("class=\"nation-line\"").unwrap();
        let legend = svg.find("id=\"legend\"").unwrap();
        assert!(counties < states && states < nation && nation < legend);
        assert!(svg.contains(r#"class="state-line" d="M10,0L10,10" fill="none""#));
    }

    #[test]
    fn counties_carry_display_attributes() {
        let map = ChoroplethMap::build(&fixture_data()).unwrap();
        let svg = map.svg();
        let expected_fill = map.scale.classify(21.9);
        assert!(svg.contains(&format!(
            r#"data-fips="1001" data-education="21.9" data-state="AL" data-county="Autauga County" fill="{expected_fill}""#
        )));
        assert!(svg.contains(r#"<path class="county no-data" d="M30,0L40,0L40,10L30,10Z" data-fips="1005""#));
    }

    #[test]
    fn scale_spans_statistic_extent() {
        let map = ChoroplethMap::build(&fixture_data()).unwrap();
        assert_eq!(map.domain, (21.9, 28.6));
        assert_eq!(map.scale.breakpoints().len(), GREENS.len() - 1);
        assert_eq!(map.regions.len(), 3);
    }

    struct Double;

    impl Projection for Double {
        fn project(&self, coord: geo::Coord<f64>) -> geo::Coord<f64> {
            geo::coord! { x: coord.x * 2.0, y: coord.y * 2.0 }
        }
    }

    #[test]
    fn every_layer_goes_through_the_projector() {
        let map = ChoroplethMap::build_with(&fixture_data(), &GeometryProjector::new(Double)).unwrap();
        assert_eq!(map.scene.state_borders, "M20,0L20,20");
        assert_eq!(map.scene.counties[2].d, "M60,0L80,0L80,20L60,20Z");
        assert!(map.scene.nation[0].starts_with("M20,0L40,0"));
    }

    #[test]
    fn empty_statistics_cannot_build_a_scale() {
        let mut data = fixture_data();
        data.stats.clear();
        assert!(matches!(ChoroplethMap::build(&data), Err(MapError::EmptyDataset(_))));
    }

    #[test]
    fn labels_are_escaped() {
        assert_eq!(escape(r#"Doña "Ana" & <Co>"#), "Doña &quot;Ana&quot; &amp; &lt;Co&gt;");
    }

    #[test]
    fn geojson_export_keeps_every_region() {
        let collection = ChoroplethMap::build(&fixture_data()).unwrap().geojson();
        assert_eq!(collection.features.len(), 3);
        let first = &collection.features[0];
        assert_eq!(first.id, Some(geojson::feature::Id::String("1001".to_string())));
        let properties = first.properties.as_ref().unwrap();
        assert_eq!(properties["label"], "Autauga County");
        assert!(collection.features[2].properties.is_none());
    }

    #[test]
    fn writes_svg_page_and_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.dir = dir.path().join("out");
        config.output.geojson = Some("regions.geojson".to_string());

        let map = ChoroplethMap::build(&fixture_data()).unwrap();
        write_outputs(&config, &map).unwrap();

        let page = fs::read_to_string(config.output.dir.join("index.html")).unwrap();
        assert!(page.contains("id=\"tooltip\""));
        assert!(page.contains("/api/pointer"));
        assert!(page.contains("seq: ++sentSeq"));
        assert!(fs::read_to_string(config.output.dir.join("map.svg")).unwrap().starts_with("<svg"));
        assert!(config.output.dir.join("regions.geojson").exists());
    }
}
