//! TopoJSON decoding: per-region features and shared-boundary meshes.
//!
//! Arcs are decoded once when the document is read. With a `transform`, arc
//! positions are quantized and delta-encoded; point coordinates are quantized
//! but absolute. An arc reference `i < 0` means arc `!i` walked backwards.

use crate::error::{MapError, MapResult};
use crate::types::{GeometryFeature, RegionId};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const ORIGIN: &str = "topology";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

impl Transform {
    fn apply(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: x * self.scale[0] + self.translate[0],
            y: y * self.scale[1] + self.translate[1],
        }
    }
}

/// A geometry object inside `objects`. The arc nesting depth depends on `type`,
/// so arcs and coordinates are kept raw until the object is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct TopoGeometry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<RegionId>,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    coordinates: Option<Value>,
    #[serde(default)]
    geometries: Vec<TopoGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawTopology {
    #[serde(default)]
    transform: Option<Transform>,
    objects: HashMap<String, TopoGeometry>,
    arcs: Vec<Vec<Vec<f64>>>,
}

enum Shape<'a> {
    Null,
    Collection(&'a [TopoGeometry]),
    Point(Vec<f64>),
    MultiPoint(Vec<Vec<f64>>),
    LineString(Vec<i64>),
    MultiLineString(Vec<Vec<i64>>),
    Polygon(Vec<Vec<i64>>),
    MultiPolygon(Vec<Vec<Vec<i64>>>),
}

fn nested<'a, T: Deserialize<'a>>(value: Option<&'a Value>, kind: &str) -> MapResult<T> {
    let value = value.ok_or_else(|| MapError::unavailable(ORIGIN, format!("{kind} without arcs or coordinates")))?;
    T::deserialize(value).map_err(|e| MapError::unavailable(ORIGIN, format!("malformed {kind}: {e}")))
}

impl TopoGeometry {
    fn shape(&self) -> MapResult<Shape<'_>> {
        let arcs = self.arcs.as_ref();
        let coordinates = self.coordinates.as_ref();
        Ok(match self.kind.as_deref() {
            None => Shape::Null,
            Some("GeometryCollection") => Shape::Collection(&self.geometries),
            Some(kind @ "Point") => Shape::Point(nested(coordinates, kind)?),
            Some(kind @ "MultiPoint") => Shape::MultiPoint(nested(coordinates, kind)?),
            Some(kind @ "LineString") => Shape::LineString(nested(arcs, kind)?),
            Some(kind @ "MultiLineString") => Shape::MultiLineString(nested(arcs, kind)?),
            Some(kind @ "Polygon") => Shape::Polygon(nested(arcs, kind)?),
            Some(kind @ "MultiPolygon") => Shape::MultiPolygon(nested(arcs, kind)?),
            Some(other) => {
                return Err(MapError::unavailable(ORIGIN, format!("unknown geometry type '{other}'")))
            }
        })
    }

    /// Every arc reference in this geometry, rings and parts flattened.
    fn arc_refs(&self) -> MapResult<Vec<i64>> {
        Ok(match self.shape()? {
            Shape::LineString(arcs) => arcs,
            Shape::MultiLineString(arcs) | Shape::Polygon(arcs) => arcs.into_iter().flatten().collect(),
            Shape::MultiPolygon(arcs) => arcs.into_iter().flatten().flatten().collect(),
            _ => Vec::new(),
        })
    }

    /// Leaf geometries, descending into collections.
    fn leaves<'a>(&'a self, out: &mut Vec<&'a TopoGeometry>) {
        if self.kind.as_deref() == Some("GeometryCollection") {
            for member in &self.geometries {
                member.leaves(out);
            }
        } else {
            out.push(self);
        }
    }
}

/// A decoded topology document.
#[derive(Debug)]
pub struct Topology {
    transform: Option<Transform>,
    objects: HashMap<String, TopoGeometry>,
    arcs: Vec<Vec<Coord<f64>>>,
}

impl Topology {
    pub fn from_slice(bytes: &[u8]) -> MapResult<Self> {
        let raw: RawTopology = serde_json::from_slice(bytes).map_err(|e| MapError::unavailable(ORIGIN, e))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTopology) -> MapResult<Self> {
        let mut arcs = Vec::with_capacity(raw.arcs.len());
        for (index, positions) in raw.arcs.iter().enumerate() {
            let mut decoded = Vec::with_capacity(positions.len());
            let (mut x, mut y) = (0.0, 0.0);
            for position in positions {
                let [px, py] = match position.as_slice() {
                    [px, py, ..] => [*px, *py],
                    _ => return Err(MapError::unavailable(ORIGIN, format!("arc {index} has a short position"))),
                };
                decoded.push(match &raw.transform {
                    Some(t) => {
                        x += px;
                        y += py;
                        t.apply(x, y)
                    }
                    None => Coord { x: px, y: py },
                });
            }
            arcs.push(decoded);
        }

        Ok(Self {
            transform: raw.transform,
            objects: raw.objects,
            arcs,
        })
    }

    fn object(&self, name: &str) -> MapResult<&TopoGeometry> {
        self.objects
            .get(name)
            .ok_or_else(|| MapError::unavailable(ORIGIN, format!("missing object '{name}'")))
    }

    /// Features of a named object: one per member of a collection, otherwise one.
    /// Null geometries are skipped.
    pub fn feature(&self, name: &str) -> MapResult<Vec<GeometryFeature>> {
        let object = self.object(name)?;
        let members: Vec<&TopoGeometry> = match object.kind.as_deref() {
            Some("GeometryCollection") => object.geometries.iter().collect(),
            _ => vec![object],
        };

        let mut features = Vec::with_capacity(members.len());
        for member in members {
            if let Some(geometry) = self.geometry(member)? {
                features.push(GeometryFeature {
                    id: member.id.clone(),
                    geometry,
                });
            }
        }
        Ok(features)
    }

    /// Arcs of a named object kept by `filter`, called with the first and the
    /// last geometry referencing each arc. Each kept arc becomes one line.
    pub fn mesh<F>(&self, name: &str, filter: F) -> MapResult<MultiLineString<f64>>
    where
        F: Fn(&TopoGeometry, &TopoGeometry) -> bool,
    {
        let object = self.object(name)?;
        let mut leaves = Vec::new();
        object.leaves(&mut leaves);

        let mut geoms_by_arc: BTreeMap<i64, (&TopoGeometry, &TopoGeometry)> = BTreeMap::new();
        for leaf in leaves {
            for index in leaf.arc_refs()? {
                let arc = if index < 0 { !index } else { index };
                geoms_by_arc
                    .entry(arc)
                    .and_modify(|(_, last)| *last = leaf)
                    .or_insert((leaf, leaf));
            }
        }

        let mut lines = Vec::new();
        for (arc, (first, last)) in geoms_by_arc {
            if filter(first, last) {
                lines.push(LineString::new(self.arc_points(arc)?));
            }
        }
        Ok(MultiLineString::new(lines))
    }

    /// Arcs shared by two different geometries, e.g. borders between states.
    pub fn interior_mesh(&self, name: &str) -> MapResult<MultiLineString<f64>> {
        self.mesh(name, |a, b| !std::ptr::eq(a, b))
    }

    fn arc_points(&self, index: i64) -> MapResult<Vec<Coord<f64>>> {
        let (arc, reversed) = if index < 0 { (!index, true) } else { (index, false) };
        let points = usize::try_from(arc)
            .ok()
            .and_then(|i| self.arcs.get(i))
            .ok_or_else(|| MapError::unavailable(ORIGIN, format!("arc index {index} out of range")))?;
        let mut points = points.clone();
        if reversed {
            points.reverse();
        }
        Ok(points)
    }

    /// Concatenates arcs, dropping the point shared at each junction.
    fn stitch(&self, arcs: &[i64]) -> MapResult<Vec<Coord<f64>>> {
        let mut points: Vec<Coord<f64>> = Vec::new();
        for &index in arcs {
            points.pop();
            points.extend(self.arc_points(index)?);
        }
        Ok(points)
    }

    fn line(&self, arcs: &[i64]) -> MapResult<LineString<f64>> {
        let mut points = self.stitch(arcs)?;
        if points.len() == 1 {
            points.push(points[0]);
        }
        Ok(LineString::new(points))
    }

    fn ring(&self, arcs: &[i64]) -> MapResult<LineString<f64>> {
        let mut points = self.stitch(arcs)?;
        if let Some(&first) = points.first() {
            while points.len() < 4 {
                points.push(first);
            }
        }
        Ok(LineString::new(points))
    }

    fn polygon(&self, rings: &[Vec<i64>]) -> MapResult<Polygon<f64>> {
        let mut rings = rings.iter().map(|r| self.ring(r)).collect::<MapResult<Vec<_>>>()?.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    fn point(&self, position: &[f64]) -> MapResult<Point<f64>> {
        let [x, y] = match position {
            [x, y, ..] => [*x, *y],
            _ => return Err(MapError::unavailable(ORIGIN, "point with fewer than 2 coordinates")),
        };
        Ok(Point::from(match &self.transform {
            Some(t) => t.apply(x, y),
            None => Coord { x, y },
        }))
    }

    fn geometry(&self, object: &TopoGeometry) -> MapResult<Option<Geometry<f64>>> {
        Ok(Some(match object.shape()? {
            Shape::Null => return Ok(None),
            Shape::Collection(members) => {
                let mut geometries = Vec::with_capacity(members.len());
                for member in members {
                    if let Some(g) = self.geometry(member)? {
                        geometries.push(g);
                    }
                }
                Geometry::GeometryCollection(GeometryCollection::new_from(geometries))
            }
            Shape::Point(p) => Geometry::Point(self.point(&p)?),
            Shape::MultiPoint(ps) => Geometry::MultiPoint(MultiPoint::new(
                ps.iter().map(|p| self.point(p)).collect::<MapResult<_>>()?,
            )),
            Shape::LineString(arcs) => Geometry::LineString(self.line(&arcs)?),
            Shape::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
                lines.iter().map(|l| self.line(l)).collect::<MapResult<_>>()?,
            )),
            Shape::Polygon(rings) => Geometry::Polygon(self.polygon(&rings)?),
            Shape::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
                polygons.iter().map(|p| self.polygon(p)).collect::<MapResult<_>>()?,
            )),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    // Two unit squares side by side; arc 0 is their shared edge.
    const SQUARES: &str = r#"{
        "type": "Topology",
        "objects": {
            "squares": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": 1001, "arcs": [[0, 1]]},
                    {"type": "Polygon", "id": "1003", "arcs": [[2, -1]]},
                    {"type": null, "id": 1005}
                ]
            }
        },
        "arcs": [
            [[1, 0], [1, 1]],
            [[1, 1], [0, 1], [0, 0], [1, 0]],
            [[1, 0], [2, 0], [2, 1], [1, 1]]
        ]
    }"#;

    const QUANTIZED: &str = r#"{
        "type": "Topology",
        "transform": {"scale": [0.5, 2], "translate": [10, 20]},
        "objects": {
            "road": {"type": "LineString", "arcs": [0]},
            "reversed": {"type": "LineString", "arcs": [-1]},
            "town": {"type": "Point", "coordinates": [2, 1]},
            "broken": {"type": "LineString", "arcs": [5]}
        },
        "arcs": [[[0, 0], [2, 0], [0, 1]]]
    }"#;

    #[test]
    fn decodes_collection_members_and_skips_null() {
        let topology = Topology::from_slice(SQUARES.as_bytes()).unwrap();
        let features = topology.feature("squares").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, Some(RegionId::from("1001")));
        assert_eq!(features[1].id, Some(RegionId::from("1003")));

        let Geometry::Polygon(a) = &features[0].geometry else {
            panic!("expected polygon");
        };
        let ring: Vec<_> = a.exterior().coords().copied().collect();
        assert_eq!(
            ring,
            vec![
                coord! { x: 1.0, y: 0.0 },
                coord! { x: 1.0, y: 1.0 },
                coord! { x: 0.0, y: 1.0 },
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 1.0, y: 0.0 },
            ]
        );
    }

    #[test]
    fn reversed_arc_closes_ring() {
        let topology = Topology::from_slice(SQUARES.as_bytes()).unwrap();
        let features = topology.feature("squares").unwrap();
        let Geometry::Polygon(b) = &features[1].geometry else {
            panic!("expected polygon");
        };
        let ring: Vec<_> = b.exterior().coords().copied().collect();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[3], coord! { x: 1.0, y: 1.0 });
    }

    #[test]
    fn interior_mesh_keeps_only_shared_arcs() {
        let topology = Topology::from_slice(SQUARES.as_bytes()).unwrap();
        let interior = topology.interior_mesh("squares").unwrap();
        assert_eq!(interior.0.len(), 1);
        assert_eq!(
            interior.0[0].0,
            vec![coord! { x: 1.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }]
        );

        let all = topology.mesh("squares", |_, _| true).unwrap();
        assert_eq!(all.0.len(), 3);
    }

    #[test]
    fn delta_decodes_quantized_arcs() {
        let topology = Topology::from_slice(QUANTIZED.as_bytes()).unwrap();
        let road = topology.feature("road").unwrap();
        let Geometry::LineString(line) = &road[0].geometry else {
            panic!("expected line");
        };
        assert_eq!(
            line.0,
            vec![
                coord! { x: 10.0, y: 20.0 },
                coord! { x: 11.0, y: 20.0 },
                coord! { x: 11.0, y: 22.0 },
            ]
        );

        let reversed = topology.feature("reversed").unwrap();
        let Geometry::LineString(line) = &reversed[0].geometry else {
            panic!("expected line");
        };
        assert_eq!(line.0[0], coord! { x: 11.0, y: 22.0 });
    }

    #[test]
    fn points_are_quantized_but_not_delta_encoded() {
        let topology = Topology::from_slice(QUANTIZED.as_bytes()).unwrap();
        let town = topology.feature("town").unwrap();
        assert_eq!(town[0].geometry, Geometry::Point(Point::new(11.0, 22.0)));
        assert!(town[0].id.is_none());
    }

    #[test]
    fn bad_references_are_decode_failures() {
        let topology = Topology::from_slice(QUANTIZED.as_bytes()).unwrap();
        assert!(matches!(
            topology.feature("broken"),
            Err(MapError::DataUnavailable { .. })
        ));
        assert!(matches!(
            topology.feature("counties"),
            Err(MapError::DataUnavailable { .. })
        ));
        assert!(Topology::from_slice(b"{\"objects\": 3}").is_err());
    }
}
