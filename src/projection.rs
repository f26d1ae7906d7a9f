//! Screen projection and SVG path serialization.
//!
//! The county topology ships already projected to pixel space, so the default
//! projection is the identity. Other projections plug in through [`Projection`].

use geo::{Coord, Geometry, LineString, MapCoords, Polygon};

/// Radius of the circle drawn for point geometries.
const POINT_RADIUS: f64 = 4.5;

pub trait Projection {
    fn project(&self, coord: Coord<f64>) -> Coord<f64>;
}

/// Null projection: coordinates are already screen coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Projection for Identity {
    fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        coord
    }
}

#[derive(Debug, Default, Clone)]
pub struct GeometryProjector<P = Identity> {
    projection: P,
}

impl<P: Projection> GeometryProjector<P> {
    pub fn new(projection: P) -> Self {
        Self { projection }
    }

    pub fn project(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        let projection = &self.projection;
        geometry.map_coords(|c| projection.project(c))
    }
}

/// Serializes screen-space geometry as SVG path data (`M`, `L`, `Z`), three decimals.
pub fn svg_path(geometry: &Geometry<f64>) -> String {
    let mut path = PathData::default();
    path.geometry(geometry);
    path.0
}

#[derive(Default)]
struct PathData(String);

impl PathData {
    fn geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.point(p.0),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.point(p.0)),
            Geometry::Line(l) => self.line(&[l.start, l.end]),
            Geometry::LineString(ls) => self.line(&ls.0),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.line(&ls.0)),
            Geometry::Polygon(p) => self.polygon(p),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.polygon(p)),
            Geometry::Rect(r) => self.polygon(&r.to_polygon()),
            Geometry::Triangle(t) => self.polygon(&t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.geometry(g)),
        }
    }

    fn point(&mut self, c: Coord<f64>) {
        let r = number(POINT_RADIUS);
        let d = number(2.0 * POINT_RADIUS);
        self.0.push_str(&format!(
            "M{},{}m0,{r}a{r},{r} 0 1,1 0,-{d}a{r},{r} 0 1,1 0,{d}z",
            number(c.x),
            number(c.y)
        ));
    }

    fn line(&mut self, coords: &[Coord<f64>]) {
        for (i, c) in coords.iter().enumerate() {
            let command = if i == 0 { 'M' } else { 'L' };
            self.0.push_str(&format!("{command}{},{}", number(c.x), number(c.y)));
        }
    }

    // closing point is implied by Z
    fn ring(&mut self, ring: &LineString<f64>) {
        let coords = &ring.0;
        let open = match coords.as_slice() {
            [first, .., last] if first == last => &coords[..coords.len() - 1],
            _ => coords.as_slice(),
        };
        if open.is_empty() {
            return;
        }
        self.line(open);
        self.0.push('Z');
    }

    fn polygon(&mut self, polygon: &Polygon<f64>) {
        self.ring(polygon.exterior());
        polygon.interiors().iter().for_each(|r| self.ring(r));
    }
}

pub(crate) fn number(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    // avoids "-0"
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}
