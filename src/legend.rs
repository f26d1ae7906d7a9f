//! Segmented legend bar for a threshold scale, with ticks at every breakpoint and at the maximum.

use crate::error::{MapError, MapResult};
use crate::projection::number;
use crate::scale::ThresholdScale;
use crate::types::Color;

/// Horizontal pixel span the legend domain is mapped onto.
pub const LEGEND_SPAN: (f64, f64) = (550.0, 860.0);
pub const LEGEND_OFFSET_Y: f64 = 35.0;
pub const RECT_HEIGHT: f64 = 12.0;
pub const TICK_OVERFLOW: f64 = 5.0;
const TICK_PADDING: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> MapResult<Self> {
        let (min, max) = domain;
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(MapError::InvalidScaleRange { min, max });
        }
        Ok(Self { domain, range })
    }

    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendRect {
    pub x: f64,
    pub width: f64,
    pub fill: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub x: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub rects: Vec<LegendRect>,
    pub ticks: Vec<Tick>,
}

impl Legend {
    pub fn build(scale: &ThresholdScale, domain: (f64, f64)) -> MapResult<Self> {
        let x = LinearScale::new(domain, LEGEND_SPAN)?;
        let mut tick_values = scale.breakpoints().to_vec();
        tick_values.push(domain.1);

        let ticks = tick_values
            .iter()
            .map(|&value| Tick {
                value,
                x: x.map(value),
                label: format!("{value:.1}"),
            })
            .collect();

        let rects = tick_values
            .windows(2)
            .map(|pair| LegendRect {
                x: x.map(pair[0]),
                width: x.map(pair[1]) - x.map(pair[0]),
                fill: scale.classify(pair[0]),
            })
            .collect();

        Ok(Self { rects, ticks })
    }

    /// The legend as an SVG group. The axis has no baseline; tick lines reach up across the bar.
    pub fn to_svg(&self) -> String {
        let axis_y = RECT_HEIGHT + TICK_OVERFLOW;
        let mut svg = String::new();
        svg.push_str(&format!(r#"<g id="legend" transform="translate(0,{})">"#, number(LEGEND_OFFSET_Y)));
        svg.push('\n');

        svg.push_str("<g class=\"legend-plot\">\n");
        for rect in &self.rects {
            svg.push_str(&format!(
                r#"<rect x="{}" y="0" width="{}" height="{}" fill="{}"/>"#,
                number(rect.x),
                number(rect.width),
                number(RECT_HEIGHT),
                rect.fill
            ));
            svg.push('\n');
        }
        svg.push_str("</g>\n");

        svg.push_str(&format!(
            r#"<g class="legend-axis" transform="translate(0,{})" fill="none" font-size="10" font-family="sans-serif" text-anchor="middle">"#,
            number(axis_y)
        ));
        svg.push('\n');
        for tick in &self.ticks {
            svg.push_str(&format!(
                r#"<g class="tick" transform="translate({},0)"><line stroke="currentColor" y2="-{}"/><text fill="currentColor" y="{}" dy="0.71em">{}</text></g>"#,
                number(tick.x),
                number(axis_y),
                number(TICK_PADDING),
                tick.label
            ));
            svg.push('\n');
        }
        svg.push_str("</g>\n</g>\n");
        svg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<Color> {
        (0..4).map(|i| Color::rgb(i * 60, 100, 100)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    #[test]
    fn ticks_sit_at_breakpoints_and_max() {
        let scale = ThresholdScale::build(0.0, 80.0, &palette()).unwrap();
        let legend = Legend::build(&scale, (0.0, 80.0)).unwrap();

        let labels: Vec<_> = legend.ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["0.0", "26.7", "53.3", "80.0"]);
        assert_close(legend.ticks[0].x, 550.0);
        assert_close(legend.ticks[3].x, 860.0);
    }

    #[test]
    fn rects_fill_the_span_between_ticks() {
        let p = palette();
        let scale = ThresholdScale::build(0.0, 80.0, &p).unwrap();
        let legend = Legend::build(&scale, (0.0, 80.0)).unwrap();

        assert_eq!(legend.rects.len(), 3);
        for (rect, pair) in legend.rects.iter().zip(legend.ticks.windows(2)) {
            assert_close(rect.x, pair[0].x);
            assert_close(rect.x + rect.width, pair[1].x);
        }
        let last = legend.rects.last().unwrap();
        assert_close(last.x + last.width, 860.0);
        assert_eq!(legend.rects[0].fill, p[1]);
        assert_eq!(last.fill, p[3]);
    }

    #[test]
    fn svg_has_no_axis_baseline() {
        let scale = ThresholdScale::build(2.6, 75.1, &crate::scale::GREENS).unwrap();
        let svg = Legend::build(&scale, (2.6, 75.1)).unwrap().to_svg();
        assert!(svg.starts_with(r#"<g id="legend" transform="translate(0,35)">"#));
        assert_eq!(svg.matches("<rect ").count(), 8);
        assert_eq!(svg.lines().filter(|l| l.starts_with("<rect ")).count(), 8);
        assert_eq!(svg.matches("class=\"tick\"").count(), 9);
        assert!(svg.contains(r#"y2="-17""#));
        assert!(!svg.contains("domain"));
    }

    #[test]
    fn degenerate_domain_is_rejected() {
        assert!(LinearScale::new((3.0, 3.0), LEGEND_SPAN).is_err());
    }
}
