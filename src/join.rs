use crate::scale::ThresholdScale;
use crate::types::{GeometryFeature, JoinedRegion, RegionAttributes, RegionId, StatRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Match counts from a join, logged once after the join runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub matched: usize,
    pub geometry_only: usize,
    pub unused_records: usize,
}

/// Attaches each region's statistic and color, keeping every geometry in input order.
///
/// Regions with no matching record (or no id) stay geometry-only. Duplicate record
/// ids are last-write-wins.
pub fn join(geometries: &[GeometryFeature], stats: &[StatRecord], scale: &ThresholdScale) -> Vec<JoinedRegion> {
    let (regions, summary) = join_with_summary(geometries, stats, scale);
    info!(
        matched = summary.matched,
        geometry_only = summary.geometry_only,
        unused_records = summary.unused_records,
        "Joined statistics onto {} regions",
        regions.len()
    );
    regions
}

pub fn join_with_summary(
    geometries: &[GeometryFeature],
    stats: &[StatRecord],
    scale: &ThresholdScale,
) -> (Vec<JoinedRegion>, JoinSummary) {
    let lookup: HashMap<&RegionId, &StatRecord> = stats.iter().map(|r| (&r.id, r)).collect();
    let mut summary = JoinSummary::default();

    let regions: Vec<JoinedRegion> = geometries
        .iter()
        .map(|feature| {
            let record = feature.id.as_ref().and_then(|id| lookup.get(id));
            let attributes = match record {
                Some(record) => {
                    summary.matched += 1;
                    Some(RegionAttributes {
                        value: record.value,
                        color: scale.classify(record.value),
                        label: record.label.clone(),
                        group_label: record.group_label.clone(),
                    })
                }
                None => {
                    debug!(id = ?feature.id, "No statistic for region");
                    summary.geometry_only += 1;
                    None
                }
            };
            JoinedRegion {
                id: feature.id.clone(),
                geometry: feature.geometry.clone(),
                attributes,
            }
        })
        .collect();

    let geometry_ids: HashSet<&RegionId> = geometries.iter().filter_map(|f| f.id.as_ref()).collect();
    summary.unused_records = lookup.keys().filter(|id| !geometry_ids.contains(*id)).count();

    (regions, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;
    use geo::{point, Geometry};

    fn feature(id: Option<&str>) -> GeometryFeature {
        GeometryFeature {
            id: id.map(RegionId::from),
            geometry: Geometry::Point(point!(x: 0.0, y: 0.0)),
        }
    }

    fn record(id: &str, value: f64) -> StatRecord {
        StatRecord {
            id: RegionId::from(id),
            value,
            label: format!("County {id}"),
            group_label: "AL".to_string(),
        }
    }

    fn scale() -> ThresholdScale {
        let palette = [Color::rgb(0, 0, 0), Color::rgb(128, 128, 128), Color::rgb(255, 255, 255)];
        ThresholdScale::build(0.0, 100.0, &palette).unwrap()
    }

    #[test]
    fn unmatched_regions_stay_geometry_only() {
        let geometries = vec![feature(Some("1001")), feature(Some("1003"))];
        let stats = vec![record("1001", 20.0)];

        let (joined, summary) = join_with_summary(&geometries, &stats, &scale());
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].attributes.as_ref().map(|a| a.value), Some(20.0));
        assert!(joined[1].attributes.is_none());
        assert_eq!(joined[1].id, Some(RegionId::from("1003")));
        assert_eq!(
            summary,
            JoinSummary {
                matched: 1,
                geometry_only: 1,
                unused_records: 0
            }
        );
    }

    #[test]
    fn attaches_color_and_labels() {
        let joined = join(&[feature(Some("7"))], &[record("7", 75.0)], &scale());
        let attributes = joined[0].attributes.as_ref().unwrap();
        assert_eq!(attributes.color, Color::rgb(255, 255, 255));
        assert_eq!(attributes.label, "County 7");
        assert_eq!(attributes.group_label, "AL");
    }

    #[test]
    fn keeps_every_geometry_in_order() {
        let geometries: Vec<_> = ["3", "1", "2"].iter().map(|id| feature(Some(*id))).chain([feature(None)]).collect();
        let stats = vec![record("2", 1.0), record("3", 2.0), record("99", 3.0)];

        let (joined, summary) = join_with_summary(&geometries, &stats, &scale());
        assert_eq!(joined.len(), geometries.len());
        let ids: Vec<_> = joined.iter().map(|r| r.id.as_ref().map(RegionId::as_str)).collect();
        assert_eq!(ids, vec![Some("3"), Some("1"), Some("2"), None]);
        for region in &joined {
            if let Some(id) = &region.id {
                if let Some(r) = stats.iter().find(|r| &r.id == id) {
                    assert_eq!(region.attributes.as_ref().map(|a| a.value), Some(r.value));
                }
            }
        }
        assert_eq!(summary.unused_records, 1);
    }

    #[test]
    fn duplicate_records_are_last_write_wins() {
        let joined = join(&[feature(Some("5"))], &[record("5", 10.0), record("5", 60.0)], &scale());
        assert_eq!(joined[0].attributes.as_ref().map(|a| a.value), Some(60.0));
    }
}
