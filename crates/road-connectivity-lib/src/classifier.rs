//! Proximity classification of a single point against a reference layer

use crate::{ConnectivityError, LineLayer, Result, utils};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of checking one endpoint against the reference layer
///
/// `Disconnected` means a reference feature passes within tolerance: the two roads
/// touch but are stored as separate, unmerged features. `DeadEnd` means nothing is
/// within tolerance and the endpoint terminates in isolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionStatus {
    Disconnected,
    DeadEnd,
}

/// Which set of labels to write into the output `status` field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LabelStyle {
    /// "Disconnected" / "Dead end"
    #[default]
    English,
    /// "Desconectado" / "Fim de rua", as produced by the original QGIS tool
    Source,
}

impl ConnectionStatus {
    /// English label
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::DeadEnd => "Dead end",
        }
    }

    /// Portuguese label used by existing review layers
    pub fn source_label(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Desconectado",
            ConnectionStatus::DeadEnd => "Fim de rua",
        }
    }

    /// Label in the requested style
    pub fn label_for(self, style: LabelStyle) -> &'static str {
        match style {
            LabelStyle::English => self.label(),
            LabelStyle::Source => self.source_label(),
        }
    }

    #[inline]
    pub fn is_disconnected(self) -> bool {
        self == ConnectionStatus::Disconnected
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One classified endpoint
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassificationResult {
    /// Dense, zero-based position in production order
    pub sequence_id: u64,
    pub status: ConnectionStatus,
    pub location: Point<f64>,
}

/// Classify `point` against `reference`
///
/// Candidates come from an envelope query over the square window of half-width
/// `tolerance` centred on the point; each candidate is then measured exactly.
/// A distance equal to `tolerance` counts as a match.
///
/// # Errors
/// [`ConnectivityError::InvalidTolerance`] for a negative or non-finite tolerance,
/// [`ConnectivityError::InvalidGeometry`] for a point with a NaN or infinite
/// coordinate, or whatever error the layer's envelope query reports.
pub fn classify<L: LineLayer + ?Sized>(
    point: Point<f64>,
    reference: &L,
    tolerance: f64,
) -> Result<ConnectionStatus> {
    if !utils::is_valid_tolerance(tolerance) {
        return Err(ConnectivityError::InvalidTolerance(tolerance));
    }
    // A non-finite window intersects everything and every distance would be NaN
    if !point.x().is_finite() || !point.y().is_finite() {
        return Err(ConnectivityError::InvalidGeometry(format!(
            "endpoint ({}, {}) has a non-finite coordinate",
            point.x(),
            point.y()
        )));
    }

    let window = utils::search_window(point, tolerance);

    for candidate in reference.query_envelope(window)? {
        let Some(distance) = utils::distance_to_geometry(point, &candidate.geometry) else {
            continue;
        };
        if distance <= tolerance {
            tracing::trace!(
                "Point ({}, {}) is {:.3} from feature {}",
                point.x(),
                point.y(),
                distance,
                candidate.id
            );
            return Ok(ConnectionStatus::Disconnected);
        }
    }

    Ok(ConnectionStatus::DeadEnd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LineFeature, MemoryLineLayer};
    use geo::{LineString, Rect, line_string};

    fn reference_with(lines: Vec<LineString<f64>>) -> MemoryLineLayer {
        MemoryLineLayer::from_features(
            "osm",
            lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| LineFeature::from_line_string(i as u64, line)),
        )
    }

    /// A layer whose envelope query returns every feature, to check the exact step alone
    struct UnindexedLayer(Vec<LineFeature>);

    impl LineLayer for UnindexedLayer {
        fn name(&self) -> &str {
            "unindexed"
        }

        fn crs(&self) -> Option<&str> {
            None
        }

        fn feature_count(&self) -> usize {
            self.0.len()
        }

        fn features(&self) -> Box<dyn Iterator<Item = &LineFeature> + '_> {
            Box::new(self.0.iter())
        }

        fn query_envelope(&self, _window: Rect<f64>) -> Result<Vec<&LineFeature>> {
            Ok(self.0.iter().collect())
        }
    }

    struct FailingLayer;

    impl LineLayer for FailingLayer {
        fn name(&self) -> &str {
            "failing"
        }

        fn crs(&self) -> Option<&str> {
            None
        }

        fn feature_count(&self) -> usize {
            0
        }

        fn features(&self) -> Box<dyn Iterator<Item = &LineFeature> + '_> {
            Box::new(std::iter::empty())
        }

        fn query_envelope(&self, _window: Rect<f64>) -> Result<Vec<&LineFeature>> {
            Err(ConnectivityError::Layer("provider went away".to_string()))
        }
    }

    #[test]
    fn test_point_on_reference_is_disconnected() {
        let reference = reference_with(vec![line_string![(x: 10.0, y: 10.0), (x: 20.0, y: 20.0)]]);

        assert_eq!(
            classify(Point::new(10.0, 10.0), &reference, 10.0).unwrap(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            classify(Point::new(15.0, 15.0), &reference, 0.0).unwrap(),
            ConnectionStatus::Disconnected
        );
    }

    #[test]
    fn test_far_point_is_dead_end() {
        let reference = reference_with(vec![line_string![(x: 10.0, y: 10.0), (x: 20.0, y: 20.0)]]);

        // Envelope touches the window corner, exact distance is ~14.14
        assert_eq!(
            classify(Point::new(0.0, 0.0), &reference, 10.0).unwrap(),
            ConnectionStatus::DeadEnd
        );
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let reference = reference_with(vec![line_string![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0)]]);

        assert_eq!(
            classify(Point::new(0.0, 0.0), &reference, 10.0).unwrap(),
            ConnectionStatus::Disconnected
        );
    }

    #[test]
    fn test_just_beyond_tolerance_is_dead_end() {
        for epsilon in [1e-9, 1e-3, 0.5] {
            let reference = reference_with(vec![line_string![
                (x: 10.0 + epsilon, y: 0.0),
                (x: 30.0, y: 0.0)
            ]]);
            assert_eq!(
                classify(Point::new(0.0, 0.0), &reference, 10.0).unwrap(),
                ConnectionStatus::DeadEnd,
                "epsilon {}",
                epsilon
            );
        }
    }

    #[test]
    fn test_segment_interior_within_tolerance() {
        // Both vertices are far away; the segment passes 5 units from the point
        let reference = reference_with(vec![line_string![(x: -100.0, y: 5.0), (x: 100.0, y: 5.0)]]);

        assert_eq!(
            classify(Point::new(0.0, 0.0), &reference, 10.0).unwrap(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            classify(Point::new(0.0, 0.0), &reference, 4.0).unwrap(),
            ConnectionStatus::DeadEnd
        );
    }

    #[test]
    fn test_empty_reference_is_dead_end() {
        let reference = MemoryLineLayer::new("osm");
        assert_eq!(
            classify(Point::new(0.0, 0.0), &reference, 10.0).unwrap(),
            ConnectionStatus::DeadEnd
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let reference = reference_with(vec![
            line_string![(x: 0.0, y: 0.0), (x: 50.0, y: 0.0)],
            line_string![(x: 30.0, y: 30.0), (x: 60.0, y: 10.0)],
        ]);

        for point in [Point::new(25.0, 9.0), Point::new(70.0, 70.0), Point::new(45.0, 20.0)] {
            let first = classify(point, &reference, 10.0).unwrap();
            for _ in 0..5 {
                assert_eq!(classify(point, &reference, 10.0).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_prefilter_agrees_with_exhaustive_check() {
        let lines: Vec<LineString<f64>> = (0..40)
            .map(|i| {
                let x = (i % 8) as f64 * 25.0;
                let y = (i / 8) as f64 * 25.0;
                line_string![(x: x, y: y), (x: x + 12.0, y: y + 7.0), (x: x + 3.0, y: y + 15.0)]
            })
            .collect();
        let indexed = reference_with(lines.clone());
        let unindexed = UnindexedLayer(
            lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| LineFeature::from_line_string(i as u64, line))
                .collect(),
        );

        for tolerance in [0.0, 2.5, 10.0, 30.0] {
            for xi in 0..30 {
                for yi in 0..20 {
                    let point = Point::new(xi as f64 * 7.3 - 10.0, yi as f64 * 7.1 - 10.0);
                    assert_eq!(
                        classify(point, &indexed, tolerance).unwrap(),
                        classify(point, &unindexed, tolerance).unwrap(),
                        "point {:?} tolerance {}",
                        point,
                        tolerance
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalid_tolerance() {
        let reference = MemoryLineLayer::new("osm");
        assert!(matches!(
            classify(Point::new(0.0, 0.0), &reference, -1.0),
            Err(ConnectivityError::InvalidTolerance(_))
        ));
        assert!(matches!(
            classify(Point::new(0.0, 0.0), &reference, f64::NAN),
            Err(ConnectivityError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_non_finite_point_is_invalid_geometry() {
        let reference = reference_with(vec![line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]]);

        for point in [
            Point::new(f64::NAN, 0.0),
            Point::new(0.0, f64::NAN),
            Point::new(f64::INFINITY, 0.0),
            Point::new(0.0, f64::NEG_INFINITY),
        ] {
            let result = classify(point, &reference, 10.0);
            assert!(
                matches!(result, Err(ConnectivityError::InvalidGeometry(_))),
                "point {:?} gave {:?}",
                point,
                result
            );
        }
    }

    #[test]
    fn test_query_failure_propagates() {
        let result = classify(Point::new(0.0, 0.0), &FailingLayer, 10.0);
        assert!(matches!(result, Err(ConnectivityError::Layer(_))));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ConnectionStatus::Disconnected.label(), "Disconnected");
        assert_eq!(ConnectionStatus::DeadEnd.source_label(), "Fim de rua");
        assert_eq!(
            ConnectionStatus::Disconnected.label_for(LabelStyle::Source),
            "Desconectado"
        );
        assert_eq!(ConnectionStatus::DeadEnd.to_string(), "Dead end");
        assert_eq!(LabelStyle::default(), LabelStyle::English);
    }
}
