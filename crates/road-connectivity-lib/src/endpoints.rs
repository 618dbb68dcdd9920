//! Endpoint extraction from line layers
//!
//! Yields the first and last vertex of every part of every feature, lazily and in
//! layer order, then part order, then (start, end) order.

use crate::{LineFeature, LineLayer};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which end of a part an endpoint was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EndpointPosition {
    Start,
    End,
}

/// The first or last vertex of one part of one feature
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Endpoint {
    /// Identifier of the feature the part belongs to
    pub feature_id: u64,
    /// Index of the part within the feature geometry
    pub part_index: usize,
    /// Start or end of the part
    pub position: EndpointPosition,
    /// Vertex coordinates
    pub point: Point<f64>,
}

/// Lazy, non-restartable iterator over the endpoints of a layer
pub struct Endpoints<'a> {
    /// Remaining features of the layer
    features: Box<dyn Iterator<Item = &'a LineFeature> + 'a>,
    /// Feature whose parts are being walked
    current: Option<&'a LineFeature>,
    /// Next part index within `current`
    part_index: usize,
    /// End vertex of the part whose start was just yielded
    pending_end: Option<Endpoint>,
}

/// Extract endpoints from every feature of `layer`
pub fn endpoints<L: LineLayer + ?Sized>(layer: &L) -> Endpoints<'_> {
    Endpoints {
        features: layer.features(),
        current: None,
        part_index: 0,
        pending_end: None,
    }
}

/// Number of endpoints [`endpoints`] will yield for `layer`
pub fn count_endpoints<L: LineLayer + ?Sized>(layer: &L) -> usize {
    layer
        .features()
        .flat_map(|feature| feature.geometry.0.iter())
        .filter(|part| !part.0.is_empty())
        .count()
        * 2
}

impl<'a> Iterator for Endpoints<'a> {
    type Item = Endpoint;

    fn next(&mut self) -> Option<Endpoint> {
        loop {
            if let Some(end) = self.pending_end.take() {
                return Some(end);
            }

            let feature = match self.current {
                Some(feature) => feature,
                None => {
                    let feature = self.features.next()?;
                    if feature.is_empty() {
                        tracing::trace!("Skipping feature {} with empty geometry", feature.id);
                        continue;
                    }
                    self.current = Some(feature);
                    self.part_index = 0;
                    feature
                }
            };

            let Some(part) = feature.geometry.0.get(self.part_index) else {
                self.current = None;
                continue;
            };
            let part_index = self.part_index;
            self.part_index += 1;

            // Parts without vertices contribute nothing
            let (Some(first), Some(last)) = (part.0.first(), part.0.last()) else {
                continue;
            };

            self.pending_end = Some(Endpoint {
                feature_id: feature.id,
                part_index,
                position: EndpointPosition::End,
                point: Point::from(*last),
            });

            return Some(Endpoint {
                feature_id: feature.id,
                part_index,
                position: EndpointPosition::Start,
                point: Point::from(*first),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLineLayer;
    use geo::{LineString, MultiLineString, line_string};

    fn single_part(id: u64, coords: Vec<(f64, f64)>) -> LineFeature {
        LineFeature::from_line_string(id, LineString::from(coords))
    }

    #[test]
    fn test_two_endpoints_per_single_part_feature() {
        let features: Vec<LineFeature> = (0..7)
            .map(|i| {
                let x = i as f64;
                single_part(i, vec![(x, 0.0), (x, 1.0), (x + 1.0, 2.0)])
            })
            .collect();
        let layer = MemoryLineLayer::from_features("routes", features);

        let extracted: Vec<Endpoint> = endpoints(&layer).collect();
        assert_eq!(extracted.len(), 14);
        assert_eq!(count_endpoints(&layer), 14);
    }

    #[test]
    fn test_endpoint_order() {
        let layer = MemoryLineLayer::from_features(
            "routes",
            vec![
                LineFeature::new(
                    10,
                    MultiLineString::new(vec![
                        line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)],
                        line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 6.0)],
                    ]),
                ),
                single_part(11, vec![(9.0, 9.0), (8.0, 8.0)]),
            ],
        );

        let extracted: Vec<(u64, usize, EndpointPosition, (f64, f64))> = endpoints(&layer)
            .map(|e| (e.feature_id, e.part_index, e.position, e.point.x_y()))
            .collect();

        assert_eq!(
            extracted,
            vec![
                (10, 0, EndpointPosition::Start, (0.0, 0.0)),
                (10, 0, EndpointPosition::End, (2.0, 0.0)),
                (10, 1, EndpointPosition::Start, (5.0, 5.0)),
                (10, 1, EndpointPosition::End, (6.0, 6.0)),
                (11, 0, EndpointPosition::Start, (9.0, 9.0)),
                (11, 0, EndpointPosition::End, (8.0, 8.0)),
            ]
        );
    }

    #[test]
    fn test_single_vertex_part_yields_twice() {
        let layer =
            MemoryLineLayer::from_features("routes", vec![single_part(1, vec![(3.0, 4.0)])]);

        let extracted: Vec<Endpoint> = endpoints(&layer).collect();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].point, extracted[1].point);
        assert_eq!(extracted[0].position, EndpointPosition::Start);
        assert_eq!(extracted[1].position, EndpointPosition::End);
    }

    #[test]
    fn test_empty_geometry_and_empty_parts_are_skipped() {
        let layer = MemoryLineLayer::from_features(
            "routes",
            vec![
                single_part(1, vec![(0.0, 0.0), (1.0, 1.0)]),
                LineFeature::new(2, MultiLineString::new(vec![])),
                LineFeature::new(
                    3,
                    MultiLineString::new(vec![
                        LineString::new(vec![]),
                        line_string![(x: 4.0, y: 4.0), (x: 5.0, y: 5.0)],
                        LineString::new(vec![]),
                    ]),
                ),
                single_part(4, vec![]),
            ],
        );

        let extracted: Vec<Endpoint> = endpoints(&layer).collect();
        assert_eq!(extracted.len(), 4);
        assert_eq!(count_endpoints(&layer), 4);
        assert!(extracted.iter().all(|e| e.feature_id == 1 || e.feature_id == 3));
        assert_eq!(extracted[2].part_index, 1);
    }

    #[test]
    fn test_empty_layer() {
        let layer = MemoryLineLayer::new("routes");
        assert_eq!(endpoints(&layer).count(), 0);
        assert_eq!(count_endpoints(&layer), 0);
    }

    #[test]
    fn test_iterator_is_lazy_and_exhausts() {
        let layer = MemoryLineLayer::from_features(
            "routes",
            vec![single_part(1, vec![(0.0, 0.0), (1.0, 1.0)])],
        );

        let mut iter = endpoints(&layer);
        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
