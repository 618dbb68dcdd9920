//! Utility functions for envelopes and planar distances

use geo::line_measures::Distance;
use geo::{BoundingRect, Coord, Euclidean, LineString, MultiLineString, Point, Rect};

/// Check that a tolerance is usable as a search radius
#[inline(always)]
pub fn is_valid_tolerance(tolerance: f64) -> bool {
    tolerance.is_finite() && tolerance >= 0.0
}

/// Build the square search window centred on `point` with half-width `tolerance`
///
/// Any geometry within `tolerance` of `point` has at least one coordinate inside
/// this window, so its envelope always intersects it.
#[inline(always)]
pub fn search_window(point: Point<f64>, tolerance: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: point.x() - tolerance,
            y: point.y() - tolerance,
        },
        Coord {
            x: point.x() + tolerance,
            y: point.y() + tolerance,
        },
    )
}

/// Check if two rectangles intersect (closed intervals, touching counts)
#[inline(always)]
pub fn rects_intersect(a: Rect<f64>, b: Rect<f64>) -> bool {
    let amin = a.min();
    let amax = a.max();
    let bmin = b.min();
    let bmax = b.max();
    !(amax.x < bmin.x || amin.x > bmax.x || amax.y < bmin.y || amin.y > bmax.y)
}

/// Check if `outer` fully contains `inner` (closed intervals)
#[inline(always)]
pub fn rect_contains(outer: Rect<f64>, inner: Rect<f64>) -> bool {
    let omin = outer.min();
    let omax = outer.max();
    let imin = inner.min();
    let imax = inner.max();
    imin.x >= omin.x && imax.x <= omax.x && imin.y >= omin.y && imax.y <= omax.y
}

/// Smallest rectangle covering both inputs
#[inline]
pub fn rect_union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Envelope of a multi-part line geometry, `None` when it has no vertices
#[inline]
pub fn geometry_envelope(geometry: &MultiLineString<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Minimum Euclidean distance from `point` to any part of `geometry`
///
/// Returns `None` for a geometry without vertices. A part with a single
/// vertex is measured as a point.
pub fn distance_to_geometry(point: Point<f64>, geometry: &MultiLineString<f64>) -> Option<f64> {
    geometry
        .0
        .iter()
        .filter_map(|part| distance_to_line_string(point, part))
        .min_by(f64::total_cmp)
}

/// Minimum Euclidean distance from `point` to a single polyline
pub fn distance_to_line_string(point: Point<f64>, line_string: &LineString<f64>) -> Option<f64> {
    match line_string.0.as_slice() {
        [] => None,
        [only] => Some(Euclidean.distance(&point, &Point::from(*only))),
        _ => line_string
            .lines()
            .map(|line| Euclidean.distance(&point, &line))
            .min_by(f64::total_cmp),
    }
}
