//! Line layers and features
//!
//! This module provides the [`LineLayer`] trait, which describes what a host must
//! supply for a connectivity check (feature iteration and an envelope query), and
//! [`MemoryLineLayer`], an in-memory implementation backed by the [`Quadtree`] index.

use crate::{Quadtree, Result, utils};
use geo::{LineString, MultiLineString, Rect};

/// A line feature: an identifier plus a possibly multi-part line geometry
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineFeature {
    /// Feature identifier assigned by the owning layer or host
    pub id: u64,
    /// Geometry parts; may be empty, and parts may have zero vertices
    pub geometry: MultiLineString<f64>,
}

impl LineFeature {
    /// Create a new feature from a multi-part geometry
    pub fn new(id: u64, geometry: MultiLineString<f64>) -> Self {
        Self { id, geometry }
    }

    /// Create a single-part feature
    pub fn from_line_string(id: u64, line_string: LineString<f64>) -> Self {
        Self::new(id, MultiLineString::new(vec![line_string]))
    }

    /// A geometry is empty when none of its parts has a vertex
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.geometry.0.iter().all(|part| part.0.is_empty())
    }

    /// Axis-aligned envelope, `None` for an empty geometry
    #[inline]
    pub fn envelope(&self) -> Option<Rect<f64>> {
        utils::geometry_envelope(&self.geometry)
    }
}

/// A read-only line layer as seen by the connectivity check
///
/// Layers are only read during a pass, so they must be shareable across threads.
pub trait LineLayer: Send + Sync {
    /// Display name of the layer
    fn name(&self) -> &str;

    /// Coordinate reference system identifier (e.g. `"EPSG:31983"`), if known
    fn crs(&self) -> Option<&str>;

    /// Number of features in the layer
    fn feature_count(&self) -> usize;

    /// Iterate over all features in layer order
    fn features(&self) -> Box<dyn Iterator<Item = &LineFeature> + '_>;

    /// Return every feature whose envelope intersects `window`
    ///
    /// May return features that do not actually come close to the window, but must
    /// never omit one whose envelope intersects it.
    fn query_envelope(&self, window: Rect<f64>) -> Result<Vec<&LineFeature>>;
}

/// In-memory line layer with an envelope index
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryLineLayer {
    /// Layer name
    name: String,
    /// CRS identifier carried through to the output layer
    crs: Option<String>,
    /// Features in insertion order
    features: Vec<LineFeature>,
    /// Envelope index over non-empty features (items are positions in `features`)
    index: Quadtree,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MemoryLineLayer {
    /// Create a new empty layer
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the CRS identifier
    pub fn with_crs(mut self, crs: &str) -> Self {
        self.crs = Some(crs.to_string());
        self
    }

    /// Build a layer from features, bulk-loading the envelope index
    pub fn from_features(name: &str, features: impl IntoIterator<Item = LineFeature>) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::from_features");

        let features: Vec<LineFeature> = features.into_iter().collect();
        let index = Quadtree::bulk_load(
            features
                .iter()
                .enumerate()
                .filter_map(|(i, feature)| feature.envelope().map(|envelope| (i, envelope))),
        );

        tracing::debug!(
            "Built layer '{}' with {} features ({} indexed, index depth {})",
            name,
            features.len(),
            index.len(),
            index.depth()
        );

        Self {
            name: name.to_string(),
            crs: None,
            features,
            index,
        }
    }

    /// Append a feature; empty geometries are kept but never returned by queries
    pub fn add_feature(&mut self, feature: LineFeature) {
        if let Some(envelope) = feature.envelope() {
            self.index.insert(self.features.len(), envelope);
        }
        self.features.push(feature);
    }

    /// Check if the layer has no features
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features with a non-empty geometry
    #[inline]
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }
}

impl LineLayer for MemoryLineLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self) -> Box<dyn Iterator<Item = &LineFeature> + '_> {
        Box::new(self.features.iter())
    }

    fn query_envelope(&self, window: Rect<f64>) -> Result<Vec<&LineFeature>> {
        Ok(self
            .index
            .query(window)
            .into_iter()
            .filter_map(|i| self.features.get(i))
            .collect())
    }
}
