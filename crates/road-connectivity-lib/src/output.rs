//! Output point layer built from classification results

use crate::{ClassificationResult, Config, ConnectionStatus};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attribute type of an output field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    Integer,
    Text,
}

/// One annotated endpoint in the output layer
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointFeature {
    /// `id` attribute: the result's sequence id
    pub id: u64,
    /// `status` attribute: the status label
    pub status: String,
    pub geometry: Point<f64>,
}

/// Marker style hint for hosts that render the layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointStyle {
    /// RGB marker colour
    pub color: [u8; 3],
}

impl Default for PointStyle {
    fn default() -> Self {
        Self { color: [255, 0, 0] }
    }
}

/// In-memory point layer with `id` and `status` attributes
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointLayer {
    name: String,
    /// CRS identifier copied from the reference layer
    crs: Option<String>,
    fields: Vec<(String, FieldType)>,
    features: Vec<PointFeature>,
    style: PointStyle,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PointLayer {
    /// Materialize results into a point layer, preserving their order
    pub fn from_results(
        results: &[ClassificationResult],
        crs: Option<&str>,
        config: &Config,
    ) -> Self {
        let features = results
            .iter()
            .map(|result| PointFeature {
                id: result.sequence_id,
                status: result.status.label_for(config.label_style).to_string(),
                geometry: result.location,
            })
            .collect();

        Self {
            name: config.output_layer_name.clone(),
            crs: crs.map(str::to_string),
            fields: vec![
                ("id".to_string(), FieldType::Integer),
                ("status".to_string(), FieldType::Text),
            ],
            features,
            style: PointStyle::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Attribute schema, in column order
    #[inline]
    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    #[inline]
    pub fn features(&self) -> &[PointFeature] {
        &self.features
    }

    #[inline]
    pub fn style(&self) -> PointStyle {
        self.style
    }

    /// Override the marker style
    pub fn with_style(mut self, style: PointStyle) -> Self {
        self.style = style;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features whose `status` carries the label of `status` in either style
    pub fn features_with_status(
        &self,
        status: ConnectionStatus,
    ) -> impl Iterator<Item = &PointFeature> + '_ {
        self.features.iter().filter(move |feature| {
            feature.status == status.label() || feature.status == status.source_label()
        })
    }
}
