//! Road Connectivity Library - Endpoint Connectivity Checks for Road Layers
//!
//! This library audits whether the endpoints of the line features in a "routes" layer
//! meet a reference road network (typically OSM-derived). Every endpoint is classified
//! by a bounding-box pre-filter against a quadtree envelope index followed by an exact
//! point-to-line distance check, and the results are collected into an in-memory point
//! layer for review.
//!
//! # Architecture
//!
//! - **[`MemoryLineLayer`]**: In-memory line layer implementing [`LineLayer`]
//! - **[`Quadtree`]**: Envelope index answering "features whose envelope intersects rect"
//! - **[`Endpoints`]**: Lazy extractor of first/last vertices per geometry part
//! - **[`classify`]**: The proximity predicate for a single point
//! - **[`ConnectivityChecker`]**: Runs a full pass with progress and cancellation
//! - **[`PointLayer`]**: The annotated output layer
//!
//! # Performance Characteristics
//!
//! - **Index Build**: O(R log R) for R reference features
//! - **Classification**: one envelope query plus O(k) exact distance checks per endpoint
//! - **Full Pass**: O(E log R + E×k) for E endpoints

mod checker;
mod classifier;
mod endpoints;
mod layer;
mod output;
mod quadtree;
pub mod utils;

// Public API exports
pub use checker::{
    CancellationToken, CheckReport, Config, ConnectivityChecker, DEFAULT_OUTPUT_LAYER_NAME,
    DEFAULT_TOLERANCE, NoProgress, ProgressSink,
};
pub use classifier::{ClassificationResult, ConnectionStatus, LabelStyle, classify};
pub use endpoints::{Endpoint, EndpointPosition, Endpoints, count_endpoints, endpoints};
pub use layer::{LineFeature, LineLayer, MemoryLineLayer};
pub use output::{FieldType, PointFeature, PointLayer, PointStyle};
pub use quadtree::Quadtree;

/// The two layers a connectivity check needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayer {
    /// The line layer whose endpoints are audited
    Routes,
    /// The road network the endpoints are checked against
    Reference,
}

impl std::fmt::Display for InputLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputLayer::Routes => f.write_str("routes"),
            InputLayer::Reference => f.write_str("reference"),
        }
    }
}

/// Error types for connectivity checks
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("Missing input: the {layer} layer must be selected")]
    MissingInput { layer: InputLayer },

    #[error("Invalid tolerance: {0} (must be finite and non-negative)")]
    InvalidTolerance(f64),

    #[error("Check cancelled, no points were added")]
    Cancelled,

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Spatial query failed for feature {feature_id}: {reason}")]
    Query { feature_id: u64, reason: String },

    #[error("Layer access failed: {0}")]
    Layer(String),
}

impl ConnectivityError {
    /// Whether this error is a user-triggered abort rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConnectivityError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ConnectivityError>;
