//! ConnectivityChecker - Runs a full endpoint connectivity pass
//!
//! This module ties extraction and classification together, reports progress to a
//! host-supplied sink and honours cancellation between endpoints. A pass either
//! returns every classified endpoint or an error; partial results are never exposed.

use crate::{
    ClassificationResult, ConnectivityError, Endpoint, InputLayer, LabelStyle, LineLayer,
    PointLayer, Result, classify, count_endpoints, endpoints, utils,
};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Search radius used by the original review workflow, in layer units
pub const DEFAULT_TOLERANCE: f64 = 10.0;

/// Name given to the output point layer
pub const DEFAULT_OUTPUT_LAYER_NAME: &str = "conexoes_verificadas";

/// Endpoints classified between progress reports and cancellation checks in parallel mode
const PARALLEL_CHUNK_SIZE: usize = 256;

/// Configuration for a connectivity check
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Maximum distance, in the reference layer's planar units, at which an
    /// endpoint is considered to meet a reference feature.
    /// Default: 10.0
    pub tolerance: f64,
    /// Labels written into the output layer's `status` field
    pub label_style: LabelStyle,
    /// Classify endpoints on the rayon thread pool.
    /// Results and sequence ids are identical to the sequential pass.
    pub parallel: bool,
    /// Name of the output point layer
    pub output_layer_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            label_style: LabelStyle::default(),
            parallel: false,
            output_layer_name: DEFAULT_OUTPUT_LAYER_NAME.to_string(),
        }
    }
}

/// Receives progress updates during a pass
pub trait ProgressSink {
    /// Called once, before the first endpoint, with the number of endpoints to classify
    fn set_total(&mut self, total: usize);

    /// Called with the number of endpoints processed so far
    fn set_progress(&mut self, current: usize, total: usize);
}

/// Progress sink that ignores every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&mut self, _total: usize) {}

    fn set_progress(&mut self, _current: usize, _total: usize) {}
}

/// Shared flag a host sets to abort a running pass
///
/// Clones observe the same flag, so the host keeps one clone and hands another to the pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the pass stops before the next endpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Results of a completed pass
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CheckReport {
    /// Classified endpoints in production order
    pub results: Vec<ClassificationResult>,
    /// Number of endpoints with a reference feature within tolerance
    pub disconnected_count: usize,
    /// Number of endpoints with nothing within tolerance
    pub dead_end_count: usize,
}

impl CheckReport {
    fn from_results(results: Vec<ClassificationResult>) -> Self {
        let disconnected_count = results
            .iter()
            .filter(|result| result.status.is_disconnected())
            .count();
        let dead_end_count = results.len() - disconnected_count;
        Self {
            results,
            disconnected_count,
            dead_end_count,
        }
    }

    /// Total number of classified endpoints
    #[inline]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Check if no endpoint was classified
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Completion message for the host to display
    pub fn summary(&self) -> String {
        format!(
            "Verification finished!\nTotal points analysed: {}",
            self.total()
        )
    }
}

/// Runs connectivity passes with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct ConnectivityChecker {
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ConnectivityChecker {
    /// Create a new checker with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classify every endpoint of `routes` against `reference`
    ///
    /// Progress is reported before each endpoint and cancellation is checked at the
    /// same point. On cancellation or failure nothing accumulated so far is returned.
    pub fn run<R, F>(
        &self,
        routes: &R,
        reference: &F,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<CheckReport>
    where
        R: LineLayer + ?Sized,
        F: LineLayer + ?Sized,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("checker::run");

        let tolerance = self.config.tolerance;
        if !utils::is_valid_tolerance(tolerance) {
            return Err(ConnectivityError::InvalidTolerance(tolerance));
        }

        let total = count_endpoints(routes);
        tracing::info!(
            "Checking {} endpoints of '{}' against '{}' ({} features)",
            total,
            routes.name(),
            reference.name(),
            reference.feature_count()
        );
        tracing::debug!("Connectivity check configuration: {:?}", self.config);

        progress.set_total(total);

        let results = if self.config.parallel {
            self.classify_parallel(routes, reference, total, progress, cancel)?
        } else {
            self.classify_sequential(routes, reference, total, progress, cancel)?
        };
        progress.set_progress(results.len(), total);

        let report = CheckReport::from_results(results);
        tracing::info!(
            "Connectivity check finished: {} endpoints, {} disconnected, {} dead ends",
            report.total(),
            report.disconnected_count,
            report.dead_end_count
        );

        Ok(report)
    }

    /// Like [`run`](Self::run), for hosts whose layer selection may be incomplete
    ///
    /// Fails with [`ConnectivityError::MissingInput`] before any processing when a
    /// layer is absent.
    pub fn run_optional(
        &self,
        routes: Option<&dyn LineLayer>,
        reference: Option<&dyn LineLayer>,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<CheckReport> {
        let routes = routes.ok_or(ConnectivityError::MissingInput {
            layer: InputLayer::Routes,
        })?;
        let reference = reference.ok_or(ConnectivityError::MissingInput {
            layer: InputLayer::Reference,
        })?;

        self.run(routes, reference, progress, cancel)
    }

    /// Run a pass and materialize the output point layer
    ///
    /// The layer takes the reference layer's CRS.
    pub fn run_to_layer<R, F>(
        &self,
        routes: &R,
        reference: &F,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PointLayer>
    where
        R: LineLayer + ?Sized,
        F: LineLayer + ?Sized,
    {
        let report = self.run(routes, reference, progress, cancel)?;
        Ok(PointLayer::from_results(
            &report.results,
            reference.crs(),
            &self.config,
        ))
    }

    fn classify_sequential<R, F>(
        &self,
        routes: &R,
        reference: &F,
        total: usize,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<ClassificationResult>>
    where
        R: LineLayer + ?Sized,
        F: LineLayer + ?Sized,
    {
        let mut results = Vec::with_capacity(total);

        for (index, endpoint) in endpoints(routes).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Connectivity check cancelled after {} of {} endpoints",
                    index,
                    total
                );
                return Err(ConnectivityError::Cancelled);
            }
            progress.set_progress(index, total);

            results.push(self.classify_endpoint(index, &endpoint, reference)?);
        }

        Ok(results)
    }

    fn classify_parallel<R, F>(
        &self,
        routes: &R,
        reference: &F,
        total: usize,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<ClassificationResult>>
    where
        R: LineLayer + ?Sized,
        F: LineLayer + ?Sized,
    {
        let extracted: Vec<Endpoint> = endpoints(routes).collect();
        let mut results = Vec::with_capacity(extracted.len());

        for (chunk_index, chunk) in extracted.chunks(PARALLEL_CHUNK_SIZE).enumerate() {
            let offset = chunk_index * PARALLEL_CHUNK_SIZE;
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Connectivity check cancelled after {} of {} endpoints",
                    offset,
                    total
                );
                return Err(ConnectivityError::Cancelled);
            }
            progress.set_progress(offset, total);

            // Indexed collect keeps production order
            let classified: Result<Vec<ClassificationResult>> = chunk
                .par_iter()
                .enumerate()
                .map(|(i, endpoint)| {
                    if cancel.is_cancelled() {
                        return Err(ConnectivityError::Cancelled);
                    }
                    self.classify_endpoint(offset + i, endpoint, reference)
                })
                .collect();

            // A chunk that fails after cancellation reports the cancellation
            let classified = match classified {
                Ok(classified) => classified,
                Err(_) if cancel.is_cancelled() => {
                    tracing::warn!(
                        "Connectivity check cancelled during endpoints {}..{} of {}",
                        offset,
                        offset + chunk.len(),
                        total
                    );
                    return Err(ConnectivityError::Cancelled);
                }
                Err(err) => return Err(err),
            };
            results.extend(classified);
        }

        Ok(results)
    }

    #[inline]
    fn classify_endpoint<F: LineLayer + ?Sized>(
        &self,
        index: usize,
        endpoint: &Endpoint,
        reference: &F,
    ) -> Result<ClassificationResult> {
        let status = classify(endpoint.point, reference, self.config.tolerance)?;

        tracing::trace!(
            "Endpoint {} (feature {}, part {}, {:?}): {}",
            index,
            endpoint.feature_id,
            endpoint.part_index,
            endpoint.position,
            status
        );

        Ok(ClassificationResult {
            sequence_id: index as u64,
            status,
            location: endpoint.point,
        })
    }
}
