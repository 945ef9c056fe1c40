use crate::config::{ExecutionMode, PipelineConfig};
use crate::core::band_math::{compute_chlorophyll_proxy, summarize_field};
use crate::core::features::FeatureAssembler;
use crate::core::hotspots::{HotspotFinder, PairLabels};
use crate::io::granule_loader::{GranuleLoader, GranuleSource};
use crate::types::{
    FeatureTable, FieldSummary, Granule, GranuleFailure, HotspotRecord, OceanError, OceanResult, PairFailure,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;

/// Result of loading and enriching one granule
#[derive(Debug)]
pub enum GranuleOutcome {
    Ready(Granule),
    Failed(GranuleFailure),
}

/// The one granule of lookback a delta needs
#[derive(Debug)]
enum Lookback {
    NoPredecessor,
    HasPredecessor(Granule),
}

/// Summary statistics of one derived field of one granule
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleSummary {
    pub identifier: String,
    pub field: String,
    pub summary: FieldSummary,
}

/// Everything a pipeline run produces
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub features: FeatureTable,
    /// Ordered by pair, then delta field, then rank
    pub hotspots: Vec<HotspotRecord>,
    pub failed_granules: Vec<GranuleFailure>,
    pub failed_pairs: Vec<PairFailure>,
    pub summaries: Vec<GranuleSummary>,
    processed: usize,
}

impl PipelineOutput {
    /// Number of granules that made it into the feature table
    pub fn processed_count(&self) -> usize {
        self.processed
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_granules.is_empty() || !self.failed_pairs.is_empty()
    }
}

/// Fold state threaded through the granule sequence
struct RunState {
    output: PipelineOutput,
    lookback: Lookback,
    last_acquired: Option<DateTime<Utc>>,
}

/// Drives load -> band math -> feature table, and hotspots for every
/// adjacent pair of successfully processed granules.
///
/// A granule that fails to load is skipped and breaks the chain: no delta
/// is computed across the gap it leaves.
pub struct PipelineDriver {
    config: PipelineConfig,
    loader: GranuleLoader,
    assembler: FeatureAssembler,
    finder: HotspotFinder,
}

impl PipelineDriver {
    /// Create a driver; an invalid configuration is rejected here
    pub fn new(config: PipelineConfig) -> OceanResult<Self> {
        config.validate()?;

        let loader = GranuleLoader::new(config.required_source_fields())?;
        let assembler = FeatureAssembler::new(config.features.fields.clone());
        let finder = HotspotFinder::new(config.hotspots.clone());

        Ok(Self {
            config,
            loader,
            assembler,
            finder,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `identifiers` in order; input order is acquisition order.
    ///
    /// Recoverable failures are collected in the output. Only configuration
    /// errors abort the run.
    pub fn run<S, I>(&self, source: &S, identifiers: &[I]) -> OceanResult<PipelineOutput>
    where
        S: GranuleSource + Sync + ?Sized,
        I: AsRef<str> + Sync,
    {
        log::info!(
            "Starting pipeline over {} granules ({:?})",
            identifiers.len(),
            self.config.execution
        );

        let mut state = RunState {
            output: PipelineOutput {
                features: self.assembler.empty_table(),
                ..Default::default()
            },
            lookback: Lookback::NoPredecessor,
            last_acquired: None,
        };

        match self.config.execution {
            ExecutionMode::Sequential => {
                for (order, id) in identifiers.iter().enumerate() {
                    let outcome = self.prepare_granule(source, id.as_ref(), order)?;
                    self.advance(&mut state, outcome);
                }
            }
            ExecutionMode::Parallel { batch_size } => {
                for (batch_index, batch) in identifiers.chunks(batch_size).enumerate() {
                    let offset = batch_index * batch_size;
                    log::debug!("Preparing batch of {} granules at #{}", batch.len(), offset);

                    let outcomes: Vec<OceanResult<GranuleOutcome>> = batch
                        .par_iter()
                        .enumerate()
                        .map(|(i, id)| self.prepare_granule(source, id.as_ref(), offset + i))
                        .collect();

                    for outcome in outcomes {
                        self.advance(&mut state, outcome?);
                    }
                }
            }
        }

        let output = state.output;
        log::info!(
            "Pipeline finished: {} granules processed, {} failed, {} feature rows, {} hotspots, {} failed pairs",
            output.processed,
            output.failed_granules.len(),
            output.features.len(),
            output.hotspots.len(),
            output.failed_pairs.len()
        );
        Ok(output)
    }

    /// Load and enrich one granule.
    ///
    /// Returns `Err` only for errors that must stop the run.
    pub fn prepare_granule<S>(&self, source: &S, identifier: &str, order: usize) -> OceanResult<GranuleOutcome>
    where
        S: GranuleSource + ?Sized,
    {
        let enriched = self
            .loader
            .load(source, identifier, order)
            .and_then(|granule| self.enrich(granule));

        match enriched {
            Ok(granule) => Ok(GranuleOutcome::Ready(granule)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::warn!("Skipping granule {}: {}", identifier, e);
                Ok(GranuleOutcome::Failed(GranuleFailure {
                    identifier: identifier.to_string(),
                    acquisition_order: order,
                    reason: e.to_string(),
                }))
            }
        }
    }

    /// Attach the chlorophyll proxy to a loaded granule.
    ///
    /// A source field already stored under the proxy name is never replaced.
    pub fn enrich(&self, granule: Granule) -> OceanResult<Granule> {
        let params = &self.config.band_math;
        if granule.derived_scalars.contains_key(&params.proxy_field) {
            return Err(OceanError::Configuration(format!(
                "Proxy field '{}' collides with a field supplied by granule {}",
                params.proxy_field, granule.identifier
            )));
        }
        let proxy = compute_chlorophyll_proxy(&granule.band_cube, &granule.wavelengths, params)?;
        granule.with_scalar(&params.proxy_field, proxy)
    }

    /// One step of the fold over prepared granules
    fn advance(&self, state: &mut RunState, outcome: GranuleOutcome) {
        let granule = match outcome {
            GranuleOutcome::Ready(granule) => granule,
            GranuleOutcome::Failed(failure) => {
                state.output.failed_granules.push(failure);
                state.lookback = Lookback::NoPredecessor;
                return;
            }
        };

        if let Some(acquired) = granule.acquired_at {
            if let Some(last) = state.last_acquired {
                if acquired <= last {
                    log::warn!(
                        "Granule {} acquired at {} does not follow previous acquisition at {}",
                        granule.identifier,
                        acquired,
                        last
                    );
                }
            }
            state.last_acquired = Some(acquired);
        }

        let appended = self
            .assembler
            .flatten(&granule)
            .and_then(|rows| state.output.features.append(rows));
        if let Err(e) = appended {
            log::warn!("Skipping granule {}: {}", granule.identifier, e);
            state.output.failed_granules.push(GranuleFailure {
                identifier: granule.identifier.clone(),
                acquisition_order: granule.acquisition_order,
                reason: e.to_string(),
            });
            state.lookback = Lookback::NoPredecessor;
            return;
        }
        state.output.processed += 1;

        for (name, field) in &granule.derived_scalars {
            let summary = summarize_field(field);
            log::info!(
                "{} {}: mean={:.3}, min={:.3}, max={:.3} ({} of {} cells finite)",
                granule.identifier,
                name,
                summary.mean,
                summary.min,
                summary.max,
                summary.finite_count,
                summary.total_count
            );
            state.output.summaries.push(GranuleSummary {
                identifier: granule.identifier.clone(),
                field: name.clone(),
                summary,
            });
        }

        if let Lookback::HasPredecessor(previous) = &state.lookback {
            self.collect_hotspots(previous, &granule, &mut state.output);
        }

        state.lookback = Lookback::HasPredecessor(granule);
    }

    /// Rank every configured delta field for one granule pair
    fn collect_hotspots(&self, previous: &Granule, current: &Granule, output: &mut PipelineOutput) {
        for field in &self.config.hotspots.delta_fields {
            let labels = PairLabels {
                field: field.as_str(),
                from_granule: &previous.identifier,
                to_granule: &current.identifier,
            };

            let result = previous.scalar(field).and_then(|prev_field| {
                let cur_field = current.scalar(field)?;
                self.finder.find(
                    prev_field,
                    cur_field,
                    &previous.coordinates,
                    &current.coordinates,
                    labels,
                )
            });

            match result {
                Ok(records) => {
                    log::info!(
                        "{} -> {} [{}]: {} hotspots",
                        previous.identifier,
                        current.identifier,
                        field,
                        records.len()
                    );
                    output.hotspots.extend(records);
                }
                Err(e) => {
                    log::warn!(
                        "No hotspots for {} -> {} [{}]: {}",
                        previous.identifier,
                        current.identifier,
                        field,
                        e
                    );
                    output.failed_pairs.push(PairFailure {
                        from_granule: previous.identifier.clone(),
                        to_granule: current.identifier.clone(),
                        field: field.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
