//! Pipeline entry points
//!
//! [`Pipeline`] is built once per process run from configuration and owns
//! the fetch client, the record store and the output locations. The
//! scheduler and the one-shot CLI modes both drive it through `extract`,
//! `transform`, `fuse` and `run_pass`.

use crate::error::{PipelineError, PipelineResult};
use crate::fusion::{FusionEngine, FusionOptions, FusionOutcome};
use crate::normalize::{
    normalize_table, split_records, Normalized, PortCall, PortCallNormalizer,
    SeaStateNormalizer, SeaStateObservation, VesselNormalizer, VesselPosition,
};
use crate::services::{retain_in_box, FetchClient, RecordStore};
use crate::sink::FusedSink;
use crate::sources::SourceKind;
use crate::tables::{write_table, OutputPaths};
use chrono::{DateTime, SecondsFormat, Utc};
use mdp_common::config::{BoundingBox, EndpointConfig, TomlConfig};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Counts for one fetch tick of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub source: SourceKind,
    /// When the payload arrived
    pub fetch_time: DateTime<Utc>,
    /// Records found in the fetched payload
    pub fetched: usize,
    /// Records new to the durable table
    pub added: usize,
    /// Records already stored
    pub duplicates: usize,
    /// Out-of-box, unpositioned or malformed records
    pub skipped: usize,
}

/// The three normalised tables of one transform run
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTables {
    pub vessels: Normalized<VesselPosition>,
    pub sea_states: Normalized<SeaStateObservation>,
    pub port_calls: Normalized<PortCall>,
}

/// Summary of one transform + fusion pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionReport {
    pub rows: usize,
    pub unmatched_vessels: usize,
    pub missing_coordinates: usize,
    pub beyond_threshold: usize,
    /// Rows accepted by the sink, when one is attached and succeeded
    pub sink_rows: Option<usize>,
}

pub struct Pipeline {
    client: FetchClient,
    store: RecordStore,
    outputs: OutputPaths,
    endpoints: EndpointConfig,
    bounding_box: BoundingBox,
    timeout: Duration,
    engine: FusionEngine,
    sink: Option<Arc<dyn FusedSink>>,
}

impl Pipeline {
    /// Durable raw tables live directly in `data_dir`; tabular outputs under
    /// `data_dir/transformed`
    pub fn new(config: &TomlConfig, data_dir: &Path) -> PipelineResult<Self> {
        Ok(Self {
            client: FetchClient::new(&config.http)?,
            store: RecordStore::new(data_dir),
            outputs: OutputPaths::new(data_dir),
            endpoints: config.endpoints.clone(),
            bounding_box: config.bounding_box,
            timeout: config.http.timeout(),
            engine: FusionEngine::new(FusionOptions::from(&config.fusion)),
            sink: None,
        })
    }

    /// Hand every successful fusion pass to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn FusedSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn outputs(&self) -> &OutputPaths {
        &self.outputs
    }

    /// One fetch → filter → store tick for `source`
    ///
    /// Failures are logged here with the source and error kind; the durable
    /// table is untouched unless the tick gets as far as the append.
    pub async fn extract_source(&self, source: SourceKind) -> PipelineResult<TickReport> {
        let start = Instant::now();
        let result = self.run_tick(source).await;

        match &result {
            Ok(report) => info!(
                source = %source,
                fetch_time = %report.fetch_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                fetched = report.fetched,
                added = report.added,
                duplicates = report.duplicates,
                skipped = report.skipped,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Source tick complete"
            ),
            Err(e) => warn!(
                source = %source,
                error_kind = e.kind(),
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Source tick failed"
            ),
        }

        result
    }

    async fn run_tick(&self, source: SourceKind) -> PipelineResult<TickReport> {
        let envelope = self
            .client
            .fetch(source, source.url(&self.endpoints), self.timeout)
            .await?;

        let split = split_records(&envelope.payload, source.collection_key());
        let mut skipped = split.rejected;
        let mut records: Vec<Value> = split.records.into_iter().cloned().collect();
        let fetched = records.len();

        if fetched == 0 && skipped > 0 {
            return Err(crate::error::SchemaShapeError::BadField {
                field: source.collection_key(),
                reason: "payload holds no records".to_string(),
            }
            .into());
        }

        if source.is_geo_filtered() {
            let (kept, dropped) = retain_in_box(records, &self.bounding_box);
            records = kept;
            skipped += dropped;
        }

        let store = self.store.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            store.append(source, records, |record| source.identity(record))
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        Ok(TickReport {
            source,
            fetch_time: envelope.fetch_time,
            fetched,
            added: outcome.added,
            duplicates: outcome.duplicates,
            skipped,
        })
    }

    /// One tick for every source, one after another
    pub async fn extract(&self) -> Vec<PipelineResult<TickReport>> {
        let mut results = Vec::with_capacity(SourceKind::ALL.len());
        for source in SourceKind::ALL {
            results.push(self.extract_source(source).await);
        }
        results
    }

    /// Load every durable table once and normalise it, writing nothing
    pub fn normalize(&self) -> NormalizedTables {
        NormalizedTables {
            vessels: normalize_table(&VesselNormalizer, &self.store.load(SourceKind::Positions)),
            sea_states: normalize_table(&SeaStateNormalizer, &self.store.load(SourceKind::SeaState)),
            port_calls: normalize_table(&PortCallNormalizer, &self.store.load(SourceKind::PortCalls)),
        }
    }

    /// Normalise every durable table and write the three normalised CSVs
    pub fn transform(&self) -> PipelineResult<NormalizedTables> {
        let tables = self.normalize();
        self.write_normalized(&tables)?;
        Ok(tables)
    }

    fn write_normalized(&self, tables: &NormalizedTables) -> PipelineResult<()> {
        write_table(&self.outputs.vessels(), &tables.vessels.rows)?;
        write_table(&self.outputs.sea_states(), &tables.sea_states.rows)?;
        write_table(&self.outputs.port_calls(), &tables.port_calls.rows)?;

        info!(
            vessels = tables.vessels.rows.len(),
            sea_states = tables.sea_states.rows.len(),
            port_calls = tables.port_calls.rows.len(),
            skipped = tables.vessels.skipped + tables.sea_states.skipped + tables.port_calls.skipped,
            path = %self.outputs.root().display(),
            "Normalised tables written"
        );
        Ok(())
    }

    fn join(&self, tables: &NormalizedTables) -> PipelineResult<FusionOutcome> {
        self.engine
            .fuse(
                &tables.vessels.rows,
                &tables.port_calls.rows,
                &tables.sea_states.rows,
            )
            .map_err(|e| {
                warn!(
                    error_kind = e.kind(),
                    error = %e,
                    "Fusion pass aborted, previous output tables left unchanged"
                );
                e
            })
    }

    /// Fuse the normalised tables and write `fused_data.csv`
    ///
    /// A failed pass writes nothing, so the previous fused table stays valid.
    pub fn fuse(&self, tables: &NormalizedTables) -> PipelineResult<FusionOutcome> {
        let outcome = self.join(tables)?;
        write_table(&self.outputs.fused(), &outcome.rows)?;
        Ok(outcome)
    }

    /// Normalise and fuse in memory; write all four tables only once fusion succeeded
    fn fusion_pass(&self) -> PipelineResult<FusionOutcome> {
        let tables = self.normalize();
        let outcome = self.join(&tables)?;
        self.write_normalized(&tables)?;
        write_table(&self.outputs.fused(), &outcome.rows)?;
        Ok(outcome)
    }

    /// One fusion pass off the async runtime, then the optional sink
    ///
    /// A failed pass leaves every output table as it was. Sink failures are
    /// logged and do not fail the pass.
    pub async fn run_pass(self: &Arc<Self>) -> PipelineResult<FusionReport> {
        let start = Instant::now();
        let pipeline = Arc::clone(self);
        let outcome = tokio::task::spawn_blocking(move || pipeline.fusion_pass())
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let mut report = FusionReport {
            rows: outcome.rows.len(),
            unmatched_vessels: outcome.unmatched_vessels,
            missing_coordinates: outcome.missing_coordinates,
            beyond_threshold: outcome.beyond_threshold,
            sink_rows: None,
        };

        if let Some(sink) = &self.sink {
            match sink.write(&outcome.rows).await {
                Ok(accepted) => report.sink_rows = Some(accepted),
                Err(e) => warn!(
                    sink = sink.name(),
                    error_kind = e.kind(),
                    error = %e,
                    "Sink rejected fused rows; fused table is still valid"
                ),
            }
        }

        info!(
            rows = report.rows,
            unmatched_vessels = report.unmatched_vessels,
            missing_coordinates = report.missing_coordinates,
            beyond_threshold = report.beyond_threshold,
            sink_rows = ?report.sink_rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fusion pass complete"
        );

        Ok(report)
    }
}
