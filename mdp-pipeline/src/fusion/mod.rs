//! Fusion engine
//!
//! Joins the three normalised tables into one row per (vessel position,
//! port-call row) pair, each enriched with the nearest sea-state observation.
//!
//! 1. Identity join: vessel positions with port-call rows on the textual
//!    `mmsi`. Inner by default; left-outer keeps vessels without a call.
//! 2. Spatial join: nearest sea-state observation by Euclidean distance in
//!    raw degrees, from a k-d tree built once per pass.
//!
//! Raw-degree distance is only a fair proxy for true distance while the
//! bounding box spans a few degrees. The engine holds no state between
//! passes.

pub mod kd_tree;

pub use kd_tree::{KdTree, Neighbour};

use crate::error::{PipelineError, PipelineResult};
use crate::normalize::lenient::normalize_identity;
use crate::normalize::port_call::{PORT_CALL_COLUMNS, PORT_CALL_MMSI_COLUMN};
use crate::normalize::sea_state::{SEA_STATE_COLUMNS, SEA_STATE_FUSED_COLUMNS};
use crate::normalize::vessel::VESSEL_COLUMNS;
use crate::normalize::{PortCall, SeaStateObservation, VesselPosition};
use crate::tables::TabularRow;
use mdp_common::config::{FusionConfig, JoinKind};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Join behaviour for one fusion pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FusionOptions {
    pub join_kind: JoinKind,
    /// Drop rows whose nearest observation is farther than this (raw degrees)
    pub max_match_distance_deg: Option<f64>,
}

impl From<&FusionConfig> for FusionOptions {
    fn from(config: &FusionConfig) -> Self {
        Self {
            join_kind: config.join_kind,
            max_match_distance_deg: config.max_match_distance_deg,
        }
    }
}

/// One vessel position with its port call and nearest sea state
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRecord {
    pub vessel: VesselPosition,
    /// Always present for inner joins
    pub port_call: Option<PortCall>,
    pub sea_state: SeaStateObservation,
    /// Raw-degree distance between the vessel and `sea_state`
    pub match_distance_deg: f64,
}

/// Fused rows plus what the pass dropped
///
/// Every drop count is in vessel positions, however many port-call rows the
/// position would have joined with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionOutcome {
    pub rows: Vec<FusedRecord>,
    /// Vessel positions without a port call (inner join only)
    pub unmatched_vessels: usize,
    /// Vessel positions that have no coordinates
    pub missing_coordinates: usize,
    /// Vessel positions whose nearest observation is beyond `max_match_distance_deg`
    pub beyond_threshold: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    options: FusionOptions,
}

impl FusionEngine {
    pub fn new(options: FusionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FusionOptions {
        &self.options
    }

    /// Run one fusion pass over fully-read input tables
    ///
    /// Fails with [`PipelineError::EmptyReferenceSet`] when no sea-state
    /// observation has coordinates.
    pub fn fuse(
        &self,
        vessels: &[VesselPosition],
        port_calls: &[PortCall],
        sea_states: &[SeaStateObservation],
    ) -> PipelineResult<FusionOutcome> {
        let (reference, points): (Vec<&SeaStateObservation>, Vec<(f64, f64)>) = sea_states
            .iter()
            .filter_map(|obs| obs.lat_lon().map(|point| (obs, point)))
            .unzip();

        if reference.is_empty() {
            return Err(PipelineError::EmptyReferenceSet);
        }
        if reference.len() < sea_states.len() {
            warn!(
                excluded = sea_states.len() - reference.len(),
                "Sea-state observations without coordinates excluded from the index"
            );
        }

        let tree = KdTree::build(&points);
        let calls_by_mmsi = index_port_calls(port_calls);
        let mut outcome = FusionOutcome::default();

        for vessel in vessels {
            let matches: Vec<Option<&PortCall>> = match normalize_identity(&vessel.mmsi)
                .and_then(|key| calls_by_mmsi.get(&key))
            {
                Some(calls) => calls.iter().map(|call| Some(*call)).collect(),
                None => match self.options.join_kind {
                    JoinKind::Inner => {
                        outcome.unmatched_vessels += 1;
                        continue;
                    }
                    JoinKind::LeftOuter => vec![None],
                },
            };

            let Some(position) = vessel.lat_lon() else {
                outcome.missing_coordinates += 1;
                continue;
            };

            let nearest = tree.nearest(position).ok_or(PipelineError::EmptyReferenceSet)?;
            if let Some(limit) = self.options.max_match_distance_deg {
                if nearest.distance > limit {
                    outcome.beyond_threshold += 1;
                    continue;
                }
            }

            let sea_state = reference[nearest.index];
            for port_call in matches {
                outcome.rows.push(FusedRecord {
                    vessel: vessel.clone(),
                    port_call: port_call.cloned(),
                    sea_state: sea_state.clone(),
                    match_distance_deg: nearest.distance,
                });
            }
        }

        if outcome.missing_coordinates > 0 {
            warn!(
                missing_coordinates = outcome.missing_coordinates,
                "Vessel positions without coordinates could not be matched"
            );
        }

        info!(
            vessels = vessels.len(),
            port_calls = port_calls.len(),
            sea_states = reference.len(),
            rows = outcome.rows.len(),
            unmatched_vessels = outcome.unmatched_vessels,
            beyond_threshold = outcome.beyond_threshold,
            join_kind = ?self.options.join_kind,
            "Fusion pass computed"
        );

        Ok(outcome)
    }
}

/// Port-call rows grouped by normalised mmsi, in table order
fn index_port_calls(port_calls: &[PortCall]) -> HashMap<String, Vec<&PortCall>> {
    let mut index: HashMap<String, Vec<&PortCall>> = HashMap::new();
    for call in port_calls {
        if let Some(key) = call.mmsi.as_deref().and_then(normalize_identity) {
            index.entry(key).or_default().push(call);
        }
    }
    index
}

fn fused_columns() -> &'static [&'static str] {
    static COLUMNS: OnceLock<Vec<&'static str>> = OnceLock::new();
    COLUMNS.get_or_init(|| {
        let port_columns = PORT_CALL_COLUMNS
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != PORT_CALL_MMSI_COLUMN)
            .map(|(_, c)| *c);

        VESSEL_COLUMNS
            .iter()
            .copied()
            .chain(port_columns)
            .chain(SEA_STATE_COLUMNS[..SEA_STATE_FUSED_COLUMNS].iter().copied())
            .collect()
    })
}

impl TabularRow for FusedRecord {
    fn columns() -> &'static [&'static str] {
        fused_columns()
    }

    fn cells(&self) -> Vec<String> {
        let mut cells = self.vessel.cells();

        match &self.port_call {
            Some(call) => cells.extend(
                call.cells()
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i != PORT_CALL_MMSI_COLUMN)
                    .map(|(_, c)| c),
            ),
            None => cells.extend(std::iter::repeat(String::new()).take(PORT_CALL_COLUMNS.len() - 1)),
        }

        let mut sea = self.sea_state.cells();
        sea.truncate(SEA_STATE_FUSED_COLUMNS);
        cells.extend(sea);
        cells
    }
}
