//! Per-source polling scheduler
//!
//! One tokio task per enabled source plus one fusion task, each on its own
//! interval. A task awaits its tick body before polling its timer again, so
//! a source never overlaps itself while different sources run concurrently.
//! Cancellation is observed between ticks only: an in-flight tick always
//! completes, which keeps every store write whole.

use crate::pipeline::Pipeline;
use crate::sources::SourceKind;
use mdp_common::config::ScheduleConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which stages run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPlan {
    /// Fetch ticks for every source
    pub extract: bool,
    /// Transform + fusion passes
    pub transform: bool,
}

impl Default for SchedulerPlan {
    fn default() -> Self {
        Self {
            extract: true,
            transform: true,
        }
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    schedule: ScheduleConfig,
    plan: SchedulerPlan,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, schedule: ScheduleConfig, plan: SchedulerPlan) -> Self {
        Self {
            pipeline,
            schedule,
            plan,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the scheduler once cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the plan once: extract every source, then one transform + fusion pass
    pub async fn run_once(pipeline: &Arc<Pipeline>, plan: SchedulerPlan) {
        if plan.extract {
            pipeline.extract().await;
        }
        if plan.transform {
            // Failures are logged by the pass itself
            let _ = pipeline.run_pass().await;
        }
    }

    /// Initial pass, then every enabled timer until cancelled
    pub async fn run(self) {
        info!(
            positions_ms = self.schedule.positions_interval_ms,
            sea_state_ms = self.schedule.sea_state_interval_ms,
            port_calls_ms = self.schedule.port_calls_interval_ms,
            fusion_ms = self.schedule.fusion_interval_ms,
            extract = self.plan.extract,
            transform = self.plan.transform,
            "Scheduler starting"
        );

        Self::run_once(&self.pipeline, self.plan).await;

        let mut tasks = JoinSet::new();

        if self.plan.extract {
            for source in SourceKind::ALL {
                let pipeline = Arc::clone(&self.pipeline);
                tasks.spawn(every(
                    source.interval(&self.schedule),
                    self.cancel.clone(),
                    move || {
                        let pipeline = Arc::clone(&pipeline);
                        async move {
                            // Failures are logged by the tick itself
                            let _ = pipeline.extract_source(source).await;
                        }
                    },
                ));
            }
        }

        if self.plan.transform {
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(every(
                self.schedule.fusion_interval(),
                self.cancel.clone(),
                move || {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        let _ = pipeline.run_pass().await;
                    }
                },
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error_kind = "task", error = %e, "Scheduler task ended abnormally");
            }
        }

        info!("Scheduler stopped");
    }
}

/// Run `tick` every `period`, first after one period, until `cancel` fires
async fn every<F, Fut>(period: Duration, cancel: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => tick().await,
        }
    }
}
