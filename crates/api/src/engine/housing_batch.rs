//! Housing campaign batch processing.
//!
//! Entry is guarded by the conditional Closed → Processing transition, so
//! a second `process` call on the same campaign gets a 409. The plan is
//! computed once, then committed in chunks; each chunk is one transaction
//! that also bumps the campaign's progress counters. On failure the
//! campaign goes back to Closed with `last_error` set. Assignments already
//! committed stay, and a retry only sees the applications still pending.
//!
//! Runs are spawned on a [`BatchTasks`] tracker. At shutdown each run stops
//! after the chunk it is committing and rolls back to Closed; runs cut off
//! harder than that (crash, grace period exceeded) are reset by
//! [`recover_interrupted`] at the next startup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crou_core::error::CoreError;
use crou_core::event_types::{
    ENTITY_CAMPAIGN, EVT_CAMPAIGN_COMPLETED, EVT_CAMPAIGN_FAILED, EVT_CAMPAIGN_PROCESSING,
};
use crou_core::housing::{
    plan_assignments, BedStatus, CampaignStatus, REASON_BED_UNAVAILABLE,
};
use crou_core::types::DbId;
use crou_db::models::housing::{HousingApplication, HousingCampaign};
use crou_db::repositories::{ApplicationRepo, CampaignRepo, OccupancyRepo, RoomRepo};
use crou_db::DbPool;
use crou_events::{EventBus, PlatformEvent};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// `last_error` of a campaign whose run did not survive a server stop.
pub const INTERRUPTED_ERROR: &str = "Processing interrupted by server shutdown; run it again";

/// Batch runs in flight, shared through the application state.
#[derive(Clone, Default)]
pub struct BatchTasks {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl BatchTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of runs still going.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Ask every run to stop after its current chunk and wait up to
    /// `grace` for them. Returns `false` if some were still running.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        self.cancel.cancel();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}

/// Reset campaigns left in Processing by a previous process. Call once at
/// startup, before any request can start a new run.
pub async fn recover_interrupted(pool: &DbPool) -> Result<usize, sqlx::Error> {
    let reset = CampaignRepo::reset_processing(pool, INTERRUPTED_ERROR).await?;
    for campaign in &reset {
        tracing::warn!(
            campaign_id = campaign.id,
            processed = campaign.processed_count,
            total = campaign.total_to_process,
            "Interrupted housing batch reset to closed"
        );
    }
    Ok(reset.len())
}

/// One planned outcome, in processing order.
#[derive(Debug, Clone)]
enum Decision {
    Assign { application_id: DbId, bed_id: DbId },
    Unassign { application_id: DbId, reason: &'static str },
}

/// Counters of one committed chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub assigned: i32,
    pub unassigned: i32,
}

/// Totals of a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub assigned: i32,
    pub unassigned: i32,
}

/// Runs bed assignment for one campaign.
pub struct HousingBatch {
    pool: DbPool,
    event_bus: Arc<EventBus>,
    chunk_size: usize,
    tasks: BatchTasks,
}

impl HousingBatch {
    pub fn new(pool: DbPool, event_bus: Arc<EventBus>, chunk_size: usize, tasks: BatchTasks) -> Self {
        Self {
            pool,
            event_bus,
            chunk_size: chunk_size.max(1),
            tasks,
        }
    }

    /// Move the campaign to Processing and spawn the worker task.
    ///
    /// Returns the campaign as it is right after the transition. Fails with
    /// a conflict when the campaign is not (or no longer) Closed.
    pub async fn start(self, campaign: &HousingCampaign, actor: DbId) -> Result<HousingCampaign, BatchError> {
        let pending = ApplicationRepo::pending(&self.pool, campaign.id).await?;
        let total = i32::try_from(pending.len()).unwrap_or(i32::MAX);

        let started = CampaignRepo::transition(
            &self.pool,
            campaign.id,
            CampaignStatus::Closed,
            CampaignStatus::Processing,
            Some(total),
            None,
        )
        .await?
        .ok_or_else(|| {
            CoreError::Conflict("Campaign is not closed or is already being processed".into())
        })?;

        tracing::info!(
            campaign_id = campaign.id,
            total,
            chunk_size = self.chunk_size,
            actor,
            "Housing batch started"
        );
        self.publish(EVT_CAMPAIGN_PROCESSING, &started, actor, serde_json::json!({ "total": total }));

        let campaign = started.clone();
        let tasks = self.tasks.clone();
        tasks.spawn(async move {
            self.run(campaign, actor).await;
        });

        Ok(started)
    }

    /// Process the campaign to completion and record the final status.
    pub async fn run(&self, campaign: HousingCampaign, actor: DbId) {
        match self.process(&campaign).await {
            Ok(summary) => {
                match CampaignRepo::transition(
                    &self.pool,
                    campaign.id,
                    CampaignStatus::Processing,
                    CampaignStatus::Completed,
                    None,
                    None,
                )
                .await
                {
                    Ok(Some(done)) => {
                        tracing::info!(
                            campaign_id = campaign.id,
                            assigned = summary.assigned,
                            unassigned = summary.unassigned,
                            "Housing batch completed"
                        );
                        self.publish(
                            EVT_CAMPAIGN_COMPLETED,
                            &done,
                            actor,
                            serde_json::json!({
                                "assigned": summary.assigned,
                                "unassigned": summary.unassigned,
                            }),
                        );
                    }
                    Ok(None) => {
                        tracing::warn!(campaign_id = campaign.id, "Campaign left processing before completion");
                    }
                    Err(e) => {
                        tracing::error!(campaign_id = campaign.id, error = %e, "Failed to mark campaign completed");
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(campaign_id = campaign.id, error = %message, "Housing batch failed");
                match CampaignRepo::transition(
                    &self.pool,
                    campaign.id,
                    CampaignStatus::Processing,
                    CampaignStatus::Closed,
                    None,
                    Some(&message),
                )
                .await
                {
                    Ok(Some(rolled_back)) => {
                        self.publish(
                            EVT_CAMPAIGN_FAILED,
                            &rolled_back,
                            actor,
                            serde_json::json!({ "error": message }),
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(campaign_id = campaign.id, error = %e, "Failed to roll campaign back to closed");
                    }
                }
            }
        }
    }

    /// Plan all pending applications, then commit the plan chunk by chunk.
    pub async fn process(&self, campaign: &HousingCampaign) -> Result<BatchSummary, BatchError> {
        let pending = ApplicationRepo::pending(&self.pool, campaign.id).await?;
        let candidates = pending
            .iter()
            .map(HousingApplication::to_candidate)
            .collect::<Result<Vec<_>, _>>()?;
        let beds = RoomRepo::free_beds(&self.pool, campaign.tenant_id)
            .await?
            .into_iter()
            .map(|b| b.into_candidate())
            .collect::<Result<Vec<_>, _>>()?;

        let plan = plan_assignments(&candidates, &beds);
        let decisions: Vec<Decision> = plan
            .assignments
            .iter()
            .map(|a| Decision::Assign {
                application_id: a.application_id,
                bed_id: a.bed_id,
            })
            .chain(plan.unassigned.iter().map(|u| Decision::Unassign {
                application_id: u.application_id,
                reason: u.reason,
            }))
            .collect();

        let by_id: HashMap<DbId, &HousingApplication> = pending.iter().map(|a| (a.id, a)).collect();

        let mut summary = BatchSummary::default();
        let chunks = decisions.chunks(self.chunk_size).count();
        for (index, chunk) in decisions.chunks(self.chunk_size).enumerate() {
            if index > 0 && self.tasks.is_cancelled() {
                tracing::info!(
                    campaign_id = campaign.id,
                    committed = index,
                    chunks,
                    "Housing batch stopping for shutdown"
                );
                return Err(BatchError::Interrupted);
            }
            let outcome = self.commit_chunk(campaign.id, chunk, &by_id).await?;
            summary.assigned += outcome.assigned;
            summary.unassigned += outcome.unassigned;
            tracing::debug!(
                campaign_id = campaign.id,
                chunk = index,
                assigned = outcome.assigned,
                unassigned = outcome.unassigned,
                "Housing batch chunk committed"
            );
        }
        Ok(summary)
    }

    async fn commit_chunk(
        &self,
        campaign_id: DbId,
        chunk: &[Decision],
        applications: &HashMap<DbId, &HousingApplication>,
    ) -> Result<ChunkOutcome, BatchError> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = ChunkOutcome::default();

        for decision in chunk {
            match *decision {
                Decision::Assign { application_id, bed_id } => {
                    let Some(application) = applications.get(&application_id) else {
                        continue;
                    };
                    let claimed = RoomRepo::set_bed_status(
                        &mut *tx,
                        bed_id,
                        BedStatus::Available,
                        BedStatus::Occupied,
                    )
                    .await?;
                    if claimed.is_none() {
                        // Bed taken or put in maintenance since planning.
                        if ApplicationRepo::mark_unassigned(&mut tx, application_id, REASON_BED_UNAVAILABLE).await? {
                            outcome.unassigned += 1;
                        }
                        continue;
                    }
                    if !ApplicationRepo::mark_assigned(&mut tx, application_id, bed_id).await? {
                        RoomRepo::set_bed_status(&mut *tx, bed_id, BedStatus::Occupied, BedStatus::Available)
                            .await?;
                        tracing::debug!(application_id, "Application no longer pending, skipped");
                        continue;
                    }
                    OccupancyRepo::create(
                        &mut tx,
                        bed_id,
                        Some(application_id),
                        &application.student_ref,
                        &application.student_name,
                    )
                    .await?;
                    outcome.assigned += 1;
                }
                Decision::Unassign { application_id, reason } => {
                    if ApplicationRepo::mark_unassigned(&mut tx, application_id, reason).await? {
                        outcome.unassigned += 1;
                    }
                }
            }
        }

        CampaignRepo::add_progress(&mut tx, campaign_id, outcome.assigned, outcome.unassigned).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Publish a campaign event; the campaign name is added to `payload`.
    fn publish(&self, event_type: &str, campaign: &HousingCampaign, actor: DbId, mut payload: serde_json::Value) {
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("name".into(), serde_json::Value::String(campaign.name.clone()));
        }
        self.event_bus.publish(
            PlatformEvent::new(event_type)
                .with_source(ENTITY_CAMPAIGN, campaign.id)
                .with_actor(actor)
                .with_tenant(campaign.tenant_id)
                .with_payload(payload),
        );
    }
}

/// Failure of a batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{}", INTERRUPTED_ERROR)]
    Interrupted,
}

impl From<BatchError> for crate::error::AppError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Core(e) => Self::Core(e),
            BatchError::Database(e) => Self::Database(e),
            BatchError::Interrupted => Self::InternalError(INTERRUPTED_ERROR.into()),
        }
    }
}
