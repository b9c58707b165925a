use crate::entities;
use crate::errors::IndexError;
use crate::registry::ResourceRegistry;
use crate::settings::BackfillSettings;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Name under which backfill runs are recorded.
pub const RECREATE_JOB: &str = "recreate_resources";

/// Initialize and start the scheduler with the recurring backfill job
pub async fn init_scheduler(
    db: DatabaseConnection,
    registry: Arc<ResourceRegistry>,
    backfill: &BackfillSettings,
) -> Result<JobScheduler, IndexError> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| IndexError::Other(format!("Failed to create job scheduler: {}", e)))?;

    let batch_size = backfill.batch_size;
    let recreate_job = Job::new_async(backfill.schedule.as_str(), move |_uuid, _l| {
        let db = db.clone();
        let registry = registry.clone();
        Box::pin(async move {
            info!("Running {} job", RECREATE_JOB);
            if let Err(e) = run_recreate(&db, &registry, batch_size).await {
                error!("Failed to record {} job: {}", RECREATE_JOB, e);
            }
        })
    })
    .map_err(|e| IndexError::Other(format!("Failed to create recreate job: {}", e)))?;

    sched
        .add(recreate_job)
        .await
        .map_err(|e| IndexError::Other(format!("Failed to add recreate job: {}", e)))?;

    sched
        .start()
        .await
        .map_err(|e| IndexError::Other(format!("Failed to start job scheduler: {}", e)))?;

    info!(schedule = %backfill.schedule, "Job scheduler started");

    Ok(sched)
}

/// Recreate the whole index and record the run. The outcome of the
/// backfill itself is stored in the execution row; only failures to write
/// that row are returned.
async fn run_recreate(
    db: &DatabaseConnection,
    registry: &ResourceRegistry,
    batch_size: u64,
) -> Result<i64, IndexError> {
    let execution_id = start_job_execution(db, RECREATE_JOB).await?;

    match registry.recreate_all(batch_size).await {
        Ok(reports) => {
            let indexed: u64 = reports.iter().map(|r| r.indexed).sum();
            let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
            info!("Recreated {} resource entries ({} skipped)", indexed, skipped);
            let error_message =
                (skipped > 0).then(|| format!("{} entities skipped: parent not indexed", skipped));
            complete_job_execution(
                db,
                execution_id,
                true,
                error_message,
                Some(i64::try_from(indexed).unwrap_or(i64::MAX)),
            )
            .await?;
        }
        Err(e) => {
            error!("Failed to recreate resource index: {}", e);
            complete_job_execution(db, execution_id, false, Some(e.to_string()), None).await?;
        }
    }

    Ok(execution_id)
}

/// Record the start of a job execution
pub async fn start_job_execution(
    db: &DatabaseConnection,
    job_name: &str,
) -> Result<i64, IndexError> {
    use entities::job_execution;

    let now = Utc::now().timestamp();

    let execution = job_execution::ActiveModel {
        job_name: Set(job_name.to_string()),
        started_at: Set(now),
        completed_at: Set(None),
        success: Set(None),
        error_message: Set(None),
        records_processed: Set(None),
        ..Default::default()
    };

    let result = execution.insert(db).await?;
    Ok(result.id)
}

/// Record the completion of a job execution
pub async fn complete_job_execution(
    db: &DatabaseConnection,
    execution_id: i64,
    success: bool,
    error_message: Option<String>,
    records_processed: Option<i64>,
) -> Result<(), IndexError> {
    use entities::job_execution::{Column, Entity};

    let now = Utc::now().timestamp();

    if let Some(execution) = Entity::find()
        .filter(Column::Id.eq(execution_id))
        .one(db)
        .await?
    {
        let mut active: entities::job_execution::ActiveModel = execution.into_active_model();
        active.completed_at = Set(Some(now));
        active.success = Set(Some(if success { 1 } else { 0 }));
        active.error_message = Set(error_message);
        active.records_processed = Set(records_processed);
        active.update(db).await?;
    }

    Ok(())
}

/// Run a job by name outside its schedule; returns the execution id.
pub async fn trigger_job_manually(
    db: &DatabaseConnection,
    registry: &ResourceRegistry,
    job_name: &str,
    batch_size: u64,
) -> Result<i64, IndexError> {
    info!("Manually triggering job: {}", job_name);

    match job_name {
        RECREATE_JOB => run_recreate(db, registry, batch_size).await,
        _ => Err(IndexError::Other(format!("Unknown job name: {}", job_name))),
    }
}

/// Most recent executions first.
pub async fn recent_executions(
    db: &DatabaseConnection,
    job_name: &str,
) -> Result<Vec<entities::job_execution::Model>, IndexError> {
    use entities::job_execution::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::JobName.eq(job_name))
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}
