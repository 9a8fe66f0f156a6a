use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::household::{self, DeleteCheck};
use crate::id::new_uuid_v7;
use crate::survey::SurveySchedules;
use crate::time::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plot {
    pub id: String,
    pub plot_identifier: String,
    pub household_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct PlotInput<'a> {
    pub plot_identifier: &'a str,
    pub household_count: i64,
}

#[derive(Error, Debug)]
pub enum PlotSaveError {
    #[error("household_count must be >= 0, got {0}")]
    NegativeCount(i64),
    #[error("cannot reduce households to {requested}: enumeration log history exists, actual count stays {actual}")]
    ReductionBlocked { requested: i64, actual: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Upsert the plot and reconcile its household rows to `household_count`
/// in one transaction. Either the full set of creations/deletions lands,
/// or nothing changes and the stored count keeps its prior value.
pub async fn save_plot(
    pool: &SqlitePool,
    schedules: &SurveySchedules,
    input: PlotInput<'_>,
) -> Result<Plot, PlotSaveError> {
    if input.household_count < 0 {
        return Err(PlotSaveError::NegativeCount(input.household_count));
    }

    let now = now_ms();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO plot (id, plot_identifier, household_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(plot_identifier) DO UPDATE SET
           household_count = excluded.household_count,
           updated_at = excluded.updated_at",
    )
    .bind(new_uuid_v7())
    .bind(input.plot_identifier)
    .bind(input.household_count)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    let plot_id: String = sqlx::query_scalar("SELECT id FROM plot WHERE plot_identifier = ?1")
        .bind(input.plot_identifier)
        .fetch_one(tx.as_mut())
        .await?;

    let existing: Vec<(String, i64)> = sqlx::query_as(
        "SELECT id, household_number FROM household
          WHERE plot_id = ?1 ORDER BY household_number",
    )
    .bind(&plot_id)
    .fetch_all(tx.as_mut())
    .await?;

    let actual = existing.len() as i64;
    let target = input.household_count;

    if actual < target {
        let next_number = existing.last().map(|(_, n)| n + 1).unwrap_or(1);
        for offset in 0..(target - actual) {
            household::provision(&mut tx, &plot_id, next_number + offset, schedules).await?;
        }
        info!(
            target: "doorstep",
            event = "plot_households_provisioned",
            plot_identifier = %input.plot_identifier,
            created = target - actual,
            household_count = target
        );
    } else if actual > target {
        // Highest-numbered households are the reduction candidates. One
        // blocked candidate rejects the whole reduction.
        let candidates: Vec<&(String, i64)> = existing
            .iter()
            .rev()
            .take((actual - target) as usize)
            .collect();
        for (household_id, household_number) in candidates.iter().copied() {
            match household::delete_check(tx.as_mut(), household_id).await? {
                DeleteCheck::Allowed => {}
                DeleteCheck::Blocked { log_entries } => {
                    warn!(
                        target: "doorstep",
                        event = "plot_reduction_blocked",
                        plot_identifier = %input.plot_identifier,
                        household_number = %household_number,
                        log_entries = %log_entries,
                        requested = %target,
                        actual = %actual
                    );
                    // Dropping the transaction rolls back the count write too.
                    return Err(PlotSaveError::ReductionBlocked {
                        requested: target,
                        actual,
                    });
                }
            }
        }
        for (household_id, _) in candidates {
            sqlx::query("DELETE FROM household WHERE id = ?1")
                .bind(household_id)
                .execute(tx.as_mut())
                .await?;
        }
        info!(
            target: "doorstep",
            event = "plot_households_removed",
            plot_identifier = %input.plot_identifier,
            removed = actual - target,
            household_count = target
        );
    }

    let plot: Plot = sqlx::query_as(
        "SELECT id, plot_identifier, household_count, created_at, updated_at
           FROM plot WHERE id = ?1",
    )
    .bind(&plot_id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;
    Ok(plot)
}

pub async fn get_plot(
    pool: &SqlitePool,
    plot_identifier: &str,
) -> Result<Option<Plot>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, plot_identifier, household_count, created_at, updated_at
           FROM plot WHERE plot_identifier = ?1",
    )
    .bind(plot_identifier)
    .fetch_optional(pool)
    .await
}
