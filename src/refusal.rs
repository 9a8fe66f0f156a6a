use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::enumeration::apply_aggregates;
use crate::id::new_uuid_v7;
use crate::status::HouseholdStatus;
use crate::time::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdRefusal {
    pub id: String,
    pub household_log_entry_id: String,
    pub reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Error, Debug)]
pub enum RefusalError {
    #[error("log entry not found")]
    EntryNotFound,
    #[error("log entry status is {0}, refusal can only confirm refused_enumeration")]
    NotARefusal(HouseholdStatus),
    #[error("refusal already confirmed for this log entry")]
    AlreadyConfirmed,
    #[error("no refusal confirmed for this log entry")]
    NotConfirmed,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Formally confirm a refusal. Flips `refused_enumeration` on the first
/// confirmed refusal regardless of the failed-attempt counter.
pub async fn confirm_refusal(
    pool: &SqlitePool,
    household_log_entry_id: &str,
    reason: Option<&str>,
) -> Result<HouseholdRefusal, RefusalError> {
    let mut tx = pool.begin().await?;

    let entry: Option<(String, HouseholdStatus)> = sqlx::query_as(
        "SELECT household_log_id, household_status FROM household_log_entry WHERE id = ?1",
    )
    .bind(household_log_entry_id)
    .fetch_optional(tx.as_mut())
    .await?;
    let (household_log_id, status) = entry.ok_or(RefusalError::EntryNotFound)?;
    if status != HouseholdStatus::RefusedEnumeration {
        return Err(RefusalError::NotARefusal(status));
    }

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM household_refusal WHERE household_log_entry_id = ?1",
    )
    .bind(household_log_entry_id)
    .fetch_optional(tx.as_mut())
    .await?;
    if existing.is_some() {
        return Err(RefusalError::AlreadyConfirmed);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household_refusal (id, household_log_entry_id, reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
    )
    .bind(&id)
    .bind(household_log_entry_id)
    .bind(reason)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    apply_aggregates(&mut tx, &household_log_id).await?;

    let refusal: HouseholdRefusal = sqlx::query_as(
        "SELECT id, household_log_entry_id, reason, created_at, updated_at
           FROM household_refusal WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;

    info!(
        target: "doorstep",
        event = "refusal_confirmed",
        refusal_id = %refusal.id,
        household_log_entry_id = %household_log_entry_id
    );
    Ok(refusal)
}

/// Withdraw a confirmed refusal: the flag drops back to false and the
/// dependent aggregates are recomputed over the unchanged entry set.
pub async fn delete_refusal(
    pool: &SqlitePool,
    household_log_entry_id: &str,
) -> Result<(), RefusalError> {
    let mut tx = pool.begin().await?;

    let household_log_id: Option<String> =
        sqlx::query_scalar("SELECT household_log_id FROM household_log_entry WHERE id = ?1")
            .bind(household_log_entry_id)
            .fetch_optional(tx.as_mut())
            .await?;
    let household_log_id = household_log_id.ok_or(RefusalError::EntryNotFound)?;

    let rows = sqlx::query("DELETE FROM household_refusal WHERE household_log_entry_id = ?1")
        .bind(household_log_entry_id)
        .execute(tx.as_mut())
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RefusalError::NotConfirmed);
    }

    apply_aggregates(&mut tx, &household_log_id).await?;
    tx.commit().await?;

    info!(
        target: "doorstep",
        event = "refusal_withdrawn",
        household_log_entry_id = %household_log_entry_id
    );
    Ok(())
}

pub async fn get_refusal(
    pool: &SqlitePool,
    household_log_entry_id: &str,
) -> Result<Option<HouseholdRefusal>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_log_entry_id, reason, created_at, updated_at
           FROM household_refusal WHERE household_log_entry_id = ?1",
    )
    .bind(household_log_entry_id)
    .fetch_optional(pool)
    .await
}
