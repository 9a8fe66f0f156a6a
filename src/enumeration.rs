use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::debug;

use crate::id::new_uuid_v7;
use crate::status::HouseholdStatus;
use crate::time::now_ms;

/// Failed attempts needed before a household counts as failed/no-informant
/// and becomes assessable.
pub const FAILED_ATTEMPTS_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdLog {
    pub id: String,
    pub household_structure_id: String,
    pub last_log_status: Option<HouseholdStatus>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdLogEntry {
    pub id: String,
    pub household_log_id: String,
    pub report_datetime: i64,
    pub household_status: HouseholdStatus,
    pub comment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry<'a> {
    pub household_log_id: &'a str,
    pub report_datetime: i64,
    pub household_status: HouseholdStatus,
    pub comment: Option<&'a str>,
}

#[derive(Error, Debug)]
pub enum LogEntryError {
    #[error("household log not found")]
    UnknownLog,
    #[error("log entry not found")]
    NotFound,
    #[error("invalid {field}: {reason}")]
    InvalidStatus { field: &'static str, reason: String },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// What the aggregation pass needs from one entry. Ordering for the
/// latest-status rule is report_datetime, then created_at, then id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntrySnapshot {
    pub id: String,
    pub household_status: HouseholdStatus,
    pub report_datetime: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregates {
    pub last_log_status: Option<HouseholdStatus>,
    pub enumeration_attempts: i64,
    pub failed_enumeration_attempts: i64,
    pub failed_enumeration: bool,
    pub no_informant: bool,
}

/// Pure function of the current entry set. `refused_enumeration` depends
/// on the refusal table rather than the entries, so `apply_aggregates`
/// recomputes it separately.
pub fn aggregate(entries: &[EntrySnapshot]) -> Aggregates {
    let last_log_status = entries
        .iter()
        .max_by(|a, b| {
            (a.report_datetime, a.created_at, &a.id).cmp(&(b.report_datetime, b.created_at, &b.id))
        })
        .map(|e| e.household_status);

    let enumeration_attempts = entries.len() as i64;
    let failed: Vec<&EntrySnapshot> = entries
        .iter()
        .filter(|e| e.household_status.is_failed_attempt())
        .collect();
    let failed_enumeration_attempts = failed.len() as i64;
    let any_enumerated = entries.iter().any(|e| e.household_status.is_enumerated());

    let over_threshold = failed_enumeration_attempts >= FAILED_ATTEMPTS_THRESHOLD;
    let failed_enumeration = over_threshold && !any_enumerated;
    let no_informant = over_threshold
        && failed
            .iter()
            .all(|e| e.household_status == HouseholdStatus::NoHouseholdInformant);

    Aggregates {
        last_log_status,
        enumeration_attempts,
        failed_enumeration_attempts,
        failed_enumeration,
        no_informant,
    }
}

async fn entry_snapshots(
    tx: &mut Transaction<'_, Sqlite>,
    household_log_id: &str,
) -> Result<Vec<EntrySnapshot>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_status, report_datetime, created_at
           FROM household_log_entry
          WHERE household_log_id = ?1
          ORDER BY report_datetime, created_at, id",
    )
    .bind(household_log_id)
    .fetch_all(tx.as_mut())
    .await
}

/// Recompute and persist the derived columns for one log. Runs inside the
/// caller's transaction so readers never see an entry without its
/// aggregate update. `refused_enumeration` is derived here too: true iff
/// a refusal row still points at one of the log's entries, so deleting an
/// entry (cascading its refusal) clears the flag.
pub(crate) async fn apply_aggregates(
    tx: &mut Transaction<'_, Sqlite>,
    household_log_id: &str,
) -> Result<Aggregates, sqlx::Error> {
    let entries = entry_snapshots(tx, household_log_id).await?;
    let aggregates = aggregate(&entries);
    let now = now_ms();

    sqlx::query("UPDATE household_log SET last_log_status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(aggregates.last_log_status)
        .bind(now)
        .bind(household_log_id)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(
        "UPDATE household_structure SET
            enumeration_attempts = ?1,
            failed_enumeration_attempts = ?2,
            failed_enumeration = ?3,
            no_informant = ?4,
            refused_enumeration = EXISTS (
              SELECT 1 FROM household_refusal r
                JOIN household_log_entry e ON e.id = r.household_log_entry_id
               WHERE e.household_log_id = ?6),
            updated_at = ?5
          WHERE id = (SELECT household_structure_id FROM household_log WHERE id = ?6)",
    )
    .bind(aggregates.enumeration_attempts)
    .bind(aggregates.failed_enumeration_attempts)
    .bind(aggregates.failed_enumeration)
    .bind(aggregates.no_informant)
    .bind(now)
    .bind(household_log_id)
    .execute(tx.as_mut())
    .await?;

    Ok(aggregates)
}

/// Validate a submitted status against current member state. Once the
/// structure has members and a representative-eligibility record,
/// refusal and representative-present statuses no longer make sense.
async fn validate_status(
    tx: &mut Transaction<'_, Sqlite>,
    structure_id: &str,
    status: HouseholdStatus,
) -> Result<(), LogEntryError> {
    if !matches!(
        status,
        HouseholdStatus::RefusedEnumeration | HouseholdStatus::EligibleRepresentativePresent
    ) {
        return Ok(());
    }

    let members: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM household_member WHERE household_structure_id = ?1",
    )
    .bind(structure_id)
    .fetch_one(tx.as_mut())
    .await?;

    let eligibility: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM representative_eligibility WHERE household_structure_id = ?1",
    )
    .bind(structure_id)
    .fetch_optional(tx.as_mut())
    .await?;

    if members > 0 && eligibility.is_some() {
        return Err(LogEntryError::InvalidStatus {
            field: "household_status",
            reason: format!(
                "{status} is not valid once members and an eligible representative are known"
            ),
        });
    }
    Ok(())
}

/// Record one enumeration visit. Aggregates land in the same transaction
/// as the insert.
pub async fn add_log_entry(
    pool: &SqlitePool,
    input: NewLogEntry<'_>,
) -> Result<HouseholdLogEntry, LogEntryError> {
    let mut tx = pool.begin().await?;

    let structure_id: Option<String> =
        sqlx::query_scalar("SELECT household_structure_id FROM household_log WHERE id = ?1")
            .bind(input.household_log_id)
            .fetch_optional(tx.as_mut())
            .await?;
    let structure_id = structure_id.ok_or(LogEntryError::UnknownLog)?;

    validate_status(&mut tx, &structure_id, input.household_status).await?;

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household_log_entry
            (id, household_log_id, report_datetime, household_status, comment, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
    )
    .bind(&id)
    .bind(input.household_log_id)
    .bind(input.report_datetime)
    .bind(input.household_status)
    .bind(input.comment)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    let aggregates = apply_aggregates(&mut tx, input.household_log_id).await?;

    let entry: HouseholdLogEntry = sqlx::query_as(
        "SELECT id, household_log_id, report_datetime, household_status, comment,
                created_at, updated_at
           FROM household_log_entry WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;

    debug!(
        target: "doorstep",
        event = "log_entry_added",
        entry_id = %entry.id,
        household_log_id = %entry.household_log_id,
        household_status = %entry.household_status,
        failed_enumeration_attempts = %aggregates.failed_enumeration_attempts
    );
    Ok(entry)
}

/// Remove a visit record and recompute aggregates over what remains.
pub async fn delete_log_entry(pool: &SqlitePool, entry_id: &str) -> Result<(), LogEntryError> {
    let mut tx = pool.begin().await?;

    let household_log_id: Option<String> =
        sqlx::query_scalar("SELECT household_log_id FROM household_log_entry WHERE id = ?1")
            .bind(entry_id)
            .fetch_optional(tx.as_mut())
            .await?;
    let household_log_id = household_log_id.ok_or(LogEntryError::NotFound)?;

    sqlx::query("DELETE FROM household_log_entry WHERE id = ?1")
        .bind(entry_id)
        .execute(tx.as_mut())
        .await?;

    apply_aggregates(&mut tx, &household_log_id).await?;
    tx.commit().await?;

    debug!(
        target: "doorstep",
        event = "log_entry_deleted",
        entry_id = %entry_id,
        household_log_id = %household_log_id
    );
    Ok(())
}

pub async fn get_log_for_structure(
    pool: &SqlitePool,
    structure_id: &str,
) -> Result<Option<HouseholdLog>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_structure_id, last_log_status, created_at, updated_at
           FROM household_log WHERE household_structure_id = ?1",
    )
    .bind(structure_id)
    .fetch_optional(pool)
    .await
}

pub async fn entries_for_log(
    pool: &SqlitePool,
    household_log_id: &str,
) -> Result<Vec<HouseholdLogEntry>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_log_id, report_datetime, household_status, comment,
                created_at, updated_at
           FROM household_log_entry
          WHERE household_log_id = ?1
          ORDER BY report_datetime, created_at, id",
    )
    .bind(household_log_id)
    .fetch_all(pool)
    .await
}
