use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::info;

use crate::id::new_uuid_v7;
use crate::survey::SurveySchedules;
use crate::time::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Household {
    pub id: String,
    pub plot_id: String,
    pub household_number: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdStructure {
    pub id: String,
    pub household_id: String,
    pub survey_schedule: String,
    pub enumeration_attempts: i64,
    pub failed_enumeration_attempts: i64,
    pub refused_enumeration: bool,
    pub failed_enumeration: bool,
    pub no_informant: bool,
    pub enumerated: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of the explicit pre-delete check. A household with visit
/// history is never deleted implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCheck {
    Allowed,
    Blocked { log_entries: i64 },
}

impl DeleteCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DeleteCheck::Allowed)
    }
}

#[derive(Error, Debug)]
pub enum HouseholdDeleteError {
    #[error("household not found")]
    NotFound,
    #[error("household has {log_entries} enumeration log entries")]
    Blocked { log_entries: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Create one household with one structure per configured survey
/// schedule, each with an empty log. Caller owns the transaction.
pub(crate) async fn provision(
    tx: &mut Transaction<'_, Sqlite>,
    plot_id: &str,
    household_number: i64,
    schedules: &SurveySchedules,
) -> Result<String, sqlx::Error> {
    let household_id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household (id, plot_id, household_number, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
    )
    .bind(&household_id)
    .bind(plot_id)
    .bind(household_number)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    for field_value in schedules.field_values() {
        let structure_id = new_uuid_v7();
        sqlx::query(
            "INSERT INTO household_structure (id, household_id, survey_schedule, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&structure_id)
        .bind(&household_id)
        .bind(&field_value)
        .bind(now)
        .execute(tx.as_mut())
        .await?;

        sqlx::query(
            "INSERT INTO household_log (id, household_structure_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(new_uuid_v7())
        .bind(&structure_id)
        .bind(now)
        .execute(tx.as_mut())
        .await?;
    }

    Ok(household_id)
}

/// Count dependent log entries before any delete. FK errors are not the
/// protection mechanism; this check is.
pub async fn delete_check<'e, E>(
    executor: E,
    household_id: &str,
) -> Result<DeleteCheck, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let log_entries: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)
           FROM household_log_entry e
           JOIN household_log l ON l.id = e.household_log_id
           JOIN household_structure s ON s.id = l.household_structure_id
          WHERE s.household_id = ?1",
    )
    .bind(household_id)
    .fetch_one(executor)
    .await?;

    if log_entries == 0 {
        Ok(DeleteCheck::Allowed)
    } else {
        Ok(DeleteCheck::Blocked { log_entries })
    }
}

/// Delete a single household and its structures/logs. Refuses when any
/// visit history exists.
pub async fn delete_household(
    pool: &SqlitePool,
    household_id: &str,
) -> Result<(), HouseholdDeleteError> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM household WHERE id = ?1")
        .bind(household_id)
        .fetch_optional(tx.as_mut())
        .await?;
    if exists.is_none() {
        return Err(HouseholdDeleteError::NotFound);
    }

    match delete_check(tx.as_mut(), household_id).await? {
        DeleteCheck::Allowed => {}
        DeleteCheck::Blocked { log_entries } => {
            return Err(HouseholdDeleteError::Blocked { log_entries });
        }
    }

    sqlx::query("DELETE FROM household WHERE id = ?1")
        .bind(household_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(
        target: "doorstep",
        event = "household_deleted",
        household_id = %household_id
    );
    Ok(())
}

pub async fn get_household(
    pool: &SqlitePool,
    plot_identifier: &str,
    household_number: i64,
) -> Result<Option<Household>, sqlx::Error> {
    sqlx::query_as(
        "SELECT h.id, h.plot_id, h.household_number, h.created_at, h.updated_at
           FROM household h
           JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1 AND h.household_number = ?2",
    )
    .bind(plot_identifier)
    .bind(household_number)
    .fetch_optional(pool)
    .await
}

pub async fn households_for_plot(
    pool: &SqlitePool,
    plot_id: &str,
) -> Result<Vec<Household>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, plot_id, household_number, created_at, updated_at
           FROM household WHERE plot_id = ?1 ORDER BY household_number",
    )
    .bind(plot_id)
    .fetch_all(pool)
    .await
}

pub async fn structures_for_household(
    pool: &SqlitePool,
    household_id: &str,
) -> Result<Vec<HouseholdStructure>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_id, survey_schedule, enumeration_attempts,
                failed_enumeration_attempts, refused_enumeration, failed_enumeration,
                no_informant, enumerated, created_at, updated_at
           FROM household_structure WHERE household_id = ?1 ORDER BY survey_schedule",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
}

pub async fn get_structure(
    pool: &SqlitePool,
    structure_id: &str,
) -> Result<Option<HouseholdStructure>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_id, survey_schedule, enumeration_attempts,
                failed_enumeration_attempts, refused_enumeration, failed_enumeration,
                no_informant, enumerated, created_at, updated_at
           FROM household_structure WHERE id = ?1",
    )
    .bind(structure_id)
    .fetch_optional(pool)
    .await
}
