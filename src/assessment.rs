use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::enumeration::FAILED_ATTEMPTS_THRESHOLD;
use crate::id::new_uuid_v7;
use crate::time::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdAssessment {
    pub id: String,
    pub household_structure_id: String,
    pub potential_eligibles: Option<i64>,
    pub eligibles_last_seen_home: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentInput<'a> {
    pub potential_eligibles: Option<i64>,
    pub eligibles_last_seen_home: Option<&'a str>,
}

#[derive(Error, Debug)]
pub enum HouseholdAssessmentError {
    #[error("household structure not found")]
    StructureNotFound,
    #[error(
        "cannot assess household: {attempts} failed enumeration attempt(s), {required} required"
    )]
    TooFewAttempts { attempts: i64, required: i64 },
    #[error("household structure already assessed")]
    AlreadyAssessed,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Record a post-hoc assessment. Permitted only after repeated failed
/// attempts; premature creation is a domain error naming the counts.
pub async fn create_assessment(
    pool: &SqlitePool,
    household_structure_id: &str,
    input: AssessmentInput<'_>,
) -> Result<HouseholdAssessment, HouseholdAssessmentError> {
    let mut tx = pool.begin().await?;

    let attempts: Option<i64> = sqlx::query_scalar(
        "SELECT failed_enumeration_attempts FROM household_structure WHERE id = ?1",
    )
    .bind(household_structure_id)
    .fetch_optional(tx.as_mut())
    .await?;
    let attempts = attempts.ok_or(HouseholdAssessmentError::StructureNotFound)?;

    if attempts < FAILED_ATTEMPTS_THRESHOLD {
        return Err(HouseholdAssessmentError::TooFewAttempts {
            attempts,
            required: FAILED_ATTEMPTS_THRESHOLD,
        });
    }

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM household_assessment WHERE household_structure_id = ?1",
    )
    .bind(household_structure_id)
    .fetch_optional(tx.as_mut())
    .await?;
    if existing.is_some() {
        return Err(HouseholdAssessmentError::AlreadyAssessed);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household_assessment
            (id, household_structure_id, potential_eligibles, eligibles_last_seen_home,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(&id)
    .bind(household_structure_id)
    .bind(input.potential_eligibles)
    .bind(input.eligibles_last_seen_home)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    let assessment: HouseholdAssessment = sqlx::query_as(
        "SELECT id, household_structure_id, potential_eligibles, eligibles_last_seen_home,
                created_at, updated_at
           FROM household_assessment WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;

    info!(
        target: "doorstep",
        event = "assessment_created",
        assessment_id = %assessment.id,
        household_structure_id = %household_structure_id,
        failed_enumeration_attempts = %attempts
    );
    Ok(assessment)
}

pub async fn get_assessment(
    pool: &SqlitePool,
    household_structure_id: &str,
) -> Result<Option<HouseholdAssessment>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, household_structure_id, potential_eligibles, eligibles_last_seen_home,
                created_at, updated_at
           FROM household_assessment WHERE household_structure_id = ?1",
    )
    .bind(household_structure_id)
    .fetch_optional(pool)
    .await
}
