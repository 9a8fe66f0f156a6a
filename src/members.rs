use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use thiserror::Error;

use crate::id::new_uuid_v7;
use crate::time::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdMember {
    pub id: String,
    pub household_structure_id: String,
    pub first_name: String,
    pub initials: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RepresentativeEligibility {
    pub id: String,
    pub household_structure_id: String,
    pub aged_over_18: bool,
    pub verbal_script: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Error, Debug)]
pub enum MemberError {
    #[error("household structure not found")]
    StructureNotFound,
    #[error("representative eligibility already recorded for this structure")]
    AlreadyRecorded,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

async fn structure_exists<'e, E>(executor: E, structure_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM household_structure WHERE id = ?1")
        .bind(structure_id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

/// Add a member to the roster. The first member marks the structure as
/// enumerated.
pub async fn add_household_member(
    pool: &SqlitePool,
    household_structure_id: &str,
    first_name: &str,
    initials: &str,
) -> Result<HouseholdMember, MemberError> {
    let mut tx = pool.begin().await?;
    if !structure_exists(tx.as_mut(), household_structure_id).await? {
        return Err(MemberError::StructureNotFound);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household_member
            (id, household_structure_id, first_name, initials, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(&id)
    .bind(household_structure_id)
    .bind(first_name)
    .bind(initials)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    sqlx::query("UPDATE household_structure SET enumerated = 1, updated_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(household_structure_id)
        .execute(tx.as_mut())
        .await?;

    let member: HouseholdMember = sqlx::query_as(
        "SELECT id, household_structure_id, first_name, initials, created_at, updated_at
           FROM household_member WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;
    Ok(member)
}

/// One eligibility record per structure; together with a member roster it
/// blocks refusal/representative-present log statuses.
pub async fn record_representative_eligibility(
    pool: &SqlitePool,
    household_structure_id: &str,
    aged_over_18: bool,
    verbal_script: bool,
) -> Result<RepresentativeEligibility, MemberError> {
    let mut tx = pool.begin().await?;
    if !structure_exists(tx.as_mut(), household_structure_id).await? {
        return Err(MemberError::StructureNotFound);
    }

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM representative_eligibility WHERE household_structure_id = ?1",
    )
    .bind(household_structure_id)
    .fetch_optional(tx.as_mut())
    .await?;
    if existing.is_some() {
        return Err(MemberError::AlreadyRecorded);
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO representative_eligibility
            (id, household_structure_id, aged_over_18, verbal_script, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(&id)
    .bind(household_structure_id)
    .bind(aged_over_18)
    .bind(verbal_script)
    .bind(now)
    .execute(tx.as_mut())
    .await?;

    let eligibility: RepresentativeEligibility = sqlx::query_as(
        "SELECT id, household_structure_id, aged_over_18, verbal_script, created_at, updated_at
           FROM representative_eligibility WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;
    Ok(eligibility)
}
