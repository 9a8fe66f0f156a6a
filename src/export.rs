use serde_json::{json, Value};
use sqlx::SqlitePool;

/// Stable natural-key records for external replication. Each entity is
/// identified by the tuple its consumers key on, never by row id:
/// household `(plot_identifier, household_number)`, structure adds
/// `survey_schedule`, log entry adds `report_datetime`.
pub async fn natural_keys(
    pool: &SqlitePool,
    plot_identifier: &str,
) -> Result<Vec<Value>, sqlx::Error> {
    let mut records = Vec::new();

    let households: Vec<(i64,)> = sqlx::query_as(
        "SELECT h.household_number
           FROM household h JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1 ORDER BY h.household_number",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    for (household_number,) in &households {
        records.push(json!({
            "model": "household",
            "plot_identifier": plot_identifier,
            "household_number": household_number,
        }));
    }

    let structures: Vec<(i64, String)> = sqlx::query_as(
        "SELECT h.household_number, s.survey_schedule
           FROM household_structure s
           JOIN household h ON h.id = s.household_id
           JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1
          ORDER BY h.household_number, s.survey_schedule",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    for (household_number, survey_schedule) in &structures {
        records.push(json!({
            "model": "household_structure",
            "plot_identifier": plot_identifier,
            "household_number": household_number,
            "survey_schedule": survey_schedule,
        }));
    }

    let entries: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT h.household_number, s.survey_schedule, e.report_datetime
           FROM household_log_entry e
           JOIN household_log l ON l.id = e.household_log_id
           JOIN household_structure s ON s.id = l.household_structure_id
           JOIN household h ON h.id = s.household_id
           JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1
          ORDER BY h.household_number, s.survey_schedule, e.report_datetime",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    for (household_number, survey_schedule, report_datetime) in &entries {
        records.push(json!({
            "model": "household_log_entry",
            "plot_identifier": plot_identifier,
            "household_number": household_number,
            "survey_schedule": survey_schedule,
            "report_datetime": report_datetime,
        }));
    }

    let refusals: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT h.household_number, s.survey_schedule, e.report_datetime
           FROM household_refusal r
           JOIN household_log_entry e ON e.id = r.household_log_entry_id
           JOIN household_log l ON l.id = e.household_log_id
           JOIN household_structure s ON s.id = l.household_structure_id
           JOIN household h ON h.id = s.household_id
           JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1
          ORDER BY h.household_number, s.survey_schedule, e.report_datetime",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    for (household_number, survey_schedule, report_datetime) in &refusals {
        records.push(json!({
            "model": "household_refusal",
            "plot_identifier": plot_identifier,
            "household_number": household_number,
            "survey_schedule": survey_schedule,
            "report_datetime": report_datetime,
        }));
    }

    let assessments: Vec<(i64, String)> = sqlx::query_as(
        "SELECT h.household_number, s.survey_schedule
           FROM household_assessment a
           JOIN household_structure s ON s.id = a.household_structure_id
           JOIN household h ON h.id = s.household_id
           JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1
          ORDER BY h.household_number, s.survey_schedule",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    for (household_number, survey_schedule) in &assessments {
        records.push(json!({
            "model": "household_assessment",
            "plot_identifier": plot_identifier,
            "household_number": household_number,
            "survey_schedule": survey_schedule,
        }));
    }

    Ok(records)
}
