use anyhow::Result;
use doorstep_lib::{
    add_log_entry, delete_check, delete_household, get_log_for_structure, get_plot, migrate,
    save_plot, structures_for_household, DeleteCheck, HouseholdDeleteError, HouseholdStatus,
    NewLogEntry, PlotInput, PlotSaveError, SurveySchedule, SurveySchedules,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const BASE_MS: i64 = 1_700_000_000_000;

async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

fn schedules() -> SurveySchedules {
    let schedules = (1..=3)
        .map(|i| SurveySchedule {
            group_name: "example-survey".into(),
            name: format!("example-survey-{i}"),
            community: "test_community".into(),
        })
        .collect();
    SurveySchedules::new("example-survey", schedules)
}

async fn household_ids(pool: &SqlitePool, plot_identifier: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT h.id FROM household h JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1 ORDER BY h.household_number",
    )
    .bind(plot_identifier)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

async fn add_attempt(pool: &SqlitePool, household_id: &str, report_datetime: i64) -> Result<()> {
    let structures = structures_for_household(pool, household_id).await?;
    let log = get_log_for_structure(pool, &structures[0].id)
        .await?
        .expect("structure has a log");
    add_log_entry(
        pool,
        NewLogEntry {
            household_log_id: &log.id,
            report_datetime,
            household_status: HouseholdStatus::NoHouseholdInformant,
            comment: None,
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn save_creates_households_with_structures_and_logs() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-001",
            household_count: 2,
        },
    )
    .await?;

    let households = household_ids(&pool, "plot-001").await?;
    assert_eq!(households.len(), 2);

    for household_id in &households {
        let structures = structures_for_household(&pool, household_id).await?;
        assert_eq!(structures.len(), 3);
        for structure in &structures {
            let log = get_log_for_structure(&pool, &structure.id).await?;
            assert!(log.is_some(), "every structure gets an empty log");
            assert_eq!(log.unwrap().last_log_status, None);
        }
    }

    let total_structures: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household_structure")
        .fetch_one(&pool)
        .await?;
    assert_eq!(total_structures, 6);
    Ok(())
}

#[tokio::test]
async fn reduction_without_history_deletes_excess() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-002",
            household_count: 2,
        },
    )
    .await?;

    let plot = save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-002",
            household_count: 1,
        },
    )
    .await?;
    assert_eq!(plot.household_count, 1);

    let households = household_ids(&pool, "plot-002").await?;
    assert_eq!(households.len(), 1);
    // the surviving household keeps its full structure set
    let structures = structures_for_household(&pool, &households[0]).await?;
    assert_eq!(structures.len(), 3);
    Ok(())
}

#[tokio::test]
async fn reduction_blocked_by_log_history_changes_nothing() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-003",
            household_count: 5,
        },
    )
    .await?;

    let households = household_ids(&pool, "plot-003").await?;
    for (i, household_id) in households.iter().enumerate() {
        add_attempt(&pool, household_id, BASE_MS + i as i64 * 1000).await?;
    }

    let err = save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-003",
            household_count: 1,
        },
    )
    .await
    .expect_err("reduction over log history should fail");
    assert!(matches!(
        err,
        PlotSaveError::ReductionBlocked {
            requested: 1,
            actual: 5
        }
    ));

    // nothing was deleted and the stored count reads back as the actual count
    assert_eq!(household_ids(&pool, "plot-003").await?.len(), 5);
    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household_log_entry")
        .fetch_one(&pool)
        .await?;
    assert_eq!(entries, 5);
    let plot = get_plot(&pool, "plot-003").await?.expect("plot exists");
    assert_eq!(plot.household_count, 5);
    Ok(())
}

#[tokio::test]
async fn one_blocked_candidate_rejects_whole_reduction() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-004",
            household_count: 3,
        },
    )
    .await?;

    // only the highest-numbered household has history, but the clean
    // middle household must survive too
    let households = household_ids(&pool, "plot-004").await?;
    add_attempt(&pool, &households[2], BASE_MS).await?;

    let err = save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-004",
            household_count: 1,
        },
    )
    .await
    .expect_err("reduction should fail");
    assert!(matches!(err, PlotSaveError::ReductionBlocked { .. }));
    assert_eq!(household_ids(&pool, "plot-004").await?.len(), 3);
    assert_eq!(
        get_plot(&pool, "plot-004").await?.unwrap().household_count,
        3
    );
    Ok(())
}

#[tokio::test]
async fn growth_appends_household_numbers() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-005",
            household_count: 2,
        },
    )
    .await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-005",
            household_count: 4,
        },
    )
    .await?;

    let numbers: Vec<i64> = sqlx::query_scalar(
        "SELECT h.household_number FROM household h JOIN plot p ON p.id = h.plot_id
          WHERE p.plot_identifier = ?1 ORDER BY h.household_number",
    )
    .bind("plot-005")
    .fetch_all(&pool)
    .await?;
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn negative_count_is_rejected() -> Result<()> {
    let pool = memory_pool().await?;
    let err = save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-006",
            household_count: -1,
        },
    )
    .await
    .expect_err("negative counts should fail");
    assert!(matches!(err, PlotSaveError::NegativeCount(-1)));
    Ok(())
}

#[tokio::test]
async fn delete_check_blocks_household_with_history() -> Result<()> {
    let pool = memory_pool().await?;
    save_plot(
        &pool,
        &schedules(),
        PlotInput {
            plot_identifier: "plot-007",
            household_count: 2,
        },
    )
    .await?;

    let households = household_ids(&pool, "plot-007").await?;
    add_attempt(&pool, &households[0], BASE_MS).await?;

    assert_eq!(
        delete_check(&pool, &households[0]).await?,
        DeleteCheck::Blocked { log_entries: 1 }
    );
    assert!(delete_check(&pool, &households[1]).await?.is_allowed());

    let err = delete_household(&pool, &households[0])
        .await
        .expect_err("delete over history should fail");
    assert!(matches!(
        err,
        HouseholdDeleteError::Blocked { log_entries: 1 }
    ));

    delete_household(&pool, &households[1]).await?;
    assert_eq!(household_ids(&pool, "plot-007").await?.len(), 1);
    Ok(())
}
