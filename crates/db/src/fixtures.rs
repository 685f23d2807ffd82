use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Row counts the demo dataset guarantees, keyed by table.
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "area", label: "areas", expected_rows: 4 },
    SeedTableContract { table: "project_type", label: "project-types", expected_rows: 4 },
    SeedTableContract { table: "approver_role", label: "approver-roles", expected_rows: 4 },
    SeedTableContract { table: "users", label: "users", expected_rows: 6 },
    SeedTableContract { table: "approval_rule", label: "approval-rules", expected_rows: 9 },
];

/// Deterministic demo data: areas, project types, approver roles, users and the
/// approval rule catalog. Proposals are never seeded.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Load the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            tables_seeded: SEED_TABLES.iter().map(|contract| contract.label).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_TABLES {
            let ids: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {} WHERE id BETWEEN 1 AND ?1",
                contract.table
            ))
            .bind(contract.expected_rows)
            .fetch_one(pool)
            .await?;
            checks.push((contract.label, ids == contract.expected_rows));
        }

        // Users 5 and 6 share a role so that role resolves to nobody.
        let ambiguous_role: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM users WHERE role_id = 4 AND id IN (5, 6)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("ambiguous-role-holders", ambiguous_role == 2));

        let unbounded_rules: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM approval_rule WHERE max_amount = '0'")
                .fetch_one(pool)
                .await?;
        checks.push(("unbounded-rules", unbounded_rules == 5));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove every proposal and the seeded rows. Statuses belong to the schema and stay.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for table in [
            "approval_step",
            "project_proposal",
            "approval_rule",
            "users",
            "approver_role",
            "project_type",
            "area",
        ] {
            sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTableContract {
    table: &'static str,
    label: &'static str,
    expected_rows: i64,
}

#[derive(Debug)]
pub struct SeedResult {
    pub tables_seeded: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, present)| !present).map(|(label, _)| *label).collect()
    }
}
