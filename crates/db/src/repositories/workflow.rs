use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use approvo_core::domain::proposal::{
    title_key, ProjectProposal, ProposalId, ProposalRecord, ProposalStatus,
};
use approvo_core::domain::reference::{AreaId, ProjectTypeId, ReferenceEntry};
use approvo_core::domain::rule::{ApprovalRule, RuleId};
use approvo_core::domain::step::{ApprovalStep, StepId, StepStatus};
use approvo_core::domain::user::{RoleId, User, UserId};
use approvo_core::ports::{
    DecisionCommit, ProposalCommand, ProposalQuery, ReferenceQuery, RevisionCommit, RuleQuery,
    StoreError, UserQuery,
};
use approvo_core::views::ReferenceDirectory;

use super::RepositoryError;
use crate::DbPool;

const PROPOSAL_SELECT: &str = "SELECT id, title, description, estimated_amount, estimated_duration,
        area_id, type_id, status_id, created_by, created_at
     FROM project_proposal";

const STEP_SELECT: &str = "SELECT id, proposal_id, approver_role_id, approver_user_id, step_order,
        status_id, observations, decision_date, decided_by
     FROM approval_step";

#[derive(Clone, Copy)]
enum ReferenceTable {
    Area,
    ProjectType,
    ApproverRole,
    ApprovalStatus,
}

impl ReferenceTable {
    const fn name(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::ProjectType => "project_type",
            Self::ApproverRole => "approver_role",
            Self::ApprovalStatus => "approval_status",
        }
    }
}

/// SQLite-backed implementation of every workflow port.
#[derive(Clone)]
pub struct SqlWorkflowStore {
    pool: DbPool,
}

impl SqlWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn load_rules(&self) -> Result<Vec<ApprovalRule>, RepositoryError> {
        sqlx::query(
            "SELECT id, min_amount, max_amount, area_id, type_id, step_order, approver_role_id
             FROM approval_rule
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(rule_from_row)
        .collect()
    }

    async fn load_users(&self) -> Result<Vec<User>, RepositoryError> {
        sqlx::query("SELECT id, name, email, role_id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(user_from_row)
            .collect()
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role_id FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn load_entry(
        &self,
        table: ReferenceTable,
        id: i32,
    ) -> Result<Option<ReferenceEntry>, RepositoryError> {
        let sql = format!("SELECT id, name FROM {} WHERE id = ?", table.name());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.map(entry_from_row).transpose()
    }

    async fn load_entries(
        &self,
        table: ReferenceTable,
    ) -> Result<Vec<ReferenceEntry>, RepositoryError> {
        let sql = format!("SELECT id, name FROM {} ORDER BY id", table.name());
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(entry_from_row)
            .collect()
    }

    async fn load_directory(&self) -> Result<ReferenceDirectory, RepositoryError> {
        let as_map = |entries: Vec<ReferenceEntry>| -> BTreeMap<i32, String> {
            entries.into_iter().map(|entry| (entry.id, entry.name)).collect()
        };

        Ok(ReferenceDirectory {
            areas: as_map(self.load_entries(ReferenceTable::Area).await?),
            project_types: as_map(self.load_entries(ReferenceTable::ProjectType).await?),
            roles: as_map(self.load_entries(ReferenceTable::ApproverRole).await?),
            statuses: as_map(self.load_entries(ReferenceTable::ApprovalStatus).await?),
            users: self.load_users().await?.into_iter().map(|user| (user.id, user)).collect(),
        })
    }

    async fn load_proposal(
        &self,
        id: ProposalId,
    ) -> Result<Option<ProposalRecord>, RepositoryError> {
        let row = sqlx::query(&format!("{PROPOSAL_SELECT} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let proposal = proposal_from_row(row)?;

        let steps = sqlx::query(&format!("{STEP_SELECT} WHERE proposal_id = ? ORDER BY step_order"))
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(step_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ProposalRecord::new(proposal, steps)))
    }

    async fn load_by_title(&self, title: &str) -> Result<Option<ProjectProposal>, RepositoryError> {
        let row = sqlx::query(&format!("{PROPOSAL_SELECT} WHERE title_key = ?"))
            .bind(title_key(title))
            .fetch_optional(&self.pool)
            .await?;

        row.map(proposal_from_row).transpose()
    }

    async fn load_all_proposals(&self) -> Result<Vec<ProposalRecord>, RepositoryError> {
        let proposals = sqlx::query(&format!("{PROPOSAL_SELECT} ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(proposal_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mut steps_by_proposal: HashMap<ProposalId, Vec<ApprovalStep>> = HashMap::new();
        for row in sqlx::query(&format!("{STEP_SELECT} ORDER BY proposal_id, step_order"))
            .fetch_all(&self.pool)
            .await?
        {
            let step = step_from_row(row)?;
            steps_by_proposal.entry(step.proposal_id).or_default().push(step);
        }

        Ok(proposals
            .into_iter()
            .map(|proposal| {
                let steps = steps_by_proposal.remove(&proposal.id).unwrap_or_default();
                ProposalRecord::new(proposal, steps)
            })
            .collect())
    }

    async fn insert_with_steps(
        &self,
        proposal: &ProjectProposal,
        steps: &[ApprovalStep],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO project_proposal
                (id, title, title_key, description, estimated_amount, estimated_duration,
                 area_id, type_id, status_id, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(proposal.id.to_string())
        .bind(&proposal.title)
        .bind(proposal.title_key())
        .bind(&proposal.description)
        .bind(proposal.estimated_amount.to_string())
        .bind(proposal.estimated_duration)
        .bind(proposal.area_id.0)
        .bind(proposal.type_id.0)
        .bind(proposal.status.id())
        .bind(proposal.created_by.0)
        .bind(proposal.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|error| title_conflict(error, &proposal.title))?;

        for step in steps {
            sqlx::query(
                "INSERT INTO approval_step
                    (id, proposal_id, approver_role_id, approver_user_id, step_order, status_id,
                     observations, decision_date, decided_by)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(step.id.to_string())
            .bind(step.proposal_id.to_string())
            .bind(step.approver_role_id.0)
            .bind(step.approver_user_id.map(|user| user.0))
            .bind(i64::from(step.step_order))
            .bind(step.status.id())
            .bind(&step.observations)
            .bind(step.decision_date.map(|date| date.to_rfc3339()))
            .bind(step.decided_by.map(|user| user.0))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn write_fields(&self, proposal: &ProjectProposal) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE project_proposal
             SET title = ?, title_key = ?, description = ?, estimated_duration = ?
             WHERE id = ? AND status_id = ?",
        )
        .bind(&proposal.title)
        .bind(proposal.title_key())
        .bind(&proposal.description)
        .bind(proposal.estimated_duration)
        .bind(proposal.id.to_string())
        .bind(ProposalStatus::ReturnedForRevision.id())
        .execute(&self.pool)
        .await
        .map_err(|error| title_conflict(error, &proposal.title))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Stale);
        }
        Ok(())
    }

    async fn write_revision(&self, commit: &RevisionCommit) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE project_proposal SET status_id = ? WHERE id = ? AND status_id = ?",
        )
        .bind(ProposalStatus::ReturnedForRevision.id())
        .bind(commit.proposal_id.to_string())
        .bind(commit.expected_status.id())
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            return Err(RepositoryError::Stale);
        }

        if let Some(step) = &commit.annotated_step {
            let annotated = sqlx::query(
                "UPDATE approval_step SET observations = ?
                 WHERE id = ? AND proposal_id = ? AND status_id = ?",
            )
            .bind(&step.observations)
            .bind(step.id.to_string())
            .bind(commit.proposal_id.to_string())
            .bind(StepStatus::Pending.id())
            .execute(&mut *tx)
            .await?;
            if annotated.rows_affected() == 0 {
                return Err(RepositoryError::Stale);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn write_decision(&self, commit: &DecisionCommit) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let step = &commit.step;

        let decided = sqlx::query(
            "UPDATE approval_step
             SET status_id = ?, observations = ?, decision_date = ?, decided_by = ?
             WHERE id = ? AND proposal_id = ? AND status_id = ?",
        )
        .bind(step.status.id())
        .bind(&step.observations)
        .bind(step.decision_date.map(|date| date.to_rfc3339()))
        .bind(step.decided_by.map(|user| user.0))
        .bind(step.id.to_string())
        .bind(commit.proposal_id.to_string())
        .bind(StepStatus::Pending.id())
        .execute(&mut *tx)
        .await?;
        if decided.rows_affected() == 0 {
            return Err(RepositoryError::Stale);
        }

        let recomputed = sqlx::query(
            "UPDATE project_proposal SET status_id = ? WHERE id = ? AND status_id = ?",
        )
        .bind(commit.next_status.id())
        .bind(commit.proposal_id.to_string())
        .bind(commit.expected_status.id())
        .execute(&mut *tx)
        .await?;
        if recomputed.rows_affected() == 0 {
            return Err(RepositoryError::Stale);
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RuleQuery for SqlWorkflowStore {
    async fn all_rules(&self) -> Result<Vec<ApprovalRule>, StoreError> {
        Ok(self.load_rules().await?)
    }
}

#[async_trait]
impl UserQuery for SqlWorkflowStore {
    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.load_users().await?)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.load_user(id).await?)
    }
}

#[async_trait]
impl ReferenceQuery for SqlWorkflowStore {
    async fn find_area(&self, id: AreaId) -> Result<Option<ReferenceEntry>, StoreError> {
        Ok(self.load_entry(ReferenceTable::Area, id.0).await?)
    }

    async fn find_project_type(
        &self,
        id: ProjectTypeId,
    ) -> Result<Option<ReferenceEntry>, StoreError> {
        Ok(self.load_entry(ReferenceTable::ProjectType, id.0).await?)
    }

    async fn status_exists(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.load_entry(ReferenceTable::ApprovalStatus, id).await?.is_some())
    }

    async fn directory(&self) -> Result<ReferenceDirectory, StoreError> {
        Ok(self.load_directory().await?)
    }
}

#[async_trait]
impl ProposalQuery for SqlWorkflowStore {
    async fn find_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError> {
        Ok(self.load_proposal(id).await?)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<ProjectProposal>, StoreError> {
        Ok(self.load_by_title(title).await?)
    }

    async fn list_proposals(&self) -> Result<Vec<ProposalRecord>, StoreError> {
        Ok(self.load_all_proposals().await?)
    }
}

#[async_trait]
impl ProposalCommand for SqlWorkflowStore {
    async fn create_with_steps(
        &self,
        proposal: ProjectProposal,
        steps: Vec<ApprovalStep>,
    ) -> Result<(), StoreError> {
        Ok(self.insert_with_steps(&proposal, &steps).await?)
    }

    async fn update_fields(&self, proposal: &ProjectProposal) -> Result<(), StoreError> {
        Ok(self.write_fields(proposal).await?)
    }

    async fn commit_revision(&self, commit: RevisionCommit) -> Result<(), StoreError> {
        Ok(self.write_revision(&commit).await?)
    }

    async fn commit_decision(&self, commit: DecisionCommit) -> Result<(), StoreError> {
        Ok(self.write_decision(&commit).await?)
    }
}

fn title_conflict(error: sqlx::Error, title: &str) -> RepositoryError {
    let unique_violation =
        error.as_database_error().map(|database| database.is_unique_violation()).unwrap_or(false);
    if unique_violation {
        RepositoryError::DuplicateTitle(title.to_string())
    } else {
        RepositoryError::Database(error)
    }
}

fn rule_from_row(row: SqliteRow) -> Result<ApprovalRule, RepositoryError> {
    Ok(ApprovalRule {
        id: RuleId(row.try_get("id")?),
        min_amount: parse_decimal("min_amount", &row.try_get::<String, _>("min_amount")?)?,
        max_amount: row
            .try_get::<Option<String>, _>("max_amount")?
            .map(|raw| parse_decimal("max_amount", &raw))
            .transpose()?,
        area: row.try_get::<Option<i32>, _>("area_id")?.map(AreaId),
        project_type: row.try_get::<Option<i32>, _>("type_id")?.map(ProjectTypeId),
        approver_role_id: RoleId(row.try_get("approver_role_id")?),
        step_order: parse_u32("step_order", row.try_get("step_order")?)?,
    })
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role_id: RoleId(row.try_get("role_id")?),
    })
}

fn entry_from_row(row: SqliteRow) -> Result<ReferenceEntry, RepositoryError> {
    Ok(ReferenceEntry { id: row.try_get("id")?, name: row.try_get("name")? })
}

fn proposal_from_row(row: SqliteRow) -> Result<ProjectProposal, RepositoryError> {
    let status_id = row.try_get::<i32, _>("status_id")?;
    let status = ProposalStatus::from_id(status_id).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown proposal status id `{status_id}`"))
    })?;

    Ok(ProjectProposal {
        id: ProposalId(parse_uuid("id", &row.try_get::<String, _>("id")?)?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        estimated_amount: parse_decimal(
            "estimated_amount",
            &row.try_get::<String, _>("estimated_amount")?,
        )?,
        estimated_duration: row.try_get("estimated_duration")?,
        area_id: AreaId(row.try_get("area_id")?),
        type_id: ProjectTypeId(row.try_get("type_id")?),
        created_by: UserId(row.try_get("created_by")?),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        status,
    })
}

fn step_from_row(row: SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let status_id = row.try_get::<i32, _>("status_id")?;
    let status = StepStatus::from_id(status_id)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step status id `{status_id}`")))?;

    Ok(ApprovalStep {
        id: StepId(parse_uuid("id", &row.try_get::<String, _>("id")?)?),
        proposal_id: ProposalId(parse_uuid(
            "proposal_id",
            &row.try_get::<String, _>("proposal_id")?,
        )?),
        approver_role_id: RoleId(row.try_get("approver_role_id")?),
        approver_user_id: row.try_get::<Option<i32>, _>("approver_user_id")?.map(UserId),
        step_order: parse_u32("step_order", row.try_get("step_order")?)?,
        status,
        observations: row.try_get("observations")?,
        decision_date: parse_optional_timestamp("decision_date", row.try_get("decision_date")?)?,
        decided_by: row.try_get::<Option<i32>, _>("decided_by")?.map(UserId),
    })
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid uuid in `{column}`: `{value}` ({error})"))
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use approvo_core::domain::proposal::{
        ProjectProposal, ProposalId, ProposalRecord, ProposalStatus,
    };
    use approvo_core::domain::reference::{AreaId, ProjectTypeId};
    use approvo_core::domain::rule::RuleId;
    use approvo_core::domain::step::{ApprovalStep, StepId, StepStatus};
    use approvo_core::domain::user::{RoleId, UserId};
    use approvo_core::ports::{
        DecisionCommit, ProposalCommand, ProposalQuery, ReferenceQuery, RevisionCommit,
        RuleQuery, StoreError, UserQuery,
    };

    use super::SqlWorkflowStore;
    use crate::fixtures::DemoSeedDataset;
    use crate::{connect_with_settings, migrations};

    async fn seeded_store() -> SqlWorkflowStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load demo seed");
        SqlWorkflowStore::new(pool)
    }

    fn proposal(title: &str) -> ProjectProposal {
        ProjectProposal {
            id: ProposalId::new(),
            title: title.to_string(),
            description: "Replace core switches".to_string(),
            estimated_amount: Decimal::new(1_250_050, 2),
            estimated_duration: 60,
            area_id: AreaId(2),
            type_id: ProjectTypeId(3),
            created_by: UserId(2),
            created_at: parse_ts("2026-03-02T09:30:00Z"),
            status: ProposalStatus::PendingApproval,
        }
    }

    fn step(proposal: &ProjectProposal, order: u32, user: Option<i32>) -> ApprovalStep {
        ApprovalStep {
            id: StepId::new(),
            proposal_id: proposal.id,
            approver_role_id: RoleId(order as i32),
            approver_user_id: user.map(UserId),
            step_order: order,
            status: StepStatus::Pending,
            observations: "Pending".to_string(),
            decision_date: None,
            decided_by: None,
        }
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn rules_load_in_catalog_order_with_optional_filters() {
        let store = seeded_store().await;
        let rules = store.all_rules().await.expect("load rules");

        assert_eq!(rules.first().map(|rule| rule.id), Some(RuleId(1)));
        assert!(rules.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert_eq!(rules[0].area, None);
        assert_eq!(rules[0].max_amount, Some(Decimal::new(100_000, 0)));
        assert_eq!(rules[2].area, Some(AreaId(2)));
        assert_eq!(rules[2].project_type, Some(ProjectTypeId(2)));
        assert_eq!(rules[3].max_amount.map(|max| max.is_zero()), Some(true));
    }

    #[tokio::test]
    async fn proposal_and_steps_round_trip() {
        let store = seeded_store().await;
        let proposal = proposal("Network refresh");
        let steps = vec![step(&proposal, 2, None), step(&proposal, 1, Some(2))];

        store.create_with_steps(proposal.clone(), steps.clone()).await.expect("create");
        let found = store.find_proposal(proposal.id).await.expect("find").expect("present");

        assert_eq!(found, ProposalRecord::new(proposal.clone(), steps));
        assert_eq!(found.steps[0].step_order, 1);

        let by_title =
            store.find_by_title("NETWORK REFRESH").await.expect("find by title").expect("match");
        assert_eq!(by_title.id, proposal.id);
        assert!(store.find_by_title("Network").await.expect("partial title").is_none());
    }

    #[tokio::test]
    async fn duplicate_title_is_reported_and_nothing_is_written() {
        let store = seeded_store().await;
        let first = proposal("Data Lake");
        store.create_with_steps(first, Vec::new()).await.expect("create first");

        let second = proposal("data lake");
        let steps = vec![step(&second, 1, Some(2))];
        let error = store.create_with_steps(second.clone(), steps).await.expect_err("duplicate");

        assert_eq!(error, StoreError::DuplicateTitle("data lake".to_string()));
        assert!(store.find_proposal(second.id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn accented_titles_collide_regardless_of_case() {
        let store = seeded_store().await;
        let first = proposal("Área Logística");
        store.create_with_steps(first.clone(), Vec::new()).await.expect("create first");

        let shouted = proposal("ÁREA LOGÍSTICA");
        let error = store.create_with_steps(shouted, Vec::new()).await.expect_err("duplicate");
        assert_eq!(error, StoreError::DuplicateTitle("ÁREA LOGÍSTICA".to_string()));

        let found = store
            .find_by_title("área logística")
            .await
            .expect("find by title")
            .expect("accented match");
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn decision_commit_is_guarded_on_pending_state() {
        let store = seeded_store().await;
        let proposal = proposal("Warehouse sensors");
        let first = step(&proposal, 1, Some(2));
        store
            .create_with_steps(proposal.clone(), vec![first.clone(), step(&proposal, 2, None)])
            .await
            .expect("create");

        let mut decided = first.clone();
        decided.status = StepStatus::Approved;
        decided.observations = "Looks good".to_string();
        decided.decision_date = Some(parse_ts("2026-03-03T11:00:00Z"));
        decided.decided_by = Some(UserId(2));
        let commit = DecisionCommit {
            proposal_id: proposal.id,
            step: decided.clone(),
            expected_status: ProposalStatus::PendingApproval,
            next_status: ProposalStatus::PendingApproval,
        };

        store.commit_decision(commit.clone()).await.expect("first decision");
        let replay = store.commit_decision(commit).await.expect_err("step no longer pending");
        assert_eq!(replay, StoreError::StaleWrite);

        let found = store.find_proposal(proposal.id).await.expect("find").expect("present");
        assert_eq!(found.steps[0], decided);
        assert_eq!(found.proposal.status, ProposalStatus::PendingApproval);
    }

    #[tokio::test]
    async fn stale_proposal_status_rolls_back_step_update() {
        let store = seeded_store().await;
        let proposal = proposal("Treasury dashboard");
        let first = step(&proposal, 1, Some(2));
        store.create_with_steps(proposal.clone(), vec![first.clone()]).await.expect("create");

        let mut decided = first;
        decided.status = StepStatus::Rejected;
        let error = store
            .commit_decision(DecisionCommit {
                proposal_id: proposal.id,
                step: decided,
                expected_status: ProposalStatus::ReturnedForRevision,
                next_status: ProposalStatus::Rejected,
            })
            .await
            .expect_err("proposal status does not match");

        assert_eq!(error, StoreError::StaleWrite);
        let found = store.find_proposal(proposal.id).await.expect("find").expect("present");
        assert!(found.steps[0].is_pending());
        assert_eq!(found.proposal.status, ProposalStatus::PendingApproval);
    }

    #[tokio::test]
    async fn edits_require_returned_status() {
        let store = seeded_store().await;
        let mut proposal = proposal("Onboarding revamp");
        let first = step(&proposal, 1, Some(2));
        store.create_with_steps(proposal.clone(), vec![first.clone()]).await.expect("create");

        proposal.description = "Shorter onboarding".to_string();
        let early = store.update_fields(&proposal).await.expect_err("still pending");
        assert_eq!(early, StoreError::StaleWrite);

        let mut annotated = first;
        annotated.observations = "Needs a budget breakdown".to_string();
        store
            .commit_revision(RevisionCommit {
                proposal_id: proposal.id,
                expected_status: ProposalStatus::PendingApproval,
                annotated_step: Some(annotated),
            })
            .await
            .expect("return for revision");
        store.update_fields(&proposal).await.expect("edit while returned");

        let found = store.find_proposal(proposal.id).await.expect("find").expect("present");
        assert_eq!(found.proposal.status, ProposalStatus::ReturnedForRevision);
        assert_eq!(found.proposal.description, "Shorter onboarding");
        assert_eq!(found.steps[0].observations, "Needs a budget breakdown");
        assert!(found.steps[0].is_pending());
    }

    #[tokio::test]
    async fn listing_groups_steps_under_their_proposals() {
        let store = seeded_store().await;
        let first = proposal("Alpha");
        let second = proposal("Beta");
        store
            .create_with_steps(first.clone(), vec![step(&first, 1, Some(2)), step(&first, 2, None)])
            .await
            .expect("create alpha");
        store.create_with_steps(second.clone(), Vec::new()).await.expect("create beta");

        let records = store.list_proposals().await.expect("list");
        let alpha = records.iter().find(|record| record.proposal.id == first.id).expect("alpha");
        let beta = records.iter().find(|record| record.proposal.id == second.id).expect("beta");

        assert_eq!(alpha.steps.len(), 2);
        assert!(beta.steps.is_empty());
    }

    #[tokio::test]
    async fn reference_lookups_and_directory() {
        let store = seeded_store().await;

        assert!(store.area_exists(AreaId(1)).await.expect("area"));
        assert!(!store.area_exists(AreaId(99)).await.expect("missing area"));
        assert!(store.project_type_exists(ProjectTypeId(4)).await.expect("type"));
        assert!(store.status_exists(4).await.expect("status"));
        assert!(!store.status_exists(5).await.expect("missing status"));
        assert!(store.user_exists(UserId(6)).await.expect("user"));
        assert!(store.find_user(UserId(42)).await.expect("missing user").is_none());

        let directory = store.directory().await.expect("directory");
        assert_eq!(directory.statuses.get(&4).map(String::as_str), Some("Observed"));
        assert_eq!(directory.areas.get(&2).map(String::as_str), Some("Technology"));
        assert_eq!(directory.users.len(), 6);
    }
}
