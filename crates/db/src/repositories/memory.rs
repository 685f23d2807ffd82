use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use approvo_core::domain::proposal::{
    title_key, ProjectProposal, ProposalId, ProposalRecord, ProposalStatus,
};
use approvo_core::domain::reference::{AreaId, ProjectTypeId, ReferenceEntry};
use approvo_core::domain::rule::ApprovalRule;
use approvo_core::domain::step::ApprovalStep;
use approvo_core::domain::user::{User, UserId};
use approvo_core::ports::{
    DecisionCommit, ProposalCommand, ProposalQuery, ReferenceQuery, RevisionCommit, RuleQuery,
    StoreError, UserQuery,
};
use approvo_core::views::ReferenceDirectory;

/// Reference data and configuration an in-memory store starts with.
#[derive(Clone, Debug, Default)]
pub struct MemorySeed {
    pub areas: Vec<ReferenceEntry>,
    pub project_types: Vec<ReferenceEntry>,
    pub roles: Vec<ReferenceEntry>,
    pub users: Vec<User>,
    pub rules: Vec<ApprovalRule>,
}

/// Workflow store kept entirely in process. Writes honor the same guards as the SQL store.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    directory: ReferenceDirectory,
    rules: Vec<ApprovalRule>,
    proposals: RwLock<HashMap<ProposalId, ProposalRecord>>,
}

impl InMemoryWorkflowStore {
    pub fn new(seed: MemorySeed) -> Self {
        let entries = |list: Vec<ReferenceEntry>| -> BTreeMap<i32, String> {
            list.into_iter().map(|entry| (entry.id, entry.name)).collect()
        };
        let statuses = [
            ProposalStatus::PendingApproval,
            ProposalStatus::Approved,
            ProposalStatus::Rejected,
            ProposalStatus::ReturnedForRevision,
        ]
        .into_iter()
        .map(|status| (status.id(), status.label().to_string()))
        .collect();

        let mut rules = seed.rules;
        rules.sort_by_key(|rule| rule.id);

        Self {
            directory: ReferenceDirectory {
                areas: entries(seed.areas),
                project_types: entries(seed.project_types),
                roles: entries(seed.roles),
                statuses,
                users: seed.users.into_iter().map(|user| (user.id, user)).collect(),
            },
            rules,
            proposals: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RuleQuery for InMemoryWorkflowStore {
    async fn all_rules(&self) -> Result<Vec<ApprovalRule>, StoreError> {
        Ok(self.rules.clone())
    }
}

#[async_trait]
impl UserQuery for InMemoryWorkflowStore {
    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.directory.users.values().cloned().collect())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.directory.users.get(&id).cloned())
    }
}

#[async_trait]
impl ReferenceQuery for InMemoryWorkflowStore {
    async fn find_area(&self, id: AreaId) -> Result<Option<ReferenceEntry>, StoreError> {
        Ok(self.directory.areas.get(&id.0).map(|name| ReferenceEntry::new(id.0, name.clone())))
    }

    async fn find_project_type(
        &self,
        id: ProjectTypeId,
    ) -> Result<Option<ReferenceEntry>, StoreError> {
        Ok(self
            .directory
            .project_types
            .get(&id.0)
            .map(|name| ReferenceEntry::new(id.0, name.clone())))
    }

    async fn status_exists(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.directory.statuses.contains_key(&id))
    }

    async fn directory(&self) -> Result<ReferenceDirectory, StoreError> {
        Ok(self.directory.clone())
    }
}

#[async_trait]
impl ProposalQuery for InMemoryWorkflowStore {
    async fn find_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.get(&id).cloned())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<ProjectProposal>, StoreError> {
        let key = title_key(title);
        let proposals = self.proposals.read().await;
        Ok(proposals
            .values()
            .find(|record| record.proposal.title_key() == key)
            .map(|record| record.proposal.clone()))
    }

    async fn list_proposals(&self) -> Result<Vec<ProposalRecord>, StoreError> {
        let proposals = self.proposals.read().await;
        let mut records = proposals.values().cloned().collect::<Vec<_>>();
        records.sort_by(|left, right| {
            (left.proposal.created_at, left.proposal.id)
                .cmp(&(right.proposal.created_at, right.proposal.id))
        });
        Ok(records)
    }
}

#[async_trait]
impl ProposalCommand for InMemoryWorkflowStore {
    async fn create_with_steps(
        &self,
        proposal: ProjectProposal,
        steps: Vec<ApprovalStep>,
    ) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;
        if title_taken(&proposals, &proposal) {
            return Err(StoreError::DuplicateTitle(proposal.title));
        }

        proposals.insert(proposal.id, ProposalRecord::new(proposal, steps));
        Ok(())
    }

    async fn update_fields(&self, proposal: &ProjectProposal) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;
        if title_taken(&proposals, proposal) {
            return Err(StoreError::DuplicateTitle(proposal.title.clone()));
        }

        let record = proposals
            .get_mut(&proposal.id)
            .filter(|record| record.proposal.status == ProposalStatus::ReturnedForRevision)
            .ok_or(StoreError::StaleWrite)?;
        record.proposal.title = proposal.title.clone();
        record.proposal.description = proposal.description.clone();
        record.proposal.estimated_duration = proposal.estimated_duration;
        Ok(())
    }

    async fn commit_revision(&self, commit: RevisionCommit) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;
        let record = proposals
            .get_mut(&commit.proposal_id)
            .filter(|record| record.proposal.status == commit.expected_status)
            .ok_or(StoreError::StaleWrite)?;

        if let Some(annotated) = commit.annotated_step {
            let step = record
                .steps
                .iter_mut()
                .find(|step| step.id == annotated.id && step.is_pending())
                .ok_or(StoreError::StaleWrite)?;
            step.observations = annotated.observations;
        }
        record.proposal.status = ProposalStatus::ReturnedForRevision;
        Ok(())
    }

    async fn commit_decision(&self, commit: DecisionCommit) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;
        let record = proposals
            .get_mut(&commit.proposal_id)
            .filter(|record| record.proposal.status == commit.expected_status)
            .ok_or(StoreError::StaleWrite)?;
        let step = record
            .steps
            .iter_mut()
            .find(|step| step.id == commit.step.id && step.is_pending())
            .ok_or(StoreError::StaleWrite)?;

        *step = commit.step;
        record.proposal.status = commit.next_status;
        Ok(())
    }
}

fn title_taken(proposals: &HashMap<ProposalId, ProposalRecord>, candidate: &ProjectProposal) -> bool {
    let key = candidate.title_key();
    proposals
        .values()
        .any(|record| record.proposal.id != candidate.id && record.proposal.title_key() == key)
}
