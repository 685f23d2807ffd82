//! Collaborator contracts the workflow consumes. Storage crates implement these; the
//! service only ever sees the traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::proposal::{ProjectProposal, ProposalId, ProposalRecord, ProposalStatus};
use crate::domain::reference::{AreaId, ProjectTypeId, ReferenceEntry};
use crate::domain::rule::ApprovalRule;
use crate::domain::step::ApprovalStep;
use crate::domain::user::{User, UserId};
use crate::views::ReferenceDirectory;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored data could not be decoded: {0}")]
    Decode(String),
    /// A guarded write matched no row because another writer got there first.
    #[error("guarded write matched no row")]
    StaleWrite,
    #[error("title `{0}` is already taken")]
    DuplicateTitle(String),
}

#[async_trait]
pub trait RuleQuery: Send + Sync {
    async fn all_rules(&self) -> Result<Vec<ApprovalRule>, StoreError>;
}

#[async_trait]
pub trait UserQuery: Send + Sync {
    async fn all_users(&self) -> Result<Vec<User>, StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn user_exists(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.find_user(id).await?.is_some())
    }
}

#[async_trait]
pub trait ReferenceQuery: Send + Sync {
    async fn find_area(&self, id: AreaId) -> Result<Option<ReferenceEntry>, StoreError>;
    async fn find_project_type(
        &self,
        id: ProjectTypeId,
    ) -> Result<Option<ReferenceEntry>, StoreError>;
    async fn status_exists(&self, id: i32) -> Result<bool, StoreError>;
    async fn directory(&self) -> Result<ReferenceDirectory, StoreError>;

    async fn area_exists(&self, id: AreaId) -> Result<bool, StoreError> {
        Ok(self.find_area(id).await?.is_some())
    }

    async fn project_type_exists(&self, id: ProjectTypeId) -> Result<bool, StoreError> {
        Ok(self.find_project_type(id).await?.is_some())
    }
}

#[async_trait]
pub trait ProposalQuery: Send + Sync {
    async fn find_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError>;
    /// Case-insensitive exact title match.
    async fn find_by_title(&self, title: &str) -> Result<Option<ProjectProposal>, StoreError>;
    async fn list_proposals(&self) -> Result<Vec<ProposalRecord>, StoreError>;
}

/// Committed as one unit: the decided step and the recomputed proposal status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionCommit {
    pub proposal_id: ProposalId,
    pub step: ApprovalStep,
    pub expected_status: ProposalStatus,
    pub next_status: ProposalStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionCommit {
    pub proposal_id: ProposalId,
    pub expected_status: ProposalStatus,
    /// The gating step, carrying the reviewer's observation. Its status is unchanged.
    pub annotated_step: Option<ApprovalStep>,
}

#[async_trait]
pub trait ProposalCommand: Send + Sync {
    /// Writes the proposal row and its generated steps atomically.
    async fn create_with_steps(
        &self,
        proposal: ProjectProposal,
        steps: Vec<ApprovalStep>,
    ) -> Result<(), StoreError>;

    /// Persists title, description and duration. Guarded on the proposal still being
    /// `ReturnedForRevision`.
    async fn update_fields(&self, proposal: &ProjectProposal) -> Result<(), StoreError>;

    /// Moves the proposal to `ReturnedForRevision`, guarded like `commit_decision`.
    async fn commit_revision(&self, commit: RevisionCommit) -> Result<(), StoreError>;

    /// Guarded on the step still being pending and the proposal still holding
    /// `expected_status`; otherwise `StaleWrite` and nothing is written.
    async fn commit_decision(&self, commit: DecisionCommit) -> Result<(), StoreError>;
}

pub trait WorkflowStore: RuleQuery + UserQuery + ReferenceQuery + ProposalQuery + ProposalCommand {}

impl<T> WorkflowStore for T where
    T: RuleQuery + UserQuery + ReferenceQuery + ProposalQuery + ProposalCommand
{
}
