use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reference::{AreaId, ProjectTypeId};
use crate::domain::step::ApprovalStep;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Overall proposal status. Ids match the `approval_status` reference table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    PendingApproval,
    Approved,
    Rejected,
    ReturnedForRevision,
}

impl ProposalStatus {
    pub const fn id(self) -> i32 {
        match self {
            Self::PendingApproval => 1,
            Self::Approved => 2,
            Self::Rejected => 3,
            Self::ReturnedForRevision => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::PendingApproval),
            2 => Some(Self::Approved),
            3 => Some(Self::Rejected),
            4 => Some(Self::ReturnedForRevision),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingApproval => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::ReturnedForRevision => "Observed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectProposal {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub estimated_amount: Decimal,
    pub estimated_duration: i32,
    pub area_id: AreaId,
    pub type_id: ProjectTypeId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub status: ProposalStatus,
}

/// Case-folded form of a title. Uniqueness and title search compare these keys.
pub fn title_key(title: &str) -> String {
    title.to_lowercase()
}

impl ProjectProposal {
    pub fn title_key(&self) -> String {
        title_key(&self.title)
    }

    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self.status, next),
            (ProposalStatus::PendingApproval, ProposalStatus::Approved)
                | (ProposalStatus::PendingApproval, ProposalStatus::Rejected)
                | (ProposalStatus::PendingApproval, ProposalStatus::ReturnedForRevision)
        )
    }

    pub fn transition_to(&mut self, next: ProposalStatus) -> Result<(), DomainError> {
        if self.status == next {
            return Ok(());
        }

        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidProposalTransition { from: self.status, to: next })
    }
}

/// A proposal together with its approval steps, ordered by step order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal: ProjectProposal,
    pub steps: Vec<ApprovalStep>,
}

impl ProposalRecord {
    pub fn new(proposal: ProjectProposal, mut steps: Vec<ApprovalStep>) -> Self {
        steps.sort_by_key(|step| step.step_order);
        Self { proposal, steps }
    }

    pub fn has_approver(&self, user_id: UserId) -> bool {
        self.steps.iter().any(|step| step.approver_user_id == Some(user_id))
    }
}
