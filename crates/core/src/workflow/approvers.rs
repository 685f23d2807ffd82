use serde::{Deserialize, Serialize};

use crate::domain::rule::ApprovalRule;
use crate::domain::user::{User, UserId};

pub const ASSIGNED_OBSERVATION: &str = "Pending";
pub const UNASSIGNED_OBSERVATION: &str = "Pending (no user assigned)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverPool {
    Empty,
    /// Several users hold the role; any of them may act on the step.
    Ambiguous { candidates: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApproverAssignment {
    Assigned { user_id: UserId },
    Unassigned { pool: ApproverPool },
}

impl ApproverAssignment {
    pub fn approver(&self) -> Option<UserId> {
        match self {
            Self::Assigned { user_id } => Some(*user_id),
            Self::Unassigned { .. } => None,
        }
    }

    pub fn observation(&self) -> &'static str {
        match self {
            Self::Assigned { .. } => ASSIGNED_OBSERVATION,
            Self::Unassigned { .. } => UNASSIGNED_OBSERVATION,
        }
    }
}

/// Matches a rule's approver role against the user roster.
#[derive(Clone, Copy, Debug)]
pub struct ApproverResolver<'a> {
    users: &'a [User],
}

impl<'a> ApproverResolver<'a> {
    pub fn new(users: &'a [User]) -> Self {
        Self { users }
    }

    pub fn resolve(&self, rule: &ApprovalRule) -> ApproverAssignment {
        let mut holders = self.users.iter().filter(|user| user.role_id == rule.approver_role_id);

        match (holders.next(), holders.count()) {
            (None, _) => ApproverAssignment::Unassigned { pool: ApproverPool::Empty },
            (Some(user), 0) => ApproverAssignment::Assigned { user_id: user.id },
            (Some(_), rest) => ApproverAssignment::Unassigned {
                pool: ApproverPool::Ambiguous { candidates: rest + 1 },
            },
        }
    }
}
