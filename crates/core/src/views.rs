//! Read models returned to API clients, joined with reference names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::proposal::{ProposalId, ProposalRecord};
use crate::domain::reference::ReferenceEntry;
use crate::domain::step::{ApprovalStep, StepId};
use crate::domain::user::{RoleId, User, UserId};

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: NamedRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: StepId,
    pub step_order: u32,
    pub decision_date: Option<DateTime<Utc>>,
    pub observations: String,
    pub approver_role: NamedRef,
    pub approver_user: Option<UserView>,
    pub decided_by: Option<UserView>,
    pub status: NamedRef,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub duration: i32,
    pub created_at: DateTime<Utc>,
    pub user: UserView,
    pub area: NamedRef,
    pub status: NamedRef,
    #[serde(rename = "type")]
    pub project_type: NamedRef,
    pub steps: Vec<StepView>,
}

/// List entry. Reference fields carry names only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub duration: i32,
    pub area: String,
    pub status: String,
    #[serde(rename = "type")]
    pub project_type: String,
}

/// Every id→name map needed to render proposals. Loaded once per request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDirectory {
    pub areas: BTreeMap<i32, String>,
    pub project_types: BTreeMap<i32, String>,
    pub roles: BTreeMap<i32, String>,
    pub statuses: BTreeMap<i32, String>,
    pub users: BTreeMap<UserId, User>,
}

impl ReferenceDirectory {
    pub fn area(&self, id: i32) -> NamedRef {
        named(&self.areas, id)
    }

    pub fn project_type(&self, id: i32) -> NamedRef {
        named(&self.project_types, id)
    }

    pub fn role(&self, id: RoleId) -> NamedRef {
        named(&self.roles, id.0)
    }

    pub fn status(&self, id: i32) -> NamedRef {
        named(&self.statuses, id)
    }

    pub fn user(&self, id: UserId) -> UserView {
        match self.users.get(&id) {
            Some(user) => UserView {
                id: user.id.0,
                name: user.name.clone(),
                email: user.email.clone(),
                role: self.role(user.role_id),
            },
            None => UserView {
                id: id.0,
                name: UNKNOWN_NAME.to_string(),
                email: String::new(),
                role: NamedRef { id: 0, name: UNKNOWN_NAME.to_string() },
            },
        }
    }

    pub fn area_list(&self) -> Vec<ReferenceEntry> {
        entries(&self.areas)
    }

    pub fn project_type_list(&self) -> Vec<ReferenceEntry> {
        entries(&self.project_types)
    }

    pub fn role_list(&self) -> Vec<ReferenceEntry> {
        entries(&self.roles)
    }

    pub fn status_list(&self) -> Vec<ReferenceEntry> {
        entries(&self.statuses)
    }

    pub fn user_list(&self) -> Vec<UserView> {
        self.users.keys().map(|id| self.user(*id)).collect()
    }

    pub fn step_view(&self, step: &ApprovalStep) -> StepView {
        StepView {
            id: step.id,
            step_order: step.step_order,
            decision_date: step.decision_date,
            observations: step.observations.clone(),
            approver_role: self.role(step.approver_role_id),
            approver_user: step.approver_user_id.map(|id| self.user(id)),
            decided_by: step.decided_by.map(|id| self.user(id)),
            status: self.status(step.status.id()),
        }
    }

    pub fn detail(&self, record: &ProposalRecord) -> ProposalDetail {
        let proposal = &record.proposal;
        ProposalDetail {
            id: proposal.id,
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            amount: proposal.estimated_amount,
            duration: proposal.estimated_duration,
            created_at: proposal.created_at,
            user: self.user(proposal.created_by),
            area: self.area(proposal.area_id.0),
            status: self.status(proposal.status.id()),
            project_type: self.project_type(proposal.type_id.0),
            steps: record.steps.iter().map(|step| self.step_view(step)).collect(),
        }
    }

    pub fn summary(&self, record: &ProposalRecord) -> ProposalSummary {
        let proposal = &record.proposal;
        ProposalSummary {
            id: proposal.id,
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            amount: proposal.estimated_amount,
            duration: proposal.estimated_duration,
            area: self.area(proposal.area_id.0).name,
            status: self.status(proposal.status.id()).name,
            project_type: self.project_type(proposal.type_id.0).name,
        }
    }
}

fn named(map: &BTreeMap<i32, String>, id: i32) -> NamedRef {
    NamedRef { id, name: map.get(&id).cloned().unwrap_or_else(|| UNKNOWN_NAME.to_string()) }
}

fn entries(map: &BTreeMap<i32, String>) -> Vec<ReferenceEntry> {
    map.iter().map(|(id, name)| ReferenceEntry::new(*id, name.clone())).collect()
}
