//! Proposal use cases: validation, workflow engine, and store commits.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::proposal::{
    title_key, ProjectProposal, ProposalId, ProposalRecord, ProposalStatus,
};
use crate::domain::reference::{AreaId, ProjectTypeId};
use crate::domain::step::StepId;
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, DomainError, ValidationFailure};
use crate::ports::{DecisionCommit, RevisionCommit, WorkflowStore};
use crate::views::{ProposalDetail, ProposalSummary, ReferenceDirectory};
use crate::workflow::{
    DecisionProcessor, PlannedStep, ProposalLifecycle, RuleCatalog, RuleSubject, StepDecision,
    StepGenerator,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub duration: i32,
    pub area: i32,
    #[serde(rename = "type")]
    pub project_type: i32,
    pub user: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFilters {
    pub title: Option<String>,
    pub status: Option<i32>,
    pub applicant: Option<i32>,
    pub approval_user: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalEdits {
    pub title: String,
    pub description: String,
    pub duration: i32,
}

/// Wire shape of a step decision; `id` addresses the step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub id: StepId,
    pub user: i32,
    pub status: i32,
    #[serde(default)]
    pub observation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub user: i32,
    #[serde(default)]
    pub observation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub amount: Decimal,
    pub area: i32,
    #[serde(rename = "type")]
    pub project_type: i32,
}

pub struct ProposalService<S> {
    store: Arc<S>,
}

impl<S> Clone for ProposalService<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: WorkflowStore> ProposalService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validates the submission, generates its approval steps and writes both at once.
    /// Nothing is written when any check fails.
    pub async fn create_proposal(
        &self,
        input: NewProposal,
        correlation_id: &str,
    ) -> Result<ProposalDetail, ApplicationError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ValidationFailure::EmptyTitle.into());
        }
        if self.store.find_by_title(title).await?.is_some() {
            return Err(ValidationFailure::DuplicateTitle { title: title.to_string() }.into());
        }
        let description = input.description.trim();
        if description.is_empty() {
            return Err(ValidationFailure::EmptyDescription.into());
        }
        if input.duration <= 0 {
            return Err(ValidationFailure::NonPositiveDuration.into());
        }
        if input.amount < Decimal::ZERO {
            return Err(ValidationFailure::NegativeAmount.into());
        }
        if !self.store.area_exists(AreaId(input.area)).await? {
            return Err(ValidationFailure::UnknownArea(input.area).into());
        }
        if !self.store.project_type_exists(ProjectTypeId(input.project_type)).await? {
            return Err(ValidationFailure::UnknownProjectType(input.project_type).into());
        }
        if !self.store.user_exists(UserId(input.user)).await? {
            return Err(ValidationFailure::UnknownUser(input.user).into());
        }

        let proposal = ProjectProposal {
            id: ProposalId::new(),
            title: title.to_string(),
            description: description.to_string(),
            estimated_amount: input.amount,
            estimated_duration: input.duration,
            area_id: AreaId(input.area),
            type_id: ProjectTypeId(input.project_type),
            created_by: UserId(input.user),
            created_at: Utc::now(),
            status: ProposalStatus::PendingApproval,
        };

        let catalog = RuleCatalog::new(self.store.all_rules().await?);
        let users = self.store.all_users().await?;
        let steps = StepGenerator::new(&catalog, &users).generate(&proposal);
        let unassigned = steps.iter().filter(|step| step.approver_user_id.is_none()).count();

        self.store.create_with_steps(proposal.clone(), steps.clone()).await?;

        info!(
            event_name = "workflow.proposal.created",
            correlation_id = %correlation_id,
            proposal_id = %proposal.id,
            step_count = steps.len(),
            unassigned_steps = unassigned,
            "proposal submitted for approval"
        );
        if steps.is_empty() {
            warn!(
                event_name = "workflow.proposal.no_matching_rules",
                correlation_id = %correlation_id,
                proposal_id = %proposal.id,
                "no approval rule matched; proposal will stay pending"
            );
        }

        self.render(&ProposalRecord::new(proposal, steps)).await
    }

    /// Filters combine with AND. Every numeric filter is checked before any proposal is read.
    pub async fn list_proposals(
        &self,
        filters: ProposalFilters,
        correlation_id: &str,
    ) -> Result<Vec<ProposalSummary>, ApplicationError> {
        if let Some(status) = filters.status {
            if status <= 0 || !self.store.status_exists(status).await? {
                return Err(ValidationFailure::InvalidFilter { parameter: "status" }.into());
            }
        }
        if let Some(applicant) = filters.applicant {
            if applicant <= 0 || !self.store.user_exists(UserId(applicant)).await? {
                return Err(ValidationFailure::InvalidFilter { parameter: "applicant" }.into());
            }
        }
        if let Some(approver) = filters.approval_user {
            if approver <= 0 || !self.store.user_exists(UserId(approver)).await? {
                return Err(ValidationFailure::InvalidFilter { parameter: "approvalUser" }.into());
            }
        }

        let needle = filters
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(title_key);

        let records = self.store.list_proposals().await?;
        let directory = self.store.directory().await?;
        let summaries = records
            .iter()
            .filter(|record| {
                needle
                    .as_deref()
                    .map_or(true, |needle| record.proposal.title_key().contains(needle))
            })
            .filter(|record| {
                filters.status.map_or(true, |status| record.proposal.status.id() == status)
            })
            .filter(|record| {
                filters.applicant.map_or(true, |applicant| record.proposal.created_by.0 == applicant)
            })
            .filter(|record| {
                filters.approval_user.map_or(true, |approver| record.has_approver(UserId(approver)))
            })
            .map(|record| directory.summary(record))
            .collect::<Vec<_>>();

        info!(
            event_name = "workflow.proposal.listed",
            correlation_id = %correlation_id,
            result_count = summaries.len(),
            "proposals listed"
        );

        Ok(summaries)
    }

    pub async fn get_proposal(
        &self,
        id: ProposalId,
        correlation_id: &str,
    ) -> Result<ProposalDetail, ApplicationError> {
        let record = self.load(id).await?;
        info!(
            event_name = "workflow.proposal.fetched",
            correlation_id = %correlation_id,
            proposal_id = %id,
            "proposal fetched"
        );
        self.render(&record).await
    }

    /// Applies one approver decision and the resulting proposal status in one commit.
    pub async fn decide_step(
        &self,
        id: ProposalId,
        request: DecisionRequest,
        correlation_id: &str,
    ) -> Result<ProposalDetail, ApplicationError> {
        let record = self.store.find_proposal(id).await?;
        let acting_user = UserId(request.user);
        let acting_user_known = self.store.user_exists(acting_user).await?;
        let decision = StepDecision {
            step_id: request.id,
            acting_user,
            status: request.status,
            observation: request.observation,
        };

        let outcome = DecisionProcessor::decide(
            id,
            record.as_ref(),
            &decision,
            acting_user_known,
            Utc::now(),
        )
        .map_err(|error| {
            warn!(
                event_name = "workflow.step.decision_rejected",
                correlation_id = %correlation_id,
                proposal_id = %id,
                step_id = %decision.step_id,
                error = %error,
                "step decision refused"
            );
            error
        })?;

        self.store
            .commit_decision(DecisionCommit {
                proposal_id: id,
                step: outcome.step.clone(),
                expected_status: outcome.previous_status,
                next_status: outcome.proposal_status,
            })
            .await?;

        info!(
            event_name = "workflow.step.decided",
            correlation_id = %correlation_id,
            proposal_id = %id,
            step_id = %outcome.step.id,
            step_order = outcome.step.step_order,
            step_status = outcome.step.status.label(),
            proposal_status = outcome.proposal_status.label(),
            "approval step decided"
        );

        let Some(mut record) = record else {
            return Err(DomainError::ProposalNotFound(id).into());
        };
        record.proposal.status = outcome.proposal_status;
        if let Some(step) = record.steps.iter_mut().find(|step| step.id == outcome.step.id) {
            *step = outcome.step;
        }
        self.render(&record).await
    }

    /// Edits are only accepted while the proposal is returned for revision. The status and
    /// the existing steps stay as they are.
    pub async fn update_proposal(
        &self,
        id: ProposalId,
        edits: ProposalEdits,
        correlation_id: &str,
    ) -> Result<ProposalDetail, ApplicationError> {
        let mut record = self.load(id).await?;
        ProposalLifecycle::ensure_editable(&record.proposal)?;

        let title = edits.title.trim();
        if title.is_empty() {
            return Err(ValidationFailure::EmptyTitle.into());
        }
        let description = edits.description.trim();
        if description.is_empty() {
            return Err(ValidationFailure::EmptyDescription.into());
        }
        if edits.duration <= 0 {
            return Err(ValidationFailure::NonPositiveDuration.into());
        }
        if let Some(existing) = self.store.find_by_title(title).await? {
            if existing.id != id {
                return Err(ValidationFailure::DuplicateTitle { title: title.to_string() }.into());
            }
        }

        record.proposal.title = title.to_string();
        record.proposal.description = description.to_string();
        record.proposal.estimated_duration = edits.duration;
        self.store.update_fields(&record.proposal).await?;

        info!(
            event_name = "workflow.proposal.updated",
            correlation_id = %correlation_id,
            proposal_id = %id,
            "proposal edited"
        );

        self.render(&record).await
    }

    /// Sends a pending proposal back to its applicant. The reviewer's note lands on the
    /// step currently gating the workflow.
    pub async fn return_for_revision(
        &self,
        id: ProposalId,
        request: ReturnRequest,
        correlation_id: &str,
    ) -> Result<ProposalDetail, ApplicationError> {
        let mut record = self.load(id).await?;
        ProposalLifecycle::ensure_accepts_decisions(&record.proposal)?;
        if !self.store.user_exists(UserId(request.user)).await? {
            return Err(ValidationFailure::UnknownUser(request.user).into());
        }

        let expected_status = record.proposal.status;
        record.proposal.transition_to(ProposalStatus::ReturnedForRevision)?;

        let note = request
            .observation
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(ProposalStatus::ReturnedForRevision.label())
            .to_string();
        let annotated_step = ProposalLifecycle::gating_step(&record.steps).map(|step| {
            let mut step = step.clone();
            step.observations = note.clone();
            step
        });

        self.store
            .commit_revision(RevisionCommit {
                proposal_id: id,
                expected_status,
                annotated_step: annotated_step.clone(),
            })
            .await?;

        info!(
            event_name = "workflow.proposal.returned",
            correlation_id = %correlation_id,
            proposal_id = %id,
            returned_by = request.user,
            "proposal returned for revision"
        );

        if let Some(annotated) = annotated_step {
            if let Some(step) = record.steps.iter_mut().find(|step| step.id == annotated.id) {
                *step = annotated;
            }
        }
        self.render(&record).await
    }

    /// Steps a proposal with these attributes would receive. Nothing is written.
    pub async fn preview_steps(
        &self,
        request: PreviewRequest,
        correlation_id: &str,
    ) -> Result<Vec<PlannedStep>, ApplicationError> {
        if request.amount < Decimal::ZERO {
            return Err(ValidationFailure::NegativeAmount.into());
        }
        if !self.store.area_exists(AreaId(request.area)).await? {
            return Err(ValidationFailure::UnknownArea(request.area).into());
        }
        if !self.store.project_type_exists(ProjectTypeId(request.project_type)).await? {
            return Err(ValidationFailure::UnknownProjectType(request.project_type).into());
        }

        let catalog = RuleCatalog::new(self.store.all_rules().await?);
        let users = self.store.all_users().await?;
        let plan = StepGenerator::new(&catalog, &users).plan(&RuleSubject {
            amount: request.amount,
            area: AreaId(request.area),
            project_type: ProjectTypeId(request.project_type),
        });

        info!(
            event_name = "workflow.steps.previewed",
            correlation_id = %correlation_id,
            step_count = plan.len(),
            "approval steps previewed"
        );

        Ok(plan)
    }

    pub async fn reference_directory(&self) -> Result<ReferenceDirectory, ApplicationError> {
        Ok(self.store.directory().await?)
    }

    async fn load(&self, id: ProposalId) -> Result<ProposalRecord, ApplicationError> {
        self.store
            .find_proposal(id)
            .await?
            .ok_or_else(|| DomainError::ProposalNotFound(id).into())
    }

    async fn render(&self, record: &ProposalRecord) -> Result<ProposalDetail, ApplicationError> {
        Ok(self.store.directory().await?.detail(record))
    }
}
