use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::proposal::{ProposalId, ProposalRecord, ProposalStatus};
use crate::domain::step::{ApprovalStep, DecisionStatus, StepId, StepStatus};
use crate::domain::user::UserId;
use crate::errors::{ConflictReason, DomainError, ValidationFailure};
use crate::workflow::lifecycle::ProposalLifecycle;

/// An approver's verdict on one step. `status` is the raw status id as submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDecision {
    pub step_id: StepId,
    pub acting_user: UserId,
    pub status: i32,
    pub observation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub step: ApprovalStep,
    pub previous_status: ProposalStatus,
    pub proposal_status: ProposalStatus,
}

pub struct DecisionProcessor;

impl DecisionProcessor {
    /// Checks every precondition against the loaded record and returns the decided step
    /// plus the recomputed proposal status. The record itself is left untouched.
    pub fn decide(
        proposal_id: ProposalId,
        record: Option<&ProposalRecord>,
        decision: &StepDecision,
        acting_user_known: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DomainError> {
        let record = record.ok_or(DomainError::ProposalNotFound(proposal_id))?;
        ProposalLifecycle::ensure_accepts_decisions(&record.proposal)?;

        let step = record
            .steps
            .iter()
            .find(|step| step.id == decision.step_id)
            .ok_or(ConflictReason::UnknownStep { step_id: decision.step_id })?;

        if !step.is_pending() {
            return Err(ConflictReason::StepAlreadyDecided {
                step_order: step.step_order,
                status: step.status,
            }
            .into());
        }

        if let Some(blocking_order) = record
            .steps
            .iter()
            .filter(|other| other.step_order < step.step_order)
            .filter(|other| other.status != StepStatus::Approved)
            .map(|other| other.step_order)
            .min()
        {
            return Err(ConflictReason::OutOfSequence {
                step_order: step.step_order,
                blocking_order,
            }
            .into());
        }

        let verdict = DecisionStatus::from_id(decision.status)
            .ok_or(ValidationFailure::InvalidDecisionStatus(decision.status))?;
        if !acting_user_known {
            return Err(ValidationFailure::UnknownUser(decision.acting_user.0).into());
        }

        let mut decided = step.clone();
        decided.status = verdict.step_status();
        decided.decision_date = Some(decided_at);
        decided.decided_by = Some(decision.acting_user);
        decided.observations = decision
            .observation
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(verdict.step_status().label())
            .to_string();

        let steps_after = record
            .steps
            .iter()
            .map(|other| if other.id == decided.id { decided.clone() } else { other.clone() })
            .collect::<Vec<_>>();
        let proposal_status = ProposalLifecycle::aggregate(record.proposal.status, &steps_after);

        Ok(DecisionOutcome { step: decided, previous_status: record.proposal.status, proposal_status })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::proposal::{ProjectProposal, ProposalId, ProposalRecord, ProposalStatus};
    use crate::domain::reference::{AreaId, ProjectTypeId};
    use crate::domain::step::{ApprovalStep, StepId, StepStatus};
    use crate::domain::user::{RoleId, UserId};
    use crate::errors::{ConflictReason, DomainError, ValidationFailure};

    use super::{DecisionProcessor, StepDecision};

    const APPROVED: i32 = 2;
    const REJECTED: i32 = 3;

    fn record(orders: &[u32]) -> ProposalRecord {
        let proposal = ProjectProposal {
            id: ProposalId::new(),
            title: "Plant expansion".to_string(),
            description: "Second production line".to_string(),
            estimated_amount: Decimal::new(250_000, 0),
            estimated_duration: 180,
            area_id: AreaId(2),
            type_id: ProjectTypeId(1),
            created_by: UserId(1),
            created_at: Utc::now(),
            status: ProposalStatus::PendingApproval,
        };
        let steps = orders
            .iter()
            .map(|order| ApprovalStep {
                id: StepId::new(),
                proposal_id: proposal.id,
                approver_role_id: RoleId(*order as i32),
                approver_user_id: Some(UserId(10 + *order as i32)),
                step_order: *order,
                status: StepStatus::Pending,
                observations: "Pending".to_string(),
                decision_date: None,
                decided_by: None,
            })
            .collect();
        ProposalRecord::new(proposal, steps)
    }

    fn decision(step: &ApprovalStep, status: i32) -> StepDecision {
        StepDecision {
            step_id: step.id,
            acting_user: UserId(11),
            status,
            observation: Some("Looks fine".to_string()),
        }
    }

    fn apply(record: &mut ProposalRecord, decision: &StepDecision) -> Result<(), DomainError> {
        let outcome = DecisionProcessor::decide(
            record.proposal.id,
            Some(record),
            decision,
            true,
            Utc::now(),
        )?;
        for step in &mut record.steps {
            if step.id == outcome.step.id {
                *step = outcome.step.clone();
            }
        }
        record.proposal.status = outcome.proposal_status;
        Ok(())
    }

    #[test]
    fn missing_proposal_is_not_found() {
        let record = record(&[1]);
        let missing = ProposalId::new();
        let error = DecisionProcessor::decide(
            missing,
            None,
            &decision(&record.steps[0], APPROVED),
            true,
            Utc::now(),
        )
        .expect_err("missing proposal");

        assert_eq!(error, DomainError::ProposalNotFound(missing));
    }

    #[test]
    fn deciding_out_of_order_is_a_conflict() {
        let record = record(&[1, 2]);
        let error = DecisionProcessor::decide(
            record.proposal.id,
            Some(&record),
            &decision(&record.steps[1], APPROVED),
            true,
            Utc::now(),
        )
        .expect_err("step 2 before step 1");

        assert_eq!(
            error,
            DomainError::Conflict(ConflictReason::OutOfSequence { step_order: 2, blocking_order: 1 })
        );
    }

    #[test]
    fn lowest_present_order_is_never_gated() {
        let record = record(&[3, 5]);
        let outcome = DecisionProcessor::decide(
            record.proposal.id,
            Some(&record),
            &decision(&record.steps[0], APPROVED),
            true,
            Utc::now(),
        )
        .expect("step 3 is first");

        assert_eq!(outcome.step.status, StepStatus::Approved);
        assert_eq!(outcome.step.decided_by, Some(UserId(11)));
        assert!(outcome.step.decision_date.is_some());
        assert_eq!(outcome.step.observations, "Looks fine");
        assert_eq!(outcome.proposal_status, ProposalStatus::PendingApproval);
    }

    #[test]
    fn approving_every_step_approves_the_proposal() {
        let mut record = record(&[1, 2]);
        let first = decision(&record.steps[0], APPROVED);
        let second = decision(&record.steps[1], APPROVED);

        apply(&mut record, &first).expect("approve step 1");
        assert_eq!(record.proposal.status, ProposalStatus::PendingApproval);
        apply(&mut record, &second).expect("approve step 2");
        assert_eq!(record.proposal.status, ProposalStatus::Approved);
    }

    #[test]
    fn rejection_finalizes_and_blocks_further_decisions() {
        let mut record = record(&[1, 2]);
        let reject_first = decision(&record.steps[0], REJECTED);
        let approve_second = decision(&record.steps[1], APPROVED);

        apply(&mut record, &reject_first).expect("reject step 1");
        assert_eq!(record.proposal.status, ProposalStatus::Rejected);

        let error = apply(&mut record, &approve_second).expect_err("proposal is final");
        assert_eq!(
            error,
            DomainError::Conflict(ConflictReason::ProposalNotPending {
                status: ProposalStatus::Rejected
            })
        );
    }

    #[test]
    fn already_decided_step_is_a_conflict() {
        let mut record = record(&[1, 2]);
        let first = decision(&record.steps[0], APPROVED);
        apply(&mut record, &first).expect("approve step 1");

        let error = apply(&mut record, &first).expect_err("decided twice");
        assert!(matches!(
            error,
            DomainError::Conflict(ConflictReason::StepAlreadyDecided { step_order: 1, .. })
        ));
    }

    #[test]
    fn unknown_step_is_a_conflict() {
        let record = record(&[1]);
        let mut foreign = decision(&record.steps[0], APPROVED);
        foreign.step_id = StepId::new();

        let error = DecisionProcessor::decide(
            record.proposal.id,
            Some(&record),
            &foreign,
            true,
            Utc::now(),
        )
        .expect_err("step from elsewhere");
        assert!(matches!(error, DomainError::Conflict(ConflictReason::UnknownStep { .. })));
    }

    #[test]
    fn non_terminal_status_is_invalid_decision_data() {
        let record = record(&[1]);
        for status in [0, 1, 4, 99] {
            let error = DecisionProcessor::decide(
                record.proposal.id,
                Some(&record),
                &decision(&record.steps[0], status),
                true,
                Utc::now(),
            )
            .expect_err("not approved or rejected");
            assert_eq!(
                error,
                DomainError::Validation(ValidationFailure::InvalidDecisionStatus(status))
            );
        }
    }

    #[test]
    fn unknown_acting_user_is_invalid_decision_data() {
        let record = record(&[1]);
        let error = DecisionProcessor::decide(
            record.proposal.id,
            Some(&record),
            &decision(&record.steps[0], APPROVED),
            false,
            Utc::now(),
        )
        .expect_err("unknown user");
        assert_eq!(error, DomainError::Validation(ValidationFailure::UnknownUser(11)));
    }

    #[test]
    fn blank_observation_defaults_to_status_label() {
        let record = record(&[1]);
        let mut blank = decision(&record.steps[0], REJECTED);
        blank.observation = Some("   ".to_string());

        let outcome = DecisionProcessor::decide(
            record.proposal.id,
            Some(&record),
            &blank,
            true,
            Utc::now(),
        )
        .expect("reject");
        assert_eq!(outcome.step.observations, "Rejected");
        assert_eq!(outcome.previous_status, ProposalStatus::PendingApproval);
        assert_eq!(outcome.proposal_status, ProposalStatus::Rejected);
    }
}
