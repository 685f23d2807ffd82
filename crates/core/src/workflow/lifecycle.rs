use crate::domain::proposal::{ProjectProposal, ProposalStatus};
use crate::domain::step::{ApprovalStep, StepStatus};
use crate::errors::ConflictReason;

/// Proposal status state machine and the rules derived from it.
pub struct ProposalLifecycle;

impl ProposalLifecycle {
    /// Status implied by the step outcomes. A single rejection is final; approval needs
    /// every step approved. Anything else keeps the current status.
    pub fn aggregate(current: ProposalStatus, steps: &[ApprovalStep]) -> ProposalStatus {
        if steps.iter().any(|step| step.status == StepStatus::Rejected) {
            return ProposalStatus::Rejected;
        }

        if !steps.is_empty() && steps.iter().all(|step| step.status == StepStatus::Approved) {
            return ProposalStatus::Approved;
        }

        current
    }

    pub fn ensure_accepts_decisions(proposal: &ProjectProposal) -> Result<(), ConflictReason> {
        match proposal.status {
            ProposalStatus::PendingApproval => Ok(()),
            status => Err(ConflictReason::ProposalNotPending { status }),
        }
    }

    pub fn ensure_editable(proposal: &ProjectProposal) -> Result<(), ConflictReason> {
        match proposal.status {
            ProposalStatus::ReturnedForRevision => Ok(()),
            status => Err(ConflictReason::ProposalNotEditable { status }),
        }
    }

    /// The lowest-ordered pending step; the only one that may currently be acted on.
    pub fn gating_step(steps: &[ApprovalStep]) -> Option<&ApprovalStep> {
        steps.iter().filter(|step| step.is_pending()).min_by_key(|step| step.step_order)
    }
}
