use serde::{Deserialize, Serialize};

use crate::domain::proposal::ProjectProposal;
use crate::domain::rule::RuleId;
use crate::domain::step::{ApprovalStep, StepId, StepStatus};
use crate::domain::user::{RoleId, User};
use crate::workflow::approvers::{ApproverAssignment, ApproverResolver};
use crate::workflow::rules::{RuleCatalog, RuleSubject};

/// A step the catalog would require, before it is attached to a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step_order: u32,
    pub rule_id: RuleId,
    pub approver_role_id: RoleId,
    pub assignment: ApproverAssignment,
}

pub struct StepGenerator<'a> {
    catalog: &'a RuleCatalog,
    users: &'a [User],
}

impl<'a> StepGenerator<'a> {
    pub fn new(catalog: &'a RuleCatalog, users: &'a [User]) -> Self {
        Self { catalog, users }
    }

    pub fn plan(&self, subject: &RuleSubject) -> Vec<PlannedStep> {
        let approvers = ApproverResolver::new(self.users);

        self.catalog
            .resolve(subject)
            .into_iter()
            .map(|(step_order, rule)| PlannedStep {
                step_order,
                rule_id: rule.id,
                approver_role_id: rule.approver_role_id,
                assignment: approvers.resolve(rule),
            })
            .collect()
    }

    /// Initial pending steps for a new proposal, ascending by step order.
    pub fn generate(&self, proposal: &ProjectProposal) -> Vec<ApprovalStep> {
        let subject = RuleSubject {
            amount: proposal.estimated_amount,
            area: proposal.area_id,
            project_type: proposal.type_id,
        };

        self.plan(&subject)
            .into_iter()
            .map(|planned| ApprovalStep {
                id: StepId::new(),
                proposal_id: proposal.id,
                approver_role_id: planned.approver_role_id,
                approver_user_id: planned.assignment.approver(),
                step_order: planned.step_order,
                status: StepStatus::Pending,
                observations: planned.assignment.observation().to_string(),
                decision_date: None,
                decided_by: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::proposal::{ProjectProposal, ProposalId, ProposalStatus};
    use crate::domain::reference::{AreaId, ProjectTypeId};
    use crate::domain::rule::{ApprovalRule, RuleId};
    use crate::domain::step::StepStatus;
    use crate::domain::user::{RoleId, User, UserId};
    use crate::workflow::rules::RuleCatalog;

    use super::StepGenerator;

    fn proposal(amount: i64) -> ProjectProposal {
        ProjectProposal {
            id: ProposalId::new(),
            title: "ERP upgrade".to_string(),
            description: "Move finance to the new ERP".to_string(),
            estimated_amount: Decimal::new(amount, 0),
            estimated_duration: 90,
            area_id: AreaId(1),
            type_id: ProjectTypeId(2),
            created_by: UserId(1),
            created_at: Utc::now(),
            status: ProposalStatus::PendingApproval,
        }
    }

    fn rule(id: i32, order: u32, min: i64, max: i64, area: Option<i32>, role: i32) -> ApprovalRule {
        ApprovalRule {
            id: RuleId(id),
            min_amount: Decimal::new(min, 0),
            max_amount: Some(Decimal::new(max, 0)),
            area: area.map(AreaId),
            project_type: None,
            approver_role_id: RoleId(role),
            step_order: order,
        }
    }

    fn users() -> Vec<User> {
        [(1, 1), (2, 2), (3, 3), (4, 3)]
            .into_iter()
            .map(|(id, role)| User {
                id: UserId(id),
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
                role_id: RoleId(role),
            })
            .collect()
    }

    #[test]
    fn generates_pending_steps_in_ascending_order() {
        let catalog = RuleCatalog::new(vec![
            rule(1, 3, 0, 0, None, 3),
            rule(2, 1, 0, 0, None, 2),
            rule(3, 2, 0, 0, Some(1), 9),
        ]);
        let users = users();
        let proposal = proposal(5_000);

        let steps = StepGenerator::new(&catalog, &users).generate(&proposal);

        assert_eq!(steps.iter().map(|step| step.step_order).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(steps.iter().all(|step| step.status == StepStatus::Pending));
        assert!(steps.iter().all(|step| step.decision_date.is_none()));
        assert!(steps.iter().all(|step| step.proposal_id == proposal.id));

        assert_eq!(steps[0].approver_user_id, Some(UserId(2)));
        assert_eq!(steps[0].observations, "Pending");
        // role 9 has no holder, role 3 has two
        assert_eq!(steps[1].approver_user_id, None);
        assert_eq!(steps[1].observations, "Pending (no user assigned)");
        assert_eq!(steps[2].approver_user_id, None);
        assert_eq!(steps[2].approver_role_id, RoleId(3));

        let ids = steps.iter().map(|step| step.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), steps.len());
    }

    #[test]
    fn only_matched_orders_produce_steps() {
        let catalog = RuleCatalog::new(vec![
            rule(1, 1, 0, 1_000, None, 1),
            rule(2, 2, 1_001, 0, None, 2),
            rule(3, 3, 0, 0, Some(5), 3),
        ]);
        let users = users();

        let small = StepGenerator::new(&catalog, &users).generate(&proposal(500));
        let large = StepGenerator::new(&catalog, &users).generate(&proposal(50_000));

        assert_eq!(small.iter().map(|step| step.step_order).collect::<Vec<_>>(), vec![1]);
        assert_eq!(large.iter().map(|step| step.step_order).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn plan_reports_rule_and_assignment_per_order() {
        let catalog = RuleCatalog::new(vec![rule(7, 1, 0, 0, Some(1), 2)]);
        let users = users();
        let subject = crate::workflow::rules::RuleSubject {
            amount: Decimal::new(10, 0),
            area: AreaId(1),
            project_type: ProjectTypeId(2),
        };

        let plan = StepGenerator::new(&catalog, &users).plan(&subject);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].rule_id, RuleId(7));
        assert_eq!(plan[0].assignment.approver(), Some(UserId(2)));
    }
}
