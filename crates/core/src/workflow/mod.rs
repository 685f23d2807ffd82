//! Approval rule resolution and step workflow engine.
//!
//! Everything in here is pure: callers load rules, users and proposals from a store, run
//! them through these types, and commit the result as one unit.

pub mod approvers;
pub mod decision;
pub mod lifecycle;
pub mod rules;
pub mod steps;

pub use approvers::{ApproverAssignment, ApproverPool, ApproverResolver};
pub use decision::{DecisionOutcome, DecisionProcessor, StepDecision};
pub use lifecycle::ProposalLifecycle;
pub use rules::{ResolvedRules, RuleCatalog, RuleResolver, RuleSpecificity, RuleSubject};
pub use steps::{PlannedStep, StepGenerator};
