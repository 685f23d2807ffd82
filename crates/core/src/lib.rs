pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod service;
pub mod views;
pub mod workflow;

pub use domain::proposal::{ProjectProposal, ProposalId, ProposalRecord, ProposalStatus};
pub use domain::rule::{ApprovalRule, RuleId};
pub use domain::step::{ApprovalStep, DecisionStatus, StepId, StepStatus};
pub use domain::user::{RoleId, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ports::{StoreError, WorkflowStore};
pub use service::ProposalService;
pub use workflow::{DecisionProcessor, RuleCatalog, RuleResolver, StepGenerator};
