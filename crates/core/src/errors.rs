use thiserror::Error;

use crate::domain::proposal::{ProposalId, ProposalStatus};
use crate::domain::step::{StepId, StepStatus};
use crate::ports::StoreError;

/// Caller-fixable input problems. Each precondition has its own variant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("project title is required")]
    EmptyTitle,
    #[error("project title `{title}` already exists")]
    DuplicateTitle { title: String },
    #[error("project description is required")]
    EmptyDescription,
    #[error("estimated duration must be greater than zero")]
    NonPositiveDuration,
    #[error("estimated amount must not be negative")]
    NegativeAmount,
    #[error("unknown area `{0}`")]
    UnknownArea(i32),
    #[error("unknown project type `{0}`")]
    UnknownProjectType(i32),
    #[error("unknown user `{0}`")]
    UnknownUser(i32),
    #[error("invalid query parameter `{parameter}`")]
    InvalidFilter { parameter: &'static str },
    #[error("decision status `{0}` is not valid; expected Approved (2) or Rejected (3)")]
    InvalidDecisionStatus(i32),
}

/// State-based rejections of otherwise well-formed requests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConflictReason {
    #[error("proposal is {status:?} and does not accept decisions")]
    ProposalNotPending { status: ProposalStatus },
    #[error("proposal is {status:?}; only proposals returned for revision can be edited")]
    ProposalNotEditable { status: ProposalStatus },
    #[error("step `{step_id}` does not belong to this proposal")]
    UnknownStep { step_id: StepId },
    #[error("step {step_order} was already decided ({status:?})")]
    StepAlreadyDecided { step_order: u32, status: StepStatus },
    #[error("step {step_order} cannot be decided before step {blocking_order} is approved")]
    OutOfSequence { step_order: u32, blocking_order: u32 },
    #[error("proposal changed concurrently; reload and retry")]
    StaleState,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid proposal transition from {from:?} to {to:?}")]
    InvalidProposalTransition { from: ProposalStatus, to: ProposalStatus },
    #[error("proposal `{0}` was not found")]
    ProposalNotFound(ProposalId),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Conflict(#[from] ConflictReason),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<ValidationFailure> for ApplicationError {
    fn from(value: ValidationFailure) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

impl From<ConflictReason> for ApplicationError {
    fn from(value: ConflictReason) -> Self {
        Self::Domain(DomainError::Conflict(value))
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::StaleWrite => ConflictReason::StaleState.into(),
            StoreError::DuplicateTitle(title) => ValidationFailure::DuplicateTitle { title }.into(),
            StoreError::Unavailable(message) | StoreError::Decode(message) => {
                Self::Persistence(message)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to hand to API clients. Client errors echo the precise reason.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(failure)) => {
                Self::BadRequest { message: failure.to_string(), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::ProposalNotFound(_)) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::Conflict(_))
            | ApplicationError::Domain(error @ DomainError::InvalidProposalTransition { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
