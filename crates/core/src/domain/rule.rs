use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{AreaId, ProjectTypeId};
use crate::domain::user::RoleId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub i32);

/// Configured approval requirement. `area`/`project_type` set to `None` match anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: RuleId,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub area: Option<AreaId>,
    pub project_type: Option<ProjectTypeId>,
    pub approver_role_id: RoleId,
    pub step_order: u32,
}

impl ApprovalRule {
    /// A zero `max_amount` is an open upper bound, same as `None`.
    pub fn covers_amount(&self, amount: Decimal) -> bool {
        if amount < self.min_amount {
            return false;
        }

        match self.max_amount {
            None => true,
            Some(max) if max.is_zero() => true,
            Some(max) => amount <= max,
        }
    }
}
