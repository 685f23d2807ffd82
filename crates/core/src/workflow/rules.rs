use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::reference::{AreaId, ProjectTypeId};
use crate::domain::rule::ApprovalRule;

/// The proposal attributes rule matching looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSubject {
    pub amount: Decimal,
    pub area: AreaId,
    pub project_type: ProjectTypeId,
}

/// How closely a rule fits a subject, most specific first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleSpecificity {
    AreaAndType,
    AreaOnly,
    TypeOnly,
    Wildcard,
}

impl RuleSpecificity {
    fn of(rule: &ApprovalRule, subject: &RuleSubject) -> Option<Self> {
        match (rule.area, rule.project_type) {
            (Some(area), Some(project_type))
                if area == subject.area && project_type == subject.project_type =>
            {
                Some(Self::AreaAndType)
            }
            (Some(area), None) if area == subject.area => Some(Self::AreaOnly),
            (None, Some(project_type)) if project_type == subject.project_type => {
                Some(Self::TypeOnly)
            }
            (None, None) => Some(Self::Wildcard),
            _ => None,
        }
    }
}

/// Read-only view over the configured approval rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleCatalog {
    rules: Vec<ApprovalRule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<ApprovalRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ApprovalRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn resolve(&self, subject: &RuleSubject) -> ResolvedRules<'_> {
        RuleResolver::resolve(subject, &self.rules)
    }
}

/// One selected rule per step order, ascending. Orders may have gaps.
pub type ResolvedRules<'a> = BTreeMap<u32, &'a ApprovalRule>;

pub struct RuleResolver;

impl RuleResolver {
    pub fn resolve<'a>(subject: &RuleSubject, rules: &'a [ApprovalRule]) -> ResolvedRules<'a> {
        let mut best: BTreeMap<u32, (RuleSpecificity, &'a ApprovalRule)> = BTreeMap::new();

        for rule in rules.iter().filter(|rule| rule.covers_amount(subject.amount)) {
            let Some(specificity) = RuleSpecificity::of(rule, subject) else {
                continue;
            };

            // Strictly better only: the earliest rule wins among equals.
            best.entry(rule.step_order)
                .and_modify(|current| {
                    if specificity < current.0 {
                        *current = (specificity, rule);
                    }
                })
                .or_insert((specificity, rule));
        }

        best.into_iter().map(|(order, (_, rule))| (order, rule)).collect()
    }
}
