//! Execution plan model.
//!
//! A plan is the ordered list of step descriptions produced by a genesis
//! response. Invariants are enforced at construction time: empty plans and
//! blank steps are unrepresentable. A plan is immutable once created; it is
//! only ever replaced wholesale by a superseding genesis plan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NonEmptyString;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan must contain at least one step")]
    Empty,
    #[error("plan step {index} is blank")]
    BlankStep { index: usize },
}

/// Ordered, validated sequence of step descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Plan {
    steps: Vec<NonEmptyString>,
}

impl Plan {
    /// Validate raw step descriptions into a plan.
    pub fn new(steps: Vec<String>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                NonEmptyString::new(step).map_err(|_| PlanError::BlankStep { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(NonEmptyString::as_str)
    }

    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(NonEmptyString::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: a plan cannot be constructed without steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the plan leaves autonomous work behind after its genesis step.
    #[must_use]
    pub fn is_multi_step(&self) -> bool {
        self.steps.len() > 1
    }

    /// The steps still owed after the genesis request consumed step 0.
    #[must_use]
    pub fn remaining_after_genesis(&self) -> Vec<String> {
        self.steps[1..]
            .iter()
            .map(|step| step.as_str().to_owned())
            .collect()
    }
}

impl TryFrom<Vec<String>> for Plan {
    type Error = PlanError;

    fn try_from(steps: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<Plan> for Vec<String> {
    fn from(plan: Plan) -> Self {
        plan.steps
            .into_iter()
            .map(NonEmptyString::into_inner)
            .collect()
    }
}
