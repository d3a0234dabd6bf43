//! Budget allocation: priorities in, ordered list of searching hats out.
//!
//! ```text
//! eligible  = hats with Critical | High | Medium
//! ordered   = stable sort of eligible by tier (hat declaration order breaks ties)
//! allocated = first B of ordered
//! if facts hat was required but cut: evict last (if full), insert facts first
//! ```
//!
//! The post-condition (`len <= B`, facts present when required) is checked on
//! every call; a violation is a contract error and aborts the run.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::CoordinationError;
use crate::hats::Hat;

use super::SearchPriority;

#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    budget: usize,
    mandatory: Hat,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            mandatory: Hat::FACTS,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn allocate(
        &self,
        priorities: &BTreeMap<Hat, SearchPriority>,
    ) -> Result<Vec<Hat>, CoordinationError> {
        let mut eligible: Vec<(Hat, SearchPriority)> = priorities
            .iter()
            .filter(|(_, p)| p.is_eligible())
            .map(|(&h, &p)| (h, p))
            .collect();
        // `sort_by_key` is stable, so equal tiers keep declaration order.
        eligible.sort_by_key(|&(_, p)| p);

        let mut allocated: Vec<Hat> = eligible
            .into_iter()
            .take(self.budget)
            .map(|(h, _)| h)
            .collect();

        let required = self.mandatory_required(priorities, &allocated);
        if required && !allocated.contains(&self.mandatory) {
            if allocated.len() >= self.budget {
                if let Some(evicted) = allocated.pop() {
                    debug!(evicted = %evicted, "evicted to make room for the facts hat");
                }
            }
            allocated.insert(0, self.mandatory);
        }

        self.check(&allocated, required)?;
        Ok(allocated)
    }

    /// Facts must appear whenever anything is allocated and facts was not
    /// explicitly excluded.
    fn mandatory_required(
        &self,
        priorities: &BTreeMap<Hat, SearchPriority>,
        allocated: &[Hat],
    ) -> bool {
        !allocated.is_empty()
            && priorities
                .get(&self.mandatory)
                .is_some_and(|&p| p != SearchPriority::Never)
    }

    fn check(&self, allocated: &[Hat], required: bool) -> Result<(), CoordinationError> {
        if allocated.len() > self.budget {
            return Err(CoordinationError::BudgetInvariant(format!(
                "{} hats allocated for a budget of {}",
                allocated.len(),
                self.budget
            )));
        }
        if required && !allocated.contains(&self.mandatory) {
            return Err(CoordinationError::BudgetInvariant(format!(
                "{} hat missing from allocation",
                self.mandatory
            )));
        }
        Ok(())
    }
}
