//! The per-compilation assumption ledger.
//!
//! Every speculative fact the compiler folds on is appended here; the ledger
//! travels with the compiled artifact and the artifact stays valid only while
//! every recorded fact still holds. Recording is append-only and keeps
//! duplicates; the invalidation machinery (outside this crate) owns
//! deduplication concerns.

use crate::constant::{Constant, ObjectConstant};
use crate::reflect::Reflection;

/// One speculative fact, true at recording time.
#[derive(Debug, Clone, PartialEq)]
pub enum Assumption {
    /// A mutable call site's resolved target was folded as if fixed.
    CallSiteTargetValue {
        call_site: ObjectConstant,
        target: Constant,
    },
}

impl Assumption {
    /// Re-checks the fact against the live runtime.
    pub fn still_holds(&self, oracle: &dyn Reflection) -> bool {
        match self {
            Assumption::CallSiteTargetValue { call_site, target } => {
                let current = oracle.call_site_target(call_site.handle());
                match target {
                    Constant::Object(t) => current == Some(t.handle()),
                    Constant::Null => current.is_none(),
                    Constant::Primitive(_) => false,
                }
            }
        }
    }
}

/// Append-only sequence of assumptions, owned by a single compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assumptions {
    records: Vec<Assumption>,
}

impl Assumptions {
    pub fn new() -> Self {
        Assumptions::default()
    }

    pub fn record(&mut self, assumption: Assumption) {
        self.records.push(assumption);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assumption> {
        self.records.iter()
    }

    /// Conjunctive validity: one violated record invalidates the whole set.
    /// An empty ledger is trivially valid.
    pub fn is_valid(&self, oracle: &dyn Reflection) -> bool {
        self.records.iter().all(|a| a.still_holds(oracle))
    }
}
