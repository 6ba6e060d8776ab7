//! The installable compilation unit: a rewritten graph plus the speculative
//! facts it folded on.

use crate::exec::{self, ExecError};
use crate::graph::Graph;
use ember::assumptions::Assumptions;
use ember::reflect::Reflection;
use ember::value::Slot;
use ember::Heap;

/// A lowered graph bundled with its assumption ledger. The artifact stays
/// installable only while every recorded assumption still holds; one violated
/// assumption invalidates the whole unit.
#[derive(Debug, Clone, Default)]
pub struct Artifact {
    graph: Graph,
    assumptions: Assumptions,
}

impl Artifact {
    /// An artifact that speculated on nothing; it can never be invalidated.
    pub fn new(graph: Graph) -> Self {
        Artifact {
            graph,
            assumptions: Assumptions::new(),
        }
    }

    pub fn with_assumptions(graph: Graph, assumptions: Assumptions) -> Self {
        Artifact { graph, assumptions }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    /// Whether every recorded assumption still holds against the runtime.
    pub fn is_valid(&self, oracle: &dyn Reflection) -> bool {
        self.assumptions.is_valid(oracle)
    }

    /// Runs the compiled graph. Validity is the installer's concern; an
    /// invalidated artifact would have been torn down before reaching here.
    pub fn run(&self, heap: &mut Heap, args: &[Slot]) -> Result<(), ExecError> {
        exec::execute(&self.graph, heap, args)
    }
}
