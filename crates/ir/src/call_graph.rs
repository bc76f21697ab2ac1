//! The call graph: method names, method identities and their bodies.

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{Graph, MethodId};

/// Owns every method body and mints method identities. Callee resolution
/// during inlining goes through this table.
#[derive(Debug, Default)]
pub struct CallGraph {
    methods: PrimaryMap<MethodId, Graph>,
    names: FxHashMap<SmolStr, MethodId>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `graph` under `method_name`, assigning it a fresh id.
    /// A name can be linked only once.
    pub fn link_graph(&mut self, method_name: &str, mut graph: Graph) -> MethodId {
        let id = self.methods.next_key();
        graph.set_method_id(id);
        assert!(
            self.names.insert(SmolStr::new(method_name), id).is_none(),
            "method `{method_name}` is already linked"
        );
        self.methods.push(graph)
    }

    pub fn graph(&self, method: MethodId) -> &Graph {
        &self.methods[method]
    }

    pub fn graph_mut(&mut self, method: MethodId) -> &mut Graph {
        &mut self.methods[method]
    }

    pub fn method_by_name(&self, method_name: &str) -> Option<MethodId> {
        self.names.get(method_name).copied()
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodId> {
        self.methods.keys()
    }
}
