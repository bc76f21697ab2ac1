//! Analyses and transformations over the Cadenza IR: the dominator tree,
//! peephole simplification, redundant-check elimination and inlining.

pub mod domtree;
pub mod optim;

pub use domtree::DominatorTree;
pub use optim::{CheckElim, Inliner, Peephole};
