//! Entity identifiers for blocks, instructions and methods.

/// An opaque reference to a [`crate::Block`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
cranelift_entity::entity_impl!(BlockId, "bb");

/// An opaque reference to an [`crate::Inst`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
cranelift_entity::entity_impl!(InstId, "v");

/// An opaque reference to a method registered in a [`crate::CallGraph`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);
cranelift_entity::entity_impl!(MethodId, "method");
