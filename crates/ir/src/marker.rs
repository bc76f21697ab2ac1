//! Visited markers for graph traversals.
//!
//! A marker is a draw of the graph's epoch counter: a block is marked iff its
//! stored epoch equals the marker's value. Drawing a fresh marker therefore
//! invalidates every stale mark at once, so traversals never unmark and the
//! supply never runs out within a graph's lifetime.

/// A traversal epoch drawn from [`crate::Graph::new_marker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(pub(crate) u64);
