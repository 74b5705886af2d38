//! Identifier newtypes and the shared timestamp space.

/// Stable identifier assigned to every vertex and edge for its full lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Gid(pub u64);

/// Vertex label identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LabelId(pub u32);

/// Property key identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PropId(pub u32);

/// Edge type identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EdgeTypeId(pub u32);

/// Logical timestamp.
///
/// Commit timestamps and transaction ids share this one `u64` space,
/// partitioned by [`TXN_ID_FLOOR`]: values below the floor are commit
/// timestamps handed out by the global clock, values at or above it are
/// reserved transaction ids.
pub type Timestamp = u64;

/// First value of the reserved transaction-id space.
pub const TXN_ID_FLOOR: Timestamp = 1 << 63;

/// Which kind of versioned object a record refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ObjectKind {
    /// A vertex.
    Vertex,
    /// An edge.
    Edge,
}
