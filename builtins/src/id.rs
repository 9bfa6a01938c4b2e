//! Builtin identity: tags for barriers, work-item queries, and group
//! collectives.

/// Execution scope of a group collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    SubGroup,
    WorkGroup,
}

/// Reduction operator carried by reductions and scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Add,
    Mul,
    Min,
    Max,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
}

/// Shape of a group collective operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectiveKind {
    All,
    Any,
    Reduce(Recurrence),
    ScanInclusive(Recurrence),
    ScanExclusive(Recurrence),
    Broadcast,
    Shuffle,
    ShuffleUp,
    ShuffleDown,
    ShuffleXor,
}

impl CollectiveKind {
    /// Shuffles move data between concrete lanes; they only exist at
    /// sub-group scope.
    pub fn is_shuffle(self) -> bool {
        matches!(self, Self::Shuffle | Self::ShuffleUp | Self::ShuffleDown | Self::ShuffleXor)
    }
}

/// A group collective: a kind at a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupCollective {
    pub scope: Scope,
    pub kind: CollectiveKind,
}

impl GroupCollective {
    pub fn is_sub_group_scope(self) -> bool {
        self.scope == Scope::SubGroup
    }

    /// The same collective rebound to another scope.
    pub fn with_scope(self, scope: Scope) -> Self {
        Self { scope, ..self }
    }
}

/// Identity of a mux builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinId {
    SubGroupBarrier,
    WorkGroupBarrier,
    GetLocalSize,
    GetLocalLinearId,
    GetSubGroupSize,
    GetMaxSubGroupSize,
    GetNumSubGroups,
    GetEnqueuedNumSubGroups,
    GetSubGroupId,
    GetSubGroupLocalId,
    Collective(GroupCollective),
    /// Sentinel: not a recognised builtin, or no mapping exists.
    Invalid,
}

impl BuiltinId {
    /// The collective payload, if this identifies a group collective.
    pub fn group_collective(self) -> Option<GroupCollective> {
        match self {
            BuiltinId::Collective(gc) => Some(gc),
            _ => None,
        }
    }
}
