//! Mux builtin name mangling and parsing.
//!
//! Names follow `__mux_<scope>_<kind>[_<recurrence>][_<type>]` for group
//! collectives and fixed `__mux_*` spellings for barriers and work-item
//! queries, e.g. `__mux_sub_group_reduce_add_i32`,
//! `__mux_work_group_broadcast_f32`, `__mux_get_sub_group_local_id`.

use skein_ir::Type;

use crate::id::{BuiltinId, CollectiveKind, GroupCollective, Recurrence, Scope};

pub(crate) const PREFIX: &str = "__mux_";

const TYPE_TOKENS: [(&str, Type); 7] = [
    ("i1", Type::I1),
    ("i8", Type::I8),
    ("i16", Type::I16),
    ("i32", Type::I32),
    ("i64", Type::I64),
    ("f32", Type::F32),
    ("f64", Type::F64),
];

fn type_token(ty: Type) -> &'static str {
    TYPE_TOKENS
        .iter()
        .find(|(_, t)| *t == ty)
        .map(|(tok, _)| *tok)
        .unwrap_or_else(|| panic!("no mangling for type {ty}"))
}

fn recurrence_token(rec: Recurrence) -> &'static str {
    match rec {
        Recurrence::Add => "add",
        Recurrence::Mul => "mul",
        Recurrence::Min => "min",
        Recurrence::Max => "max",
        Recurrence::And => "and",
        Recurrence::Or => "or",
        Recurrence::Xor => "xor",
        Recurrence::LogicalAnd => "logical_and",
        Recurrence::LogicalOr => "logical_or",
    }
}

fn parse_recurrence(tok: &str) -> Option<Recurrence> {
    Some(match tok {
        "add" => Recurrence::Add,
        "mul" => Recurrence::Mul,
        "min" => Recurrence::Min,
        "max" => Recurrence::Max,
        "and" => Recurrence::And,
        "or" => Recurrence::Or,
        "xor" => Recurrence::Xor,
        "logical_and" => Recurrence::LogicalAnd,
        "logical_or" => Recurrence::LogicalOr,
        _ => return None,
    })
}

fn kind_token(kind: CollectiveKind) -> String {
    match kind {
        CollectiveKind::All => "all".into(),
        CollectiveKind::Any => "any".into(),
        CollectiveKind::Broadcast => "broadcast".into(),
        CollectiveKind::Shuffle => "shuffle".into(),
        CollectiveKind::ShuffleUp => "shuffle_up".into(),
        CollectiveKind::ShuffleDown => "shuffle_down".into(),
        CollectiveKind::ShuffleXor => "shuffle_xor".into(),
        CollectiveKind::Reduce(rec) => format!("reduce_{}", recurrence_token(rec)),
        CollectiveKind::ScanInclusive(rec) => format!("scan_inclusive_{}", recurrence_token(rec)),
        CollectiveKind::ScanExclusive(rec) => format!("scan_exclusive_{}", recurrence_token(rec)),
    }
}

fn parse_kind(tok: &str) -> Option<CollectiveKind> {
    Some(match tok {
        "all" => CollectiveKind::All,
        "any" => CollectiveKind::Any,
        "broadcast" => CollectiveKind::Broadcast,
        "shuffle" => CollectiveKind::Shuffle,
        "shuffle_up" => CollectiveKind::ShuffleUp,
        "shuffle_down" => CollectiveKind::ShuffleDown,
        "shuffle_xor" => CollectiveKind::ShuffleXor,
        _ => {
            if let Some(rest) = tok.strip_prefix("reduce_") {
                CollectiveKind::Reduce(parse_recurrence(rest)?)
            } else if let Some(rest) = tok.strip_prefix("scan_inclusive_") {
                CollectiveKind::ScanInclusive(parse_recurrence(rest)?)
            } else if let Some(rest) = tok.strip_prefix("scan_exclusive_") {
                CollectiveKind::ScanExclusive(parse_recurrence(rest)?)
            } else {
                return None;
            }
        }
    })
}

/// The mangled symbol name of a builtin.
pub fn mangled_name(id: BuiltinId, overload: Option<Type>) -> String {
    match id {
        BuiltinId::SubGroupBarrier => format!("{PREFIX}sub_group_barrier"),
        BuiltinId::WorkGroupBarrier => format!("{PREFIX}work_group_barrier"),
        BuiltinId::GetLocalSize => format!("{PREFIX}get_local_size"),
        BuiltinId::GetLocalLinearId => format!("{PREFIX}get_local_linear_id"),
        BuiltinId::GetSubGroupSize => format!("{PREFIX}get_sub_group_size"),
        BuiltinId::GetMaxSubGroupSize => format!("{PREFIX}get_max_sub_group_size"),
        BuiltinId::GetNumSubGroups => format!("{PREFIX}get_num_sub_groups"),
        BuiltinId::GetEnqueuedNumSubGroups => format!("{PREFIX}get_enqueued_num_sub_groups"),
        BuiltinId::GetSubGroupId => format!("{PREFIX}get_sub_group_id"),
        BuiltinId::GetSubGroupLocalId => format!("{PREFIX}get_sub_group_local_id"),
        BuiltinId::Collective(gc) => {
            let scope = match gc.scope {
                Scope::SubGroup => "sub_group",
                Scope::WorkGroup => "work_group",
            };
            let mut name = format!("{PREFIX}{scope}_{}", kind_token(gc.kind));
            if let Some(ty) = overload {
                name.push('_');
                name.push_str(type_token(ty));
            }
            name
        }
        BuiltinId::Invalid => unreachable!("the invalid builtin has no name"),
    }
}

/// Parse a symbol name back into a builtin identity and overload.
/// Returns None for names that are not mux builtins.
pub fn parse(name: &str) -> Option<(BuiltinId, Option<Type>)> {
    let rest = name.strip_prefix(PREFIX)?;

    let fixed = match rest {
        "sub_group_barrier" => Some(BuiltinId::SubGroupBarrier),
        "work_group_barrier" => Some(BuiltinId::WorkGroupBarrier),
        "get_local_size" => Some(BuiltinId::GetLocalSize),
        "get_local_linear_id" => Some(BuiltinId::GetLocalLinearId),
        "get_sub_group_size" => Some(BuiltinId::GetSubGroupSize),
        "get_max_sub_group_size" => Some(BuiltinId::GetMaxSubGroupSize),
        "get_num_sub_groups" => Some(BuiltinId::GetNumSubGroups),
        "get_enqueued_num_sub_groups" => Some(BuiltinId::GetEnqueuedNumSubGroups),
        "get_sub_group_id" => Some(BuiltinId::GetSubGroupId),
        "get_sub_group_local_id" => Some(BuiltinId::GetSubGroupLocalId),
        _ => None,
    };
    if let Some(id) = fixed {
        return Some((id, None));
    }

    let (scope, rest) = if let Some(r) = rest.strip_prefix("sub_group_") {
        (Scope::SubGroup, r)
    } else if let Some(r) = rest.strip_prefix("work_group_") {
        (Scope::WorkGroup, r)
    } else {
        return None;
    };

    let (kind_part, overload) = match TYPE_TOKENS.iter().find_map(|(tok, ty)| {
        rest.strip_suffix(tok).and_then(|r| r.strip_suffix('_')).map(|r| (r, *ty))
    }) {
        Some((r, ty)) => (r, Some(ty)),
        None => (rest, None),
    };

    let kind = parse_kind(kind_part)?;
    Some((BuiltinId::Collective(GroupCollective { scope, kind }), overload))
}
