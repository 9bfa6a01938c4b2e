use skein_ir::Type;
use test_case::test_case;

use crate::id::{BuiltinId, CollectiveKind, GroupCollective, Recurrence, Scope};
use crate::mangle::{mangled_name, parse};

fn collective(scope: Scope, kind: CollectiveKind) -> BuiltinId {
    BuiltinId::Collective(GroupCollective { scope, kind })
}

#[test_case(BuiltinId::SubGroupBarrier, "__mux_sub_group_barrier")]
#[test_case(BuiltinId::WorkGroupBarrier, "__mux_work_group_barrier")]
#[test_case(BuiltinId::GetLocalSize, "__mux_get_local_size")]
#[test_case(BuiltinId::GetLocalLinearId, "__mux_get_local_linear_id")]
#[test_case(BuiltinId::GetSubGroupSize, "__mux_get_sub_group_size")]
#[test_case(BuiltinId::GetMaxSubGroupSize, "__mux_get_max_sub_group_size")]
#[test_case(BuiltinId::GetNumSubGroups, "__mux_get_num_sub_groups")]
#[test_case(BuiltinId::GetEnqueuedNumSubGroups, "__mux_get_enqueued_num_sub_groups")]
#[test_case(BuiltinId::GetSubGroupId, "__mux_get_sub_group_id")]
#[test_case(BuiltinId::GetSubGroupLocalId, "__mux_get_sub_group_local_id")]
fn fixed_names(id: BuiltinId, expected: &str) {
    assert_eq!(mangled_name(id, None), expected);
    assert_eq!(parse(expected), Some((id, None)));
}

#[test_case(CollectiveKind::Reduce(Recurrence::Add), Some(Type::I32), "__mux_sub_group_reduce_add_i32")]
#[test_case(CollectiveKind::Reduce(Recurrence::LogicalAnd), Some(Type::I1), "__mux_sub_group_reduce_logical_and_i1")]
#[test_case(CollectiveKind::ScanInclusive(Recurrence::Max), Some(Type::F32), "__mux_sub_group_scan_inclusive_max_f32")]
#[test_case(CollectiveKind::ScanExclusive(Recurrence::Mul), Some(Type::I64), "__mux_sub_group_scan_exclusive_mul_i64")]
#[test_case(CollectiveKind::Broadcast, Some(Type::F64), "__mux_sub_group_broadcast_f64")]
#[test_case(CollectiveKind::Shuffle, Some(Type::I32), "__mux_sub_group_shuffle_i32")]
#[test_case(CollectiveKind::ShuffleXor, Some(Type::I16), "__mux_sub_group_shuffle_xor_i16")]
#[test_case(CollectiveKind::All, None, "__mux_sub_group_all")]
fn sub_group_collectives_round_trip(kind: CollectiveKind, overload: Option<Type>, expected: &str) {
    let id = collective(Scope::SubGroup, kind);
    assert_eq!(mangled_name(id, overload), expected);
    assert_eq!(parse(expected), Some((id, overload)));
}

#[test]
fn work_group_names_round_trip() {
    let id = collective(Scope::WorkGroup, CollectiveKind::Reduce(Recurrence::Add));
    let name = mangled_name(id, Some(Type::I32));
    assert_eq!(name, "__mux_work_group_reduce_add_i32");
    assert_eq!(parse(&name), Some((id, Some(Type::I32))));
}

#[test_case("reduce_add"; "no mux prefix")]
#[test_case("__mux_sub_group_reduce_nand_i32"; "unknown recurrence")]
#[test_case("__mux_sub_group_frobnicate"; "unknown kind")]
#[test_case("__mux_pixel_group_reduce_add"; "unknown scope")]
#[test_case("memset"; "ordinary function")]
fn unknown_names_do_not_parse(name: &str) {
    assert_eq!(parse(name), None);
}
