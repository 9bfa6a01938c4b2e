use skein_builtins::{BuiltinId, BuiltinInfo};
use test_case::test_case;

use crate::degenerate_sub_groups::needs_degenerate_sub_groups;
use crate::test::helpers::{calls_builtin, kernel, new_module};
use crate::{DegenerateSubGroupPass, DeviceInfo, attributes};

#[test_case(1, 8, false; "one is a power of two")]
#[test_case(2, 8, false; "small power of two")]
#[test_case(64, 8, false; "large power of two")]
#[test_case(8, 8, false; "equal to max width")]
#[test_case(24, 8, false; "multiple of max width")]
#[test_case(9, 8, true; "one past the max width")]
#[test_case(3, 8, true; "small odd size")]
#[test_case(24, 7, true; "multiple of nothing relevant")]
#[test_case(21, 7, false; "multiple of odd width")]
fn local_size_rules(local_size_x: u32, max_work_width: u32, degenerate: bool) {
    assert_eq!(needs_degenerate_sub_groups(local_size_x, max_work_width), degenerate);
}

#[test_case([4, 1, 1], false; "native stays native")]
#[test_case([9, 1, 1], true; "incompatible size degenerates")]
// Only the X dimension participates in the check.
#[test_case([4, 9, 9], false; "y and z do not participate")]
fn known_local_size_is_never_cloned(local_size: [u32; 3], degenerate: bool) {
    let mut m = new_module();
    let bi = BuiltinInfo::new();
    let barrier = bi.get_or_declare(&mut m, BuiltinId::SubGroupBarrier, None);
    let k = kernel(&mut m, "k", Some(local_size), &[barrier]);

    DegenerateSubGroupPass::new().run(&mut m, &bi, &DeviceInfo::new(8));

    assert!(m.find_function("k.degenerate-subgroups").is_none());
    assert_eq!(attributes::has_degenerate_subgroups(m.func(k)), degenerate);
    // Degenerate kernels are rewritten in place; native kernels keep the
    // sub-group call.
    assert_eq!(calls_builtin(&m, k, &bi, BuiltinId::SubGroupBarrier), !degenerate);
    assert_eq!(calls_builtin(&m, k, &bi, BuiltinId::WorkGroupBarrier), degenerate);
}

#[test]
fn unknown_local_size_is_cloned() {
    let mut m = new_module();
    let bi = BuiltinInfo::new();
    let barrier = bi.get_or_declare(&mut m, BuiltinId::SubGroupBarrier, None);
    kernel(&mut m, "k", None, &[barrier]);

    DegenerateSubGroupPass::new().run(&mut m, &bi, &DeviceInfo::new(8));

    assert!(m.find_function("k.degenerate-subgroups").is_some());
}

#[test]
#[should_panic(expected = "max_work_width must be positive")]
fn device_info_rejects_zero_width() {
    let _ = DeviceInfo::new(0);
}
