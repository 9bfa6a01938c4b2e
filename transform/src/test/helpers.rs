//! Shared module-construction and inspection helpers for pass tests.

use std::collections::HashSet;

use skein_builtins::{BuiltinId, BuiltinInfo, CollectiveKind, GroupCollective, Scope};
use skein_ir::{
    CallingConv, FuncId, FunctionBuilder, InstData, Linkage, Module, PointerWidth, Signature, Type, Value,
};

use crate::attributes;
use crate::degenerate_sub_groups::{is_sub_group_work_item, sub_group_builtin};

pub fn new_module() -> Module {
    Module::new("test", PointerWidth::P64)
}

pub fn sub_group_collective(kind: CollectiveKind) -> BuiltinId {
    BuiltinId::Collective(GroupCollective { scope: Scope::SubGroup, kind })
}

pub fn work_group_collective(kind: CollectiveKind) -> BuiltinId {
    BuiltinId::Collective(GroupCollective { scope: Scope::WorkGroup, kind })
}

/// Emit a call to `callee` with constant-1 arguments synthesized from
/// its signature. Test modules only use integer-typed builtin overloads.
pub fn call_with_default_args(b: &mut FunctionBuilder<'_>, callee: FuncId) {
    let params = b.module().func(callee).signature().params.clone();
    let args: Vec<Value> = params
        .iter()
        .map(|&ty| match ty {
            Type::Int { .. } => b.const_int(ty, 1),
            _ => panic!("test helpers only synthesize integer arguments"),
        })
        .collect();
    b.call(callee, &args).unwrap();
}

/// Define a `() -> void` function that calls each of `calls` and
/// returns.
pub fn helper(m: &mut Module, name: &str, calls: &[FuncId]) -> FuncId {
    let f = m.declare_function(name, Signature::new(vec![], Type::Void), Linkage::Internal, CallingConv::SpirFunc);
    let mut b = FunctionBuilder::new(m, f);
    for &c in calls {
        call_with_default_args(&mut b, c);
    }
    b.ret(None);
    f
}

/// Define a kernel entry point that calls each of `calls` and returns.
pub fn kernel(m: &mut Module, name: &str, local_size: Option<[u32; 3]>, calls: &[FuncId]) -> FuncId {
    let f = m.declare_function(name, Signature::new(vec![], Type::Void), Linkage::External, CallingConv::SpirKernel);
    attributes::set_is_kernel_entry_pt(m.func_mut(f));
    if let Some(size) = local_size {
        attributes::set_local_size_metadata(m.func_mut(f), size);
    }
    let mut b = FunctionBuilder::new(m, f);
    for &c in calls {
        call_with_default_args(&mut b, c);
    }
    b.ret(None);
    f
}

/// Functions `f` calls directly, in call-site order.
pub fn callees_of(m: &Module, f: FuncId) -> Vec<FuncId> {
    m.func(f).insts().filter_map(|(_, d)| d.called_function()).collect()
}

/// Whether `f` directly contains a call analysed as `id`.
pub fn calls_builtin(m: &Module, f: FuncId, bi: &BuiltinInfo, id: BuiltinId) -> bool {
    callees_of(m, f).iter().any(|&c| bi.analyze_builtin(m.func(c)).id == id)
}

/// Whether `f` directly contains any sub-group builtin call (barrier,
/// collective, or work-item query).
pub fn calls_any_sub_group_builtin(m: &Module, f: FuncId, bi: &BuiltinInfo) -> bool {
    callees_of(m, f).iter().any(|&c| {
        let b = bi.analyze_builtin(m.func(c));
        sub_group_builtin(b).is_some() || is_sub_group_work_item(b.id)
    })
}

/// All functions transitively reachable from `root` through direct
/// calls, including `root`.
pub fn reachable(m: &Module, root: FuncId) -> HashSet<FuncId> {
    let mut seen = HashSet::from([root]);
    let mut stack = vec![root];
    while let Some(f) = stack.pop() {
        for callee in callees_of(m, f) {
            if seen.insert(callee) {
                stack.push(callee);
            }
        }
    }
    seen
}

/// The argument list of the first call to `callee` inside `f`.
pub fn call_args(m: &Module, f: FuncId, callee: FuncId) -> Option<Vec<Value>> {
    m.func(f).insts().find_map(|(_, d)| match d {
        InstData::Call { callee: c, args, .. } if *c == callee => Some(args.to_vec()),
        _ => None,
    })
}

/// Whether `v` is the integer constant `value` in `f`.
pub fn is_const(m: &Module, f: FuncId, v: Value, ty: Type, value: u64) -> bool {
    matches!(m.func(f).value_def(v), skein_ir::ValueDef::ConstInt { ty: t, value: val } if *t == ty && *val == value)
}
