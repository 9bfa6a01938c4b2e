//! Replaces calls to sub-group builtins with their analogous work-group
//! builtin.
//!
//! A kernel whose work-group geometry is incompatible with the device's
//! vector width cannot be given native sub-groups, so its sub-groups are
//! made *degenerate*: one sub-group spanning the whole work-group. For
//! every kernel that needs (or may need) this, the pass rewrites all
//! transitively reachable sub-group builtin calls into their work-group
//! counterparts.
//!
//! The call graph is traversed in both directions:
//!
//! * from sub-group builtin call sites up to kernels, to learn which
//!   functions use sub-groups at all, and
//! * from kernels down to the leaves, to learn which functions are
//!   reached by degenerate and by native kernels.
//!
//! Functions reached by both kinds of kernel are cloned so each side
//! keeps its own semantics. Kernels whose local size is unknown at
//! compile time are also cloned, and the runtime picks a variant.
//!
//! Sub-group shuffles have no work-group equivalent. A function that
//! invokes one poisons every transitive caller: a poisoned kernel is
//! left entirely native and is only reported through a debug event.

use std::collections::{HashMap, HashSet};

use skein_builtins::{Builtin, BuiltinId, BuiltinInfo, CollectiveKind, Scope};
use skein_ir::{
    CallingConv, FuncId, Function, FunctionBuilder, InstData, InstId, Module, Type, Value, clone_function_body,
};
use smallvec::SmallVec;

use crate::PreservedAnalyses;
use crate::attributes;
use crate::device_info::DeviceInfo;

/// Name suffix of the rewritten copy of a cloned function.
pub const DEGENERATE_SUFFIX: &str = ".degenerate-subgroups";

/// See the module documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegenerateSubGroupPass;

impl DegenerateSubGroupPass {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, module: &mut Module, bi: &BuiltinInfo, device: &DeviceInfo) -> PreservedAnalyses {
        let mut kernels: Vec<FuncId> = Vec::new();
        let mut degenerate_kernels: HashSet<FuncId> = HashSet::new();
        let mut kernels_to_clone: HashSet<FuncId> = HashSet::new();

        for id in module.func_ids() {
            if !attributes::is_kernel_entry_pt(module.func(id)) {
                continue;
            }
            kernels.push(id);
            if attributes::has_degenerate_subgroups(module.func(id)) {
                // Already the degenerate variant (e.g. a clone made by an
                // earlier invocation); never cloned again.
                degenerate_kernels.insert(id);
                continue;
            }
            match attributes::local_size_metadata(module.func(id)) {
                None => {
                    // Local size unknown at compile time: keep both a
                    // native and a degenerate variant and let the
                    // runtime choose. If the degenerate variant already
                    // exists, this is the native one.
                    let base = attributes::get_base_fn_name_or_fn_name(module.func(id));
                    if module.find_function(&format!("{base}{DEGENERATE_SUFFIX}")).is_none() {
                        kernels_to_clone.insert(id);
                    }
                }
                Some(local_sizes) => {
                    if needs_degenerate_sub_groups(local_sizes[0], device.max_work_width) {
                        attributes::set_has_degenerate_subgroups(module.func_mut(id));
                        degenerate_kernels.insert(id);
                    }
                }
            }
        }

        // Seed the upward traversal with every function that directly
        // contains a sub-group builtin call, and mark as poisonous those
        // whose builtin has no work-group analogue.
        let mut uses_subgroups: HashSet<FuncId> = HashSet::new();
        let mut poison: HashSet<FuncId> = HashSet::new();
        let mut worklist: Vec<FuncId> = Vec::new();
        for (id, f) in module.funcs() {
            for (_, data) in f.insts() {
                let Some(callee) = direct_callee(data) else { continue };
                let builtin = bi.analyze_builtin(module.func(callee));
                if let Some(sg) = sub_group_builtin(builtin) {
                    if uses_subgroups.insert(id) {
                        worklist.push(id);
                    }
                    if work_group_analogue(bi, sg) == BuiltinId::Invalid {
                        poison.insert(id);
                    }
                } else if is_sub_group_work_item(builtin.id) && uses_subgroups.insert(id) {
                    worklist.push(id);
                }
            }
        }

        // No sub-group usage anywhere: annotate every kernel so the
        // vectorizer is unconstrained, and leave the module untouched.
        if worklist.is_empty() {
            for &k in &kernels {
                attributes::set_has_degenerate_subgroups(module.func_mut(k));
            }
            return PreservedAnalyses::All;
        }

        // Close `uses_subgroups` under callers, carrying poison along.
        // A caller is re-enqueued whenever it gains either property, so
        // the result does not depend on pop order.
        while let Some(work) = worklist.pop() {
            let work_poisoned = poison.contains(&work);
            for (caller, _) in module.callers_of(work) {
                let newly_uses = uses_subgroups.insert(caller);
                let newly_poisoned = work_poisoned && poison.insert(caller);
                if newly_uses || newly_poisoned {
                    worklist.push(caller);
                }
            }
        }

        // Partition the kernels into the roots of the two downward
        // traversals. Kernels to be cloned act as both degenerate and
        // native users; poisoned kernels are always native.
        let mut non_degenerate_users: Vec<FuncId> = Vec::new();
        for &k in &kernels {
            let subgroups = uses_subgroups.contains(&k);
            if !subgroups {
                attributes::set_has_degenerate_subgroups(module.func_mut(k));
                kernels_to_clone.remove(&k);
            }

            if poison.contains(&k) {
                tracing::debug!(
                    kernel = %module.func(k).name(),
                    "kernel uses sub-group builtin with no work-group equivalent - skipping"
                );
                kernels_to_clone.remove(&k);
                degenerate_kernels.remove(&k);
                attributes::clear_has_degenerate_subgroups(module.func_mut(k));
                non_degenerate_users.push(k);
                continue;
            }

            if kernels_to_clone.contains(&k) {
                worklist.push(k);
                non_degenerate_users.push(k);
                degenerate_kernels.insert(k);
            } else if !subgroups || degenerate_kernels.contains(&k) {
                worklist.push(k);
            } else {
                non_degenerate_users.push(k);
            }
        }

        let used_by_degenerate = reachable_sub_group_users(module, &mut worklist, &uses_subgroups);
        worklist.extend(non_degenerate_users.iter().copied());
        let used_by_non_degenerate = reachable_sub_group_users(module, &mut worklist, &uses_subgroups);

        // Clone kernels with a deferred decision plus every function
        // shared between the two sides.
        let mut to_clone: Vec<FuncId> = kernels.iter().copied().filter(|k| kernels_to_clone.contains(k)).collect();
        for (id, f) in module.funcs() {
            if !f.is_declaration()
                && used_by_degenerate.contains(&id)
                && used_by_non_degenerate.contains(&id)
                && !kernels_to_clone.contains(&id)
            {
                to_clone.push(id);
            }
        }

        // Declarations first: the clone map must be complete before any
        // body is walked, so calls between clones retarget during
        // cloning.
        let mut clone_map: HashMap<FuncId, FuncId> = HashMap::new();
        for &f in &to_clone {
            let (sig, linkage, conv) = {
                let fun = module.func(f);
                (fun.signature().clone(), fun.linkage(), fun.calling_conv())
            };
            let new_f = module.declare_function("", sig, linkage, conv);
            let base = attributes::get_or_set_base_fn_name(module, new_f, f);
            module.func_mut(new_f).set_name(format!("{base}{DEGENERATE_SUFFIX}"));
            clone_map.insert(f, new_f);
        }

        for &f in &to_clone {
            let new_f = clone_map[&f];
            clone_function_body(module, f, new_f, &clone_map)
                .expect("clone target is a fresh declaration with a matching signature");
            // Body cloning copies attributes wholesale; re-establish the
            // lineage attribute and flag kernel clones as the
            // degenerate variant.
            let base = attributes::get_base_fn_name_or_fn_name(module.func(f)).to_owned();
            attributes::set_base_fn_name(module.func_mut(new_f), &base);
            if attributes::is_kernel(module.func(f)) {
                attributes::set_has_degenerate_subgroups(module.func_mut(new_f));
            }
        }

        // The degenerate side: the clone where one was made, the
        // function itself where it is used by degenerate kernels only.
        let mut degenerate_side: Vec<FuncId> = degenerate_kernels
            .iter()
            .chain(used_by_degenerate.iter())
            .map(|&f| clone_map.get(&f).copied().unwrap_or(f))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        degenerate_side.sort();

        // Functions updated in place still call the shared originals;
        // retarget those calls at the degenerate clones. Cloned bodies
        // were already retargeted while cloning.
        for &f in &degenerate_side {
            remap_cloned_callees(module.func_mut(f), &clone_map);
        }

        // Rewrite sub-group builtin calls. Call sites are enumerated
        // per function before any replacement is built, and the original
        // calls are only erased after every function has been rewritten,
        // so no list being iterated is ever invalidated.
        let mut to_delete: Vec<(FuncId, InstId)> = Vec::new();
        for &f in &degenerate_side {
            let queued: Vec<(InstId, Builtin)> = module
                .func(f)
                .insts()
                .filter_map(|(id, data)| {
                    let callee = data.called_function()?;
                    let builtin = bi.analyze_builtin(module.func(callee));
                    if let Some(sg) = sub_group_builtin(builtin) {
                        Some((id, sg))
                    } else if is_sub_group_work_item(builtin.id) {
                        Some((id, builtin))
                    } else {
                        None
                    }
                })
                .collect();
            for (ci, builtin) in queued {
                if sub_group_builtin(builtin).is_some() {
                    replace_sub_group_builtin_call(module, bi, f, ci, builtin);
                } else {
                    replace_sub_group_work_item_call(module, bi, f, ci, builtin.id);
                }
                to_delete.push((f, ci));
            }
        }
        for (f, ci) in to_delete {
            module.func_mut(f).erase_inst(ci);
        }

        PreservedAnalyses::None
    }
}

/// Whether a kernel with this X local size must run with degenerate
/// sub-groups.
///
/// Degenerate sub-groups are always safe, so native sub-groups are kept
/// only when the size is provably compatible with whatever width the
/// vectorizer later picks: a power of two, or a multiple of the device's
/// maximum work width.
//
// TODO: decide whether the Y and Z dimensions should participate in
// this check.
pub(crate) fn needs_degenerate_sub_groups(local_size_x: u32, max_work_width: u32) -> bool {
    !local_size_x.is_power_of_two() && !local_size_x.is_multiple_of(max_work_width)
}

/// The direct callee of a call instruction, None for non-calls.
/// Indirect calls cannot be analysed and are rejected outright.
fn direct_callee(data: &InstData) -> Option<FuncId> {
    match data {
        InstData::Call { callee, .. } => Some(*callee),
        InstData::CallIndirect { .. } => panic!("virtual calls are not supported"),
        _ => None,
    }
}

/// The builtin, if it is the sub-group barrier or a collective at
/// sub-group scope.
pub(crate) fn sub_group_builtin(b: Builtin) -> Option<Builtin> {
    match b.id {
        BuiltinId::SubGroupBarrier => Some(b),
        BuiltinId::Collective(gc) if gc.is_sub_group_scope() => Some(b),
        _ => None,
    }
}

pub(crate) fn is_sub_group_work_item(id: BuiltinId) -> bool {
    matches!(
        id,
        BuiltinId::GetSubGroupSize
            | BuiltinId::GetMaxSubGroupSize
            | BuiltinId::GetNumSubGroups
            | BuiltinId::GetEnqueuedNumSubGroups
            | BuiltinId::GetSubGroupId
            | BuiltinId::GetSubGroupLocalId
    )
}

/// The work-group builtin equivalent to a sub-group builtin, or
/// [`BuiltinId::Invalid`] when none exists.
fn work_group_analogue(bi: &BuiltinInfo, sg: Builtin) -> BuiltinId {
    match sg.id {
        BuiltinId::SubGroupBarrier => BuiltinId::WorkGroupBarrier,
        BuiltinId::Collective(gc) => bi.group_collective_id(gc.with_scope(Scope::WorkGroup)),
        _ => unreachable!("not a sub-group builtin"),
    }
}

/// Forward closure over direct calls from the functions on `worklist`,
/// restricted to defined callees that themselves use sub-groups. Other
/// callees are safely shared between both kinds of kernel.
fn reachable_sub_group_users(
    module: &Module,
    worklist: &mut Vec<FuncId>,
    uses_subgroups: &HashSet<FuncId>,
) -> HashSet<FuncId> {
    let mut reached = HashSet::new();
    while let Some(work) = worklist.pop() {
        for (_, data) in module.func(work).insts() {
            if let Some(callee) = data.called_function()
                && !module.func(callee).is_declaration()
                && uses_subgroups.contains(&callee)
                && reached.insert(callee)
            {
                worklist.push(callee);
            }
        }
    }
    reached
}

/// Retarget direct calls to cloned functions at their clones.
fn remap_cloned_callees(f: &mut Function, clone_map: &HashMap<FuncId, FuncId>) {
    let sites: Vec<(InstId, FuncId)> = f
        .insts()
        .filter_map(|(id, data)| match data {
            InstData::Call { callee, .. } => clone_map.get(callee).map(|&c| (id, c)),
            InstData::CallIndirect { .. } => unreachable!("unhandled call instruction kind during callee remap"),
            _ => None,
        })
        .collect();
    for (id, callee) in sites {
        f.retarget_call(id, callee);
    }
}

/// Replace a sub-group barrier or collective call with its work-group
/// analogue. The new call is inserted before the old one; the old call
/// is left for the caller to erase.
fn replace_sub_group_builtin_call(module: &mut Module, bi: &BuiltinInfo, f: FuncId, ci: InstId, sg: Builtin) {
    let (args, conv) = match module.func(f).inst(ci) {
        InstData::Call { args, conv, .. } => (args.clone(), *conv),
        _ => unreachable!("queued call site is not a call"),
    };
    let wg_id = work_group_analogue(bi, sg);
    assert!(wg_id != BuiltinId::Invalid, "missing work-group builtin");

    if matches!(sg.id, BuiltinId::Collective(gc) if gc.kind == CollectiveKind::Broadcast) {
        lower_broadcast(module, bi, f, ci, wg_id, sg, &args, conv)
            .expect("sub-group broadcast lowering must not fail");
        return;
    }

    // Everything except broadcasts forwards its arguments unchanged,
    // with the work-group barrier id prepended for collectives.
    let wg = bi.get_or_declare(module, wg_id, sg.overload);
    module.func_mut(wg).set_calling_conv(conv);
    let mut builder = FunctionBuilder::before(module, f, ci);
    let mut call_args: SmallVec<[Value; 8]> = SmallVec::new();
    if sg.id != BuiltinId::SubGroupBarrier {
        call_args.push(builder.const_int(Type::I32, 0));
    }
    call_args.extend(args.iter().copied());
    let new_value = builder
        .call_with_conv(wg, &call_args, conv)
        .expect("the work-group analogue accepts the forwarded arguments");
    if let (Some(old), Some(new)) = (module.func(f).inst_result(ci), new_value) {
        module.func_mut(f).replace_all_uses(old, new);
    }
}

/// Lower a sub-group broadcast.
///
/// The sub-group broadcast takes an element index in
/// `[0, sub_group_size)`; the work-group broadcast takes local (x, y, z)
/// coordinates. With the sub-group spanning the whole work-group the
/// element index equals the local linear id, which is inverted as
///
/// ```text
/// x = id % lx
/// y = ((id - x) / lx) % ly
/// z = (id - x - y*lx) / (lx*ly)
/// ```
///
/// in unsigned arithmetic at the index's width, with the coordinates
/// then widened to the target's size type.
#[allow(clippy::too_many_arguments)]
fn lower_broadcast(
    module: &mut Module,
    bi: &BuiltinInfo,
    f: FuncId,
    ci: InstId,
    wg_id: BuiltinId,
    sg: Builtin,
    args: &[Value],
    conv: CallingConv,
) -> skein_ir::Result<()> {
    let get_local_size = bi.get_or_declare(module, BuiltinId::GetLocalSize, None);
    let wg_broadcast = bi.get_or_declare(module, wg_id, sg.overload);
    module.func_mut(wg_broadcast).set_calling_conv(conv);
    let size_ty = module.size_type();

    let value = args[0];
    let element_id = args[1];
    let element_ty = module.func(f).value_type(element_id);

    let mut b = FunctionBuilder::before(module, f, ci);
    let dim_x = b.const_int(Type::I32, 0);
    let ls_x = b.call_with_conv(get_local_size, &[dim_x], conv)?.expect("get_local_size returns a value");
    let lx = b.cast_unsigned(ls_x, element_ty)?;
    let dim_y = b.const_int(Type::I32, 1);
    let ls_y = b.call_with_conv(get_local_size, &[dim_y], conv)?.expect("get_local_size returns a value");
    let ly = b.cast_unsigned(ls_y, element_ty)?;

    let x = b.urem(element_id, lx)?;
    let id_minus_x = b.sub(element_id, x)?;
    let y_quot = b.udiv(id_minus_x, lx)?;
    let y = b.urem(y_quot, ly)?;
    let y_times_lx = b.mul(y, lx)?;
    let x_plus_y_lx = b.add(x, y_times_lx)?;
    let z_numerator = b.sub(element_id, x_plus_y_lx)?;
    let xy_plane = b.mul(lx, ly)?;
    let z = b.udiv(z_numerator, xy_plane)?;

    let barrier_id = b.const_int(Type::I32, 0);
    let x = b.cast_unsigned(x, size_ty)?;
    let y = b.cast_unsigned(y, size_ty)?;
    let z = b.cast_unsigned(z, size_ty)?;
    let new_value = b
        .call_with_conv(wg_broadcast, &[barrier_id, value, x, y, z], conv)?
        .expect("the work-group broadcast returns a value");

    let old = module.func(f).inst_result(ci).expect("broadcast calls produce a value");
    module.func_mut(f).replace_all_uses(old, new_value);
    Ok(())
}

/// Replace a sub-group work-item query with its value under degenerate
/// sub-groups: the sub-group is the work-group, so there is exactly one
/// sub-group, its id is 0, its size is the total local size, and the
/// sub-group local id is the local linear id.
fn replace_sub_group_work_item_call(module: &mut Module, bi: &BuiltinInfo, f: FuncId, ci: InstId, id: BuiltinId) {
    let conv = match module.func(f).inst(ci) {
        InstData::Call { conv, .. } => *conv,
        _ => unreachable!("queued call site is not a call"),
    };
    let old = module.func(f).inst_result(ci).expect("work-item queries produce a value");
    let ret_ty = module.func(f).value_type(old);

    match id {
        BuiltinId::GetSubGroupSize | BuiltinId::GetMaxSubGroupSize => {
            let get_local_size = bi.get_or_declare(module, BuiltinId::GetLocalSize, None);
            module.func_mut(get_local_size).set_calling_conv(conv);
            let mut b = FunctionBuilder::before(module, f, ci);
            let mut total: Option<Value> = None;
            for dim in 0..3u64 {
                let d = b.const_int(Type::I32, dim);
                let ls = b
                    .call_with_conv(get_local_size, &[d], conv)
                    .expect("get_local_size takes a dimension index")
                    .expect("get_local_size returns a value");
                total = Some(match total {
                    None => ls,
                    Some(t) => b.mul(t, ls).expect("local sizes share the size type"),
                });
            }
            let total = total.expect("three dimensions were combined");
            let total = b.cast_unsigned(total, ret_ty).expect("the query returns an integer");
            module.func_mut(f).replace_all_uses(old, total);
        }
        BuiltinId::GetNumSubGroups | BuiltinId::GetEnqueuedNumSubGroups => {
            let one = module.func_mut(f).const_int(ret_ty, 1);
            module.func_mut(f).replace_all_uses(old, one);
        }
        BuiltinId::GetSubGroupId => {
            let zero = module.func_mut(f).const_int(ret_ty, 0);
            module.func_mut(f).replace_all_uses(old, zero);
        }
        BuiltinId::GetSubGroupLocalId => {
            let get_linear_id = bi.get_or_declare(module, BuiltinId::GetLocalLinearId, None);
            module.func_mut(get_linear_id).set_calling_conv(conv);
            let mut b = FunctionBuilder::before(module, f, ci);
            let linear_id = b
                .call_with_conv(get_linear_id, &[], conv)
                .expect("get_local_linear_id takes no arguments")
                .expect("get_local_linear_id returns a value");
            let linear_id = b.cast_unsigned(linear_id, Type::I32).expect("the linear id is an integer");
            module.func_mut(f).replace_all_uses(old, linear_id);
        }
        _ => unreachable!("unhandled sub-group work-item builtin"),
    }
}
