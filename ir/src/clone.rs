//! Function body cloning.
//!
//! `clone_function_body` is the "clone into a prepared declaration"
//! primitive: the caller creates the destination declaration first (so a
//! complete original-to-clone map can exist before any body is walked),
//! then bodies are copied one by one with direct callees remapped
//! through that map. Remapping during the walk is what retargets calls
//! between clones without a separate fixup pass.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::func::{Function, InstData, InstId, Subprogram, Value, ValueDef};
use crate::module::{FuncId, Module};

/// Clone `src`'s body into `dst`, remapping direct callees through
/// `callee_map` (identity for callees not present in the map).
///
/// `dst` must be an empty declaration with `src`'s signature.
/// Attributes, metadata, and argument names are copied; a debug
/// subprogram on `src` is regenerated for `dst` under the clone's name,
/// never shared. Returns the cloned return instructions.
pub fn clone_function_body(
    module: &mut Module,
    src: FuncId,
    dst: FuncId,
    callee_map: &HashMap<FuncId, FuncId>,
) -> Result<Vec<InstId>> {
    let src_fn = module.func(src).clone();
    let dst_fn = module.func_mut(dst);
    if !dst_fn.is_declaration() || dst_fn.signature() != src_fn.signature() {
        return Err(Error::CloneTargetMismatch { name: dst_fn.name().to_owned() });
    }

    dst_fn.copy_attrs_from(&src_fn);
    dst_fn.set_local_size(src_fn.local_size());
    if src_fn.subprogram().is_some() {
        let name = dst_fn.name().to_owned();
        dst_fn.set_subprogram(Some(Subprogram { name }));
    }

    // Bind each source argument to the matching destination argument,
    // preserving names.
    let mut vmap: HashMap<Value, Value> = HashMap::new();
    for index in 0..src_fn.num_args() {
        dst_fn.set_arg_name(index, src_fn.arg_name(index));
        vmap.insert(src_fn.arg_value(index), dst_fn.arg_value(index));
    }

    let mut returns = Vec::new();
    for src_block in src_fn.block_ids() {
        let dst_block = dst_fn.append_block();
        for &inst in src_fn.block_insts(src_block) {
            let mut data = src_fn.inst(inst).clone();
            remap_operands(dst_fn, &src_fn, &mut vmap, &mut data);
            if let InstData::Call { callee, .. } = &mut data
                && let Some(&mapped) = callee_map.get(callee)
            {
                *callee = mapped;
            }
            let is_ret = matches!(data, InstData::Ret { .. });
            let result_ty = match src_fn.inst_result(inst) {
                Some(v) => src_fn.value_type(v),
                None => crate::types::Type::Void,
            };
            let (new_inst, new_result) = dst_fn.push_inst_at(dst_block, None, data, result_ty);
            if let (Some(old), Some(new)) = (src_fn.inst_result(inst), new_result) {
                vmap.insert(old, new);
            }
            if is_ret {
                returns.push(new_inst);
            }
        }
    }
    Ok(returns)
}

fn remap_operands(dst: &mut Function, src: &Function, vmap: &mut HashMap<Value, Value>, data: &mut InstData) {
    // Remapped slot by slot: source and destination handles share an
    // index space, so a value-equality rewrite could alias a slot that
    // was already remapped.
    data.map_operands(|old| match vmap.get(&old) {
        Some(&v) => v,
        None => match src.value_def(old) {
            ValueDef::ConstInt { ty, value } => {
                let v = dst.const_int(*ty, *value);
                vmap.insert(old, v);
                v
            }
            _ => unreachable!("operand used before definition in source function"),
        },
    });
}
