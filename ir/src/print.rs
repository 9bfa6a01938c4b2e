//! Deterministic textual printer.
//!
//! The output is stable across runs for identical modules, so tests can
//! compare functions and whole modules byte for byte.

use std::fmt::{self, Write as _};

use crate::func::{Function, InstData, Value, ValueDef};
use crate::module::{FuncId, Module};

fn operand(f: &Function, v: Value) -> String {
    match f.value_def(v) {
        ValueDef::ConstInt { ty, value } => format!("{ty} {value}"),
        _ => format!("%{}", v.index()),
    }
}

/// Render one function, declaration or definition.
pub fn function_to_string(module: &Module, id: FuncId) -> String {
    let f = module.func(id);
    let mut out = String::new();

    let params: Vec<String> =
        f.signature().params.iter().enumerate().map(|(i, ty)| format!("{ty} %{i}")).collect();
    let head = if f.is_declaration() { "declare" } else { "fn" };
    let _ = write!(out, "{head} @{}({}) -> {}", f.name(), params.join(", "), f.signature().ret);

    let attrs: Vec<String> = f.attrs().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
    if !attrs.is_empty() {
        let _ = write!(out, " attrs{{{}}}", attrs.join(", "));
    }
    if let Some([x, y, z]) = f.local_size() {
        let _ = write!(out, " local_size[{x}, {y}, {z}]");
    }
    if f.is_declaration() {
        out.push('\n');
        return out;
    }

    out.push_str(" {\n");
    for b in f.block_ids() {
        let _ = writeln!(out, "b{}:", b.index());
        for &inst in f.block_insts(b) {
            out.push_str("  ");
            if let Some(r) = f.inst_result(inst) {
                let _ = write!(out, "%{} = ", r.index());
            }
            match f.inst(inst) {
                InstData::Binary { op, lhs, rhs } => {
                    let ty = f.value_type(*lhs);
                    let _ = write!(out, "{} {ty} {}, {}", op.mnemonic(), operand(f, *lhs), operand(f, *rhs));
                }
                InstData::Cast { value, ty } => {
                    let _ = write!(out, "cast {} to {ty}", operand(f, *value));
                }
                InstData::Call { callee, args, .. } => {
                    let args: Vec<String> = args.iter().map(|&a| operand(f, a)).collect();
                    let _ = write!(out, "call @{}({})", module.func(*callee).name(), args.join(", "));
                }
                InstData::CallIndirect { target, args, .. } => {
                    let args: Vec<String> = args.iter().map(|&a| operand(f, a)).collect();
                    let _ = write!(out, "call.indirect {}({})", operand(f, *target), args.join(", "));
                }
                InstData::Ret { value } => match value {
                    Some(v) => {
                        let _ = write!(out, "ret {}", operand(f, *v));
                    }
                    None => out.push_str("ret"),
                },
            }
            out.push('\n');
        }
    }
    out.push_str("}\n");
    out
}

impl fmt::Display for Module {
    fn fmt(&self, fm: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fm, "module @{} (size_t = {}) {{", self.name(), self.size_type())?;
        for id in self.func_ids() {
            for line in function_to_string(self, id).lines() {
                writeln!(fm, "  {line}")?;
            }
        }
        write!(fm, "}}")
    }
}
