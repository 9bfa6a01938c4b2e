//! Mux builtin catalogue for the skein kernel compiler.
//!
//! Builtins are identified first by tag ([`BuiltinId`]); the mangled
//! `__mux_*` name is only touched at two boundaries: analysing an
//! existing function ([`BuiltinInfo::analyze_builtin`]) and synthesising
//! a declaration ([`BuiltinInfo::get_or_declare`]).
//!
//! Group collectives carry their scope structurally, so rebinding a
//! sub-group collective to work-group scope is
//! `gc.with_scope(Scope::WorkGroup)` followed by
//! [`BuiltinInfo::group_collective_id`], which yields
//! [`BuiltinId::Invalid`] for combinations with no registered builtin
//! (work-group shuffles).

pub mod id;
pub mod mangle;

#[cfg(test)]
pub mod test;

pub use id::{BuiltinId, CollectiveKind, GroupCollective, Recurrence, Scope};
pub use mangle::{mangled_name, parse};

use skein_ir::{CallingConv, FuncId, Function, Linkage, Module, Signature, Type};

/// Analysis result for one function: its identity plus the element-type
/// overload encoded in the mangled name, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub id: BuiltinId,
    pub overload: Option<Type>,
}

impl Builtin {
    pub const INVALID: Builtin = Builtin { id: BuiltinId::Invalid, overload: None };
}

/// The builtin information service.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinInfo;

impl BuiltinInfo {
    pub fn new() -> Self {
        Self
    }

    /// Classify a function by name. Functions that are not mux builtins
    /// analyse as [`Builtin::INVALID`].
    pub fn analyze_builtin(&self, f: &Function) -> Builtin {
        match mangle::parse(f.name()) {
            Some((id, overload)) => Builtin { id, overload },
            None => Builtin::INVALID,
        }
    }

    /// The builtin registered for a group collective, or
    /// [`BuiltinId::Invalid`] when no such builtin exists. Shuffles are
    /// lane-addressed and have no work-group form.
    pub fn group_collective_id(&self, gc: GroupCollective) -> BuiltinId {
        if gc.scope == Scope::WorkGroup && gc.kind.is_shuffle() {
            return BuiltinId::Invalid;
        }
        BuiltinId::Collective(gc)
    }

    /// The catalogue signature of a builtin.
    ///
    /// `size_ty` is the module's size type; `overload` is the element
    /// type for collectives (defaulted per kind when absent).
    pub fn signature(&self, id: BuiltinId, overload: Option<Type>, size_ty: Type) -> Signature {
        match id {
            BuiltinId::SubGroupBarrier => Signature::new(vec![], Type::Void),
            BuiltinId::WorkGroupBarrier => Signature::new(vec![Type::I32], Type::Void),
            BuiltinId::GetLocalSize => Signature::new(vec![Type::I32], size_ty),
            BuiltinId::GetLocalLinearId => Signature::new(vec![], size_ty),
            BuiltinId::GetSubGroupSize
            | BuiltinId::GetMaxSubGroupSize
            | BuiltinId::GetNumSubGroups
            | BuiltinId::GetEnqueuedNumSubGroups
            | BuiltinId::GetSubGroupId
            | BuiltinId::GetSubGroupLocalId => Signature::new(vec![], Type::I32),
            BuiltinId::Collective(gc) => {
                let elem = overload.unwrap_or(match gc.kind {
                    CollectiveKind::All | CollectiveKind::Any => Type::I1,
                    _ => Type::I32,
                });
                let mut params = Vec::new();
                if gc.scope == Scope::WorkGroup {
                    // Work-group collectives carry a barrier id.
                    params.push(Type::I32);
                }
                params.push(elem);
                match gc.kind {
                    CollectiveKind::Broadcast => match gc.scope {
                        Scope::SubGroup => params.push(Type::I32),
                        Scope::WorkGroup => params.extend([size_ty, size_ty, size_ty]),
                    },
                    CollectiveKind::Shuffle
                    | CollectiveKind::ShuffleUp
                    | CollectiveKind::ShuffleDown
                    | CollectiveKind::ShuffleXor => params.push(Type::I32),
                    _ => {}
                }
                Signature::new(params, elem)
            }
            BuiltinId::Invalid => unreachable!("the invalid builtin has no signature"),
        }
    }

    /// Find the builtin's declaration in the module, or declare it.
    pub fn get_or_declare(&self, module: &mut Module, id: BuiltinId, overload: Option<Type>) -> FuncId {
        let name = mangle::mangled_name(id, overload);
        if let Some(f) = module.find_function(&name) {
            return f;
        }
        let sig = self.signature(id, overload, module.size_type());
        module.declare_function(name, sig, Linkage::External, CallingConv::Default)
    }
}
