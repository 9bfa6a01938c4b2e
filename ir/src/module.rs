//! The module: an ordered collection of functions.

use crate::func::{Function, InstId};
use crate::types::{CallingConv, Linkage, PointerWidth, Signature, Type};

/// Handle to a function in a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A linked module. Functions are appended and never removed, so
/// [`FuncId`] handles stay valid for the module's lifetime.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    size_ty: Type,
    funcs: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>, ptr_width: PointerWidth) -> Self {
        Self { name: name.into(), size_ty: ptr_width.size_type(), funcs: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The target's `size_t` type.
    pub fn size_type(&self) -> Type {
        self.size_ty
    }

    /// Append a new function declaration and return its handle.
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        sig: Signature,
        linkage: Linkage,
        conv: CallingConv,
    ) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(Function::new(name.into(), sig, linkage, conv));
        id
    }

    /// Look a function up by its current name.
    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.funcs.iter().position(|f| f.name() == name).map(|i| FuncId(i as u32))
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + use<> {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs.iter().enumerate().map(|(i, f)| (FuncId(i as u32), f))
    }

    /// Reverse call-site edges: every direct call to `target`, as
    /// (calling function, call instruction) pairs, in program order.
    pub fn callers_of(&self, target: FuncId) -> Vec<(FuncId, InstId)> {
        let mut sites = Vec::new();
        for (id, f) in self.funcs() {
            for (inst, data) in f.insts() {
                if data.called_function() == Some(target) {
                    sites.push((id, inst));
                }
            }
        }
        sites
    }
}
