//! Functions: blocks, instructions, and the per-function value table.
//!
//! Entities are referenced by `Copy` index handles rather than pointers.
//! Values are function-local: arguments occupy the first slots of the
//! value table, instruction results and interned constants follow. This
//! keeps replace-all-uses and erasure strictly within one function, so a
//! rewrite in one function can never invalidate a value held for another.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::module::FuncId;
use crate::types::{CallingConv, Linkage, Signature, Type};

/// Handle to a function-local SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub(crate) u32);

impl Value {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an instruction within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub(crate) u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Definition site of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDef {
    /// Function argument at the given parameter index.
    Arg { index: usize, ty: Type, name: String },
    /// Result of an instruction.
    Inst { inst: InstId, ty: Type },
    /// Interned integer constant.
    ConstInt { ty: Type, value: u64 },
}

impl ValueDef {
    pub fn ty(&self) -> Type {
        match self {
            ValueDef::Arg { ty, .. } | ValueDef::Inst { ty, .. } | ValueDef::ConstInt { ty, .. } => *ty,
        }
    }
}

/// Integer binary operator. All arithmetic is unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    URem,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::URem => "urem",
        }
    }
}

/// Instruction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InstData {
    /// Unsigned integer arithmetic on same-typed operands.
    Binary { op: BinaryOp, lhs: Value, rhs: Value },
    /// Unsigned integer cast (zero-extend or truncate by width).
    Cast { value: Value, ty: Type },
    /// Direct call. The result type is the callee's return type.
    Call { callee: FuncId, args: SmallVec<[Value; 4]>, conv: CallingConv },
    /// Indirect call through a function-pointer value.
    CallIndirect { target: Value, args: SmallVec<[Value; 4]>, ty: Type },
    /// Return from the function.
    Ret { value: Option<Value> },
}

impl InstData {
    /// The directly-named callee, if this is a direct call.
    pub fn called_function(&self) -> Option<FuncId> {
        match self {
            InstData::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }

    /// Rewrite every operand slot through `f`, each slot exactly once.
    pub(crate) fn map_operands(&mut self, mut f: impl FnMut(Value) -> Value) {
        match self {
            InstData::Binary { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            InstData::Cast { value, .. } => *value = f(*value),
            InstData::Call { args, .. } => args.iter_mut().for_each(|a| *a = f(*a)),
            InstData::CallIndirect { target, args, .. } => {
                *target = f(*target);
                args.iter_mut().for_each(|a| *a = f(*a));
            }
            InstData::Ret { value } => {
                if let Some(v) = value {
                    *v = f(*v);
                }
            }
        }
    }

    /// Replace every operand equal to `old` with `new`.
    pub(crate) fn replace_operand(&mut self, old: Value, new: Value) {
        let swap = |v: &mut Value| {
            if *v == old {
                *v = new;
            }
        };
        match self {
            InstData::Binary { lhs, rhs, .. } => {
                swap(lhs);
                swap(rhs);
            }
            InstData::Cast { value, .. } => swap(value),
            InstData::Call { args, .. } => args.iter_mut().for_each(swap),
            InstData::CallIndirect { target, args, .. } => {
                swap(target);
                args.iter_mut().for_each(swap);
            }
            InstData::Ret { value } => {
                if let Some(v) = value {
                    swap(v);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct InstNode {
    data: InstData,
    result: Option<Value>,
    block: BlockId,
}

/// A basic block: an ordered list of instructions.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub(crate) insts: Vec<InstId>,
}

/// Debug subprogram stand-in. Clones regenerate it, never share it.
#[derive(Debug, Clone, PartialEq)]
pub struct Subprogram {
    pub name: String,
}

/// A function: signature, attributes, metadata, and (for definitions) a
/// body of blocks and instructions.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    sig: Signature,
    linkage: Linkage,
    conv: CallingConv,
    attrs: BTreeMap<String, String>,
    local_size: Option<[u32; 3]>,
    subprogram: Option<Subprogram>,
    blocks: Vec<Block>,
    insts: Vec<Option<InstNode>>,
    values: Vec<ValueDef>,
    const_cache: HashMap<(Type, u64), Value>,
}

impl Function {
    pub(crate) fn new(name: String, sig: Signature, linkage: Linkage, conv: CallingConv) -> Self {
        let values = sig
            .params
            .iter()
            .enumerate()
            .map(|(index, ty)| ValueDef::Arg { index, ty: *ty, name: format!("arg{index}") })
            .collect();
        Self {
            name,
            sig,
            linkage,
            conv,
            attrs: BTreeMap::new(),
            local_size: None,
            subprogram: None,
            blocks: Vec::new(),
            insts: Vec::new(),
            values,
            const_cache: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn calling_conv(&self) -> CallingConv {
        self.conv
    }

    pub fn set_calling_conv(&mut self, conv: CallingConv) {
        self.conv = conv;
    }

    /// A declaration has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    // String attributes. These back the kernel metadata accessors of the
    // transform layer.

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.remove(key);
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn copy_attrs_from(&mut self, other: &Function) {
        for (k, v) in &other.attrs {
            self.attrs.insert(k.clone(), v.clone());
        }
    }

    /// Required work-group size metadata, when known at compile time.
    pub fn local_size(&self) -> Option<[u32; 3]> {
        self.local_size
    }

    pub fn set_local_size(&mut self, size: Option<[u32; 3]>) {
        self.local_size = size;
    }

    pub fn subprogram(&self) -> Option<&Subprogram> {
        self.subprogram.as_ref()
    }

    pub fn set_subprogram(&mut self, sp: Option<Subprogram>) {
        self.subprogram = sp;
    }

    // Values.

    pub fn num_args(&self) -> usize {
        self.sig.params.len()
    }

    /// Value handle of the argument at `index`. Arguments occupy the
    /// first slots of the value table.
    pub fn arg_value(&self, index: usize) -> Value {
        assert!(index < self.num_args(), "argument index out of range");
        Value(index as u32)
    }

    pub fn arg_name(&self, index: usize) -> &str {
        match &self.values[index] {
            ValueDef::Arg { name, .. } => name,
            _ => unreachable!("argument slot holds a non-argument value"),
        }
    }

    pub fn set_arg_name(&mut self, index: usize, name: impl Into<String>) {
        match &mut self.values[index] {
            ValueDef::Arg { name: n, .. } => *n = name.into(),
            _ => unreachable!("argument slot holds a non-argument value"),
        }
    }

    pub fn value_def(&self, v: Value) -> &ValueDef {
        &self.values[v.index()]
    }

    pub fn value_type(&self, v: Value) -> Type {
        self.values[v.index()].ty()
    }

    /// Interned integer constant of the given type.
    pub fn const_int(&mut self, ty: Type, value: u64) -> Value {
        if let Some(&v) = self.const_cache.get(&(ty, value)) {
            return v;
        }
        let v = Value(self.values.len() as u32);
        self.values.push(ValueDef::ConstInt { ty, value });
        self.const_cache.insert((ty, value), v);
        v
    }

    // Blocks and instructions.

    pub fn append_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        (!self.blocks.is_empty()).then_some(BlockId(0))
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + use<> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block_insts(&self, b: BlockId) -> &[InstId] {
        &self.blocks[b.index()].insts
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()].as_ref().expect("instruction was erased").data
    }

    pub fn inst_result(&self, id: InstId) -> Option<Value> {
        self.insts[id.index()].as_ref().expect("instruction was erased").result
    }

    pub fn inst_block(&self, id: InstId) -> BlockId {
        self.insts[id.index()].as_ref().expect("instruction was erased").block
    }

    /// Iterate all live instructions in program order.
    pub fn insts(&self) -> impl Iterator<Item = (InstId, &InstData)> {
        self.blocks.iter().flat_map(|b| &b.insts).map(|&id| (id, self.inst(id)))
    }

    /// Insert an instruction into `block`. `index` of None appends.
    ///
    /// Returns the instruction handle and its result value (None when
    /// `result_ty` is `Void`).
    pub(crate) fn push_inst_at(
        &mut self,
        block: BlockId,
        index: Option<usize>,
        data: InstData,
        result_ty: Type,
    ) -> (InstId, Option<Value>) {
        let id = InstId(self.insts.len() as u32);
        let result = (result_ty != Type::Void).then(|| {
            let v = Value(self.values.len() as u32);
            self.values.push(ValueDef::Inst { inst: id, ty: result_ty });
            v
        });
        self.insts.push(Some(InstNode { data, result, block }));
        let insts = &mut self.blocks[block.index()].insts;
        match index {
            Some(i) => insts.insert(i, id),
            None => insts.push(id),
        }
        (id, result)
    }

    /// Replace every use of `old` with `new` across the function.
    pub fn replace_all_uses(&mut self, old: Value, new: Value) {
        for node in self.insts.iter_mut().flatten() {
            node.data.replace_operand(old, new);
        }
    }

    /// Retarget a direct call to a different callee. The signatures of
    /// the old and new callee must agree; callers are trusted on this.
    pub fn retarget_call(&mut self, id: InstId, new_callee: FuncId) {
        let node = self.insts[id.index()].as_mut().expect("instruction was erased");
        match &mut node.data {
            InstData::Call { callee, .. } => *callee = new_callee,
            _ => unreachable!("retarget_call on a non-call instruction"),
        }
    }

    /// Unlink an instruction from its block and drop it. Operands are
    /// detached; the handle becomes invalid.
    pub fn erase_inst(&mut self, id: InstId) {
        let node = self.insts[id.index()].take().expect("instruction already erased");
        let insts = &mut self.blocks[node.block.index()].insts;
        let pos = insts.iter().position(|&i| i == id).expect("instruction not in its block");
        insts.remove(pos);
    }

    pub(crate) fn check_call_args(&self, callee_name: &str, callee_sig: &Signature, args: &[Value]) -> Result<()> {
        if args.len() != callee_sig.params.len() {
            return Err(Error::CallArityMismatch {
                callee: callee_name.to_owned(),
                expected: callee_sig.params.len(),
                actual: args.len(),
            });
        }
        for (index, (&arg, &expected)) in args.iter().zip(&callee_sig.params).enumerate() {
            let actual = self.value_type(arg);
            if actual != expected {
                return Err(Error::CallArgTypeMismatch { callee: callee_name.to_owned(), index, expected, actual });
            }
        }
        Ok(())
    }
}
