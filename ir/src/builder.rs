//! Instruction builder with append and insert-before positioning.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::func::{BinaryOp, BlockId, InstData, InstId, Value};
use crate::module::{FuncId, Module};
use crate::types::{CallingConv, Type};

/// Builds instructions into one function of a module.
///
/// The builder owns a mutable borrow of the whole module so that calls
/// can be type-checked against their callee's signature at construction
/// time.
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: FuncId,
    block: BlockId,
    /// Insertion index within the block; None appends at the end.
    at: Option<usize>,
}

impl<'m> FunctionBuilder<'m> {
    /// Position at the end of the function's entry block, creating it if
    /// the function has no body yet.
    pub fn new(module: &'m mut Module, func: FuncId) -> Self {
        let block = match module.func(func).entry_block() {
            Some(b) => b,
            None => module.func_mut(func).append_block(),
        };
        Self { module, func, block, at: None }
    }

    /// Position immediately before an existing instruction.
    pub fn before(module: &'m mut Module, func: FuncId, anchor: InstId) -> Self {
        let f = module.func(func);
        let block = f.inst_block(anchor);
        let index = f
            .block_insts(block)
            .iter()
            .position(|&i| i == anchor)
            .expect("anchor instruction not in its block");
        Self { module, func, block, at: Some(index) }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    pub fn func_id(&self) -> FuncId {
        self.func
    }

    /// Append a fresh block and continue building there.
    pub fn append_block(&mut self) -> BlockId {
        let b = self.module.func_mut(self.func).append_block();
        self.block = b;
        self.at = None;
        b
    }

    pub fn const_int(&mut self, ty: Type, value: u64) -> Value {
        self.module.func_mut(self.func).const_int(ty, value)
    }

    fn push(&mut self, data: InstData, result_ty: Type) -> (InstId, Option<Value>) {
        let out = self.module.func_mut(self.func).push_inst_at(self.block, self.at, data, result_ty);
        if let Some(i) = &mut self.at {
            *i += 1;
        }
        out
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        let f = self.module.func(self.func);
        let (lt, rt) = (f.value_type(lhs), f.value_type(rhs));
        if lt != rt {
            return Err(Error::BinaryTypeMismatch { lhs: lt, rhs: rt });
        }
        if !lt.is_int() {
            return Err(Error::BinaryNotInteger { ty: lt });
        }
        let (_, v) = self.push(InstData::Binary { op, lhs, rhs }, lt);
        Ok(v.expect("binary instructions produce a value"))
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn udiv(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::UDiv, lhs, rhs)
    }

    pub fn urem(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        self.binary(BinaryOp::URem, lhs, rhs)
    }

    /// Unsigned integer cast. A no-op when the value already has the
    /// requested type.
    pub fn cast_unsigned(&mut self, value: Value, ty: Type) -> Result<Value> {
        let from = self.module.func(self.func).value_type(value);
        if from == ty {
            return Ok(value);
        }
        if !from.is_int() || !ty.is_int() {
            return Err(Error::CastNotInteger { from, to: ty });
        }
        let (_, v) = self.push(InstData::Cast { value, ty }, ty);
        Ok(v.expect("casts produce a value"))
    }

    /// Direct call using the callee's own calling convention.
    pub fn call(&mut self, callee: FuncId, args: &[Value]) -> Result<Option<Value>> {
        let conv = self.module.func(callee).calling_conv();
        self.call_with_conv(callee, args, conv)
    }

    /// Direct call with an explicit calling convention on the call site.
    pub fn call_with_conv(&mut self, callee: FuncId, args: &[Value], conv: CallingConv) -> Result<Option<Value>> {
        let callee_fn = self.module.func(callee);
        let ret = callee_fn.signature().ret;
        let name = callee_fn.name().to_owned();
        let sig = callee_fn.signature().clone();
        self.module.func(self.func).check_call_args(&name, &sig, args)?;
        let (_, v) = self.push(InstData::Call { callee, args: SmallVec::from_slice(args), conv }, ret);
        Ok(v)
    }

    /// Indirect call through a function-pointer value. The result type
    /// must be supplied since no callee is named.
    pub fn call_indirect(&mut self, target: Value, args: &[Value], ty: Type) -> Option<Value> {
        let (_, v) = self.push(InstData::CallIndirect { target, args: SmallVec::from_slice(args), ty }, ty);
        v
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(InstData::Ret { value }, Type::Void);
    }
}
