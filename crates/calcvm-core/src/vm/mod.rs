//! The stack-based virtual machine (spec.md §4.3). Grounded in
//! `examples/original_source/vm/virtual_machine.go`'s `State`/`VM.Run` dispatch
//! loop structure (one big match over a structured instruction, typed errors,
//! ip-restore-on-error) and in the teacher's own per-area helper-function split
//! (monty splits `compare.rs`/`attr.rs` out of its VM's central dispatch).

pub mod alloc;
pub mod error;

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::builtins::{list_elements_for_vm, Registry};
use crate::bytecode::shared::Linked;
use crate::bytecode::{Instruction, Opcode, Operand};
use crate::value::{clone_value, LambdaClosure, Ref, Value};
use alloc::Allocator;
use error::{ExecError, RuntimeError};

/// Number of general-purpose registers; one slot is conventionally reserved for
/// the current closure environment (spec.md §4.3), the rest are free for future
/// use and currently unused by the compiler.
const REGISTER_COUNT: usize = 4;

pub struct Vm<'a> {
    code: Vec<Instruction>,
    code_map: IndexMap<usize, String>,
    data_map: IndexMap<usize, String>,
    builtins: &'a Registry,
    stack: Vec<Value>,
    data: Allocator,
    bp: usize,
    ip: usize,
    gr: [Value; REGISTER_COUNT],
    halted: bool,
}

impl<'a> Vm<'a> {
    #[must_use]
    pub fn new(linked: &Linked, builtins: &'a Registry) -> Self {
        let static_slots = if linked.highest_data_offset < 0 {
            0
        } else {
            linked.highest_data_offset as usize + 1
        };
        Self {
            code: linked.code.clone(),
            code_map: linked.code_map.clone(),
            data_map: linked.data_map.clone(),
            builtins,
            stack: Vec::new(),
            data: Allocator::with_static_slots(static_slots),
            bp: 0,
            ip: 0,
            gr: [Value::Unit, Value::Unit, Value::Unit, Value::Unit],
            halted: false,
        }
    }

    /// Runs until `halt` or an error. Returns the top of stack (or `Unit` if the
    /// program left nothing) as the expression's value, per invariant 1 of
    /// spec.md §8.
    pub fn run(&mut self) -> Result<Value, ExecError> {
        while !self.halted {
            if self.ip >= self.code.len() {
                break;
            }
            if let Err(error) = self.step() {
                return Err(ExecError {
                    error,
                    ip: self.ip,
                    snapshot: self.summary(),
                });
            }
        }
        Ok(self.stack.last().cloned().unwrap_or(Value::Unit))
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::InvalidStackSize("stack underflow".into()))
    }

    fn pop_ref(&mut self) -> Result<Ref, RuntimeError> {
        match self.pop()? {
            Value::Ref(r) => Ok(r),
            other => Err(RuntimeError::InvalidOperandType(format!(
                "expected a ref, got {}",
                other.type_name()
            ))),
        }
    }

    fn pop_int(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::Int(i) => i
                .to_i64()
                .ok_or_else(|| RuntimeError::InvalidOperandValue("integer out of range".into())),
            other => Err(RuntimeError::InvalidOperandType(format!(
                "expected an int, got {}",
                other.type_name()
            ))),
        }
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        let stack_backup = self.stack.clone();
        match self.try_step() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stack = stack_backup;
                Err(e)
            }
        }
    }

    fn try_step(&mut self) -> Result<(), RuntimeError> {
        let instr = self.code[self.ip].clone();
        self.ip += 1;

        match instr.opcode {
            Opcode::Push => {
                let value = match instr.operand {
                    Operand::Value(v) => v,
                    Operand::Ref(r) => Value::Ref(r),
                    Operand::Int(n) => Value::Int(BigInt::from(n)),
                    _ => {
                        return Err(RuntimeError::InvalidOperandType(
                            "push requires a resolved operand".into(),
                        ))
                    }
                };
                self.stack.push(value);
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(RuntimeError::InvalidStackSize("swap needs 2 values".into()));
                }
                self.stack.swap(len - 1, len - 2);
            }
            Opcode::Clone => {
                let top = self.pop()?;
                self.stack.push(clone_value(&top));
            }
            Opcode::Iadd => {
                let b = self.pop()?;
                let a = self.pop()?;
                match (a, b) {
                    (Value::Int(a), Value::Int(b)) => self.stack.push(Value::Int(a + b)),
                    _ => return Err(RuntimeError::InvalidOperandType("iadd requires two ints".into())),
                }
            }
            Opcode::Load => {
                let r = self.require_ref(&instr.operand)?;
                let value = self
                    .data
                    .get(r.0)
                    .cloned()
                    .ok_or(RuntimeError::InvalidAddress(r.0))?;
                self.stack.push(value);
            }
            Opcode::Store => {
                let r = self.require_ref(&instr.operand)?;
                let value = self.pop()?;
                if !self.data.set(r.0, value) {
                    return Err(RuntimeError::InvalidAddress(r.0));
                }
            }
            Opcode::Stores => {
                let addr = self.pop_ref()?;
                let value = self.pop()?;
                if !self.data.set(addr.0, value) {
                    return Err(RuntimeError::InvalidAddress(addr.0));
                }
            }
            Opcode::Alloc => {
                let slot = self.data.alloc(Value::Unit);
                self.stack.push(Value::Ref(Ref(slot)));
            }
            Opcode::Free => {
                let r = self.pop_ref()?;
                self.data.free(r.0);
            }
            Opcode::Tmake => {
                let n = self.require_int(&instr.operand)? as usize;
                if self.stack.len() < n {
                    return Err(RuntimeError::InvalidStackSize("tmake underflow".into()));
                }
                let elems = self.stack.split_off(self.stack.len() - n);
                self.stack.push(Value::Table(elems));
            }
            Opcode::Tload => {
                let i = self.require_int(&instr.operand)? as usize;
                let table = self.pop()?;
                match table {
                    Value::Table(t) => {
                        let value = t
                            .get(i)
                            .cloned()
                            .ok_or_else(|| RuntimeError::InvalidOperandValue("tload index out of range".into()))?;
                        self.stack.push(value);
                    }
                    other => {
                        return Err(RuntimeError::InvalidOperandType(format!(
                            "tload requires a table, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Opcode::Tstore => {
                let i = self.require_int(&instr.operand)? as usize;
                let value = self.pop()?;
                match self.stack.last_mut() {
                    Some(Value::Table(t)) => {
                        if i >= t.len() {
                            return Err(RuntimeError::InvalidOperandValue(
                                "tstore index out of range".into(),
                            ));
                        }
                        t[i] = value;
                    }
                    _ => {
                        return Err(RuntimeError::InvalidOperandType(
                            "tstore requires a table on top of stack".into(),
                        ))
                    }
                }
            }
            Opcode::Callb => self.exec_callb(&instr.operand)?,
            Opcode::Call => {
                let target = self.require_ref(&instr.operand)?;
                self.stack.push(Value::ReturnAddr(self.ip));
                self.ip = target.0;
            }
            Opcode::Calli => {
                let addr = self.require_ref(&instr.operand)?;
                let target = self
                    .data
                    .get(addr.0)
                    .cloned()
                    .ok_or(RuntimeError::InvalidAddress(addr.0))?;
                self.dispatch_dynamic_call(target)?;
            }
            Opcode::Calls => {
                let target = self.pop()?;
                self.dispatch_dynamic_call(target)?;
            }
            Opcode::Return => {
                let ret = self.pop()?;
                match ret {
                    Value::ReturnAddr(addr) => self.ip = addr,
                    other => {
                        return Err(RuntimeError::InvalidOperandType(format!(
                            "return expected a return address, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Opcode::Enter => {
                self.stack.push(Value::Int(BigInt::from(self.bp as i64)));
                self.bp = self.stack.len() - 3;
            }
            Opcode::Leave => {
                // Stack before leave, top to bottom: return_value, saved_bp,
                // ret_ip, argc, …args… (enter pushed saved_bp last, and the body
                // leaves exactly one value above that — spec.md §4.3).
                let ret_val = self.pop()?;
                let saved_bp = self.pop()?;
                let ret_ip = self.pop()?;
                let argc = self.pop_int_value()?;
                if self.stack.len() < argc as usize {
                    return Err(RuntimeError::InvalidStackSize("leave underflow".into()));
                }
                self.stack.truncate(self.stack.len() - argc as usize);
                self.stack.push(ret_val);
                self.stack.push(ret_ip);
                self.bp = match saved_bp {
                    Value::Int(i) => i
                        .to_i64()
                        .and_then(|v| usize::try_from(v).ok())
                        .ok_or_else(|| RuntimeError::InvalidOperandValue("bad saved bp".into()))?,
                    _ => return Err(RuntimeError::InvalidOperandType("expected saved bp".into())),
                };
            }
            Opcode::Reparm => {
                let argc = self.frame_argc()?;
                let base = self.bp - argc as usize;
                let args: Vec<Value> = self.stack[base..self.bp].to_vec();
                self.stack.extend(args);
                self.stack.push(Value::Int(BigInt::from(argc)));
            }
            Opcode::Vldac => {
                let n = self.require_int(&instr.operand)?;
                if n >= 0 {
                    let argc = self.frame_argc()?;
                    if argc != n {
                        return Err(RuntimeError::InvalidArgumentCount {
                            expected: n as i32,
                            got: argc as usize,
                        });
                    }
                }
            }
            Opcode::Pushparm => {
                let i = self.require_int(&instr.operand)? as usize;
                let idx = self
                    .bp
                    .checked_sub(1 + i)
                    .ok_or_else(|| RuntimeError::InvalidStackSize("pushparm out of range".into()))?;
                let value = self
                    .stack
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| RuntimeError::InvalidStackSize("pushparm out of range".into()))?;
                self.stack.push(value);
            }
            Opcode::Copys => {
                if let Operand::Copys(c) = instr.operand {
                    let len = self.stack.len();
                    let start = len
                        .checked_sub(c.offset + c.len)
                        .ok_or_else(|| RuntimeError::InvalidStackSize("copys out of range".into()))?;
                    let slice = self.stack[start..start + c.len].to_vec();
                    self.stack.extend(slice);
                } else {
                    return Err(RuntimeError::InvalidOperandType("copys requires a Copys operand".into()));
                }
            }
            Opcode::Mkclsr => {
                let lambda_addr = self.require_ref(&instr.operand)?;
                let env = self.pop_ref()?;
                self.stack.push(Value::Closure(LambdaClosure {
                    lambda_addr: lambda_addr.0,
                    env_slot: env.0,
                }));
            }
            Opcode::Setgr => {
                let i = self.require_int(&instr.operand)? as usize;
                let value = self.pop()?;
                let slot = self
                    .gr
                    .get_mut(i)
                    .ok_or(RuntimeError::InvalidRegister(i))?;
                *slot = value;
            }
            Opcode::Getgr => {
                let i = self.require_int(&instr.operand)? as usize;
                let value = self.gr.get(i).cloned().ok_or(RuntimeError::InvalidRegister(i))?;
                self.stack.push(value);
            }
            Opcode::Halt => {
                self.halted = true;
            }
        }
        Ok(())
    }

    fn pop_int_value(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::Int(i) => i
                .to_i64()
                .ok_or_else(|| RuntimeError::InvalidOperandValue("integer out of range".into())),
            other => Err(RuntimeError::InvalidOperandType(format!(
                "expected int, got {}",
                other.type_name()
            ))),
        }
    }

    fn frame_argc(&self) -> Result<i64, RuntimeError> {
        match self.stack.get(self.bp) {
            Some(Value::Int(i)) => i
                .to_i64()
                .ok_or_else(|| RuntimeError::InvalidOperandValue("argc out of range".into())),
            _ => Err(RuntimeError::InvalidStackSize("no active frame".into())),
        }
    }

    fn require_ref(&self, operand: &Operand) -> Result<Ref, RuntimeError> {
        match operand {
            Operand::Ref(r) => Ok(*r),
            _ => Err(RuntimeError::InvalidOperandType("expected a resolved ref".into())),
        }
    }

    fn require_int(&self, operand: &Operand) -> Result<i64, RuntimeError> {
        match operand {
            Operand::Int(n) => Ok(*n),
            _ => Err(RuntimeError::InvalidOperandType("expected an int operand".into())),
        }
    }

    /// Shared by `calli` (target read from data) and `calls` (target popped from
    /// the stack): detects a `LambdaClosure` and pushes its env ref as the hidden
    /// zeroth argument before dispatching, incrementing argc to match (spec.md
    /// §4.1's closure capture contract; the callee was compiled expecting this
    /// extra slot whenever it's in closure mode, see `Compiler::is_closure_mode`).
    fn dispatch_dynamic_call(&mut self, target: Value) -> Result<(), RuntimeError> {
        match target {
            Value::Ref(addr) => {
                self.stack.push(Value::ReturnAddr(self.ip));
                self.ip = addr.0;
                Ok(())
            }
            Value::Closure(c) => {
                let argc = self.pop_int_value()?;
                // The hidden zeroth argument must be the captured table itself,
                // not a ref to it: the lambda body reads it with
                // `pushparm 0; tload slot`, and `tload` requires a table on the
                // stack, not a ref.
                let env = self
                    .data
                    .get(c.env_slot)
                    .cloned()
                    .ok_or(RuntimeError::InvalidAddress(c.env_slot))?;
                self.stack.push(env);
                self.stack.push(Value::Int(BigInt::from(argc + 1)));
                self.stack.push(Value::ReturnAddr(self.ip));
                self.ip = c.lambda_addr;
                Ok(())
            }
            other => Err(RuntimeError::InvalidOperandType(format!(
                "cannot call a {}",
                other.type_name()
            ))),
        }
    }

    fn exec_callb(&mut self, operand: &Operand) -> Result<(), RuntimeError> {
        let Operand::CallB(cb) = operand else {
            return Err(RuntimeError::InvalidOperandType("callb requires a CallB operand".into()));
        };
        let n = if cb.numparms < 0 {
            self.pop_int_value()? as usize
        } else {
            cb.numparms as usize
        };
        if self.stack.len() < n {
            return Err(RuntimeError::InvalidStackSize("callb underflow".into()));
        }
        let mut args = self.stack.split_off(self.stack.len() - n);
        args.reverse();

        match self.builtins.name(cb.index) {
            Some("map") => {
                let result = self.hof_map(args)?;
                self.stack.push(result);
            }
            Some("filter") => {
                let result = self.hof_filter(args)?;
                self.stack.push(result);
            }
            Some("reduce") => {
                let result = self.hof_reduce(args)?;
                self.stack.push(result);
            }
            _ => {
                let result = self.builtins.call(cb.index, &args)?;
                self.stack.push(result);
            }
        }
        Ok(())
    }

    /// Invokes a callable `Value` (a plain function `Ref` or a `Closure`) with
    /// already-evaluated arguments, by replaying the same frame-setup a `calls`
    /// instruction performs and then stepping the dispatch loop until that frame's
    /// `leave`/`return` has unwound back to the caller's stack depth. This is the
    /// only form of VM reentrancy the system needs (spec.md §5 forbids reentrant
    /// evaluation from *user* code, but `map`/`reduce`/`filter` calling back into
    /// a first-class function value are host-builtin machinery, not user code).
    fn invoke(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let depth_before = self.stack.len();
        let resume_ip = self.ip;

        for arg in args.iter().rev() {
            self.stack.push(arg.clone());
        }
        self.stack.push(Value::Int(BigInt::from(args.len() as i64)));
        self.dispatch_dynamic_call(callee)?;

        loop {
            if self.stack.len() == depth_before + 1 {
                break;
            }
            if self.ip >= self.code.len() {
                return Err(RuntimeError::InvalidStackSize(
                    "callable ran past end of program".into(),
                ));
            }
            self.try_step()?;
        }
        self.ip = resume_ip;
        self.pop()
    }

    fn hof_map(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let [list, callee] = <[Value; 2]>::try_from(args).map_err(|_| {
            RuntimeError::InvalidArgumentCount { expected: 2, got: 0 }
        })?;
        let elements = list_elements_for_vm(&list)?;
        let mut out = Vec::with_capacity(elements.len());
        for e in elements {
            out.push(self.invoke(callee.clone(), vec![e])?);
        }
        let list_ctor = self.builtins.lookup("list").expect("list builtin always registered");
        self.builtins.call(list_ctor, &out)
    }

    fn hof_filter(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let [list, callee] = <[Value; 2]>::try_from(args).map_err(|_| {
            RuntimeError::InvalidArgumentCount { expected: 2, got: 0 }
        })?;
        let elements = list_elements_for_vm(&list)?;
        let mut out = Vec::new();
        for e in elements {
            if self.invoke(callee.clone(), vec![e.clone()])?.is_truthy() {
                out.push(e);
            }
        }
        let list_ctor = self.builtins.lookup("list").expect("list builtin always registered");
        self.builtins.call(list_ctor, &out)
    }

    /// Human-readable VM state at the current `ip`, used both for `ExecError`
    /// snapshots and the REPL's `:debug` disassembly surface (SPEC_FULL.md §4.9).
    #[must_use]
    pub fn summary(&self) -> String {
        let stack_preview: Vec<String> = self
            .stack
            .iter()
            .rev()
            .take(8)
            .map(std::string::ToString::to_string)
            .collect();
        format!(
            "ip={} bp={} stack(top-first, max 8)=[{}]",
            self.ip,
            self.bp,
            stack_preview.join(", ")
        )
    }

    #[must_use]
    pub fn ip(&self) -> usize {
        self.ip
    }

    #[must_use]
    pub fn code_map(&self) -> &IndexMap<usize, String> {
        &self.code_map
    }

    #[must_use]
    pub fn data_map(&self) -> &IndexMap<usize, String> {
        &self.data_map
    }

    #[must_use]
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    fn hof_reduce(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let [list, callee, init] = <[Value; 3]>::try_from(args).map_err(|_| {
            RuntimeError::InvalidArgumentCount { expected: 3, got: 0 }
        })?;
        let elements = list_elements_for_vm(&list)?;
        let mut acc = init;
        for e in elements {
            acc = self.invoke(callee.clone(), vec![acc, e])?;
        }
        Ok(acc)
    }
}
