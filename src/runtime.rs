//! Execution engine: the shared operand stack, the flat locals stack,
//! method lookup and dispatch, instance allocation, and the opcode loop.
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bootstrap;
use crate::bytecode::Opcode;
use crate::bytes;
use crate::class::{Class, Method};
use crate::classfile::{parse_class, ClassError};
use crate::object::Object;
use crate::pool::{Constant, FieldKind, ResolvedField};
use crate::registry::ClassRegistry;

/// `istore_0`..`istore_3` address four slots even when a method declares
/// fewer locals, so every frame reserves at least that many.
const MIN_LOCALS: u16 = 4;

/// One operand-stack or local slot: a tagged word wide enough for a
/// reference, a 32-bit integer, or a 32-bit float bit pattern.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i32),
    Float(f32),
    Ref(Rc<Object>),
}

impl Value {
    /// Pointer-identity comparison for the `if_acmp*` family.
    pub fn same_ref(a: &Self, b: &Self) -> bool {
        match (a, b) {
            (Self::Null, Self::Null) => true,
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Bit equality, so distinct NaN patterns stay distinct.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Fatal interpreter errors. There is no exception mechanism and no stack
/// unwind; the run reports the error and halts.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    ClassNotFound {
        name: String,
    },
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },
    UnknownOpcode {
        opcode: u8,
        pc: u32,
    },
    DivisionByZero {
        pc: u32,
    },
    /// The resolved method has no `Code` attribute to execute.
    MissingCode {
        class: String,
        name: String,
    },
    /// `getfield`/`putfield` hit a pool slot the loader never resolved,
    /// i.e. a field of some other class.
    UnresolvedField {
        index: u16,
        pc: u32,
    },
    /// `ldc` of a constant kind outside the supported set.
    UnsupportedConstant {
        index: u16,
        pc: u32,
    },
    /// Field access on a 64-bit (long/double) cell; no opcode in the
    /// subset can carry the value.
    WideFieldAccess {
        index: u16,
        pc: u32,
    },
    /// A pool index did not hold the constant shape the opcode demands.
    BadConstant {
        index: u16,
        expected: &'static str,
        pc: u32,
    },
    OperandMismatch {
        opcode: Opcode,
        pc: u32,
    },
    StackUnderflow {
        opcode: Opcode,
        pc: u32,
    },
    BadLocal {
        index: usize,
        pc: u32,
    },
    /// The program counter or an operand ran off the end of the bytecode.
    TruncatedCode {
        pc: u32,
    },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassNotFound { name } => {
                write!(f, "class `{name}` is not registered")
            }
            Self::MethodNotFound {
                class,
                name,
                descriptor,
            } => write!(f, "method `{class}.{name}{descriptor}` not found"),
            Self::UnknownOpcode { opcode, pc } => {
                write!(f, "unknown opcode {opcode:#04x} at pc {pc}")
            }
            Self::DivisionByZero { pc } => {
                write!(f, "integer division by zero at pc {pc}")
            }
            Self::MissingCode { class, name } => {
                write!(f, "method `{class}.{name}` has no Code attribute")
            }
            Self::UnresolvedField { index, pc } => {
                write!(f, "unresolved field reference #{index} at pc {pc}")
            }
            Self::UnsupportedConstant { index, pc } => {
                write!(f, "unsupported ldc constant #{index} at pc {pc}")
            }
            Self::WideFieldAccess { index, pc } => {
                write!(f, "64-bit field access via #{index} at pc {pc}")
            }
            Self::BadConstant {
                index,
                expected,
                pc,
            } => write!(f, "constant #{index} is not a {expected} (pc {pc})"),
            Self::OperandMismatch { opcode, pc } => {
                write!(f, "operand of the wrong kind for {opcode} at pc {pc}")
            }
            Self::StackUnderflow { opcode, pc } => {
                write!(f, "operand stack underflow at {opcode}, pc {pc}")
            }
            Self::BadLocal { index, pc } => {
                write!(f, "local slot {index} out of range at pc {pc}")
            }
            Self::TruncatedCode { pc } => {
                write!(f, "bytecode ends inside an instruction at pc {pc}")
            }
        }
    }
}

impl Error for RuntimeError {}

/// The virtual machine: class registry, object heap, and the two stacks
/// every invocation shares. Single-threaded and non-reentrant.
pub struct Runtime {
    registry: ClassRegistry,
    heap: Vec<Rc<Object>>,
    stack: Vec<Value>,
    locals: Vec<Value>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            registry: ClassRegistry::new(),
            heap: Vec::new(),
            stack: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Loads the built-in `java/lang/Object` blob.
    pub fn bootstrap(&mut self) -> Result<Rc<Class>, ClassError> {
        self.load_class(bootstrap::ROOT_CLASS_NAME, bootstrap::ROOT_CLASS.to_vec())
    }

    /// Parses `bytes` and registers the class under `name`. If the name is
    /// already registered the existing class is returned unchanged, so a
    /// name always maps to one class identity.
    pub fn load_class(&mut self, name: &str, bytes: Vec<u8>) -> Result<Rc<Class>, ClassError> {
        if let Some(existing) = self.registry.get(name) {
            return Ok(existing);
        }
        let class = Rc::new(parse_class(name, bytes)?);
        self.registry.insert(class.clone());
        Ok(class)
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Top of the operand stack, where a completed invocation leaves its
    /// return value.
    pub fn operand_top(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Invokes the first method with the given name (any descriptor) with a
    /// null receiver. This is how the host harness enters `main`.
    pub fn call(&mut self, class: &Rc<Class>, method_name: &str) -> Result<(), RuntimeError> {
        let method =
            class
                .method_named(method_name.as_bytes())
                .ok_or_else(|| RuntimeError::MethodNotFound {
                    class: class.name().to_owned(),
                    name: method_name.to_owned(),
                    descriptor: String::new(),
                })?;
        self.invoke(class, method, Value::Null)
    }

    /// Runs a method: reserves its locals, seats the receiver in slot 0,
    /// executes the bytecode, and releases the locals again. Any return
    /// value is left on the shared operand stack by the method's own
    /// return opcode.
    pub fn invoke(
        &mut self,
        class: &Rc<Class>,
        method: &Method,
        receiver: Value,
    ) -> Result<(), RuntimeError> {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| RuntimeError::MissingCode {
                class: class.name().to_owned(),
                name: class.method_name(method).into_owned(),
            })?;
        debug!(class = class.name(), method = %class.method_name(method), "invoke");

        let local_count = usize::from(code.max_locals.max(MIN_LOCALS));
        self.alloc_locals(local_count);
        let top = self.locals.len() - 1;
        self.locals[top] = receiver;

        let result = self.execute(class, code.code.of(class.bytes()));
        self.free_locals(local_count);
        result
    }

    /// Resolves the method reference at `index` in `class`'s pool, locates
    /// the named class in the registry, and invokes the matching method.
    fn dispatch(
        &mut self,
        class: &Rc<Class>,
        receiver: Value,
        index: u16,
        pc: u32,
    ) -> Result<(), RuntimeError> {
        let (class_name, name, descriptor) =
            class
                .member_ref_at(index)
                .ok_or(RuntimeError::BadConstant {
                    index,
                    expected: "method reference",
                    pc,
                })?;
        let target = self
            .registry
            .get(&String::from_utf8_lossy(class_name))
            .ok_or_else(|| RuntimeError::ClassNotFound {
                name: String::from_utf8_lossy(class_name).into_owned(),
            })?;
        let method =
            target
                .find_method(name, descriptor)
                .ok_or_else(|| RuntimeError::MethodNotFound {
                    class: target.name().to_owned(),
                    name: String::from_utf8_lossy(name).into_owned(),
                    descriptor: String::from_utf8_lossy(descriptor).into_owned(),
                })?;
        self.invoke(&target, method, receiver)
    }

    /// Allocates an instance of the class named by the Class constant at
    /// `index`: zeroed field area, header back reference, heap handle.
    fn new_instance(
        &mut self,
        class: &Rc<Class>,
        index: u16,
        pc: u32,
    ) -> Result<Rc<Object>, RuntimeError> {
        let name = class
            .class_name_at(index)
            .ok_or(RuntimeError::BadConstant {
                index,
                expected: "class",
                pc,
            })?;
        let target = self
            .registry
            .get(&String::from_utf8_lossy(name))
            .ok_or_else(|| RuntimeError::ClassNotFound {
                name: String::from_utf8_lossy(name).into_owned(),
            })?;
        let handle = self.heap.len() as u32 + 1;
        let object = Rc::new(Object::new(target, handle));
        self.heap.push(object.clone());
        Ok(object)
    }

    fn object_by_handle(&self, handle: u32) -> Value {
        if handle == 0 {
            return Value::Null;
        }
        match self.heap.get(handle as usize - 1) {
            Some(object) => Value::Ref(object.clone()),
            None => Value::Null,
        }
    }

    fn read_field(
        &self,
        object: &Object,
        field: ResolvedField,
        index: u16,
        pc: u32,
    ) -> Result<Value, RuntimeError> {
        let offset = usize::from(field.offset);
        match field.kind {
            FieldKind::Int => Ok(Value::Int(object.read_cell(offset, 4) as u32 as i32)),
            FieldKind::Float => Ok(Value::Float(f32::from_bits(
                object.read_cell(offset, 4) as u32
            ))),
            FieldKind::Reference => {
                let handle = object.read_cell(offset, field.byte_len()) as u32;
                Ok(self.object_by_handle(handle))
            }
            FieldKind::Long | FieldKind::Double => Err(RuntimeError::WideFieldAccess { index, pc }),
        }
    }

    fn write_field(
        &self,
        object: &Object,
        field: ResolvedField,
        value: Value,
        opcode: Opcode,
        index: u16,
        pc: u32,
    ) -> Result<(), RuntimeError> {
        let offset = usize::from(field.offset);
        match (field.kind, value) {
            (FieldKind::Int, Value::Int(v)) => {
                object.write_cell(offset, 4, v as u32 as u64);
                Ok(())
            }
            (FieldKind::Float, Value::Float(v)) => {
                object.write_cell(offset, 4, u64::from(v.to_bits()));
                Ok(())
            }
            (FieldKind::Reference, Value::Null) => {
                object.write_cell(offset, field.byte_len(), 0);
                Ok(())
            }
            (FieldKind::Reference, Value::Ref(target)) => {
                object.write_cell(offset, field.byte_len(), u64::from(target.handle()));
                Ok(())
            }
            (FieldKind::Long | FieldKind::Double, _) => {
                Err(RuntimeError::WideFieldAccess { index, pc })
            }
            _ => Err(RuntimeError::OperandMismatch { opcode, pc }),
        }
    }

    fn alloc_locals(&mut self, count: usize) {
        self.locals.resize(self.locals.len() + count, Value::Null);
    }

    fn free_locals(&mut self, count: usize) {
        self.locals.truncate(self.locals.len() - count);
    }

    /// Writes local slot `index`, counted downward from the locals top
    /// (slot 0 is the most recently reserved slot of the current frame).
    fn store_local(&mut self, index: usize, value: Value) -> Option<()> {
        let slot = self.locals.len().checked_sub(index + 1)?;
        self.locals[slot] = value;
        Some(())
    }

    fn load_local(&self, index: usize) -> Option<Value> {
        let slot = self.locals.len().checked_sub(index + 1)?;
        Some(self.locals[slot].clone())
    }

    /// Non-destructive read of the k-th operand from the top (k = 0 is the
    /// top).
    pub fn peek(&self, k: usize) -> Option<&Value> {
        self.stack.get(self.stack.len().checked_sub(k + 1)?)
    }

    fn pop(&mut self, opcode: Opcode, pc: u32) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { opcode, pc })
    }

    fn pop_int(&mut self, opcode: Opcode, pc: u32) -> Result<i32, RuntimeError> {
        match self.pop(opcode, pc)? {
            Value::Int(v) => Ok(v),
            _ => Err(RuntimeError::OperandMismatch { opcode, pc }),
        }
    }

    fn pop_float(&mut self, opcode: Opcode, pc: u32) -> Result<f32, RuntimeError> {
        match self.pop(opcode, pc)? {
            Value::Float(v) => Ok(v),
            _ => Err(RuntimeError::OperandMismatch { opcode, pc }),
        }
    }

    fn pop_object(&mut self, opcode: Opcode, pc: u32) -> Result<Rc<Object>, RuntimeError> {
        match self.pop(opcode, pc)? {
            Value::Ref(object) => Ok(object),
            _ => Err(RuntimeError::OperandMismatch { opcode, pc }),
        }
    }

    /// The dispatch loop. `pc` indexes into `code`; each arm performs the
    /// opcode's effect and advances `pc` by the instruction's total length
    /// (or jumps). Branch displacements are measured from the opcode's own
    /// address.
    fn execute(&mut self, class: &Rc<Class>, code: &[u8]) -> Result<(), RuntimeError> {
        let mut pc: u32 = 0;
        loop {
            let at = pc as usize;
            let byte = *code.get(at).ok_or(RuntimeError::TruncatedCode { pc })?;
            let op = Opcode::decode(byte).ok_or(RuntimeError::UnknownOpcode { opcode: byte, pc })?;
            trace!(pc, opcode = %op, depth = self.stack.len(), "step");

            match op {
                Opcode::Nop => pc += 1,
                Opcode::Pop => {
                    self.pop(op, pc)?;
                    pc += 1;
                }
                Opcode::Dup => {
                    let top = self
                        .peek(0)
                        .cloned()
                        .ok_or(RuntimeError::StackUnderflow { opcode: op, pc })?;
                    self.stack.push(top);
                    pc += 1;
                }

                Opcode::AConstNull => {
                    self.stack.push(Value::Null);
                    pc += 1;
                }
                Opcode::Iconst0
                | Opcode::Iconst1
                | Opcode::Iconst2
                | Opcode::Iconst3
                | Opcode::Iconst4
                | Opcode::Iconst5 => {
                    self.stack
                        .push(Value::Int(i32::from(byte - Opcode::Iconst0 as u8)));
                    pc += 1;
                }
                Opcode::Fconst0 | Opcode::Fconst1 | Opcode::Fconst2 => {
                    self.stack
                        .push(Value::Float(f32::from(byte - Opcode::Fconst0 as u8)));
                    pc += 1;
                }
                Opcode::BiPush => {
                    let v = operand_u8(code, pc)?;
                    self.stack.push(Value::Int(i32::from(v)));
                    pc += 2;
                }
                Opcode::Ldc => {
                    let index = u16::from(operand_u8(code, pc)?);
                    match class.pool().get(index) {
                        Some(Constant::Integer(raw)) => {
                            self.stack.push(Value::Int(*raw as i32));
                        }
                        Some(Constant::Float(raw)) => {
                            self.stack.push(Value::Float(f32::from_bits(*raw)));
                        }
                        _ => return Err(RuntimeError::UnsupportedConstant { index, pc }),
                    }
                    pc += 2;
                }

                Opcode::ILoad | Opcode::ALoad => {
                    let index = usize::from(operand_u8(code, pc)?);
                    let v = self
                        .load_local(index)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    self.stack.push(v);
                    pc += 2;
                }
                Opcode::ILoad0 | Opcode::ILoad1 | Opcode::ILoad2 | Opcode::ILoad3 => {
                    let index = usize::from(byte - Opcode::ILoad0 as u8);
                    let v = self
                        .load_local(index)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    self.stack.push(v);
                    pc += 1;
                }
                Opcode::ALoad0 | Opcode::ALoad1 | Opcode::ALoad2 | Opcode::ALoad3 => {
                    let index = usize::from(byte - Opcode::ALoad0 as u8);
                    let v = self
                        .load_local(index)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    self.stack.push(v);
                    pc += 1;
                }
                Opcode::IStore | Opcode::AStore => {
                    let index = usize::from(operand_u8(code, pc)?);
                    let v = self.pop(op, pc)?;
                    self.store_local(index, v)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    pc += 2;
                }
                Opcode::IStore0 | Opcode::IStore1 | Opcode::IStore2 | Opcode::IStore3 => {
                    let index = usize::from(byte - Opcode::IStore0 as u8);
                    let v = self.pop(op, pc)?;
                    self.store_local(index, v)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    pc += 1;
                }
                Opcode::AStore0 | Opcode::AStore1 | Opcode::AStore2 | Opcode::AStore3 => {
                    let index = usize::from(byte - Opcode::AStore0 as u8);
                    let v = self.pop(op, pc)?;
                    self.store_local(index, v)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    pc += 1;
                }
                Opcode::IInc => {
                    let index = usize::from(operand_u8(code, pc)?);
                    let delta =
                        bytes::u8_at(code, at + 2).ok_or(RuntimeError::TruncatedCode { pc })? as i8;
                    let v = match self.load_local(index) {
                        Some(Value::Int(v)) => v,
                        Some(_) => return Err(RuntimeError::OperandMismatch { opcode: op, pc }),
                        None => return Err(RuntimeError::BadLocal { index, pc }),
                    };
                    let v = Value::Int(v.wrapping_add(i32::from(delta)));
                    self.store_local(index, v)
                        .ok_or(RuntimeError::BadLocal { index, pc })?;
                    pc += 3;
                }

                Opcode::IAdd => {
                    let rhs = self.pop_int(op, pc)?;
                    let lhs = self.pop_int(op, pc)?;
                    self.stack.push(Value::Int(lhs.wrapping_add(rhs)));
                    pc += 1;
                }
                Opcode::ISub => {
                    // The stack top is the left operand of the
                    // non-commutative ops.
                    let lhs = self.pop_int(op, pc)?;
                    let rhs = self.pop_int(op, pc)?;
                    self.stack.push(Value::Int(lhs.wrapping_sub(rhs)));
                    pc += 1;
                }
                Opcode::IDiv => {
                    let lhs = self.pop_int(op, pc)?;
                    let rhs = self.pop_int(op, pc)?;
                    if rhs == 0 {
                        return Err(RuntimeError::DivisionByZero { pc });
                    }
                    self.stack.push(Value::Int(lhs.wrapping_div(rhs)));
                    pc += 1;
                }
                Opcode::I2S => {
                    let v = self.pop_int(op, pc)?;
                    self.stack.push(Value::Int(i32::from(v as i16)));
                    pc += 1;
                }
                Opcode::FAdd => {
                    let rhs = self.pop_float(op, pc)?;
                    let lhs = self.pop_float(op, pc)?;
                    self.stack.push(Value::Float(lhs + rhs));
                    pc += 1;
                }
                Opcode::FMul => {
                    let rhs = self.pop_float(op, pc)?;
                    let lhs = self.pop_float(op, pc)?;
                    self.stack.push(Value::Float(lhs * rhs));
                    pc += 1;
                }
                Opcode::FDiv => {
                    let lhs = self.pop_float(op, pc)?;
                    let rhs = self.pop_float(op, pc)?;
                    self.stack.push(Value::Float(lhs / rhs));
                    pc += 1;
                }

                Opcode::IfICmpEq
                | Opcode::IfICmpNe
                | Opcode::IfICmpLt
                | Opcode::IfICmpGe
                | Opcode::IfICmpGt
                | Opcode::IfICmpLe => {
                    let target = branch_target16(code, pc)?;
                    let rhs = self.pop_int(op, pc)?;
                    let lhs = self.pop_int(op, pc)?;
                    let taken = match op {
                        Opcode::IfICmpEq => lhs == rhs,
                        Opcode::IfICmpNe => lhs != rhs,
                        Opcode::IfICmpLt => lhs < rhs,
                        Opcode::IfICmpGe => lhs >= rhs,
                        Opcode::IfICmpGt => lhs > rhs,
                        Opcode::IfICmpLe => lhs <= rhs,
                        _ => unreachable!(),
                    };
                    pc = if taken { target } else { pc + 3 };
                }
                Opcode::IfEq
                | Opcode::IfNe
                | Opcode::IfLt
                | Opcode::IfGe
                | Opcode::IfGt
                | Opcode::IfLe => {
                    let target = branch_target16(code, pc)?;
                    let v = self.pop_int(op, pc)?;
                    let taken = match op {
                        Opcode::IfEq => v == 0,
                        Opcode::IfNe => v != 0,
                        Opcode::IfLt => v < 0,
                        Opcode::IfGe => v >= 0,
                        Opcode::IfGt => v > 0,
                        Opcode::IfLe => v <= 0,
                        _ => unreachable!(),
                    };
                    pc = if taken { target } else { pc + 3 };
                }
                Opcode::IfACmpEq | Opcode::IfACmpNe => {
                    let target = branch_target16(code, pc)?;
                    let rhs = self.pop(op, pc)?;
                    let lhs = self.pop(op, pc)?;
                    let equal = Value::same_ref(&lhs, &rhs);
                    let taken = (op == Opcode::IfACmpEq) == equal;
                    pc = if taken { target } else { pc + 3 };
                }
                Opcode::IfNull | Opcode::IfNonNull => {
                    let target = branch_target16(code, pc)?;
                    let null = matches!(self.pop(op, pc)?, Value::Null);
                    let taken = (op == Opcode::IfNull) == null;
                    pc = if taken { target } else { pc + 3 };
                }
                Opcode::Goto => pc = branch_target16(code, pc)?,
                Opcode::GotoW => pc = branch_target32(code, pc)?,

                Opcode::New => {
                    let index = operand_u16(code, pc)?;
                    let object = self.new_instance(class, index, pc)?;
                    self.stack.push(Value::Ref(object));
                    pc += 3;
                }
                Opcode::GetField => {
                    let index = operand_u16(code, pc)?;
                    let field = class
                        .field_slot(index)
                        .ok_or(RuntimeError::UnresolvedField { index, pc })?;
                    let object = self.pop_object(op, pc)?;
                    let v = self.read_field(&object, field, index, pc)?;
                    self.stack.push(v);
                    pc += 3;
                }
                Opcode::PutField => {
                    let index = operand_u16(code, pc)?;
                    let field = class
                        .field_slot(index)
                        .ok_or(RuntimeError::UnresolvedField { index, pc })?;
                    let value = self.pop(op, pc)?;
                    let object = self.pop_object(op, pc)?;
                    self.write_field(&object, field, value, op, index, pc)?;
                    pc += 3;
                }

                Opcode::InvokeStatic => {
                    let index = operand_u16(code, pc)?;
                    self.dispatch(class, Value::Null, index, pc)?;
                    pc += 3;
                }
                Opcode::InvokeVirtual | Opcode::InvokeSpecial => {
                    let index = operand_u16(code, pc)?;
                    let receiver = self.pop(op, pc)?;
                    self.dispatch(class, receiver, index, pc)?;
                    pc += 3;
                }

                // A value-returning method leaves its result on the shared
                // operand stack; `return` leaves the stack untouched.
                Opcode::AReturn | Opcode::IReturn | Opcode::FReturn | Opcode::Return => {
                    return Ok(())
                }
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn operand_u8(code: &[u8], pc: u32) -> Result<u8, RuntimeError> {
    bytes::u8_at(code, pc as usize + 1).ok_or(RuntimeError::TruncatedCode { pc })
}

fn operand_u16(code: &[u8], pc: u32) -> Result<u16, RuntimeError> {
    bytes::u16_at(code, pc as usize + 1).ok_or(RuntimeError::TruncatedCode { pc })
}

/// Target of a 16-bit branch: the signed displacement is relative to the
/// opcode's own address, so a displacement of 0 loops on the opcode itself.
pub(crate) fn branch_target16(code: &[u8], pc: u32) -> Result<u32, RuntimeError> {
    let disp = bytes::i16_at(code, pc as usize + 1).ok_or(RuntimeError::TruncatedCode { pc })?;
    Ok((i64::from(pc) + i64::from(disp)) as u32)
}

pub(crate) fn branch_target32(code: &[u8], pc: u32) -> Result<u32, RuntimeError> {
    let disp = bytes::i32_at(code, pc as usize + 1).ok_or(RuntimeError::TruncatedCode { pc })?;
    Ok((i64::from(pc) + i64::from(disp)) as u32)
}
