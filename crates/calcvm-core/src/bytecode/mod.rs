pub mod compiler;
pub mod fragment;
pub mod instr;
pub mod shared;

pub use compiler::Compiler;
pub use instr::{Instruction, Opcode, Operand, Unresolved, UnresolvedKind};
pub use shared::{Compiled, Linked, Shared};
