//! Disassembly and state-dump helpers (SPEC_FULL.md §4.9). No `tracing`/`log`
//! dependency, matching the teacher's own choice (`monty-cli/src/main.rs`
//! reports everything through `eprintln!`/`Display`); diagnostics here are
//! plain `Display`-style string builders consumed by the REPL's `--debug`
//! output.

use std::fmt::Write as _;

use crate::bytecode::{Instruction, Linked, Opcode, Operand};

/// One disassembled line: `<offset>: <opcode> <operand>`, with the symbolic
/// name substituted for any instruction a prior link resolved to a `Ref`.
#[must_use]
pub fn instruction_string(offset: usize, instr: &Instruction, linked: &Linked) -> String {
    let operand = match &instr.operand {
        Operand::None => String::new(),
        Operand::Int(n) => format!(" {n}"),
        Operand::Value(v) => format!(" {v}"),
        Operand::Ref(r) => {
            if let Some(name) = linked.code_map.get(&r.0).or_else(|| linked.data_map.get(&r.0)) {
                format!(" &{} ({name})", r.0)
            } else {
                format!(" &{}", r.0)
            }
        }
        Operand::Unresolved(u) => format!(" <unresolved {}:{}>", u.kind, u.name),
        Operand::CallB(cb) => format!(" #{} argc={}", cb.index, cb.numparms),
        Operand::Copys(c) => format!(" offset={} len={}", c.offset, c.len),
    };
    format!("{offset:>5}: {}{operand}", instr.opcode)
}

/// Disassembles the whole linked program, one instruction per line.
#[must_use]
pub fn disassemble(linked: &Linked) -> String {
    let mut out = String::new();
    for (offset, instr) in linked.code.iter().enumerate() {
        let _ = writeln!(out, "{}", instruction_string(offset, instr, linked));
    }
    out
}

/// A `±window` slice of the disassembly centered on `ip`, used by the REPL's
/// `--debug` crash dump so a failing instruction is shown in context instead
/// of dumping the whole program.
#[must_use]
pub fn disassemble_window(linked: &Linked, ip: usize, window: usize) -> String {
    let start = ip.saturating_sub(window);
    let end = (ip + window + 1).min(linked.code.len());
    let mut out = String::new();
    for offset in start..end {
        let marker = if offset == ip { ">" } else { " " };
        let _ = writeln!(
            out,
            "{marker}{}",
            instruction_string(offset, &linked.code[offset], linked)
        );
    }
    out
}

/// Renders a caret under the failing column of a source line, for parse-error
/// display (spec.md §7's "user visible" contract).
#[must_use]
pub fn caret_line(src_line: &str, col: usize) -> String {
    let mut out = String::new();
    out.push_str(src_line);
    out.push('\n');
    for _ in 1..col {
        out.push(' ');
    }
    out.push('^');
    out
}

#[must_use]
pub fn opcode_help(op: Opcode) -> &'static str {
    match op {
        Opcode::Push => "push a value (or resolved ref) onto the stack",
        Opcode::Pop => "discard the top of stack",
        Opcode::Swap => "swap the top two stack values",
        Opcode::Clone => "deep-copy the top of stack in place",
        Opcode::Iadd => "pop two ints, push their sum",
        Opcode::Load => "push a copy of a data-segment slot",
        Opcode::Store => "pop a value into a data-segment slot",
        Opcode::Stores => "pop addr then value, store value at addr",
        Opcode::Alloc => "allocate a data-segment slot, push its ref",
        Opcode::Free => "pop a ref, free its data-segment slot",
        Opcode::Tmake => "pop n values, push them as a table",
        Opcode::Tload => "pop a table, push element i",
        Opcode::Tstore => "store into element i of the table on top of stack",
        Opcode::Callb => "call a builtin by index",
        Opcode::Call => "call a resolved function address",
        Opcode::Calli => "call the function value stored at an address",
        Opcode::Calls => "call the function value on top of stack",
        Opcode::Return => "pop a return address and jump to it",
        Opcode::Enter => "push the saved base pointer, open a new frame",
        Opcode::Leave => "tear down the current frame, keep the return value",
        Opcode::Reparm => "re-push the current frame's arguments",
        Opcode::Vldac => "validate argument count against a fixed arity",
        Opcode::Pushparm => "push a copy of parameter i of the current frame",
        Opcode::Copys => "copy a slice near the top of stack to the top",
        Opcode::Mkclsr => "pop an env ref, push a closure over a lambda address",
        Opcode::Setgr => "pop a value into general register i",
        Opcode::Getgr => "push the value of general register i",
        Opcode::Halt => "stop execution",
    }
}
