//! The compiler: AST walks → bytecode fragments (spec.md §4.1). Grounded in
//! `bytecode/compiler.rs`'s pass structure (build tables, then a single
//! post-order emission walk) and `bytecode/builder.rs`'s builder pattern, adapted
//! into a fragment-emitting builder since operands here are structured rather than
//! packed bytes. The name-resolution order and reversal pass are supplemented from
//! `examples/original_source/compiler/resolve.go` and `compiler/reverse.go`.

use std::collections::HashMap;

use crate::ast::{Ast, BinaryOp, Node, NodeId, Order, UnaryOp};
use crate::builtins::Registry;
use crate::bytecode::fragment::{ClosureCapture, Fragment};
use crate::bytecode::instr::{Instruction, Opcode, Operand, UnresolvedKind};
use crate::bytecode::shared::{Compiled, Shared};
use crate::error::CompileError;
use crate::symbol::{SymbolTable, VarSymbol};
use crate::value::Value;

enum Resolved {
    LocalParm(usize),
    AncestorParm {
        inner_fn: NodeId,
        ancestor_fn: String,
        index: usize,
    },
    Var,
    Fn(String),
    Builtin(usize),
}

/// Drives one module's compilation. Not `Send`/`Sync` by design — the compiler is
/// single-use, constructed fresh per REPL line (spec.md §5's single-threaded model).
pub struct Compiler<'a> {
    builtins: &'a Registry,
    base_shared: Option<&'a Shared>,
    module_id: u64,
    func_names: HashMap<NodeId, String>,
    local_funcs: HashMap<String, NodeId>,
    local_vars: SymbolTable<VarSymbol>,
    fragments: HashMap<NodeId, Fragment>,
    closures: HashMap<NodeId, ClosureCapture>,
    lambda_counter: usize,
    shim_cache: HashMap<String, String>,
    shim_defs: Vec<(String, Vec<Instruction>)>,
}

impl<'a> Compiler<'a> {
    pub fn compile(
        ast: &mut Ast,
        builtins: &'a Registry,
        base_shared: Option<&'a Shared>,
        module_id: u64,
    ) -> Result<Compiled, CompileError> {
        let mut compiler = Compiler {
            builtins,
            base_shared,
            module_id,
            func_names: HashMap::new(),
            local_funcs: HashMap::new(),
            local_vars: SymbolTable::new(),
            fragments: HashMap::new(),
            closures: HashMap::new(),
            lambda_counter: 0,
            shim_cache: HashMap::new(),
            shim_defs: Vec::new(),
        };

        // Pass 1: parent pointers.
        ast.set_parents();

        // Pass 2: local function table + lambda auto-naming (invariant 2).
        compiler.build_function_table(ast);

        // Pass 3: local variable table, in document order (invariant 5).
        compiler.build_variable_table(ast);

        // Determine, for every FuncDef, whether any descendant identifier captures
        // one of its *own* enclosing function's parameters — this must be known
        // before emission so every `pushparm` inside a capturing lambda can be
        // shifted by one slot to make room for the hidden env argument at index 0
        // (see `closure_construction` / the call-site handling in `vm::Vm`).
        compiler.precompute_closure_mode(ast);

        // Pass 4: reversal so post-order emission pushes operands in source order.
        compiler.reverse_operand_order(ast);

        // Pass 5: post-order emission.
        let root = ast.root();
        compiler.emit_post_order(ast, root)?;

        // Pass 6: main code is exactly the root's collected fragment.
        let main = compiler
            .fragments
            .get(&root)
            .map(|f| f.main.clone())
            .unwrap_or_default();

        // Pass 7: collect function bodies (document order for determinism).
        let mut shared = Shared::new();
        for id in compiler.nodes_with_fn_body(ast) {
            let frag = compiler.fragments.get(&id).expect("fn body fragment present");
            let name = frag.fn_name.clone().expect("fn body implies fn_name");
            let body = frag.fn_body.clone().expect("checked by nodes_with_fn_body");
            let arity = compiler.arity_of(ast, id);
            shared.add_fn(name, &body, arity);
        }
        for (name, body) in &compiler.shim_defs {
            shared.add_fn(name.clone(), body, -1);
        }
        for (name, _) in compiler.local_vars.iter() {
            shared.add_var(name.clone());
        }

        Ok(Compiled { main, shared })
    }

    fn arity_of(&self, ast: &Ast, id: NodeId) -> i32 {
        match ast.get(id) {
            Node::FuncDef { params, .. } => params.len() as i32,
            _ => -1,
        }
    }

    fn nodes_with_fn_body(&self, ast: &Ast) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut collect = |_: &Ast, id: NodeId, _depth: usize| -> bool {
            ids.push(id);
            true
        };
        ast.walk(Order::Post, ast.root(), &mut collect);
        ids.retain(|id| {
            self.fragments
                .get(id)
                .is_some_and(|f| f.fn_body.is_some())
        });
        ids
    }

    fn build_function_table(&mut self, ast: &Ast) {
        let mut assign = |_: &Ast, id: NodeId, _depth: usize| -> bool {
            if let Node::FuncDef { name, .. } = ast.get(id) {
                let assigned = if name.is_empty() {
                    let n = format!("@{}.lambda-{}", self.module_id, self.lambda_counter);
                    self.lambda_counter += 1;
                    n
                } else {
                    name.clone()
                };
                self.local_funcs.insert(assigned.clone(), id);
                self.func_names.insert(id, assigned);
            }
            true
        };
        ast.walk(Order::Pre, ast.root(), &mut assign);
    }

    /// Walks every identifier-like name occurrence once, populating `self.closures`
    /// from purely structural (name/param) information — the same resolution
    /// `resolve_name` performs during emission, run early so the shift decision
    /// below doesn't depend on emission order.
    fn precompute_closure_mode(&mut self, ast: &Ast) {
        let mut sites = Vec::new();
        let mut collect = |_: &Ast, id: NodeId, _depth: usize| -> bool {
            sites.push(id);
            true
        };
        ast.walk(Order::Pre, ast.root(), &mut collect);

        for id in sites {
            let name = match ast.get(id) {
                Node::Ident { name } => name.clone(),
                Node::FuncCall { name, .. } => name.clone(),
                _ => continue,
            };
            if let Some(Resolved::AncestorParm {
                inner_fn,
                ancestor_fn,
                index,
            }) = self.resolve_name(ast, id, &name)
            {
                self.closures
                    .entry(inner_fn)
                    .or_insert_with(ClosureCapture::new)
                    .slot_for(&ancestor_fn, index);
            }
        }
    }

    fn is_closure_mode(&self, fn_id: NodeId) -> bool {
        self.closures.get(&fn_id).is_some_and(|c| !c.is_empty())
    }

    fn build_variable_table(&mut self, ast: &Ast) {
        let mut collect = |_: &Ast, id: NodeId, _depth: usize| -> bool {
            if let Node::SetStmt { name, .. } = ast.get(id) {
                self.local_vars.alloc(name.clone());
            }
            true
        };
        ast.walk(Order::Pre, ast.root(), &mut collect);
    }

    /// Swaps `BinaryExpr` children and reverses `List`/`FuncCall` argument order so
    /// a post-order emission pushes operands in source-left-to-right stack order,
    /// matching the call convention's "caller pushes arguments in reverse"
    /// (spec.md §4.1 pass 4, §4.3).
    fn reverse_operand_order(&mut self, ast: &mut Ast) {
        for index in 0..ast.len() {
            let id = crate::ast::NodeId::from_raw(index);
            match ast.get(id).clone() {
                Node::BinaryExpr { op, left, right } => {
                    *ast.get_mut(id) = Node::BinaryExpr {
                        op,
                        left: right,
                        right: left,
                    };
                }
                Node::List { mut elements } => {
                    elements.reverse();
                    *ast.get_mut(id) = Node::List { elements };
                }
                Node::FuncCall { name, mut args } => {
                    args.reverse();
                    *ast.get_mut(id) = Node::FuncCall { name, args };
                }
                _ => {}
            }
        }
    }

    fn resolve_name(&self, ast: &Ast, site: NodeId, name: &str) -> Option<Resolved> {
        let inner_fn = ast.ancestor(site, |_, n| n.is_func_def());

        if let Some(inner_fn) = inner_fn {
            if let Node::FuncDef { params, .. } = ast.get(inner_fn) {
                if let Some(idx) = params.iter().position(|p| p == name) {
                    return Some(Resolved::LocalParm(idx));
                }
            }
            if let Some(outer_fn) = ast.ancestor(inner_fn, |_, n| n.is_func_def()) {
                if let Node::FuncDef { params, .. } = ast.get(outer_fn) {
                    if let Some(idx) = params.iter().position(|p| p == name) {
                        let ancestor_fn = self
                            .func_names
                            .get(&outer_fn)
                            .cloned()
                            .expect("every FuncDef has an assigned name by emission time");
                        return Some(Resolved::AncestorParm {
                            inner_fn,
                            ancestor_fn,
                            index: idx,
                        });
                    }
                }
            }
        }

        if self.local_vars.contains(name) {
            return Some(Resolved::Var);
        }
        if let Some(shared) = self.base_shared {
            if shared.var_symbols.contains(name) {
                return Some(Resolved::Var);
            }
        }
        if self.local_funcs.contains_key(name) {
            return Some(Resolved::Fn(name.to_string()));
        }
        if let Some(shared) = self.base_shared {
            if shared.fn_symbols.contains(name) {
                return Some(Resolved::Fn(name.to_string()));
            }
        }
        if let Some(idx) = self.builtins.lookup(name) {
            return Some(Resolved::Builtin(idx));
        }
        None
    }

    fn emit_post_order(&mut self, ast: &Ast, root: NodeId) -> Result<(), CompileError> {
        let mut ids = Vec::new();
        let mut collect = |_: &Ast, id: NodeId, _depth: usize| -> bool {
            ids.push(id);
            true
        };
        ast.walk(Order::Post, root, &mut collect);

        for id in ids {
            let frag = self.emit_node(ast, id)?;
            self.fragments.insert(id, frag);
        }
        Ok(())
    }

    fn child_main(&self, id: NodeId) -> Vec<Instruction> {
        self.fragments
            .get(&id)
            .map(|f| f.main.clone())
            .unwrap_or_default()
    }

    fn emit_node(&mut self, ast: &Ast, id: NodeId) -> Result<Fragment, CompileError> {
        match ast.get(id).clone() {
            Node::Number { value } => Ok(Fragment::inline(vec![Instruction::push(
                Value::from_number(value),
            )])),

            Node::Ident { name } => self.emit_ident(ast, id, &name),

            Node::BinaryExpr { op, left, right } => {
                let mut code = self.child_main(left);
                code.extend(self.child_main(right));
                let builtin = self
                    .builtins
                    .lookup(op.builtin_name())
                    .ok_or_else(|| CompileError::UnknownOperator(op.builtin_name().to_string()))?;
                code.push(Instruction::callb(builtin, 2));
                Ok(Fragment::inline(code))
            }

            Node::UnaryExpr { op, operand } => {
                let mut code = self.child_main(operand);
                let builtin = self
                    .builtins
                    .lookup(op.builtin_name())
                    .ok_or_else(|| CompileError::UnknownOperator(op.builtin_name().to_string()))?;
                code.push(Instruction::callb(builtin, 1));
                Ok(Fragment::inline(code))
            }

            Node::List { elements } => {
                let mut code = Vec::new();
                for e in &elements {
                    code.extend(self.child_main(*e));
                }
                let list_ctor = self
                    .builtins
                    .lookup("list")
                    .ok_or_else(|| CompileError::UnknownBuiltin("list".to_string()))?;
                code.push(Instruction::callb(list_ctor, elements.len() as i32));
                Ok(Fragment::inline(code))
            }

            Node::FuncCall { name, args } => self.emit_call(ast, id, &name, &args),

            Node::SetStmt { name, rhs } => {
                let mut code = self.child_main(rhs);
                code.push(Instruction::store_unresolved(name));
                Ok(Fragment::inline(code))
            }

            Node::Stmts { stmts } => {
                let mut code = Vec::new();
                for s in &stmts {
                    code.extend(self.child_main(*s));
                }
                Ok(Fragment::inline(code))
            }

            Node::FuncDef {
                name: _,
                params,
                help: _,
                body,
            } => self.emit_func_def(ast, id, &params, body),
        }
    }

    fn emit_ident(&mut self, ast: &Ast, id: NodeId, name: &str) -> Result<Fragment, CompileError> {
        match self.resolve_name(ast, id, name) {
            Some(Resolved::LocalParm(i)) => {
                let inner_fn = ast
                    .ancestor(id, |_, n| n.is_func_def())
                    .expect("LocalParm only resolves inside a FuncDef");
                let shift = usize::from(self.is_closure_mode(inner_fn));
                Ok(Fragment::inline(vec![
                    Instruction::int(Opcode::Pushparm, (i + shift) as i64),
                    Instruction::bare(Opcode::Clone),
                ]))
            }
            Some(Resolved::AncestorParm {
                inner_fn,
                ancestor_fn,
                index,
            }) => {
                let slot = self
                    .closures
                    .entry(inner_fn)
                    .or_insert_with(ClosureCapture::new)
                    .slot_for(&ancestor_fn, index);
                Ok(Fragment::inline(vec![
                    Instruction::int(Opcode::Pushparm, 0),
                    Instruction::int(Opcode::Tload, slot as i64),
                ]))
            }
            Some(Resolved::Var) => Ok(Fragment::inline(vec![
                Instruction::load_unresolved(name),
                Instruction::bare(Opcode::Clone),
            ])),
            Some(Resolved::Fn(fn_name)) => Ok(Fragment::inline(vec![Instruction::push_unresolved(
                fn_name,
                UnresolvedKind::Function,
            )])),
            Some(Resolved::Builtin(index)) => {
                let shim = self.shim_for_builtin(name, index);
                Ok(Fragment::inline(vec![Instruction::push_unresolved(
                    shim,
                    UnresolvedKind::Function,
                )]))
            }
            None => Err(CompileError::UnknownName(name.to_string())),
        }
    }

    fn emit_call(
        &mut self,
        ast: &Ast,
        id: NodeId,
        name: &str,
        args: &[NodeId],
    ) -> Result<Fragment, CompileError> {
        let mut arg_code = Vec::new();
        for a in args {
            arg_code.extend(self.child_main(*a));
        }
        let argc = args.len() as i64;

        match self.resolve_name(ast, id, name) {
            Some(Resolved::LocalParm(i)) => {
                let inner_fn = ast
                    .ancestor(id, |_, n| n.is_func_def())
                    .expect("LocalParm only resolves inside a FuncDef");
                let shift = usize::from(self.is_closure_mode(inner_fn));
                let mut code = arg_code;
                code.push(Instruction::int(Opcode::Push, argc));
                code.push(Instruction::int(Opcode::Pushparm, (i + shift) as i64));
                code.push(Instruction::bare(Opcode::Calls));
                Ok(Fragment::inline(code))
            }
            Some(Resolved::AncestorParm {
                inner_fn,
                ancestor_fn,
                index,
            }) => {
                let slot = self
                    .closures
                    .entry(inner_fn)
                    .or_insert_with(ClosureCapture::new)
                    .slot_for(&ancestor_fn, index);
                let mut code = arg_code;
                code.push(Instruction::int(Opcode::Push, argc));
                code.push(Instruction::int(Opcode::Pushparm, 0));
                code.push(Instruction::int(Opcode::Tload, slot as i64));
                code.push(Instruction::bare(Opcode::Calls));
                Ok(Fragment::inline(code))
            }
            Some(Resolved::Var) => {
                let mut code = arg_code;
                code.push(Instruction::int(Opcode::Push, argc));
                code.push(Instruction::calli_unresolved(name));
                Ok(Fragment::inline(code))
            }
            Some(Resolved::Fn(fn_name)) => {
                let mut code = arg_code;
                code.push(Instruction::int(Opcode::Push, argc));
                code.push(Instruction::call_unresolved(fn_name));
                Ok(Fragment::inline(code))
            }
            Some(Resolved::Builtin(index)) => {
                let mut code = arg_code;
                code.push(Instruction::callb(index, argc as i32));
                Ok(Fragment::inline(code))
            }
            None => Err(CompileError::UnknownName(name.to_string())),
        }
    }

    fn shim_for_builtin(&mut self, name: &str, index: usize) -> String {
        if let Some(existing) = self.shim_cache.get(name) {
            return existing.clone();
        }
        let shim_name = format!("@builtin-lambda-{name}");
        let body = vec![
            Instruction::bare(Opcode::Enter),
            Instruction::bare(Opcode::Reparm),
            Instruction::callb(index, -1),
            Instruction::bare(Opcode::Leave),
            Instruction::bare(Opcode::Return),
        ];
        self.shim_defs.push((shim_name.clone(), body));
        self.shim_cache.insert(name.to_string(), shim_name.clone());
        shim_name
    }

    fn emit_func_def(
        &mut self,
        ast: &Ast,
        id: NodeId,
        params: &[String],
        body: NodeId,
    ) -> Result<Fragment, CompileError> {
        let body_code = self.child_main(body);
        let assigned_name = self
            .func_names
            .get(&id)
            .cloned()
            .expect("build_function_table assigns every FuncDef a name");

        let declared_arity = params.len() + usize::from(self.is_closure_mode(id));
        let mut fn_body = vec![
            Instruction::bare(Opcode::Enter),
            Instruction::int(Opcode::Vldac, declared_arity as i64),
        ];
        fn_body.extend(body_code);
        fn_body.push(Instruction::bare(Opcode::Leave));
        fn_body.push(Instruction::bare(Opcode::Return));

        let is_statement = ast
            .parent(id)
            .is_some_and(|p| matches!(ast.get(p), Node::Stmts { .. }));

        let main = if is_statement {
            Vec::new()
        } else {
            self.closure_construction(id, &assigned_name)
        };

        Ok(Fragment::function(main, assigned_name, fn_body))
    }

    /// Builds the `alloc`/`tmake`/`copys`/`stores`/`mkclsr` sequence that wraps a
    /// lambda's address into a `LambdaClosure` value at the point it's
    /// constructed (spec.md §4.1 "Closure capture"). `alloc` runs first so the
    /// env ref sits below the captured values on the stack; `copys{1,1}`
    /// re-duplicates that ref above the built table so it survives `stores`
    /// (which consumes both the address and the value) for the final `mkclsr`
    /// to consume.
    fn closure_construction(&self, lambda_id: NodeId, assigned_name: &str) -> Vec<Instruction> {
        let Some(capture) = self.closures.get(&lambda_id) else {
            return vec![Instruction::push_unresolved(
                assigned_name,
                UnresolvedKind::Function,
            )];
        };
        if capture.is_empty() {
            return vec![Instruction::push_unresolved(
                assigned_name,
                UnresolvedKind::Function,
            )];
        }

        // `alloc` first, so the fresh ref sits below the captures on the stack
        // and `tmake` (which only consumes its top `n` elements) can't touch it.
        let mut code = vec![Instruction::bare(Opcode::Alloc)];
        for (ancestor_fn, param_index) in capture.ordered_captures() {
            // This code runs inside `ancestor_fn`'s own body (the lambda literal
            // is textually nested there), so it must respect whatever shift
            // `ancestor_fn`'s own parameters are under if it is itself a
            // capturing lambda one level further out.
            let ancestor_shift = self
                .local_funcs
                .get(&ancestor_fn)
                .map(|&id| usize::from(self.is_closure_mode(id)))
                .unwrap_or(0);
            code.push(Instruction::int(
                Opcode::Pushparm,
                (param_index + ancestor_shift) as i64,
            ));
            code.push(Instruction::bare(Opcode::Clone));
        }
        code.push(Instruction::int(Opcode::Tmake, capture.len() as i64));
        // Stack is now `[ref, table]`. Duplicate the ref (one slot below the
        // top) to get `[ref, table, ref]`, so `stores` writes the table into
        // the ref's slot and leaves the remaining ref for `mkclsr`.
        code.push(Instruction::new(
            Opcode::Copys,
            Operand::Copys(crate::bytecode::instr::CopysOperand { offset: 1, len: 1 }),
        ));
        code.push(Instruction::bare(Opcode::Stores));
        code.push(Instruction::new(
            Opcode::Mkclsr,
            Operand::Unresolved(crate::bytecode::instr::Unresolved {
                name: assigned_name.to_string(),
                kind: UnresolvedKind::Function,
            }),
        ));
        code
    }
}

