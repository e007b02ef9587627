//! Walks `pest::iterators::Pairs` produced by [`super::CalcGrammar`] into
//! [`crate::ast::Ast`]. The grammar already enforces structural validity, so
//! construction here is infallible; the `Result` at the `parse` boundary only
//! ever carries pest's own syntax errors.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use pest::iterators::{Pair, Pairs};

use crate::ast::{Ast, BinaryOp, Node, NodeId, UnaryOp};
use crate::error::ParseError;
use crate::value::Number;

use super::Rule;

pub(crate) fn build_program(_src: &str, pair: Pair<'_, Rule>) -> Result<Ast, Vec<ParseError>> {
    let mut ast = Ast::new();
    // Reserve index 0 for the root `Stmts` node so `Ast::root()`'s constant-0
    // assumption holds regardless of how many descendant nodes get pushed
    // while walking the statement list below.
    let root = ast.push(Node::Stmts { stmts: Vec::new() });

    let mut stmts = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::stmt {
            stmts.push(build_stmt(&mut ast, inner));
        }
    }
    *ast.get_mut(root) = Node::Stmts { stmts };
    Ok(ast)
}

fn build_stmt(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let inner = pair.into_inner().next().expect("stmt always has one alternative");
    match inner.as_rule() {
        Rule::set_stmt => build_set_stmt(ast, inner),
        Rule::func_def => build_func_def(ast, inner),
        Rule::expr => build_expr(ast, inner),
        other => unreachable!("unexpected stmt alternative {other:?}"),
    }
}

fn build_set_stmt(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("set_stmt has a name").as_str().to_string();
    let rhs_pair = inner.next().expect("set_stmt has a rhs expr");
    let rhs = build_expr(ast, rhs_pair);
    ast.push(Node::SetStmt { name, rhs })
}

fn build_func_def(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let mut name = String::new();
    let mut params = Vec::new();
    let mut help = None;
    let mut body_pair = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::params => {
                params = inner
                    .into_inner()
                    .map(|p| p.as_str().to_string())
                    .collect();
            }
            Rule::help_str => {
                let raw = inner.as_str();
                help = Some(raw[1..raw.len() - 1].to_string());
            }
            Rule::body => body_pair = Some(inner),
            other => unreachable!("unexpected func_def child {other:?}"),
        }
    }

    let body_pair = body_pair.expect("func_def always has a body");
    let body = build_body(ast, body_pair);
    ast.push(Node::FuncDef {
        name,
        params,
        help,
        body,
    })
}

fn build_body(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let inner = pair.into_inner().next().expect("body always has one alternative");
    match inner.as_rule() {
        Rule::brace_body => {
            let stmts: Vec<NodeId> = inner
                .into_inner()
                .filter(|p| p.as_rule() == Rule::stmt)
                .map(|p| build_stmt(ast, p))
                .collect();
            ast.push(Node::Stmts { stmts })
        }
        Rule::expr => build_expr(ast, inner),
        other => unreachable!("unexpected body alternative {other:?}"),
    }
}

/// Entry point for any `expr` pair; `expr` always wraps exactly one `or_expr`.
fn build_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let inner = pair.into_inner().next().expect("expr always wraps or_expr");
    build_or_expr(ast, inner)
}

fn build_or_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), |_| BinaryOp::Or, build_and_expr)
}

fn build_and_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), |_| BinaryOp::And, build_cmp_expr)
}

fn build_cmp_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), cmp_op, build_bitor_expr)
}

fn cmp_op(text: &str) -> BinaryOp {
    match text {
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        other => unreachable!("unknown comparison operator {other}"),
    }
}

fn build_bitor_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), |_| BinaryOp::BitOr, build_bitand_expr)
}

fn build_bitand_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), |_| BinaryOp::BitAnd, build_add_expr)
}

fn build_add_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(
        ast,
        pair.into_inner(),
        |text| if text == "+" { BinaryOp::Add } else { BinaryOp::Sub },
        build_mul_expr,
    )
}

fn build_mul_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(
        ast,
        pair.into_inner(),
        |text| match text {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            other => unreachable!("unknown mul-level operator {other}"),
        },
        build_pow_expr,
    )
}

fn build_pow_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    fold_binary(ast, pair.into_inner(), |_| BinaryOp::Pow, build_unary_expr)
}

/// Shared left-fold for every binary precedence level: each level's grammar
/// rule is `operand ~ (op ~ operand)*`, so pairs alternate operand/operator
/// after the first. Children are built in natural left-to-right order; the
/// compiler's own reversal pass (not this one) later swaps them for emission.
fn fold_binary(
    ast: &mut Ast,
    mut pairs: Pairs<'_, Rule>,
    op_of: impl Fn(&str) -> BinaryOp,
    build_operand: impl Fn(&mut Ast, Pair<'_, Rule>) -> NodeId,
) -> NodeId {
    let first = pairs.next().expect("precedence-chain rule always has a first operand");
    let mut acc = build_operand(ast, first);
    loop {
        let Some(op_pair) = pairs.next() else { break };
        let operand_pair = pairs.next().expect("an operator pair is always followed by an operand");
        let op = op_of(op_pair.as_str());
        let rhs = build_operand(ast, operand_pair);
        acc = ast.push(Node::BinaryExpr {
            op,
            left: acc,
            right: rhs,
        });
    }
    acc
}

fn build_unary_expr(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let mut ops = Vec::new();
    let mut atom_pair = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::unary_op => ops.push(unary_op_of(inner.as_str())),
            Rule::atom => atom_pair = Some(inner),
            other => unreachable!("unexpected unary_expr child {other:?}"),
        }
    }
    let mut node = build_atom(ast, atom_pair.expect("unary_expr always ends in an atom"));
    for op in ops.into_iter().rev() {
        node = ast.push(Node::UnaryExpr { op, operand: node });
    }
    node
}

fn unary_op_of(text: &str) -> UnaryOp {
    match text {
        "-" => UnaryOp::Neg,
        "+" => UnaryOp::Pos,
        "~" => UnaryOp::BitNot,
        "not" => UnaryOp::Not,
        other => unreachable!("unknown unary operator {other}"),
    }
}

fn build_atom(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let inner = pair.into_inner().next().expect("atom always has one alternative");
    match inner.as_rule() {
        Rule::number => build_number(ast, inner),
        Rule::list_lit => build_list_lit(ast, inner),
        Rule::func_def => build_func_def(ast, inner),
        Rule::paren_expr => {
            let expr_pair = inner.into_inner().next().expect("paren_expr wraps one expr");
            build_expr(ast, expr_pair)
        }
        Rule::func_call => build_func_call(ast, inner),
        Rule::operator_atom => ast.push(Node::Ident {
            name: inner.as_str().to_string(),
        }),
        Rule::ident => ast.push(Node::Ident {
            name: inner.as_str().to_string(),
        }),
        other => unreachable!("unexpected atom alternative {other:?}"),
    }
}

fn build_func_call(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let mut inner = pair.into_inner();
    let name = inner.next().expect("func_call has a callee_name").as_str().to_string();
    let args = match inner.next() {
        Some(args_pair) if args_pair.as_rule() == Rule::args => args_pair
            .into_inner()
            .map(|p| build_expr(ast, p))
            .collect(),
        _ => Vec::new(),
    };
    ast.push(Node::FuncCall { name, args })
}

fn build_list_lit(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let elements = pair.into_inner().map(|p| build_expr(ast, p)).collect();
    ast.push(Node::List { elements })
}

fn build_number(ast: &mut Ast, pair: Pair<'_, Rule>) -> NodeId {
    let text = pair.as_str();
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let value = if cleaned.contains('.') {
        Number::Float(
            cleaned
                .parse::<BigDecimal>()
                .expect("grammar only admits well-formed float literals"),
        )
    } else {
        Number::Int(
            cleaned
                .parse::<BigInt>()
                .expect("grammar only admits well-formed int literals"),
        )
    };
    ast.push(Node::Number { value })
}
