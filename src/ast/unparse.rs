//! Render a (possibly woven) tree back to source text.
//!
//! Hooks are rendered as calls on a `__weave__` services handle so dumps,
//! stubs and diffs show exactly where dispatch happens. The output of a tree
//! without hooks re-parses to an equivalent tree.

use super::{
    CallExpr, ClassDef, Expr, ExprKind, FunctionDef, HookStmt, Module, Params, Stmt, StmtKind,
    UnaryOp,
};
use crate::model::literal::quote_str;
use crate::model::{Literal, PointKey};

const INDENT: &str = "    ";

pub fn unparse_module(module: &Module) -> String {
    let mut out = String::new();
    let mut prev_was_def = false;
    for (i, stmt) in module.body.iter().enumerate() {
        let is_def = matches!(stmt.kind, StmtKind::FunctionDef(_) | StmtKind::ClassDef(_));
        if i > 0 && (is_def || prev_was_def) {
            out.push('\n');
        }
        write_stmt(stmt, 0, &mut out);
        prev_was_def = is_def;
    }
    out
}

pub fn unparse_stmts(body: &[Stmt], level: usize) -> String {
    let mut out = String::new();
    write_block(body, level, &mut out);
    out
}

fn write_block(body: &[Stmt], level: usize, out: &mut String) {
    if body.is_empty() {
        line(level, "pass", out);
        return;
    }
    for stmt in body {
        write_stmt(stmt, level, out);
    }
}

fn line(level: usize, text: &str, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn write_stmt(stmt: &Stmt, level: usize, out: &mut String) {
    match &stmt.kind {
        StmtKind::Expr(e) => line(level, &unparse_expr(e), out),
        StmtKind::Assign { targets, value } => {
            let mut text = String::new();
            for t in targets {
                text.push_str(&unparse_expr(t));
                text.push_str(" = ");
            }
            text.push_str(&unparse_expr(value));
            line(level, &text, out);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            let mut text = format!("{}: {}", unparse_expr(target), unparse_expr(annotation));
            if let Some(v) = value {
                text.push_str(" = ");
                text.push_str(&unparse_expr(v));
            }
            line(level, &text, out);
        }
        StmtKind::AugAssign { target, op, value } => line(
            level,
            &format!(
                "{} {}= {}",
                unparse_expr(target),
                op.token(),
                unparse_expr(value)
            ),
            out,
        ),
        StmtKind::Return(None) => line(level, "return", out),
        StmtKind::Return(Some(v)) => line(level, &format!("return {}", unparse_expr(v)), out),
        StmtKind::If { test, body, orelse } => {
            line(level, &format!("if {}:", unparse_expr(test)), out);
            write_block(body, level + 1, out);
            write_else_chain(orelse, level, out);
        }
        StmtKind::While { test, body, orelse } => {
            line(level, &format!("while {}:", unparse_expr(test)), out);
            write_block(body, level + 1, out);
            if !orelse.is_empty() {
                line(level, "else:", out);
                write_block(orelse, level + 1, out);
            }
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            line(
                level,
                &format!("for {} in {}:", unparse_expr(target), unparse_expr(iter)),
                out,
            );
            write_block(body, level + 1, out);
            if !orelse.is_empty() {
                line(level, "else:", out);
                write_block(orelse, level + 1, out);
            }
        }
        StmtKind::Break => line(level, "break", out),
        StmtKind::Continue => line(level, "continue", out),
        StmtKind::Pass => line(level, "pass", out),
        StmtKind::Raise { exc, cause } => {
            let mut text = "raise".to_string();
            if let Some(e) = exc {
                text.push(' ');
                text.push_str(&unparse_expr(e));
            }
            if let Some(c) = cause {
                text.push_str(" from ");
                text.push_str(&unparse_expr(c));
            }
            line(level, &text, out);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            line(level, "try:", out);
            write_block(body, level + 1, out);
            for handler in handlers {
                let mut text = "except".to_string();
                if let Some(class) = &handler.class {
                    text.push(' ');
                    text.push_str(&unparse_expr(class));
                }
                if let Some(name) = &handler.name {
                    text.push_str(" as ");
                    text.push_str(name);
                }
                text.push(':');
                line(level, &text, out);
                write_block(&handler.body, level + 1, out);
            }
            if !orelse.is_empty() {
                line(level, "else:", out);
                write_block(orelse, level + 1, out);
            }
            if !finalbody.is_empty() {
                line(level, "finally:", out);
                write_block(finalbody, level + 1, out);
            }
        }
        StmtKind::Assert { test, msg } => {
            let mut text = format!("assert {}", unparse_expr(test));
            if let Some(m) = msg {
                text.push_str(", ");
                text.push_str(&unparse_expr(m));
            }
            line(level, &text, out);
        }
        StmtKind::FunctionDef(func) => write_function(func, level, out),
        StmtKind::ClassDef(class) => write_class(class, level, out),
        StmtKind::Hook(hook) => line(level, &hook_stmt_text(hook), out),
    }
}

fn write_else_chain(orelse: &[Stmt], level: usize, out: &mut String) {
    match orelse {
        [] => {}
        [Stmt {
            kind: StmtKind::If { test, body, orelse },
            ..
        }] => {
            line(level, &format!("elif {}:", unparse_expr(test)), out);
            write_block(body, level + 1, out);
            write_else_chain(orelse, level, out);
        }
        _ => {
            line(level, "else:", out);
            write_block(orelse, level + 1, out);
        }
    }
}

fn write_function(func: &FunctionDef, level: usize, out: &mut String) {
    for d in &func.decorators {
        line(level, &format!("@{}", unparse_expr(d)), out);
    }
    line(level, &format!("{}:", signature(func)), out);
    write_block(&func.body, level + 1, out);
}

fn write_class(class: &ClassDef, level: usize, out: &mut String) {
    for d in &class.decorators {
        line(level, &format!("@{}", unparse_expr(d)), out);
    }
    let header = if class.bases.is_empty() {
        format!("class {}:", class.name)
    } else {
        let bases: Vec<String> = class.bases.iter().map(unparse_expr).collect();
        format!("class {}({}):", class.name, bases.join(", "))
    };
    line(level, &header, out);
    if class.body.is_empty() {
        line(level + 1, "pass", out);
    }
    for (i, stmt) in class.body.iter().enumerate() {
        if i > 0 && matches!(stmt.kind, StmtKind::FunctionDef(_)) {
            out.push('\n');
        }
        write_stmt(stmt, level + 1, out);
    }
}

/// `def name(params) -> ret` without the trailing colon.
pub fn signature(func: &FunctionDef) -> String {
    let prefix = if func.is_async { "async def" } else { "def" };
    let mut text = format!("{prefix} {}({})", func.name, params_text(&func.params));
    if let Some(ret) = &func.returns {
        text.push_str(" -> ");
        text.push_str(&unparse_expr(ret));
    }
    text
}

pub fn params_text(params: &Params) -> String {
    let mut parts = Vec::new();
    let param = |p: &super::Param| match &p.default {
        Some(d) => format!("{}={}", p.name, unparse_expr(d)),
        None => p.name.clone(),
    };
    parts.extend(params.positional.iter().map(param));
    match &params.vararg {
        Some(name) => parts.push(format!("*{name}")),
        None if !params.kwonly.is_empty() => parts.push("*".to_string()),
        None => {}
    }
    parts.extend(params.kwonly.iter().map(param));
    if let Some(name) = &params.kwarg {
        parts.push(format!("**{name}"));
    }
    parts.join(", ")
}

fn point_label(point: &PointKey) -> String {
    quote_str(&point.to_string())
}

fn awaited(is_async: bool, text: String) -> String {
    if is_async {
        format!("await {text}")
    } else {
        text
    }
}

fn hook_stmt_text(hook: &HookStmt) -> String {
    let mut call = format!("__weave__.dispatch({}", point_label(&hook.point));
    if let Some(subject) = &hook.subject {
        call.push_str(", ");
        call.push_str(&unparse_expr(subject));
    }
    call.push(')');
    let call = awaited(hook.is_async, call);
    match &hook.rebind {
        Some(name) => format!("{name} = {call}"),
        None => call,
    }
}

fn call_text(call: &CallExpr) -> String {
    format!("{}({})", operand(&call.func), args_text(call))
}

fn args_text(call: &CallExpr) -> String {
    let mut parts: Vec<String> = call.args.iter().map(unparse_expr).collect();
    for kw in &call.keywords {
        match &kw.name {
            Some(name) => parts.push(format!("{name}={}", unparse_expr(&kw.value))),
            None => parts.push(format!("**{}", operand(&kw.value))),
        }
    }
    parts.join(", ")
}

/// Wrap compound expressions in parentheses when used as an operand.
fn operand(expr: &Expr) -> String {
    let text = unparse_expr(expr);
    let compound = match &expr.kind {
        ExprKind::BinOp { .. }
        | ExprKind::BoolOp { .. }
        | ExprKind::Compare { .. }
        | ExprKind::IfExp { .. }
        | ExprKind::Lambda { .. }
        | ExprKind::Yield(_)
        | ExprKind::Await(_)
        | ExprKind::UnaryOp { .. } => true,
        ExprKind::Constant(Literal::Int(i)) => *i < 0,
        ExprKind::Constant(Literal::Float(x)) => *x < 0.0,
        _ => false,
    };
    if compound {
        format!("({text})")
    } else {
        text
    }
}

pub fn unparse_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Constant(lit) => lit.to_string(),
        ExprKind::Name(name) => name.clone(),
        ExprKind::Attribute { value, attr } => format!("{}.{attr}", operand(value)),
        ExprKind::Subscript { value, index } => {
            let index = match &index.kind {
                ExprKind::Tuple(items) if !items.is_empty() => {
                    items.iter().map(unparse_expr).collect::<Vec<_>>().join(", ")
                }
                _ => unparse_expr(index),
            };
            format!("{}[{index}]", operand(value))
        }
        ExprKind::Call(call) => call_text(call),
        ExprKind::BinOp { left, op, right } => {
            format!("{} {} {}", operand(left), op.token(), operand(right))
        }
        ExprKind::UnaryOp { op, operand: inner } => {
            let token = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert => "~",
                UnaryOp::Not => "not ",
            };
            format!("{token}{}", operand(inner))
        }
        ExprKind::BoolOp { op, left, right } => {
            let token = match op {
                super::BoolOp::And => "and",
                super::BoolOp::Or => "or",
            };
            format!("{} {token} {}", operand(left), operand(right))
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut text = operand(left);
            for (op, right) in ops.iter().zip(comparators) {
                text.push(' ');
                text.push_str(op.token());
                text.push(' ');
                text.push_str(&operand(right));
            }
            text
        }
        ExprKind::IfExp { test, body, orelse } => format!(
            "{} if {} else {}",
            operand(body),
            operand(test),
            operand(orelse)
        ),
        ExprKind::List(items) => {
            let parts: Vec<String> = items.iter().map(unparse_expr).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Tuple(items) => match items.as_slice() {
            [single] => format!("({},)", unparse_expr(single)),
            _ => {
                let parts: Vec<String> = items.iter().map(unparse_expr).collect();
                format!("({})", parts.join(", "))
            }
        },
        ExprKind::Dict(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match &item.key {
                    Some(k) => format!("{}: {}", unparse_expr(k), unparse_expr(&item.value)),
                    None => format!("**{}", operand(&item.value)),
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        ExprKind::ListComp { elt, generators } => {
            let mut text = format!("[{}", unparse_expr(elt));
            for gen in generators {
                text.push_str(&format!(
                    " for {} in {}",
                    unparse_expr(&gen.target),
                    operand(&gen.iter)
                ));
                for cond in &gen.ifs {
                    text.push_str(&format!(" if {}", operand(cond)));
                }
            }
            text.push(']');
            text
        }
        ExprKind::Lambda { params, body } => {
            let params = params_text(params);
            if params.is_empty() {
                format!("lambda: {}", unparse_expr(body))
            } else {
                format!("lambda {params}: {}", unparse_expr(body))
            }
        }
        ExprKind::Starred(inner) => format!("*{}", operand(inner)),
        ExprKind::Yield(None) => "yield".to_string(),
        ExprKind::Yield(Some(v)) => format!("yield {}", unparse_expr(v)),
        ExprKind::Await(inner) => format!("await {}", operand(inner)),
        ExprKind::Hook(hook) => awaited(
            hook.is_async,
            format!(
                "__weave__.value({}, {})",
                point_label(&hook.point),
                unparse_expr(&hook.value)
            ),
        ),
        ExprKind::HookCall(hook) => {
            let labels: Vec<String> = hook.points.iter().map(point_label).collect();
            let mut args = vec![format!("[{}]", labels.join(", ")), operand(&hook.call.func)];
            let rest = args_text(&hook.call);
            if !rest.is_empty() {
                args.push(rest);
            }
            awaited(
                hook.is_async,
                format!("__weave__.invoke({})", args.join(", ")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parse_module;

    fn round_trip(source: &str) -> String {
        unparse_module(&parse_module(source).unwrap())
    }

    #[test]
    fn renders_class_with_methods() {
        let source = "class Player(Entity):\n    def set_health(self, value):\n        self.health = value\n        return self.health\n";
        assert_eq!(round_trip(source), source);
    }

    #[test]
    fn renders_control_flow() {
        let source = "def f(x, *args, key=1, **kw):\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    else:\n        for i in range(3):\n            x += i\n    try:\n        pass\n    except ValueError as exc:\n        raise RuntimeError('bad') from exc\n    finally:\n        x = None\n    return x\n";
        assert_eq!(round_trip(source), source);
    }

    #[test]
    fn parenthesizes_nested_operators() {
        let out = round_trip("def f(a, b, c):\n    return (a + b) * c\n");
        assert!(out.contains("return (a + b) * c"));
    }

    #[test]
    fn output_reparses() {
        let source = "def f(d):\n    xs = [x * 2 for x in d if x]\n    g = lambda y=1: y\n    return {'a': xs, **d}, g\n";
        let once = round_trip(source);
        assert_eq!(round_trip(&once), once);
    }
}
