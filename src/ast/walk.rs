//! Traversal helpers.
//!
//! All traversals stay inside one function scope: nested `def` and `class`
//! bodies are never entered (their decorators, defaults and bases belong to
//! the enclosing scope and are visited). Lambda bodies are visited.

use super::{CallExpr, Expr, ExprKind, Params, Stmt, StmtKind};

/// Direct sub-expressions of an expression, in evaluation order.
pub fn expr_children(expr: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    match &expr.kind {
        ExprKind::Constant(_) | ExprKind::Name(_) => {}
        ExprKind::Attribute { value, .. } => out.push(&**value),
        ExprKind::Subscript { value, index } => {
            out.push(&**value);
            out.push(&**index);
        }
        ExprKind::Call(call) => call_children(call, &mut out),
        ExprKind::BinOp { left, right, .. } | ExprKind::BoolOp { left, right, .. } => {
            out.push(&**left);
            out.push(&**right);
        }
        ExprKind::UnaryOp { operand, .. } => out.push(&**operand),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            out.push(&**left);
            out.extend(comparators.iter());
        }
        ExprKind::IfExp { test, body, orelse } => {
            out.push(&**test);
            out.push(&**body);
            out.push(&**orelse);
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => out.extend(items.iter()),
        ExprKind::Dict(items) => {
            for item in items {
                out.extend(item.key.as_ref());
                out.push(&item.value);
            }
        }
        ExprKind::ListComp { elt, generators } => {
            out.push(&**elt);
            for gen in generators {
                out.push(&gen.target);
                out.push(&gen.iter);
                out.extend(gen.ifs.iter());
            }
        }
        ExprKind::Lambda { params, body } => {
            param_defaults(params, &mut out);
            out.push(&**body);
        }
        ExprKind::Starred(inner) | ExprKind::Await(inner) => out.push(&**inner),
        ExprKind::Yield(value) => out.extend(value.as_deref()),
        ExprKind::Hook(hook) => out.push(&*hook.value),
        ExprKind::HookCall(hook) => call_children(&hook.call, &mut out),
    }
    out
}

fn call_children<'a>(call: &'a CallExpr, out: &mut Vec<&'a Expr>) {
    out.push(&*call.func);
    out.extend(call.args.iter());
    out.extend(call.keywords.iter().map(|k| &k.value));
}

fn param_defaults<'a>(params: &'a Params, out: &mut Vec<&'a Expr>) {
    out.extend(params.positional.iter().filter_map(|p| p.default.as_ref()));
    out.extend(params.kwonly.iter().filter_map(|p| p.default.as_ref()));
}

/// Expressions owned directly by a statement (not by its nested blocks).
pub fn stmt_roots(stmt: &Stmt) -> Vec<&Expr> {
    let mut out = Vec::new();
    match &stmt.kind {
        StmtKind::Expr(e) => out.push(e),
        StmtKind::Assign { targets, value } => {
            out.extend(targets.iter());
            out.push(value);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            out.push(target);
            out.push(annotation);
            out.extend(value.as_ref());
        }
        StmtKind::AugAssign { target, value, .. } => {
            out.push(target);
            out.push(value);
        }
        StmtKind::Return(value) => out.extend(value.as_ref()),
        StmtKind::If { test, .. } | StmtKind::While { test, .. } => out.push(test),
        StmtKind::For { target, iter, .. } => {
            out.push(target);
            out.push(iter);
        }
        StmtKind::Raise { exc, cause } => {
            out.extend(exc.as_ref());
            out.extend(cause.as_ref());
        }
        StmtKind::Try { handlers, .. } => {
            out.extend(handlers.iter().filter_map(|h| h.class.as_ref()));
        }
        StmtKind::Assert { test, msg } => {
            out.push(test);
            out.extend(msg.as_ref());
        }
        StmtKind::FunctionDef(func) => {
            out.extend(func.decorators.iter());
            param_defaults(&func.params, &mut out);
        }
        StmtKind::ClassDef(class) => {
            out.extend(class.decorators.iter());
            out.extend(class.bases.iter());
        }
        StmtKind::Hook(hook) => out.extend(hook.subject.as_ref()),
        StmtKind::Break | StmtKind::Continue | StmtKind::Pass => {}
    }
    out
}

/// Nested statement blocks in structural order: body, handlers, else, finally.
pub fn stmt_blocks(stmt: &Stmt) -> Vec<&[Stmt]> {
    match &stmt.kind {
        StmtKind::If { body, orelse, .. }
        | StmtKind::While { body, orelse, .. }
        | StmtKind::For { body, orelse, .. } => vec![body.as_slice(), orelse.as_slice()],
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            let mut out: Vec<&[Stmt]> = vec![body.as_slice()];
            out.extend(handlers.iter().map(|h| h.body.as_slice()));
            out.push(orelse.as_slice());
            out.push(finalbody.as_slice());
            out
        }
        _ => Vec::new(),
    }
}

/// Every statement of a scope, nested blocks flattened in structural order.
pub fn flatten(body: &[Stmt]) -> Vec<&Stmt> {
    let mut out = Vec::new();
    flatten_into(body, &mut out);
    out
}

fn flatten_into<'a>(body: &'a [Stmt], out: &mut Vec<&'a Stmt>) {
    for stmt in body {
        out.push(stmt);
        for block in stmt_blocks(stmt) {
            flatten_into(block, out);
        }
    }
}

/// Pre-order walk of an expression tree.
pub fn preorder<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    out.push(expr);
    for child in expr_children(expr) {
        preorder(child, out);
    }
}

/// Pre-order walk over the expressions a statement owns directly.
pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    let mut out = Vec::new();
    for root in stmt_roots(stmt) {
        preorder(root, &mut out);
    }
    out
}

/// Whether the scope produces values (contains `yield` outside nested defs).
pub fn contains_yield(body: &[Stmt]) -> bool {
    flatten(body).into_iter().any(|stmt| {
        stmt_exprs(stmt)
            .into_iter()
            .any(|e| matches!(e.kind, ExprKind::Yield(_)))
    })
}

/// Post-order walk that may replace nodes in place.
///
/// Children are visited before their parent, so a node replaced by `f` is
/// never visited again during the same walk.
pub fn walk_expr_mut(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    match &mut expr.kind {
        ExprKind::Constant(_) | ExprKind::Name(_) => {}
        ExprKind::Attribute { value, .. } => walk_expr_mut(value, f),
        ExprKind::Subscript { value, index } => {
            walk_expr_mut(value, f);
            walk_expr_mut(index, f);
        }
        ExprKind::Call(call) => walk_call_mut(call, f),
        ExprKind::BinOp { left, right, .. } | ExprKind::BoolOp { left, right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr_mut(operand, f),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr_mut(left, f);
            for c in comparators {
                walk_expr_mut(c, f);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr_mut(test, f);
            walk_expr_mut(body, f);
            walk_expr_mut(orelse, f);
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                walk_expr_mut(item, f);
            }
        }
        ExprKind::Dict(items) => {
            for item in items {
                if let Some(key) = &mut item.key {
                    walk_expr_mut(key, f);
                }
                walk_expr_mut(&mut item.value, f);
            }
        }
        ExprKind::ListComp { elt, generators } => {
            walk_expr_mut(elt, f);
            for gen in generators {
                walk_expr_mut(&mut gen.target, f);
                walk_expr_mut(&mut gen.iter, f);
                for cond in &mut gen.ifs {
                    walk_expr_mut(cond, f);
                }
            }
        }
        ExprKind::Lambda { params, body } => {
            walk_params_mut(params, f);
            walk_expr_mut(body, f);
        }
        ExprKind::Starred(inner) | ExprKind::Await(inner) => walk_expr_mut(inner, f),
        ExprKind::Yield(value) => {
            if let Some(value) = value {
                walk_expr_mut(value, f);
            }
        }
        ExprKind::Hook(hook) => walk_expr_mut(&mut hook.value, f),
        ExprKind::HookCall(hook) => walk_call_mut(&mut hook.call, f),
    }
    f(expr);
}

fn walk_call_mut(call: &mut CallExpr, f: &mut dyn FnMut(&mut Expr)) {
    walk_expr_mut(&mut call.func, f);
    for arg in &mut call.args {
        walk_expr_mut(arg, f);
    }
    for kw in &mut call.keywords {
        walk_expr_mut(&mut kw.value, f);
    }
}

fn walk_params_mut(params: &mut Params, f: &mut dyn FnMut(&mut Expr)) {
    for p in params.positional.iter_mut().chain(params.kwonly.iter_mut()) {
        if let Some(default) = &mut p.default {
            walk_expr_mut(default, f);
        }
    }
}

/// Apply `f` post-order to every expression of a scope.
pub fn for_each_expr_mut(body: &mut [Stmt], f: &mut dyn FnMut(&mut Expr)) {
    for stmt in body.iter_mut() {
        match &mut stmt.kind {
            StmtKind::Expr(e) => walk_expr_mut(e, f),
            StmtKind::Assign { targets, value } => {
                for t in targets {
                    walk_expr_mut(t, f);
                }
                walk_expr_mut(value, f);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                walk_expr_mut(target, f);
                walk_expr_mut(annotation, f);
                if let Some(v) = value {
                    walk_expr_mut(v, f);
                }
            }
            StmtKind::AugAssign { target, value, .. } => {
                walk_expr_mut(target, f);
                walk_expr_mut(value, f);
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    walk_expr_mut(v, f);
                }
            }
            StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
                walk_expr_mut(test, f);
                for_each_expr_mut(body, f);
                for_each_expr_mut(orelse, f);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                walk_expr_mut(target, f);
                walk_expr_mut(iter, f);
                for_each_expr_mut(body, f);
                for_each_expr_mut(orelse, f);
            }
            StmtKind::Raise { exc, cause } => {
                if let Some(e) = exc {
                    walk_expr_mut(e, f);
                }
                if let Some(c) = cause {
                    walk_expr_mut(c, f);
                }
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                for handler in handlers.iter_mut() {
                    if let Some(class) = &mut handler.class {
                        walk_expr_mut(class, f);
                    }
                }
                for_each_expr_mut(body, f);
                for handler in handlers.iter_mut() {
                    for_each_expr_mut(&mut handler.body, f);
                }
                for_each_expr_mut(orelse, f);
                for_each_expr_mut(finalbody, f);
            }
            StmtKind::Assert { test, msg } => {
                walk_expr_mut(test, f);
                if let Some(m) = msg {
                    walk_expr_mut(m, f);
                }
            }
            StmtKind::FunctionDef(func) => {
                for d in &mut func.decorators {
                    walk_expr_mut(d, f);
                }
                walk_params_mut(&mut func.params, f);
            }
            StmtKind::ClassDef(class) => {
                for d in &mut class.decorators {
                    walk_expr_mut(d, f);
                }
                for b in &mut class.bases {
                    walk_expr_mut(b, f);
                }
            }
            StmtKind::Hook(hook) => {
                if let Some(subject) = &mut hook.subject {
                    walk_expr_mut(subject, f);
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => {}
        }
    }
}

/// Apply `f` to every statement of a scope, nested blocks first.
pub fn for_each_stmt_mut(body: &mut [Stmt], f: &mut dyn FnMut(&mut Stmt)) {
    for stmt in body.iter_mut() {
        match &mut stmt.kind {
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => {
                for_each_stmt_mut(body, f);
                for_each_stmt_mut(orelse, f);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                for_each_stmt_mut(body, f);
                for handler in handlers.iter_mut() {
                    for_each_stmt_mut(&mut handler.body, f);
                }
                for_each_stmt_mut(orelse, f);
                for_each_stmt_mut(finalbody, f);
            }
            _ => {}
        }
        f(stmt);
    }
}
