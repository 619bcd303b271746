//! Lowering from the tree-sitter Python CST to the value-typed [`crate::ast`].
//!
//! Only the subset the interpreter can execute is accepted; every other node
//! kind is rejected with [`TreeSitterError::Unsupported`] naming the kind and
//! line, so a module either lowers completely or not at all.

use crate::ast::{
    BinOp, BoolOp, CallExpr, ClassDef, CmpOp, Comprehension, DictItem, ExceptHandler, Expr,
    ExprKind, FunctionDef, IdGen, Keyword, Module, Param, Params, Stmt, StmtKind, UnaryOp,
};
use crate::ast::walk::contains_yield;
use crate::model::Literal;
use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;
use crate::ts::validator::check_parsed;
use tree_sitter::Node;

/// Lower a parsed module. Fails on syntax errors and unsupported constructs.
pub fn lower_module(parsed: &ParsedSource<'_>) -> Result<Module, TreeSitterError> {
    check_parsed(parsed)?;
    let mut lowerer = Lowerer {
        source: parsed.source,
        ids: IdGen::default(),
    };
    let body = lowerer.block(parsed.root_node())?;
    Ok(Module {
        body,
        ids: lowerer.ids,
    })
}

struct Lowerer<'a> {
    source: &'a str,
    ids: IdGen,
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn named(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn unsupported(node: Node<'_>) -> TreeSitterError {
    TreeSitterError::Unsupported {
        kind: node.kind().to_string(),
        line: line_of(node),
    }
}

fn malformed(node: Node<'_>, field: &'static str) -> TreeSitterError {
    TreeSitterError::Malformed {
        kind: node.kind().to_string(),
        field,
        line: line_of(node),
    }
}

fn field<'t>(node: Node<'t>, name: &'static str) -> Result<Node<'t>, TreeSitterError> {
    node.child_by_field_name(name)
        .ok_or_else(|| malformed(node, name))
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

impl<'a> Lowerer<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }

    fn stmt(&mut self, node: Node<'_>, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.ids.next_id(),
            line: line_of(node),
            kind,
        }
    }

    fn expr(&mut self, node: Node<'_>, kind: ExprKind) -> Expr {
        Expr::new(self.ids.next_id(), line_of(node), kind)
    }

    fn block(&mut self, node: Node<'_>) -> Result<Vec<Stmt>, TreeSitterError> {
        named(node)
            .into_iter()
            .map(|child| self.statement(child))
            .collect()
    }

    fn statement(&mut self, node: Node<'_>) -> Result<Stmt, TreeSitterError> {
        let kind = match node.kind() {
            "expression_statement" => self.expression_statement(node)?,
            "return_statement" => {
                let value = match named(node).first() {
                    Some(child) => Some(self.expression(*child)?),
                    None => None,
                };
                StmtKind::Return(value)
            }
            "pass_statement" => StmtKind::Pass,
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            "if_statement" => self.if_statement(node)?,
            "while_statement" => {
                let test = self.expression(field(node, "condition")?)?;
                let body = self.block(field(node, "body")?)?;
                let orelse = self.else_clause(node)?;
                StmtKind::While { test, body, orelse }
            }
            "for_statement" => {
                if has_token(node, "async") {
                    return Err(unsupported(node));
                }
                let target = self.target(field(node, "left")?)?;
                let iter = self.expression(field(node, "right")?)?;
                let body = self.block(field(node, "body")?)?;
                let orelse = self.else_clause(node)?;
                StmtKind::For {
                    target,
                    iter,
                    body,
                    orelse,
                }
            }
            "try_statement" => self.try_statement(node)?,
            "raise_statement" => {
                let cause_node = node.child_by_field_name("cause");
                let exc_node = named(node)
                    .into_iter()
                    .find(|n| Some(*n) != cause_node);
                let exc = match exc_node {
                    Some(n) => Some(self.expression(n)?),
                    None => None,
                };
                let cause = match cause_node {
                    Some(n) => Some(self.expression(n)?),
                    None => None,
                };
                StmtKind::Raise { exc, cause }
            }
            "assert_statement" => {
                let parts = named(node);
                let test = self.expression(*parts.first().ok_or_else(|| malformed(node, "test"))?)?;
                let msg = match parts.get(1) {
                    Some(n) => Some(self.expression(*n)?),
                    None => None,
                };
                StmtKind::Assert { test, msg }
            }
            "function_definition" => StmtKind::FunctionDef(self.function(node, Vec::new())?),
            "class_definition" => StmtKind::ClassDef(self.class(node, Vec::new())?),
            "decorated_definition" => {
                let definition = field(node, "definition")?;
                let mut decorators = Vec::new();
                for child in named(node) {
                    if child.kind() == "decorator" {
                        let inner = named(child)
                            .into_iter()
                            .next()
                            .ok_or_else(|| malformed(child, "expression"))?;
                        decorators.push(self.expression(inner)?);
                    }
                }
                let kind = match definition.kind() {
                    "function_definition" => {
                        StmtKind::FunctionDef(self.function(definition, decorators)?)
                    }
                    "class_definition" => StmtKind::ClassDef(self.class(definition, decorators)?),
                    _ => return Err(unsupported(definition)),
                };
                return Ok(self.stmt(definition, kind));
            }
            _ => return Err(unsupported(node)),
        };
        Ok(self.stmt(node, kind))
    }

    fn expression_statement(&mut self, node: Node<'_>) -> Result<StmtKind, TreeSitterError> {
        let children = named(node);
        match children.as_slice() {
            [single] => match single.kind() {
                "assignment" => self.assignment(*single),
                "augmented_assignment" => {
                    let target = self.target(field(*single, "left")?)?;
                    let token = self.text(field(*single, "operator")?);
                    let op = BinOp::from_token(token.trim_end_matches('='))
                        .ok_or_else(|| unsupported(*single))?;
                    let value = self.expression(field(*single, "right")?)?;
                    Ok(StmtKind::AugAssign { target, op, value })
                }
                _ => Ok(StmtKind::Expr(self.expression(*single)?)),
            },
            many => {
                let items = many
                    .iter()
                    .map(|n| self.expression(*n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StmtKind::Expr(self.expr(node, ExprKind::Tuple(items))))
            }
        }
    }

    fn assignment(&mut self, node: Node<'_>) -> Result<StmtKind, TreeSitterError> {
        let left = field(node, "left")?;
        let right = node.child_by_field_name("right");

        if let Some(ty) = node.child_by_field_name("type") {
            let target = self.target(left)?;
            let annotation = self.type_annotation(ty)?;
            let value = match right {
                Some(r) => Some(self.expression(r)?),
                None => None,
            };
            return Ok(StmtKind::AnnAssign {
                target,
                annotation,
                value,
            });
        }

        let mut targets = vec![self.target(left)?];
        let mut current = right.ok_or_else(|| malformed(node, "right"))?;
        while current.kind() == "assignment" {
            if current.child_by_field_name("type").is_some() {
                return Err(unsupported(current));
            }
            targets.push(self.target(field(current, "left")?)?);
            current = field(current, "right")?;
        }
        if current.kind() == "augmented_assignment" {
            return Err(unsupported(current));
        }
        let value = self.expression(current)?;
        Ok(StmtKind::Assign { targets, value })
    }

    fn type_annotation(&mut self, node: Node<'_>) -> Result<Expr, TreeSitterError> {
        if node.kind() == "type" {
            let inner = named(node)
                .into_iter()
                .next()
                .ok_or_else(|| malformed(node, "type"))?;
            self.expression(inner)
        } else {
            self.expression(node)
        }
    }

    fn target(&mut self, node: Node<'_>) -> Result<Expr, TreeSitterError> {
        match node.kind() {
            "identifier" | "keyword_identifier" => {
                let name = self.text(node).to_string();
                Ok(self.expr(node, ExprKind::Name(name)))
            }
            "attribute" | "subscript" => self.expression(node),
            "pattern_list" | "tuple_pattern" | "expression_list" | "tuple" | "list_pattern"
            | "list" => {
                let items = named(node)
                    .into_iter()
                    .map(|n| self.target(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.expr(node, ExprKind::Tuple(items)))
            }
            "list_splat_pattern" | "list_splat" => {
                let inner = named(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(node, "target"))?;
                let inner = self.target(inner)?;
                Ok(self.expr(node, ExprKind::Starred(Box::new(inner))))
            }
            "parenthesized_expression" => {
                let inner = named(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(node, "target"))?;
                self.target(inner)
            }
            _ => Err(unsupported(node)),
        }
    }

    fn if_statement(&mut self, node: Node<'_>) -> Result<StmtKind, TreeSitterError> {
        let test = self.expression(field(node, "condition")?)?;
        let body = self.block(field(node, "consequence")?)?;

        let mut cursor = node.walk();
        let alternatives: Vec<Node<'_>> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();

        let mut orelse = Vec::new();
        for alt in alternatives.into_iter().rev() {
            match alt.kind() {
                "else_clause" => orelse = self.block(field(alt, "body")?)?,
                "elif_clause" => {
                    let test = self.expression(field(alt, "condition")?)?;
                    let body = self.block(field(alt, "consequence")?)?;
                    let nested = StmtKind::If {
                        test,
                        body,
                        orelse: std::mem::take(&mut orelse),
                    };
                    orelse = vec![self.stmt(alt, nested)];
                }
                _ => return Err(unsupported(alt)),
            }
        }
        Ok(StmtKind::If { test, body, orelse })
    }

    fn else_clause(&mut self, node: Node<'_>) -> Result<Vec<Stmt>, TreeSitterError> {
        match node.child_by_field_name("alternative") {
            Some(alt) if alt.kind() == "else_clause" => self.block(field(alt, "body")?),
            Some(alt) => Err(unsupported(alt)),
            None => Ok(Vec::new()),
        }
    }

    fn suite_of<'t>(&self, clause: Node<'t>) -> Result<Node<'t>, TreeSitterError> {
        clause
            .child_by_field_name("body")
            .or_else(|| named(clause).into_iter().find(|n| n.kind() == "block"))
            .ok_or_else(|| malformed(clause, "body"))
    }

    fn try_statement(&mut self, node: Node<'_>) -> Result<StmtKind, TreeSitterError> {
        let body_node = field(node, "body")?;
        let body = self.block(body_node)?;
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for child in named(node) {
            if child == body_node {
                continue;
            }
            match child.kind() {
                "except_clause" => handlers.push(self.except_clause(child)?),
                "else_clause" => orelse = self.block(self.suite_of(child)?)?,
                "finally_clause" => finalbody = self.block(self.suite_of(child)?)?,
                _ => return Err(unsupported(child)),
            }
        }
        Ok(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn except_clause(&mut self, node: Node<'_>) -> Result<ExceptHandler, TreeSitterError> {
        let suite = self.suite_of(node)?;
        let parts: Vec<Node<'_>> = named(node).into_iter().filter(|n| *n != suite).collect();

        let (class, name) = match parts.as_slice() {
            [] => (None, None),
            [pattern] if pattern.kind() == "as_pattern" => {
                let class_node = named(*pattern)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(*pattern, "value"))?;
                let alias = pattern
                    .child_by_field_name("alias")
                    .or_else(|| {
                        named(*pattern)
                            .into_iter()
                            .find(|n| n.kind() == "as_pattern_target")
                    })
                    .ok_or_else(|| malformed(*pattern, "alias"))?;
                let alias = self.text(alias).trim().to_string();
                (Some(self.expression(class_node)?), Some(alias))
            }
            [class_node] => (Some(self.expression(*class_node)?), None),
            [class_node, alias] => {
                let alias = self.text(*alias).trim().to_string();
                (Some(self.expression(*class_node)?), Some(alias))
            }
            _ => return Err(unsupported(node)),
        };

        Ok(ExceptHandler {
            line: line_of(node),
            class,
            name,
            body: self.block(suite)?,
        })
    }

    fn function(
        &mut self,
        node: Node<'_>,
        decorators: Vec<Expr>,
    ) -> Result<FunctionDef, TreeSitterError> {
        let name = self.text(field(node, "name")?).to_string();
        let params = self.params(field(node, "parameters")?)?;
        let returns = match node.child_by_field_name("return_type") {
            Some(ty) => Some(self.type_annotation(ty)?),
            None => None,
        };
        let body = self.block(field(node, "body")?)?;
        let is_generator = contains_yield(&body);
        Ok(FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
            is_async: has_token(node, "async"),
            is_generator,
            line: line_of(node),
            end_line: node.end_position().row + 1,
        })
    }

    fn params(&mut self, node: Node<'_>) -> Result<Params, TreeSitterError> {
        let mut params = Params::default();
        let mut keyword_only = false;

        for child in named(node) {
            let (name_node, default) = match child.kind() {
                "identifier" => (child, None),
                "typed_parameter" => {
                    let inner = named(child)
                        .into_iter()
                        .next()
                        .ok_or_else(|| malformed(child, "name"))?;
                    match inner.kind() {
                        "identifier" => (inner, None),
                        "list_splat_pattern" => {
                            params.vararg = Some(self.splat_name(inner)?);
                            keyword_only = true;
                            continue;
                        }
                        "dictionary_splat_pattern" => {
                            params.kwarg = Some(self.splat_name(inner)?);
                            continue;
                        }
                        _ => return Err(unsupported(inner)),
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name_node = field(child, "name")?;
                    if name_node.kind() != "identifier" {
                        return Err(unsupported(name_node));
                    }
                    let default = self.expression(field(child, "value")?)?;
                    (name_node, Some(default))
                }
                "list_splat_pattern" => {
                    params.vararg = Some(self.splat_name(child)?);
                    keyword_only = true;
                    continue;
                }
                "dictionary_splat_pattern" => {
                    params.kwarg = Some(self.splat_name(child)?);
                    continue;
                }
                "keyword_separator" => {
                    keyword_only = true;
                    continue;
                }
                "positional_separator" => continue,
                _ => return Err(unsupported(child)),
            };
            let param = Param {
                name: self.text(name_node).to_string(),
                default,
                line: line_of(child),
            };
            if keyword_only {
                params.kwonly.push(param);
            } else {
                params.positional.push(param);
            }
        }
        Ok(params)
    }

    fn splat_name(&self, node: Node<'_>) -> Result<String, TreeSitterError> {
        let inner = named(node)
            .into_iter()
            .next()
            .ok_or_else(|| malformed(node, "name"))?;
        if inner.kind() != "identifier" {
            return Err(unsupported(inner));
        }
        Ok(self.text(inner).to_string())
    }

    fn class(&mut self, node: Node<'_>, decorators: Vec<Expr>) -> Result<ClassDef, TreeSitterError> {
        let name = self.text(field(node, "name")?).to_string();
        let mut bases = Vec::new();
        if let Some(supers) = node.child_by_field_name("superclasses") {
            for base in named(supers) {
                if base.kind() == "keyword_argument" {
                    return Err(unsupported(base));
                }
                bases.push(self.expression(base)?);
            }
        }
        let body = self.block(field(node, "body")?)?;
        Ok(ClassDef {
            name,
            bases,
            body,
            decorators,
            line: line_of(node),
        })
    }

    fn expression(&mut self, node: Node<'_>) -> Result<Expr, TreeSitterError> {
        let kind = match node.kind() {
            "identifier" | "keyword_identifier" => ExprKind::Name(self.text(node).to_string()),
            "integer" => ExprKind::Constant(Literal::Int(self.integer(node)?)),
            "float" => ExprKind::Constant(Literal::Float(self.float(node)?)),
            "true" => ExprKind::Constant(Literal::Bool(true)),
            "false" => ExprKind::Constant(Literal::Bool(false)),
            "none" => ExprKind::Constant(Literal::None),
            "string" => ExprKind::Constant(Literal::Str(self.string(node)?)),
            "concatenated_string" => {
                let mut joined = String::new();
                for part in named(node) {
                    joined.push_str(&self.string(part)?);
                }
                ExprKind::Constant(Literal::Str(joined))
            }
            "attribute" => {
                let value = self.expression(field(node, "object")?)?;
                let attr = self.text(field(node, "attribute")?).to_string();
                ExprKind::Attribute {
                    value: Box::new(value),
                    attr,
                }
            }
            "subscript" => {
                let value = self.expression(field(node, "value")?)?;
                let mut cursor = node.walk();
                let parts: Vec<Node<'_>> =
                    node.children_by_field_name("subscript", &mut cursor).collect();
                let index = match parts.as_slice() {
                    [] => return Err(malformed(node, "subscript")),
                    [single] => self.expression(*single)?,
                    many => {
                        let items = many
                            .iter()
                            .map(|n| self.expression(*n))
                            .collect::<Result<Vec<_>, _>>()?;
                        self.expr(node, ExprKind::Tuple(items))
                    }
                };
                ExprKind::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                }
            }
            "call" => ExprKind::Call(self.call(node)?),
            "binary_operator" => {
                let left = self.expression(field(node, "left")?)?;
                let op_node = field(node, "operator")?;
                let op = BinOp::from_token(self.text(op_node)).ok_or_else(|| unsupported(op_node))?;
                let right = self.expression(field(node, "right")?)?;
                ExprKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                }
            }
            "unary_operator" => {
                let op_node = field(node, "operator")?;
                let operand = self.expression(field(node, "argument")?)?;
                let op = match self.text(op_node) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Pos,
                    "~" => UnaryOp::Invert,
                    _ => return Err(unsupported(op_node)),
                };
                match (op, &operand.kind) {
                    (UnaryOp::Neg, ExprKind::Constant(Literal::Int(i))) => {
                        ExprKind::Constant(Literal::Int(-i))
                    }
                    (UnaryOp::Neg, ExprKind::Constant(Literal::Float(x))) => {
                        ExprKind::Constant(Literal::Float(-x))
                    }
                    _ => ExprKind::UnaryOp {
                        op,
                        operand: Box::new(operand),
                    },
                }
            }
            "not_operator" => {
                let operand = self.expression(field(node, "argument")?)?;
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                }
            }
            "boolean_operator" => {
                let left = self.expression(field(node, "left")?)?;
                let op_node = field(node, "operator")?;
                let op = match self.text(op_node) {
                    "and" => BoolOp::And,
                    "or" => BoolOp::Or,
                    _ => return Err(unsupported(op_node)),
                };
                let right = self.expression(field(node, "right")?)?;
                ExprKind::BoolOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            "comparison_operator" => self.comparison(node)?,
            "conditional_expression" => {
                let parts = named(node);
                let [body, test, orelse] = parts.as_slice() else {
                    return Err(malformed(node, "branches"));
                };
                let body = self.expression(*body)?;
                let test = self.expression(*test)?;
                let orelse = self.expression(*orelse)?;
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                }
            }
            "parenthesized_expression" => {
                let inner = named(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(node, "expression"))?;
                return self.expression(inner);
            }
            "tuple" | "expression_list" | "pattern_list" => ExprKind::Tuple(self.sequence(node)?),
            "list" => ExprKind::List(self.sequence(node)?),
            "dictionary" => {
                let mut items = Vec::new();
                for child in named(node) {
                    match child.kind() {
                        "pair" => {
                            let key = self.expression(field(child, "key")?)?;
                            let value = self.expression(field(child, "value")?)?;
                            items.push(DictItem {
                                key: Some(key),
                                value,
                            });
                        }
                        "dictionary_splat" => {
                            let inner = named(child)
                                .into_iter()
                                .next()
                                .ok_or_else(|| malformed(child, "expression"))?;
                            items.push(DictItem {
                                key: None,
                                value: self.expression(inner)?,
                            });
                        }
                        _ => return Err(unsupported(child)),
                    }
                }
                ExprKind::Dict(items)
            }
            "list_comprehension" | "generator_expression" => self.comprehension(node)?,
            "lambda" => {
                let params = match node.child_by_field_name("parameters") {
                    Some(p) => self.params(p)?,
                    None => Params::default(),
                };
                let body = self.expression(field(node, "body")?)?;
                ExprKind::Lambda {
                    params: Box::new(params),
                    body: Box::new(body),
                }
            }
            "list_splat" => {
                let inner = named(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(node, "expression"))?;
                ExprKind::Starred(Box::new(self.expression(inner)?))
            }
            "yield" => {
                if has_token(node, "from") {
                    return Err(unsupported(node));
                }
                match named(node).into_iter().next() {
                    Some(value) => ExprKind::Yield(Some(Box::new(self.expression(value)?))),
                    None => ExprKind::Yield(None),
                }
            }
            "await" => {
                let inner = named(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed(node, "expression"))?;
                ExprKind::Await(Box::new(self.expression(inner)?))
            }
            _ => return Err(unsupported(node)),
        };
        Ok(self.expr(node, kind))
    }

    fn sequence(&mut self, node: Node<'_>) -> Result<Vec<Expr>, TreeSitterError> {
        named(node)
            .into_iter()
            .map(|n| self.expression(n))
            .collect()
    }

    fn comparison(&mut self, node: Node<'_>) -> Result<ExprKind, TreeSitterError> {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            if child.kind() == "comment" {
                continue;
            }
            if child.is_named() {
                if !pending.is_empty() {
                    let token = pending.join(" ");
                    let op = CmpOp::from_token(&token).ok_or_else(|| unsupported(child))?;
                    ops.push(op);
                    pending.clear();
                }
                operands.push(self.expression(child)?);
            } else {
                pending.extend(self.text(child).split_whitespace());
            }
        }

        if operands.len() < 2 || ops.len() != operands.len() - 1 {
            return Err(malformed(node, "operands"));
        }
        let mut operands = operands.into_iter();
        let left = operands.next().ok_or_else(|| malformed(node, "left"))?;
        Ok(ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators: operands.collect(),
        })
    }

    fn comprehension(&mut self, node: Node<'_>) -> Result<ExprKind, TreeSitterError> {
        let elt = self.expression(field(node, "body")?)?;
        let mut generators: Vec<Comprehension> = Vec::new();

        for child in named(node) {
            match child.kind() {
                "for_in_clause" => {
                    if has_token(child, "async") {
                        return Err(unsupported(child));
                    }
                    let target = self.target(field(child, "left")?)?;
                    let mut cursor = child.walk();
                    let rights: Vec<Node<'_>> =
                        child.children_by_field_name("right", &mut cursor).collect();
                    let iter = match rights.as_slice() {
                        [] => return Err(malformed(child, "right")),
                        [single] => self.expression(*single)?,
                        many => {
                            let items = many
                                .iter()
                                .map(|n| self.expression(*n))
                                .collect::<Result<Vec<_>, _>>()?;
                            self.expr(child, ExprKind::Tuple(items))
                        }
                    };
                    generators.push(Comprehension {
                        target,
                        iter,
                        ifs: Vec::new(),
                    });
                }
                "if_clause" => {
                    let cond_node = named(child)
                        .into_iter()
                        .next()
                        .ok_or_else(|| malformed(child, "condition"))?;
                    let cond = self.expression(cond_node)?;
                    generators
                        .last_mut()
                        .ok_or_else(|| malformed(node, "for_in_clause"))?
                        .ifs
                        .push(cond);
                }
                _ if Some(child) == node.child_by_field_name("body") => {}
                _ => return Err(unsupported(child)),
            }
        }

        if generators.is_empty() {
            return Err(malformed(node, "for_in_clause"));
        }
        Ok(ExprKind::ListComp {
            elt: Box::new(elt),
            generators,
        })
    }

    fn call(&mut self, node: Node<'_>) -> Result<CallExpr, TreeSitterError> {
        let func = self.expression(field(node, "function")?)?;
        let arguments = field(node, "arguments")?;
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        if arguments.kind() == "generator_expression" {
            args.push(self.expression(arguments)?);
        } else {
            for arg in named(arguments) {
                match arg.kind() {
                    "keyword_argument" => {
                        let name = self.text(field(arg, "name")?).to_string();
                        let value = self.expression(field(arg, "value")?)?;
                        keywords.push(Keyword {
                            name: Some(name),
                            value,
                        });
                    }
                    "dictionary_splat" => {
                        let inner = named(arg)
                            .into_iter()
                            .next()
                            .ok_or_else(|| malformed(arg, "expression"))?;
                        keywords.push(Keyword {
                            name: None,
                            value: self.expression(inner)?,
                        });
                    }
                    _ => args.push(self.expression(arg)?),
                }
            }
        }

        Ok(CallExpr {
            func: Box::new(func),
            args,
            keywords,
        })
    }

    fn integer(&self, node: Node<'_>) -> Result<i64, TreeSitterError> {
        let raw = self.text(node);
        let cleaned = raw.replace('_', "").to_ascii_lowercase();
        if cleaned.ends_with('j') || cleaned.ends_with('l') {
            return Err(unsupported(node));
        }
        let parsed = if let Some(hex) = cleaned.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else if let Some(oct) = cleaned.strip_prefix("0o") {
            i64::from_str_radix(oct, 8)
        } else if let Some(bin) = cleaned.strip_prefix("0b") {
            i64::from_str_radix(bin, 2)
        } else {
            cleaned.parse::<i64>()
        };
        parsed.map_err(|_| TreeSitterError::InvalidLiteral {
            text: raw.to_string(),
            line: line_of(node),
        })
    }

    fn float(&self, node: Node<'_>) -> Result<f64, TreeSitterError> {
        let raw = self.text(node);
        let cleaned = raw.replace('_', "");
        if cleaned.ends_with(['j', 'J']) {
            return Err(unsupported(node));
        }
        cleaned
            .parse::<f64>()
            .map_err(|_| TreeSitterError::InvalidLiteral {
                text: raw.to_string(),
                line: line_of(node),
            })
    }

    fn string(&self, node: Node<'_>) -> Result<String, TreeSitterError> {
        if node.kind() != "string" {
            return Err(unsupported(node));
        }
        if named(node).iter().any(|c| c.kind() == "interpolation") {
            return Err(TreeSitterError::Unsupported {
                kind: "f-string interpolation".to_string(),
                line: line_of(node),
            });
        }

        let raw = self.text(node);
        let quote_at = raw
            .find(['\'', '"'])
            .ok_or_else(|| malformed(node, "quote"))?;
        let prefix = raw[..quote_at].to_ascii_lowercase();
        if prefix.contains('b') {
            return Err(TreeSitterError::Unsupported {
                kind: "bytes literal".to_string(),
                line: line_of(node),
            });
        }
        let rest = &raw[quote_at..];
        let quote_len = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
            3
        } else {
            1
        };
        if rest.len() < quote_len * 2 {
            return Err(malformed(node, "closing quote"));
        }
        let body = &rest[quote_len..rest.len() - quote_len];

        let mut value = if prefix.contains('r') {
            body.to_string()
        } else {
            unescape(body)
        };
        if prefix.contains('f') {
            value = value.replace("{{", "{").replace("}}", "}");
        }
        Ok(value)
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('\\'),
            Some('\n') => {}
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(kind @ ('x' | 'u' | 'U')) => {
                let width = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&digits);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}
