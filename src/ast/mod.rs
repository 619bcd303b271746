//! Value-typed syntax tree for the woven target language.
//!
//! The tree is produced by lowering a tree-sitter Python CST (see
//! [`crate::ts::lower`]). Every statement and expression carries a stable
//! [`NodeId`] assigned during lowering, so the `find` pass of a handler can
//! name "this exact node" and the `instrument` pass can rewrite it later
//! without relying on object identity.
//!
//! Instrumentation adds three hook forms ([`HookStmt`], [`HookExpr`],
//! [`HookCall`]) that the interpreter routes into [`crate::runtime`].

pub mod unparse;
pub mod walk;

use crate::model::{Literal, PointKey};

/// Stable identifier of a statement or expression within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Id used for throwaway nodes while a subtree is being moved.
    pub const DETACHED: NodeId = NodeId(u32::MAX);
}

/// Monotonic id allocator owned by a [`Module`].
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: u32,
}

impl IdGen {
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// A parsed (and possibly woven) module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
    pub ids: IdGen,
}

impl Module {
    /// Iterate the module-level function definitions.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|s| match &s.kind {
            StmtKind::FunctionDef(f) => Some(f),
            _ => None,
        })
    }

    /// Iterate the module-level class definitions.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.body.iter().filter_map(|s| match &s.kind {
            StmtKind::ClassDef(c) => Some(c),
            _ => None,
        })
    }

    /// Find a module-level function or a `Class.method` by dotted name.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDef> {
        match name.split_once('.') {
            None => self.functions().find(|f| f.name == name),
            Some((class, method)) => self
                .classes()
                .find(|c| c.name == class)
                .and_then(|c| c.methods().find(|f| f.name == method)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Break,
    Continue,
    Pass,
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Hook(HookStmt),
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub line: usize,
    /// Exception class (or tuple of classes); `None` catches everything.
    pub class: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Params,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub returns: Option<Expr>,
    pub is_async: bool,
    pub is_generator: bool,
    pub line: usize,
    pub end_line: usize,
}

impl FunctionDef {
    /// Name of the first positional parameter, the receiver of a method.
    pub fn receiver(&self) -> Option<&str> {
        self.params.positional.first().map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Params {
    pub positional: Vec<Param>,
    pub vararg: Option<String>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<String>,
}

impl Params {
    /// All parameter names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.positional.iter().map(|p| p.name.as_str()).collect();
        out.extend(self.vararg.as_deref());
        out.extend(self.kwonly.iter().map(|p| p.name.as_str()));
        out.extend(self.kwarg.as_deref());
        out
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub line: usize,
}

impl ClassDef {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|s| match &s.kind {
            StmtKind::FunctionDef(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub line: usize,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(id: NodeId, line: usize, kind: ExprKind) -> Self {
        Self { id, line, kind }
    }

    /// Placeholder left behind by `std::mem::replace` while rewriting.
    pub fn detached() -> Self {
        Self::new(NodeId::DETACHED, 0, ExprKind::Constant(Literal::None))
    }

    /// Dotted path of a `Name` / `Attribute` chain, e.g. `self.engine.start`.
    pub fn dotted_path(&self) -> Option<Vec<String>> {
        match &self.kind {
            ExprKind::Name(name) => Some(vec![name.clone()]),
            ExprKind::Attribute { value, attr } => {
                let mut parts = value.dotted_path()?;
                parts.push(attr.clone());
                Some(parts)
            }
            _ => None,
        }
    }

    pub fn dotted_name(&self) -> Option<String> {
        self.dotted_path().map(|parts| parts.join("."))
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Constant(Literal),
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Call(CallExpr),
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<DictItem>),
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Lambda {
        params: Box<Params>,
        body: Box<Expr>,
    },
    Starred(Box<Expr>),
    Yield(Option<Box<Expr>>),
    Await(Box<Expr>),
    Hook(HookExpr),
    HookCall(HookCall),
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub func: Box<Expr>,
    /// Positional arguments; `*expr` appears as [`ExprKind::Starred`].
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
}

/// `name=value`, or `**value` when `name` is `None`.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub name: Option<String>,
    pub value: Expr,
}

/// `key: value`, or `**value` when `key` is `None`.
#[derive(Debug, Clone)]
pub struct DictItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitAnd,
    BitXor,
    LShift,
    RShift,
}

impl BinOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "|" => BinOp::BitOr,
            "&" => BinOp::BitAnd,
            "^" => BinOp::BitXor,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "in" => CmpOp::In,
            "not in" => CmpOp::NotIn,
            "is" => CmpOp::Is,
            "is not" => CmpOp::IsNot,
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/// Statement-level hook: ENTRY, PARAMETER and EXCEPTION points.
///
/// On cancellation the enclosing function returns the decision's result.
/// When `rebind` is set and a callback replaced the value, the named local is
/// reassigned before the original body continues.
#[derive(Debug, Clone)]
pub struct HookStmt {
    pub point: PointKey,
    pub subject: Option<Expr>,
    pub rebind: Option<String>,
    pub is_async: bool,
}

/// Expression-level hook: the wrapped value is passed through the callback
/// chain and replaced by the decision (CONSTANT, ATTRIBUTE_WRITE,
/// PRODUCED_VALUE and PRE_RETURN points).
#[derive(Debug, Clone)]
pub struct HookExpr {
    pub point: PointKey,
    pub value: Box<Expr>,
    pub is_async: bool,
}

/// Call-site hook. Several points may share one call when more than one
/// descriptor selects it; the first point is the outermost.
#[derive(Debug, Clone)]
pub struct HookCall {
    pub points: Vec<PointKey>,
    pub call: CallExpr,
    pub is_async: bool,
}
