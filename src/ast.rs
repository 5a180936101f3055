use std::collections::BTreeSet;

mod display;

/// Variables live at a program point, by name.
pub type LiveSet = BTreeSet<String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
    Lt,  // <
    Gt,  // >
    Le,  // <=
    Ge,  // >=
    Eq,  // ==
    Ne,  // !=
    And, // &&
    Or,  // ||
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn from_symbol(sym: &str) -> Option<BinOp> {
        Some(match sym {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            _ => return None,
        })
    }

    /// `&&` and `||` expand to branches at emission time; everything else
    /// is a straight-line instruction sequence.
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg, // -
    Not, // !
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }

    pub fn from_symbol(sym: &str) -> Option<UnOp> {
        Some(match sym {
            "-" => UnOp::Neg,
            "!" => UnOp::Not,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetType {
    Int,
    Void,
}

impl RetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetType::Int => "int",
            RetType::Void => "void",
        }
    }
}

/// Expressions. Every node exclusively owns its children.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    IntLit(i32),
    Var(String),
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnOp {
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Collect every variable name this expression reads into `out`.
    pub fn collect_vars(&self, out: &mut LiveSet) {
        match self {
            Expr::IntLit(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::BinOp { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Expr::UnOp { operand, .. } => {
                operand.collect_vars(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_vars(out);
                }
            }
        }
    }

    pub fn used_vars(&self) -> LiveSet {
        let mut out = LiveSet::new();
        self.collect_vars(&mut out);
        out
    }
}

/// A statement plus its liveness annotation. `live_in`/`live_out` are
/// empty until `opt::liveness` runs; the code generator reads `live_in`
/// to prefer dead values as spill victims.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub live_in: LiveSet,
    pub live_out: LiveSet,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            live_in: LiveSet::new(),
            live_out: LiveSet::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    Empty,
    Expr(Expr),
    Decl {
        name: String,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub rtype: RetType,
    pub params: Vec<String>,
    pub body: Stmt,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub functions: Vec<FuncDef>,
}
