//! Typed AST for parsed templates.
//!
//! Nodes are self-contained and freely clonable. `Display` renders a node
//! back to template syntax; binary expressions are printed with parentheses
//! wherever a child binds looser than its parent, so re-parsing the output
//! yields a structurally equal tree.

use std::fmt;

/// Statement-level nodes.
#[derive(Debug, Clone)]
pub enum Node {
    List(ListNode),
    Text(TextNode),
    Var(VarNode),
    If(IfNode),
    For(ForNode),
    Set(SetNode),
}

impl Node {
    /// Byte offset at which the node begins.
    pub fn pos(&self) -> usize {
        match self {
            Node::List(n) => n.pos,
            Node::Text(n) => n.pos,
            Node::Var(n) => n.pos,
            Node::If(n) => n.pos,
            Node::For(n) => n.pos,
            Node::Set(n) => n.pos,
        }
    }
}

/// An ordered sequence of nodes; also the root of every parsed tree.
#[derive(Debug, Clone, Default)]
pub struct ListNode {
    pub pos: usize,
    pub nodes: Vec<Node>,
}

impl ListNode {
    pub fn new(pos: usize) -> Self {
        Self {
            pos,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

/// Verbatim text between template constructs. Never empty.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub pos: usize,
    pub text: String,
}

/// A `{{ … }}` print expression with exactly one inner expression.
#[derive(Debug, Clone)]
pub struct VarNode {
    pub pos: usize,
    pub expr: Expr,
}

/// An `if`/`elif`/`else` chain.
#[derive(Debug, Clone)]
pub struct IfNode {
    pub pos: usize,
    pub branches: Vec<IfBranch>,
    pub else_body: Option<ListNode>,
}

/// One guarded branch of an `if` chain.
#[derive(Debug, Clone)]
pub struct IfBranch {
    pub pos: usize,
    pub guard: Expr,
    pub body: ListNode,
}

/// A `for … in … endfor` loop.
#[derive(Debug, Clone)]
pub struct ForNode {
    pub pos: usize,
    pub target: ForTarget,
    pub iter: Expr,
    pub body: ListNode,
}

/// Loop target: a single name, or a parenthesised tuple of names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForTarget {
    Single(String),
    Tuple(Vec<String>),
}

impl fmt::Display for ForTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForTarget::Single(name) => f.write_str(name),
            ForTarget::Tuple(names) => write!(f, "({})", names.join(", ")),
        }
    }
}

/// A `set name = expr` binding.
#[derive(Debug, Clone)]
pub struct SetNode {
    pub pos: usize,
    pub name: String,
    pub value: Expr,
}

/// Expression nodes.
#[derive(Debug, Clone)]
pub enum Expr {
    Int {
        value: i64,
        pos: usize,
    },
    Float {
        value: f64,
        pos: usize,
    },
    Str {
        value: String,
        pos: usize,
    },
    Bool {
        value: bool,
        pos: usize,
    },
    Lookup {
        name: String,
        pos: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: usize,
    },
    /// Additive binary expression: `+` or `-`.
    Add {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: usize,
    },
    /// Multiplicative binary expression: `*`, `/`, `//`, or `%`.
    Mul {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: usize,
    },
    /// Comparison; non-associative.
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: usize,
    },
    /// Short-circuiting `and` / `or`.
    Logic {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: usize,
    },
    /// Map literal; insertion order is preserved and keys are not
    /// deduplicated at parse time.
    Map {
        elems: Vec<MapElem>,
        pos: usize,
    },
    /// List literal.
    List {
        elems: Vec<Expr>,
        pos: usize,
    },
    /// Subscript: `target[index]`. Attribute access `target.name` is
    /// represented as an index with a string-literal key.
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: usize,
    },
}

/// One key/value pair of a map literal.
#[derive(Debug, Clone)]
pub struct MapElem {
    pub pos: usize,
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Floordiv,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Floordiv => "//",
            ArithOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "and",
            LogicOp::Or => "or",
        }
    }
}

impl Expr {
    /// Byte offset at which the expression begins.
    pub fn pos(&self) -> usize {
        match self {
            Expr::Int { pos, .. }
            | Expr::Float { pos, .. }
            | Expr::Str { pos, .. }
            | Expr::Bool { pos, .. }
            | Expr::Lookup { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Add { pos, .. }
            | Expr::Mul { pos, .. }
            | Expr::Compare { pos, .. }
            | Expr::Logic { pos, .. }
            | Expr::Map { pos, .. }
            | Expr::List { pos, .. }
            | Expr::Index { pos, .. } => *pos,
        }
    }

    /// Binding strength used when printing; mirrors the parser's levels.
    fn binding(&self) -> u8 {
        match self {
            Expr::Logic {
                op: LogicOp::Or, ..
            } => 1,
            Expr::Logic {
                op: LogicOp::And, ..
            } => 2,
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => 3,
            Expr::Compare { .. } => 4,
            Expr::Add { .. } => 5,
            Expr::Mul { .. } => 6,
            Expr::Unary { .. } => 7,
            Expr::Index { .. } => 8,
            _ => 9,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let binding = self.binding();
        let parens = binding < min;
        if parens {
            f.write_str("(")?;
        }
        match self {
            Expr::Int { value, .. } => write!(f, "{}", value)?,
            Expr::Float { value, .. } => {
                // keep a decimal point so the literal re-lexes as a float
                if value.is_finite() && value.fract() == 0.0 {
                    write!(f, "{:.1}", value)?;
                } else {
                    write!(f, "{}", value)?;
                }
            }
            Expr::Str { value, .. } => write_quoted(f, value)?,
            Expr::Bool { value, .. } => write!(f, "{}", value)?,
            Expr::Lookup { name, .. } => f.write_str(name)?,
            Expr::Unary { op, operand, .. } => {
                match op {
                    UnaryOp::Not => f.write_str("not ")?,
                    _ => f.write_str(op.symbol())?,
                }
                operand.fmt_at(f, binding)?;
            }
            Expr::Add { op, lhs, rhs, .. } | Expr::Mul { op, lhs, rhs, .. } => {
                lhs.fmt_at(f, binding)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_at(f, binding + 1)?;
            }
            Expr::Compare { op, lhs, rhs, .. } => {
                lhs.fmt_at(f, binding + 1)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_at(f, binding + 1)?;
            }
            Expr::Logic { op, lhs, rhs, .. } => {
                lhs.fmt_at(f, binding)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_at(f, binding + 1)?;
            }
            Expr::Map { elems, .. } => {
                f.write_str("{")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", elem.key, elem.value)?;
                }
                f.write_str("}")?;
            }
            Expr::List { elems, .. } => {
                f.write_str("[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                f.write_str("]")?;
            }
            Expr::Index { target, index, .. } => {
                target.fmt_at(f, binding)?;
                write!(f, "[{}]", index)?;
            }
        }
        if parens {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            _ => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::List(n) => write!(f, "{}", n),
            Node::Text(n) => f.write_str(&n.text),
            Node::Var(n) => write!(f, "{{{{ {} }}}}", n.expr),
            Node::If(n) => {
                for (i, branch) in n.branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    write!(f, "{{% {} {} %}}{}", keyword, branch.guard, branch.body)?;
                }
                if let Some(body) = &n.else_body {
                    write!(f, "{{% else %}}{}", body)?;
                }
                f.write_str("{% endif %}")
            }
            Node::For(n) => write!(
                f,
                "{{% for {} in {} %}}{}{{% endfor %}}",
                n.target, n.iter, n.body
            ),
            Node::Set(n) => write!(f, "{{% set {} = {} %}}", n.name, n.value),
        }
    }
}
