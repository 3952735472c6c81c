//! Parse tree for Clausewitz script
//!
//! Every node records the stream indices of its first and last token so the
//! formatter can recover the comment and blank-line runs adjacent to it.

/// Ordered sequence of top-level expressions
#[derive(Debug, Clone)]
pub struct Program {
    pub exprs: Vec<Expr>,
}

/// Top-level or block-level expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub start: usize,
    pub stop: usize,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `key = value`
    Assign(AssignExpr),
    /// Bare value, e.g. a top-level `{ ... }`
    Value(Value),
}

#[derive(Debug, Clone)]
pub struct AssignExpr {
    /// Token index of the key
    pub key: usize,
    pub value: Value,
}

/// Assignment value: a scalar/string literal or a brace block
#[derive(Debug, Clone)]
pub struct Value {
    pub kind: ValueKind,
    pub start: usize,
    pub stop: usize,
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    /// Single scalar or string token; its index is the node's `start`
    Leaf,
    Brace(BraceExpr),
}

/// `{ ... }` with its ordered elements
#[derive(Debug, Clone)]
pub struct BraceExpr {
    /// Token index of the opening brace
    pub l_brace: usize,
    /// Token index of the closing brace
    pub r_brace: usize,
    pub values: Vec<BraceValue>,
}

/// Element of a brace block
#[derive(Debug, Clone)]
pub struct BraceValue {
    pub kind: BraceValueKind,
    pub start: usize,
    pub stop: usize,
}

#[derive(Debug, Clone)]
pub enum BraceValueKind {
    /// Plain scalar or string value
    Value(Value),
    /// Assignment or nested bare block
    Expr(Expr),
}

impl BraceValue {
    /// Plain (non-assignment, non-block) element
    pub fn is_plain(&self) -> bool {
        matches!(self.kind, BraceValueKind::Value(_))
    }

    /// Element that is itself `key = { ... }`
    pub fn is_assign_brace(&self) -> bool {
        match &self.kind {
            BraceValueKind::Expr(expr) => match &expr.kind {
                ExprKind::Assign(assign) => matches!(assign.value.kind, ValueKind::Brace(_)),
                ExprKind::Value(_) => false,
            },
            BraceValueKind::Value(_) => false,
        }
    }
}
