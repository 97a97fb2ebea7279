//! Syntax tree for procedure source.

/// A parsed source file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Module-level constants in source order
    pub constants: Vec<Constant>,
    /// Function definitions in source order
    pub functions: Vec<Function>,
}

impl Module {
    /// Look up a function by name
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Async functions in source order
    pub fn async_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_async)
    }
}

/// `let NAME = expr;` at module level
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Name
    pub name: String,
    /// Initializer
    pub value: Expr,
    /// Source line
    pub line: usize,
}

/// `[async] fn name(params) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Name
    pub name: String,
    /// Declared `async`
    pub is_async: bool,
    /// Parameter names
    pub params: Vec<String>,
    /// Statements
    pub body: Vec<Stmt>,
    /// Source line of the `fn` keyword
    pub line: usize,
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = value;`
    Let {
        /// Binding name
        name: String,
        /// Initializer
        value: Expr,
        /// Source line
        line: usize,
    },
    /// `expr;`
    Expr(Expr),
    /// `return [value];`
    Return {
        /// Returned value
        value: Option<Expr>,
        /// Source line
        line: usize,
    },
}

impl Stmt {
    /// Source line
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Let { line, .. } | Self::Return { line, .. } => *line,
            Self::Expr(expr) => expr.line,
        }
    }
}

/// Expression with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Kind
    pub kind: ExprKind,
    /// Line
    pub line: usize,
    /// Column
    pub column: usize,
}

impl Expr {
    /// Build an expression
    #[must_use]
    pub const fn new(kind: ExprKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// String literal
    Str(String),
    /// Number literal
    Number(f64),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// Name reference
    Ident(String),
    /// `object.name`
    Member {
        /// Receiver
        object: Box<Expr>,
        /// Member name
        name: String,
    },
    /// `callee(args, name=value)`
    Call {
        /// Function name or method access
        callee: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments in source order
        kwargs: Vec<(String, Expr)>,
    },
    /// `left + right`
    Add(Box<Expr>, Box<Expr>),
    /// `await inner`
    Await(Box<Expr>),
}
