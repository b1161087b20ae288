//! Static resolver pass for the **Rox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str, bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, self‑referencing initializer,
//!    invalid `return`, misplaced `this`/`super`, self‑inheritance).
//! 3. Tell the interpreter, for *each* variable occurrence, whether it’s a local
//!    (and at what depth) or a global, so the interpreter never falls back to
//!    dynamic lookup that would see a later shadowing local.
//!
//! Errors do not stop the walk; all of them are returned together.

use std::collections::HashMap;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::Token;
use log::{debug, info, trace};

/// Distance table: expression node → number of scopes between use and declaration.
/// Nodes without an entry are globals.
pub type Locals = HashMap<ExprId, usize>;

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body are we in?  Used to validate `this`/`super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Enclosing function and class kinds.  Passed down by value, so leaving a
/// region restores the outer context without any bookkeeping.
#[derive(Copy, Clone, Debug)]
struct Context {
    function: FunctionKind,
    class: ClassKind,
}

impl Context {
    const TOP_LEVEL: Context = Context {
        function: FunctionKind::None,
        class: ClassKind::None,
    };

    fn in_function(self, function: FunctionKind) -> Self {
        Context { function, ..self }
    }
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals).
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    globals: HashMap<String, bool>,      // top‑level names known so far
    locals: Locals,
    errors: Vec<LoxError>,
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            globals: HashMap::new(),
            locals: Locals::new(),
            errors: Vec::new(),
        }
    }

    /// Seed the resolver with globals that already hold a value at run time
    /// (natives, declarations from earlier REPL lines).
    pub fn with_globals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globals
            .extend(names.into_iter().map(|name| (name.into(), true)));
        self
    }

    /// Walk all top‑level statements.
    pub fn resolve(mut self, statements: &'a [Stmt]) -> Result<Locals, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements, Context::TOP_LEVEL);
        self.finish()
    }

    /// Resolve a lone expression (expression‑only mode).
    pub fn resolve_expression(mut self, expr: &'a Expr) -> Result<Locals, Vec<LoxError>> {
        info!("Beginning resolve pass over a single expression");

        self.resolve_expr(expr, Context::TOP_LEVEL);
        self.finish()
    }

    fn finish(self) -> Result<Locals, Vec<LoxError>> {
        if self.errors.is_empty() {
            debug!("Resolved {} local reference(s)", self.locals.len());
            Ok(self.locals)
        } else {
            debug!("Resolution failed with {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmts(&mut self, statements: &'a [Stmt], ctx: Context) {
        for stmt in statements {
            self.resolve_stmt(stmt, ctx);
        }
    }

    fn resolve_stmt(&mut self, stmt: &'a Stmt, ctx: Context) {
        trace!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements, ctx);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr, ctx);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // the name is visible *inside* its own body
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, ctx.in_function(FunctionKind::Function));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods, ctx),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr, ctx),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition, ctx);
                self.resolve_stmt(then_branch, ctx);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb, ctx);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition, ctx);
                self.resolve_stmt(body, ctx);
            }

            Stmt::Return { keyword, value } => {
                if ctx.function == FunctionKind::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if ctx.function == FunctionKind::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr, ctx);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &'a Token,
        superclass: Option<&'a Expr>,
        methods: &'a [std::rc::Rc<FunctionDecl>],
        ctx: Context,
    ) {
        self.declare(name);
        self.define(name);

        let class = match superclass {
            Some(expr) => {
                if let Expr::Variable { name: super_name, .. } = expr {
                    if super_name.lexeme == name.lexeme {
                        self.error(super_name, "A class can't inherit from itself.");
                    }
                }

                self.resolve_expr(expr, ctx);
                ClassKind::Subclass
            }
            None => ClassKind::Class,
        };

        if superclass.is_some() {
            self.begin_scope();
            self.bind_synthetic("super");
        }

        self.begin_scope();
        self.bind_synthetic("this");

        let class_ctx = Context { class, ..ctx };

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };

            self.resolve_function(method, class_ctx.in_function(kind));
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr, ctx: Context) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner, ctx),

            Expr::Unary { right, .. } => self.resolve_expr(right, ctx),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left, ctx);
                self.resolve_expr(right, ctx);
            }

            Expr::Variable { id, name } => self.resolve_local(*id, name),

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value, ctx);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee, ctx);
                for arg in arguments {
                    self.resolve_expr(arg, ctx);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object, ctx),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value, ctx);
                self.resolve_expr(object, ctx);
            }

            Expr::This { id, keyword } => {
                if ctx.class == ClassKind::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match ctx.class {
                    ClassKind::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassKind::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassKind::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// One fresh scope holds the parameters *and* the top level of the body,
    /// mirroring the single frame a call creates at run time.
    fn resolve_function(&mut self, decl: &'a FunctionDecl, ctx: Context) {
        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body, ctx);
        self.end_scope();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind_synthetic(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    fn declare(&mut self, name: &'a Token) {
        let Some(scope) = self.scopes.last() else {
            // Globals may be redeclared; an existing definition stays
            // readable from the new initializer.
            self.globals.entry(name.lexeme.clone()).or_insert(false);
            return;
        };

        if scope.contains_key(name.lexeme.as_str()) {
            self.error(name, "Already a variable with this name in this scope.");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.as_str(), false);
        }
    }

    fn define(&mut self, name: &'a Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.lexeme.as_str(), true);
            }
            None => {
                self.globals.insert(name.lexeme.clone(), true);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as either a local at depth `d` or a global.
    ///
    /// A declaration whose initializer is still being resolved is skipped, so
    /// `var a = a + 1;` in a block reads the enclosing `a`.  If nothing outside
    /// declares the name, the reference can only mean the variable itself,
    /// which is an error.
    fn resolve_local(&mut self, id: ExprId, name: &'a Token) {
        let lexeme: &str = name.lexeme.as_str();
        let mut in_own_initializer = false;

        // 1. check innermost → outermost
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            match scope.get(lexeme) {
                Some(true) => {
                    trace!("Resolved '{}' at depth {}", lexeme, depth);
                    self.locals.insert(id, depth);
                    return;
                }
                Some(false) => in_own_initializer = true,
                None => {}
            }
        }

        // 2. not found in any local scope ⇒ global
        match self.globals.get(lexeme) {
            Some(true) => {}
            Some(false) => {
                self.error(name, "Can't read local variable in its own initializer.");
            }
            None if in_own_initializer => {
                self.error(name, "Can't read local variable in its own initializer.");
            }
            None => {}
        }

        trace!("Resolved '{}' as global", lexeme);
    }
}
