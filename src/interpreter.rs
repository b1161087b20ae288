//! Tree‑walking evaluator for resolved programs.
//!
//! The interpreter owns the frame arena, the distance table produced by the
//! resolver, and the writer `print` goes to.  Statement execution reports
//! how control left the statement through [`Flow`]; only genuine failures
//! travel through the `Err` side of [`Result`].

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info, trace};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::{EnvId, Environments};
use crate::error::{LoxError, Result};
use crate::native::natives;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{format_number, ArrayMethod, Instance, LoxClass, LoxFunction, Value};

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,

    /// A `return` is unwinding to the nearest call.
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    envs: Environments,
    environment: EnvId,
    locals: Locals,
    out: W,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<W: Write> Interpreter<W> {
    /// An interpreter printing to `out`, with every native defined.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let mut envs = Environments::new();
        let globals = envs.globals();

        for native in natives() {
            debug!("Defining native function '{}'", native.name);
            envs.define(globals, native.name, Value::Native(Rc::new(native)));
        }

        Interpreter {
            envs,
            environment: globals,
            locals: Locals::new(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Merge a distance table from the resolver.  Tables from earlier runs
    /// stay valid because expression ids are never reused.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Recording {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Names currently bound in the global frame.
    pub fn global_names(&self) -> Vec<String> {
        self.envs.names(self.envs.globals())
    }

    /// Frames currently allocated, the global frame included.
    pub fn live_frames(&self) -> usize {
        self.envs.live_frames()
    }

    /// Run a program.  Stops at the first runtime error; everything executed
    /// before it stays in effect.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            if let Err(error) = self.execute(stmt) {
                self.environment = self.envs.globals();
                self.envs.drain_released();
                self.out.flush()?;
                return Err(error);
            }

            self.maybe_collect();
        }

        self.out.flush()?;
        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Evaluate a lone expression against the global frame.
    pub fn interpret_expression(&mut self, expr: &Expr) -> Result<Value> {
        let result = self.evaluate(expr);
        self.environment = self.envs.globals();
        self.maybe_collect();

        result
    }

    /// Tracing is only safe between top‑level statements: no value is then
    /// held anywhere except in frames reachable from the globals.
    fn maybe_collect(&mut self) {
        self.envs.drain_released();

        if self.envs.should_collect() {
            let freed = self.envs.collect(&[self.environment]);
            debug!("Frame collection reclaimed {} frame(s)", freed);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        trace!("Executing statement: {:?}", stmt);

        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.envs.define(self.environment, &name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let env = self.envs.create(self.environment);
                return self.execute_block(statements, env);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = self.closure_over(decl, false);
                self.envs.define(
                    self.environment,
                    &decl.name.lexeme,
                    Value::Function(function),
                );
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods)?,

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` with `env` as the active frame.  The previous frame is
    /// restored on every exit path, and `env` is released unless a closure
    /// captured it.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvId) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, env);

        let result = self.execute_all(statements);

        self.environment = previous;
        self.envs.release(env);
        self.envs.drain_released();

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// A function object closing over the active frame.
    fn closure_over(&mut self, decl: &Rc<FunctionDecl>, is_initializer: bool) -> Rc<LoxFunction> {
        self.envs.capture(self.environment);

        Rc::new(LoxFunction::new(
            Rc::clone(decl),
            self.environment,
            is_initializer,
        ))
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => return Err(LoxError::runtime(expr.line(), "Superclass must be a class.")),
            },
            None => None,
        };

        // The name exists before the methods do, so they can refer to it.
        self.envs.define(self.environment, &name.lexeme, Value::Nil);

        let defining = self.environment;

        if let Some(superclass) = &superclass {
            let env = self.envs.create(defining);
            self.envs
                .define(env, "super", Value::Class(Rc::clone(superclass)));
            self.environment = env;
        }

        let mut table: HashMap<String, Rc<LoxFunction>> = HashMap::with_capacity(methods.len());

        for method in methods {
            let is_initializer = method.name.lexeme == "init";

            let function = self.closure_over(method, is_initializer);
            table.insert(method.name.lexeme.clone(), function);
        }

        if superclass.is_some() {
            let super_env = std::mem::replace(&mut self.environment, defining);
            self.envs.release(super_env);
        }

        let class = LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: table,
        };

        self.envs
            .define(defining, &name.lexeme, Value::Class(Rc::new(class)));

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluate an expression in the active frame.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        trace!("Evaluating expression: {:?}", expr);

        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(Rc::clone(s)),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                evaluate_unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                evaluate_binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuits = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call(callee, args, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                self.get_property(&object, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.set_field(&name.lexeme, value.clone());
                    Ok(value)
                }
                Value::Array(_) => Err(LoxError::runtime(
                    name.line,
                    "Can't add properties to arrays.",
                )),
                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass = match self.envs.get_at(self.environment, distance, "super") {
            Some(Value::Class(class)) => class,
            _ => return Err(LoxError::runtime(keyword.line, "Superclass must be a class.")),
        };

        let instance = match distance
            .checked_sub(1)
            .and_then(|d| self.envs.get_at(self.environment, d, "this"))
        {
            Some(Value::Instance(instance)) => instance,
            _ => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Can't use 'super' outside of a method.",
                ))
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(self.bind(&found, &instance)))),
            None => Err(undefined_property(method)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Variables
    // ─────────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        let found = match self.locals.get(&id) {
            Some(&distance) => self.envs.get_at(self.environment, distance, &name.lexeme),
            None => self.envs.get(self.envs.globals(), &name.lexeme),
        };

        found.ok_or_else(|| undefined_variable(name))
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<()> {
        let assigned = match self.locals.get(&id) {
            Some(&distance) => {
                self.envs
                    .assign_at(self.environment, distance, &name.lexeme, value)
            }
            None => {
                let globals = self.envs.globals();
                self.envs.assign(globals, &name.lexeme, value)
            }
        };

        if assigned {
            Ok(())
        } else {
            Err(undefined_variable(name))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Result<Value> {
        let Some(arity) = callee.arity() else {
            return Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            ));
        };

        if args.len() != arity {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        match callee {
            Value::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(&args, &mut self.out)
                    .map_err(|message| LoxError::runtime(paren.line, message))
            }

            Value::Function(function) => {
                debug!("Calling function '{}'", function.name());

                let result = self.call_function(&function, args, paren);

                // A method bound just for this call takes its `this` frame with it.
                drop(function);
                self.envs.drain_released();

                result
            }

            Value::Class(class) => self.instantiate(class, args, paren),

            Value::ArrayMethod(array, method) => Ok(match method {
                ArrayMethod::Get => array.get(&args[0]),
                ArrayMethod::Set => array.set(&args[0], args[1].clone()),
            }),

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFunction,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value> {
        if !self.envs.contains(function.closure) {
            return Err(LoxError::runtime(
                paren.line,
                format!("Function '{}' outlived its scope.", function.name()),
            ));
        }

        let env = self.envs.create(function.closure);

        for (param, arg) in function.declaration.params.iter().zip(args) {
            self.envs.define(env, &param.lexeme, arg);
        }

        let flow = self.execute_block(&function.declaration.body, env)?;

        if function.is_initializer {
            return Ok(self
                .envs
                .get(function.closure, "this")
                .unwrap_or(Value::Nil));
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }

    fn instantiate(&mut self, class: Rc<LoxClass>, args: Vec<Value>, paren: &Token) -> Result<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(Instance::new(Rc::clone(&class)));

        if let Some(init) = class.find_method("init") {
            let bound = self.bind(&init, &instance);
            let result = self.call_function(&bound, args, paren);
            drop(bound);
            self.envs.drain_released();
            result?;
        }

        Ok(Value::Instance(instance))
    }

    /// A copy of `method` whose closure is a fresh frame binding `this`.  The
    /// copy owns that frame and frees it when dropped.
    fn bind(&mut self, method: &LoxFunction, instance: &Rc<Instance>) -> LoxFunction {
        let env = self.envs.create(method.closure);
        self.envs
            .define(env, "this", Value::Instance(Rc::clone(instance)));

        LoxFunction::bound(method, env, self.envs.guard(env))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────────────────

    fn get_property(&mut self, object: &Value, name: &Token) -> Result<Value> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.field(&name.lexeme) {
                    return Ok(value);
                }

                match instance.class.find_method(&name.lexeme) {
                    Some(method) => Ok(Value::Function(Rc::new(self.bind(&method, instance)))),
                    None => Err(undefined_property(name)),
                }
            }

            Value::Array(array) => match name.lexeme.as_str() {
                "get" => Ok(Value::ArrayMethod(Rc::clone(array), ArrayMethod::Get)),
                "set" => Ok(Value::ArrayMethod(Rc::clone(array), ArrayMethod::Set)),
                "length" => Ok(Value::Number(array.len() as f64)),
                _ => Err(undefined_property(name)),
            },

            _ => Err(LoxError::runtime(
                name.line,
                "Only instances have properties.",
            )),
        }
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(
        name.line,
        format!("Undefined variable '{}'.", name.lexeme),
    )
}

fn undefined_property(name: &Token) -> LoxError {
    LoxError::runtime(
        name.line,
        format!("Undefined property '{}'.", name.lexeme),
    )
}

fn evaluate_unary(operator: &Token, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::MINUS => match right {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(LoxError::runtime(
                operator.line,
                "Operand of '-' must be a number.",
            )),
        },
        TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
        _ => Err(LoxError::runtime(
            operator.line,
            format!("Invalid unary operator '{}'.", operator.lexeme),
        )),
    }
}

fn evaluate_binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    let line = operator.line;

    let numbers = |left: Value, right: Value| match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(LoxError::runtime(
            line,
            format!("Operands of '{}' must be numbers.", operator.lexeme),
        )),
    };

    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{}{}", a, b))),
            (Value::String(a), Value::Number(b)) => Ok(Value::string(format!(
                "{}{}",
                a,
                format_number(b)
            ))),
            (Value::Number(a), Value::String(b)) => Ok(Value::string(format!(
                "{}{}",
                format_number(a),
                b
            ))),
            _ => Err(LoxError::runtime(
                line,
                "Operands of '+' must be two numbers, two strings, or a string and a number.",
            )),
        },

        TokenType::MINUS => numbers(left, right).map(|(a, b)| Value::Number(a - b)),

        TokenType::STAR => numbers(left, right).map(|(a, b)| Value::Number(a * b)),

        TokenType::SLASH => {
            let (a, b) = numbers(left, right)?;
            if b == 0.0 {
                return Err(LoxError::runtime(line, "Can't divide by zero."));
            }
            Ok(Value::Number(a / b))
        }

        TokenType::PERCENT => {
            let (a, b) = numbers(left, right)?;
            if b == 0.0 {
                return Err(LoxError::runtime(line, "Can't take modulo by zero."));
            }
            Ok(Value::Number(a % b))
        }

        TokenType::GREATER => numbers(left, right).map(|(a, b)| Value::Bool(a > b)),
        TokenType::GREATER_EQUAL => numbers(left, right).map(|(a, b)| Value::Bool(a >= b)),
        TokenType::LESS => numbers(left, right).map(|(a, b)| Value::Bool(a < b)),
        TokenType::LESS_EQUAL => numbers(left, right).map(|(a, b)| Value::Bool(a <= b)),

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        _ => Err(LoxError::runtime(
            line,
            format!("Invalid binary operator '{}'.", operator.lexeme),
        )),
    }
}
