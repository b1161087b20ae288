//! Runtime values and the object model behind them: functions, classes,
//! instances and arrays.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::{EnvId, FrameGuard};

/// Signature of a host‑provided function.  The writer is the interpreter's
/// output, for natives that produce visible effects.
pub type NativeFn = fn(&[Value], &mut dyn Write) -> Result<Value, String>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Native(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<Instance>),
    Array(Rc<LoxArray>),

    /// `array.get` / `array.set`, already tied to their array.
    ArrayMethod(Rc<LoxArray>, ArrayMethod),
}

impl Value {
    /// `nil` and `false` are falsey; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Native(_) | Value::Function(_) | Value::ArrayMethod(..) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Array(_) => "array",
        }
    }

    /// Number of arguments a call must supply, or `None` if not callable.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Value::Native(native) => Some(native.arity),
            Value::Function(function) => Some(function.arity()),
            Value::Class(class) => Some(class.arity()),
            Value::ArrayMethod(_, method) => Some(method.arity()),
            _ => None,
        }
    }

    pub fn string<S: AsRef<str>>(s: S) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }
}

/// Language equality: `nil` only equals `nil`, numbers/strings/booleans by
/// value, everything else by identity.  Values of different types are never
/// equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::ArrayMethod(a, m), Value::ArrayMethod(b, n)) => Rc::ptr_eq(a, b) && m == n,
            _ => false,
        }
    }
}

/// Magnitude from which whole numbers switch to exponent form.
const EXPONENT_THRESHOLD: f64 = 1e21;

/// Canonical text of a number: whole values print without a fractional part,
/// and very large ones in shortest exponent form (`1e25`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.abs() >= EXPONENT_THRESHOLD {
        format!("{:e}", n)
    } else if n.is_finite() && n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Writes `array`, printing `[...]` for any array already being written
/// further up `path`.
fn write_array(
    f: &mut fmt::Formatter<'_>,
    array: &Rc<LoxArray>,
    path: &mut Vec<*const LoxArray>,
) -> fmt::Result {
    if path.contains(&Rc::as_ptr(array)) {
        return write!(f, "[...]");
    }

    path.push(Rc::as_ptr(array));

    write!(f, "[")?;
    for (i, element) in array.elements.borrow().iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match element {
            Value::Array(inner) => write_array(f, inner, path)?,
            other => write!(f, "{}", other)?,
        }
    }

    path.pop();
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::String(s) => write!(f, "{}", s),

            Value::Native(native) => write!(f, "<native fn {}>", native.name),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),

            Value::Array(array) => write_array(f, array, &mut Vec::new()),

            Value::ArrayMethod(_, method) => write!(f, "<native fn {}>", method.name()),
        }
    }
}

/// Values can be cyclic (an instance holding itself), so Debug shows the
/// same shallow form as Display, tagged with the type.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(array) => write!(f, "Array(len={})", array.len()),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callables
// ─────────────────────────────────────────────────────────────────────────────

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

/// A user function or method together with the frame it closes over.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvId,

    /// `init` methods always hand back their instance.
    pub is_initializer: bool,

    /// Set when `closure` is a frame created by binding a method to an
    /// instance.  That frame belongs to this function object alone.
    _binding: Option<FrameGuard>,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvId, is_initializer: bool) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
            _binding: None,
        }
    }

    /// `method` closing over `this_frame`, which `guard` hands to the new
    /// function.
    pub fn bound(method: &LoxFunction, this_frame: EnvId, guard: FrameGuard) -> Self {
        LoxFunction {
            declaration: Rc::clone(&method.declaration),
            closure: this_frame,
            is_initializer: method.is_initializer,
            _binding: Some(guard),
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Look `name` up in this class, then up the inheritance chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref()?.find_method(name)
    }

    /// Calling a class takes whatever its initializer takes.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<LoxClass>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arrays
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Get,
    Set,
}

impl ArrayMethod {
    pub fn name(self) -> &'static str {
        match self {
            ArrayMethod::Get => "get",
            ArrayMethod::Set => "set",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            ArrayMethod::Get => 1,
            ArrayMethod::Set => 2,
        }
    }
}

/// Fixed‑length array.  Its only members are `get`, `set` and `length`.
///
/// An index that does not name an element (not a number, not whole, or out
/// of range) reads as `nil`, and writing through it stores nothing.
#[derive(Debug)]
pub struct LoxArray {
    pub elements: RefCell<Vec<Value>>,
}

impl LoxArray {
    /// `size` slots, all `nil`.
    pub fn with_len(size: usize) -> Self {
        LoxArray {
            elements: RefCell::new(vec![Value::Nil; size]),
        }
    }

    /// A one‑element array holding `value`.
    pub fn with_value(value: Value) -> Self {
        LoxArray {
            elements: RefCell::new(vec![value]),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, index: &Value) -> Option<usize> {
        match index {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && (*n as usize) < self.len() => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    pub fn get(&self, index: &Value) -> Value {
        match self.slot(index) {
            Some(i) => self.elements.borrow()[i].clone(),
            None => Value::Nil,
        }
    }

    /// Store `value` at `index` and return it, or return `nil` if `index`
    /// names no element.
    pub fn set(&self, index: &Value, value: Value) -> Value {
        match self.slot(index) {
            Some(i) => {
                self.elements.borrow_mut()[i] = value.clone();
                value
            }
            None => Value::Nil,
        }
    }
}
