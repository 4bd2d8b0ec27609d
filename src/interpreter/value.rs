use super::environment::Environment;
use super::task::TaskHandle;
use crate::parser::ast::Block;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

/// Runtime discriminator, inspectable without touching a value's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Number,
    String,
    Boolean,
    Nil,
    NaN,
    Object,
    Array,
    Range,
    Function,
    TaskFunction,
    LambdaFunction,
    Environment,
    Task,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::Number => "number",
            Tag::String => "string",
            Tag::Boolean => "boolean",
            Tag::Nil => "nil",
            Tag::NaN => "NaN",
            Tag::Object => "object",
            Tag::Array => "array",
            Tag::Range => "range",
            Tag::Function => "function",
            Tag::TaskFunction => "task-function",
            Tag::LambdaFunction => "lambda-function",
            Tag::Environment => "environment",
            Tag::Task => "task",
        };
        write!(f, "{}", name)
    }
}

/// Insertion-ordered string-keyed mapping backing object values.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(Rc<str>, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // an existing key keeps its position
    pub fn insert(&mut self, key: impl Into<Rc<str>>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.as_ref() == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Rc<str>, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, Value)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Plain,
    Task,
    Lambda,
}

pub struct Function {
    pub kind: FunctionKind,
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub body: Rc<Block>,
    pub closure: Rc<Environment>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &"<block>")
            .field("closure", &"<env>")
            .finish()
    }
}

/// What a host function sees of its caller: the caller's file (for relative paths) and the
/// interpreter's output sink.
pub struct HostContext<'a> {
    pub file_path: Option<PathBuf>,
    pub out: &'a mut dyn Write,
}

pub type HostFn = dyn Fn(&mut HostContext, &[Value]) -> Result<Value, String>;

pub struct NativeFunction {
    pub name: Rc<str>,
    pub arity: Option<usize>, // minimum argument count, None for variadic
    pub func: Box<HostFn>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Num(f64),
    Str(Rc<str>),
    Bool(bool),
    Nil,
    NaN,
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Range(f64, f64),
    Fn(Rc<Function>),
    NativeFn(Rc<NativeFunction>),
    Module(Rc<Environment>),
    Task(Rc<TaskHandle>),
}

impl Value {
    /// Wraps a host number, folding IEEE NaN into the `NaN` value.
    pub fn num(n: f64) -> Value {
        if n.is_nan() {
            Value::NaN
        } else {
            Value::Num(n)
        }
    }

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn tag(&self) -> Tag {
        match self {
            Value::Num(_) => Tag::Number,
            Value::Str(_) => Tag::String,
            Value::Bool(_) => Tag::Boolean,
            Value::Nil => Tag::Nil,
            Value::NaN => Tag::NaN,
            Value::Array(_) => Tag::Array,
            Value::Object(_) => Tag::Object,
            Value::Range(_, _) => Tag::Range,
            Value::Fn(fun) => match fun.kind {
                FunctionKind::Plain => Tag::Function,
                FunctionKind::Task => Tag::TaskFunction,
                FunctionKind::Lambda => Tag::LambdaFunction,
            },
            Value::NativeFn(_) => Tag::Function,
            Value::Module(_) => Tag::Environment,
            Value::Task(_) => Tag::Task,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Fn(_) | Value::NativeFn(_))
    }

    /// Numeric view used by arithmetic. Strings parse (NaN when they do not); booleans,
    /// nil and composites have none.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::NaN => Some(f64::NAN),
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    Some(trimmed.parse::<f64>().unwrap_or(f64::NAN))
                }
            }
            _ => None,
        }
    }

    /// `==` semantics: numbers and numeric strings meet, NaN equals nothing,
    /// composites compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(n), Value::Str(s)) | (Value::Str(s), Value::Num(n)) => {
                s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
            }
            _ => self.strict_eq(other),
        }
    }

    /// Same kind and same value; what `switch` uses to pick a case.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Range(a1, b1), Value::Range(a2, b2)) => a1 == a2 && b1 == b2,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFn(a), Value::NativeFn(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_infinite() {
        write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
    } else {
        write!(f, "{}", n)
    }
}

// strings nested in arrays and objects are quoted
fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", s.as_ref()),
        _ => write!(f, "{}", value),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write_number(f, *n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::NaN => write!(f, "NaN"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, val) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, val)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                write!(f, "{{")?;
                for (i, (key, val)) in object.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    write_nested(f, val)?;
                }
                write!(f, "}}")
            }
            Value::Range(start, end) => {
                write_number(f, *start)?;
                write!(f, "..")?;
                write_number(f, *end)
            }
            Value::Fn(fun) => match fun.kind {
                FunctionKind::Plain => write!(f, "[[Function {}]]", fun.name),
                FunctionKind::Task => write!(f, "[[Task {}]]", fun.name),
                FunctionKind::Lambda => write!(f, "[[Lambda]]"),
            },
            Value::NativeFn(native) => write!(f, "[[Function {}]]", native.name),
            Value::Module(_) => write!(f, "[[Environment]]"),
            Value::Task(_) => write!(f, "[[Task]]"),
        }
    }
}
