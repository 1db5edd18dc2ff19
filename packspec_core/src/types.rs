//! Value model shared by parsed literals, scope entries and results

use crate::error::{PackspecError, Result};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Reserved result meaning "an exception was raised" (actual) or
/// "an exception is expected" (declared).
///
/// A feature that legitimately expects the string `"ERROR"` cannot be told
/// apart from one that expects an exception.
pub const ERROR: &str = "ERROR";

/// Insertion-ordered string keyed mapping
pub type Mapping = IndexMap<String, Value>;

/// Signature of every native invocable
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value>;

/// Runtime value
///
/// The first seven variants are plain data and are all a YAML document can
/// produce. The last three are supplied by the host (packages, extensions)
/// and only ever enter a tree through scope lookups or invocations.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Mapping),
    Function(Function),
    Class(Class),
    Instance(Rc<dyn Instance>),
}

impl Value {
    /// Build a reference node to a dotted scope path
    pub fn reference(path: impl Into<String>) -> Self {
        let mut mapping = Mapping::new();
        mapping.insert(path.into(), Value::Null);
        Value::Object(mapping)
    }

    /// Dotted path of a reference node: a mapping with one key and a null value
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Value::Object(mapping) if mapping.len() == 1 => match mapping.first() {
                Some((path, Value::Null)) => Some(path.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The `"ERROR"` sentinel
    pub fn error() -> Self {
        Value::String(ERROR.to_string())
    }

    pub fn is_error(&self) -> bool {
        self.as_str() == Some(ERROR)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Int(_) | Value::Float(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "sequence".to_string(),
            Value::Object(_) => "mapping".to_string(),
            Value::Function(f) => format!("function {}", f.name()),
            Value::Class(c) => format!("class {}", c.name()),
            Value::Instance(i) => format!("{} instance", i.class_name()),
        }
    }

    /// Compact JSON-like text; reference nodes render as their bare path
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_rendered(&mut out);
        out
    }

    fn write_rendered(&self, out: &mut String) {
        if let Some(path) = self.as_reference() {
            out.push_str(path);
            return;
        }
        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => out.push_str(&n.to_string()),
                None => out.push_str(&f.to_string()),
            },
            Value::String(s) => out.push_str(&serde_json::Value::String(s.clone()).to_string()),
            Value::Array(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    item.write_rendered(out);
                }
                out.push(']');
            }
            Value::Object(mapping) => {
                out.push('{');
                for (index, (key, item)) in mapping.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::Value::String(key.clone()).to_string());
                    out.push(':');
                    item.write_rendered(out);
                }
                out.push('}');
            }
            Value::Function(f) => out.push_str(&format!("<function {}>", f.name())),
            Value::Class(c) => out.push_str(&format!("<class {}>", c.name())),
            Value::Instance(i) => match i.to_value() {
                Some(value) => value.write_rendered(out),
                None => out.push_str(&format!("<{} instance>", i.class_name())),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(&a.imp), Rc::as_ptr(&b.imp))
            }
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(&a.inner, &b.inner),
            (Value::Instance(a), Value::Instance(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Value::Instance(i), data) | (data, Value::Instance(i)) => {
                i.to_value().is_some_and(|value| &value == data)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&serde_yaml::Value> for Value {
    fn from(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_yaml::Value::String(s) => Value::String(s.clone()),
            serde_yaml::Value::Sequence(seq) => Value::Array(seq.iter().map(Value::from).collect()),
            serde_yaml::Value::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (key_text(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(&tagged.value),
        }
    }
}

/// Mapping keys are strings; scalars keep their YAML spelling
fn key_text(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => Value::from(other).render(),
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Mapping> for Value {
    fn from(mapping: Mapping) -> Self {
        Value::Object(mapping)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl From<Class> for Value {
    fn from(class: Class) -> Self {
        Value::Class(class)
    }
}

/// Named native invocable
///
/// Called with no arguments it doubles as a deferred thunk: property walks
/// invoke it before indexing into its result.
#[derive(Clone)]
pub struct Function {
    name: String,
    imp: Rc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, imp: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Self {
            name: name.into(),
            imp: Rc::new(imp),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.imp)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

/// Constructible type with class level members (constants, static functions)
#[derive(Clone)]
pub struct Class {
    inner: Rc<ClassInner>,
}

struct ClassInner {
    name: String,
    constructor: Box<NativeFn>,
    members: RefCell<Mapping>,
}

impl Class {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Self {
            inner: Rc::new(ClassInner {
                name: name.into(),
                constructor: Box::new(constructor),
                members: RefCell::new(Mapping::new()),
            }),
        }
    }

    /// Add a class level member
    pub fn with_member(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_member(name, value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn construct(&self, args: &[Value]) -> Result<Value> {
        (self.inner.constructor)(args)
    }

    pub fn member(&self, name: &str) -> Option<Value> {
        self.inner.members.borrow().get(name).cloned()
    }

    pub fn set_member(&self, name: impl Into<String>, value: Value) {
        self.inner.members.borrow_mut().insert(name.into(), value);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("name", &self.inner.name).finish()
    }
}

/// Object produced by a host constructor
///
/// Instances are shared: every clone of the holding [`Value`] sees the same
/// state, so implementations keep mutable state behind interior mutability.
pub trait Instance {
    fn class_name(&self) -> &str;

    /// Look up a member; methods come back as [`Function`]s bound to `self`
    fn member(&self, name: &str) -> Option<Value>;

    fn set_member(&self, name: &str, _value: Value) -> Result<()> {
        Err(PackspecError::raise(format!(
            "cannot set '{}' on {} instance",
            name,
            self.class_name()
        )))
    }

    /// Plain data view used for equality against literals and for rendering
    fn to_value(&self) -> Option<Value> {
        None
    }
}
