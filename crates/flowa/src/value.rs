//! Runtime value model.
//!
//! Values are shared via `Rc`: the VM, globals, arrays, and maps all hold
//! `ValueRef` clones and the host runtime reclaims storage when the last
//! clone drops. There is no garbage collector beyond this reference
//! management.
//!
//! Small integers in `[MIN_CACHE, MAX_CACHE]` resolve to pre-allocated shared
//! singletons, as do `null`, `true`, and `false`, so identity comparisons and
//! hot loops never allocate for common values. The singletons live in a
//! thread-local pool; the VM is single-threaded by design.

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    builtins::Builtin,
    bytecode::CompiledFunction,
    modules::NativeFn,
};

/// Smallest cached integer.
pub const MIN_CACHE: i64 = -4096;
/// Largest cached integer.
pub const MAX_CACHE: i64 = 4096;

/// Shared handle to a runtime value.
pub type ValueRef = Rc<Value>;

/// A key in a Map value.
///
/// String, Integer, and Boolean keys compare by content; every other kind of
/// key compares by object identity (the address of its shared allocation).
/// The shared singleton pool makes identity stable for `null`/`true`/`false`
/// and small integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Bool(bool),
    Str(String),
    Identity(usize),
}

impl MapKey {
    /// Derives the lookup key for a value used in key position.
    #[must_use]
    pub fn from_value(value: &ValueRef) -> Self {
        match value.as_ref() {
            Value::Int(n) => Self::Int(*n),
            Value::Bool(b) => Self::Bool(*b),
            Value::Str(s) => Self::Str(s.clone()),
            _ => Self::Identity(Rc::as_ptr(value) as usize),
        }
    }
}

/// One map entry: the original key value (kept for display) plus the value.
#[derive(Debug, Clone)]
pub struct MapPair {
    pub key: ValueRef,
    pub value: ValueRef,
}

/// Map storage. Insertion order is preserved internally (display, JSON) but
/// is not observable through language semantics.
pub type MapStorage = IndexMap<MapKey, MapPair>;

/// A module loaded from a `.flowa` file: its name and exported globals.
#[derive(Debug)]
pub struct ModuleValue {
    pub name: String,
    pub exports: AHashMap<String, ValueRef>,
}

impl ModuleValue {
    /// Looks up an exported member by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ValueRef> {
        self.exports.get(name).cloned()
    }
}

/// Primary runtime value type.
///
/// Mutation happens only through the `RefCell` interiors of Array and Map;
/// everything else is immutable once constructed, which is what makes the
/// shared-singleton scheme sound.
#[derive(Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(RefCell<Vec<ValueRef>>),
    Map(RefCell<MapStorage>),
    /// A compiled Flowa function.
    Function(Rc<CompiledFunction>),
    /// Entry in the fixed-index builtin table.
    Builtin(Builtin),
    /// A host function reached through a builtin module (`json.encode`, ...).
    NativeFn(NativeFn),
    /// A loaded module.
    Module(Rc<ModuleValue>),
    /// Result of `spawn`: evaluation is eager, so the result is already here
    /// and `await` just unwraps it.
    Task(ValueRef),
    /// A runtime-produced error value (builtin failures surface as these).
    Error(String),
}

impl Value {
    /// Name of the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
            Self::Bool(_) => "Boolean",
            Self::Null => "Null",
            Self::Array(_) => "Array",
            Self::Map(_) => "Map",
            Self::Function(_) => "Function",
            Self::Builtin(_) | Self::NativeFn(_) => "BuiltinFunction",
            Self::Module(_) => "Module",
            Self::Task(_) => "Task",
            Self::Error(_) => "Error",
        }
    }

    /// `False` and `Null` are falsy; everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false) | Self::Null)
    }
}

/// Content equality as used by `==`/`!=`.
///
/// Integers and floats compare numerically (with promotion), strings by
/// content, booleans and null by tag; all other kinds fall back to object
/// identity.
#[must_use]
pub fn values_equal(a: &ValueRef, b: &ValueRef) -> bool {
    match (a.as_ref(), b.as_ref()) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        _ => Rc::ptr_eq(a, b),
    }
}

struct Pool {
    null: ValueRef,
    truth: ValueRef,
    falsity: ValueRef,
    /// Cached integers, indexed by `n - MIN_CACHE`.
    ints: Vec<ValueRef>,
}

impl Pool {
    fn new() -> Self {
        let ints = (MIN_CACHE..=MAX_CACHE).map(|n| Rc::new(Value::Int(n))).collect();
        Self {
            null: Rc::new(Value::Null),
            truth: Rc::new(Value::Bool(true)),
            falsity: Rc::new(Value::Bool(false)),
            ints,
        }
    }
}

thread_local! {
    static POOL: Pool = Pool::new();
}

/// The shared `null` singleton.
#[must_use]
pub fn null_value() -> ValueRef {
    POOL.with(|p| p.null.clone())
}

/// The shared `True`/`False` singletons.
#[must_use]
pub fn bool_value(b: bool) -> ValueRef {
    POOL.with(|p| if b { p.truth.clone() } else { p.falsity.clone() })
}

/// An integer value; inside the cache window this is a shared singleton.
#[must_use]
pub fn int_value(n: i64) -> ValueRef {
    if (MIN_CACHE..=MAX_CACHE).contains(&n) {
        POOL.with(|p| p.ints[(n - MIN_CACHE) as usize].clone())
    } else {
        Rc::new(Value::Int(n))
    }
}

/// The shared zero singleton.
#[must_use]
pub fn zero_value() -> ValueRef {
    int_value(0)
}

/// The shared one singleton.
#[must_use]
pub fn one_value() -> ValueRef {
    int_value(1)
}

#[must_use]
pub fn float_value(f: f64) -> ValueRef {
    Rc::new(Value::Float(f))
}

#[must_use]
pub fn str_value(s: impl Into<String>) -> ValueRef {
    Rc::new(Value::Str(s.into()))
}

#[must_use]
pub fn array_value(elements: Vec<ValueRef>) -> ValueRef {
    Rc::new(Value::Array(RefCell::new(elements)))
}

#[must_use]
pub fn map_value(storage: MapStorage) -> ValueRef {
    Rc::new(Value::Map(RefCell::new(storage)))
}

/// Builds a Map value from key/value pairs, applying the standard key
/// equality rules (later duplicates overwrite earlier ones).
#[must_use]
pub fn map_from_pairs(pairs: impl IntoIterator<Item = (ValueRef, ValueRef)>) -> ValueRef {
    let mut storage = MapStorage::new();
    for (key, value) in pairs {
        storage.insert(MapKey::from_value(&key), MapPair { key, value });
    }
    map_value(storage)
}

/// Looks up a string key in a Map value. Returns None when `value` is not a
/// Map or the key is absent.
#[must_use]
pub fn map_lookup_str(value: &ValueRef, key: &str) -> Option<ValueRef> {
    match value.as_ref() {
        Value::Map(pairs) => pairs.borrow().get(&MapKey::Str(key.to_owned())).map(|p| p.value.clone()),
        _ => None,
    }
}

#[must_use]
pub fn error_value(message: impl Into<String>) -> ValueRef {
    Rc::new(Value::Error(message.into()))
}

/// Formats a float the way the language displays it: shortest round-trip
/// decimal, with a `.0` suffix for integral values so floats stay visibly
/// distinct from integers.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    let mut buf = ryu::Buffer::new();
    buf.format(f).to_owned()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Str(s) => f.write_str(s),
            Self::Bool(true) => f.write_str("true"),
            Self::Bool(false) => f.write_str("false"),
            Self::Null => f.write_str("null"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_element(f, item)?;
                }
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (_, pair)) in pairs.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_element(f, &pair.key)?;
                    f.write_str(": ")?;
                    write_element(f, &pair.value)?;
                }
                f.write_str("}")
            }
            Self::Function(func) => match &func.name {
                Some(name) => write!(f, "<func {name}>"),
                None => f.write_str("<func>"),
            },
            Self::Builtin(b) => write!(f, "<builtin {b}>"),
            Self::NativeFn(n) => write!(f, "<builtin {n}>"),
            Self::Module(m) => write!(f, "<module {}>", m.name),
            Self::Task(_) => f.write_str("<task>"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Container elements quote strings so `["a"]` does not display as `[a]`.
fn write_element(f: &mut fmt::Formatter<'_>, value: &ValueRef) -> fmt::Result {
    match value.as_ref() {
        Value::Str(s) => write!(f, "\"{s}\""),
        other => fmt::Display::fmt(other, f),
    }
}
