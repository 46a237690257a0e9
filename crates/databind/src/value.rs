use crate::context::Context;
use crate::evaluator::EvalError;
use databind_scene::PropertyValue;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type NativeFunction = dyn Fn(&Value, &[Value]) -> Result<Value, EvalError>;

/// A host function callable from binding expressions.
/// Receives the receiver (`this`) and the call arguments.
#[derive(Clone)]
pub struct Function(Rc<NativeFunction>);

impl Function {
    pub fn new(
        function: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self(Rc::new(function))
    }

    pub fn call(&self, receiver: &Value, arguments: &[Value]) -> Result<Value, EvalError> {
        (self.0)(receiver, arguments)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Function({:#x})", self.address())
    }
}

/// A shared, mutable record. Clones alias the same fields.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(Rc::new(RefCell::new(
            iter.into_iter().map(|(name, value)| (name.into(), value)).collect(),
        )))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(fields) => f.debug_map().entries(fields.iter()).finish(),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

/// A dynamically typed value flowing through binding expressions.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(Rc<Vec<Value>>),
    Object(Object),
    Function(Function),
    Context(Context),
}

impl Value {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn function(
        function: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self::Function(Function::new(function))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Text(text) => !text.is_empty(),
            Self::List(_) | Self::Object(_) | Self::Function(_) | Self::Context(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Function(_) => "function",
            Self::Null | Self::List(_) | Self::Object(_) | Self::Context(_) => "object",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(value) => f64::from(u8::from(*value)),
            Self::Number(number) => *number,
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    0.0
                } else {
                    text.parse().unwrap_or(f64::NAN)
                }
            }
            Self::List(items) => match items.as_slice() {
                [] => 0.0,
                [item] => item.to_number(),
                _ => f64::NAN,
            },
            Self::Object(_) | Self::Function(_) | Self::Context(_) => f64::NAN,
        }
    }

    /// Identity for aggregates, value equality for primitives.
    /// `NaN` equals itself here, unlike [`Value::strict_equals`].
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.strict_equals(other),
        }
    }

    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Context(a), Self::Context(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Number(_), Self::Text(_)) | (Self::Text(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::Bool(_), _) | (_, Self::Bool(_)) => {
                Self::Number(self.to_number()).loose_equals(&Self::Number(other.to_number()))
            }
            _ => self.strict_equals(other),
        }
    }

    pub fn item_key(&self) -> ItemKey {
        match self {
            Self::Undefined => ItemKey::Undefined,
            Self::Null => ItemKey::Null,
            Self::Bool(value) => ItemKey::Bool(*value),
            Self::Number(number) => ItemKey::Number(OrderedFloat(*number)),
            Self::Text(text) => ItemKey::Text(text.clone()),
            Self::List(items) => ItemKey::Reference(Rc::as_ptr(items) as usize),
            Self::Object(object) => ItemKey::Reference(object.address()),
            Self::Function(function) => ItemKey::Reference(function.address()),
            Self::Context(context) => ItemKey::Reference(Rc::as_ptr(context) as usize),
        }
    }

    pub fn to_property(&self) -> PropertyValue {
        match self {
            Self::Undefined | Self::Null => PropertyValue::Null,
            Self::Bool(value) => PropertyValue::Bool(*value),
            Self::Number(number) => PropertyValue::Number(*number),
            other => PropertyValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(number) => write_number(f, *number),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) | Self::Context(_) => f.write_str("[object Object]"),
            Self::Function(_) => f.write_str("function"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

fn write_number(f: &mut fmt::Formatter, number: f64) -> fmt::Result {
    if number.is_nan() {
        f.write_str("NaN")
    } else if number.is_infinite() {
        f.write_str(if number > 0.0 { "Infinity" } else { "-Infinity" })
    } else if number == 0.0 {
        f.write_str("0")
    } else {
        write!(f, "{number}")
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Self::Number(number.into())
    }
}

impl From<usize> for Value {
    fn from(number: usize) -> Self {
        Self::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::new(items))
    }
}

/// Identity of a list item during reconciliation.
/// Aggregates are keyed by reference, primitives by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Undefined,
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    Text(Rc<str>),
    Reference(usize),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(number) => write_number(f, number.0),
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Reference(address) => write!(f, "&{address:#x}"),
        }
    }
}
