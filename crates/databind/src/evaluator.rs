use crate::context::Context;
use crate::parser::{BinaryOperator, LogicalOperator, UnaryOperator};
use crate::value::{Object, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("`{0}` is not defined")]
    Reference(String),
    #[error("{0}")]
    Type(String),
    #[error("`{0}` is not a function")]
    NotCallable(String),
    #[error("expected {expected} argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },
    /// Raised by host functions.
    #[error("{0}")]
    Thrown(String),
}

/// Expression tree with every identifier bound to where its value lives.
#[derive(Debug, Clone)]
pub(crate) enum Code {
    Constant(Value),
    /// Positional extra argument supplied per call.
    Extra(usize),
    /// Variable looked up through the context at call time.
    Free(String),
    /// Name not visible when compiled; reading it fails.
    Unresolved(String),
    This,
    Array(Vec<Code>),
    Object(Vec<(String, Code)>),
    Member {
        object: Box<Code>,
        property: String,
    },
    Index {
        object: Box<Code>,
        index: Box<Code>,
    },
    Call {
        callee: Box<Code>,
        arguments: Vec<Code>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Code>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Code>,
        right: Box<Code>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Code>,
        right: Box<Code>,
    },
    Conditional {
        test: Box<Code>,
        consequent: Box<Code>,
        alternate: Box<Code>,
    },
    Assign {
        target: Target,
        value: Box<Code>,
    },
    Sequence(Vec<Code>),
}

#[derive(Debug, Clone)]
pub(crate) enum Target {
    Extra(usize),
    Free(String),
    Unresolved(String),
    Member { object: Box<Code>, property: String },
    Index { object: Box<Code>, index: Box<Code> },
}

pub(crate) struct Frame<'a> {
    pub context: &'a Context,
    pub extras: Vec<Value>,
}

impl Frame<'_> {
    pub fn evaluate(&mut self, code: &Code) -> Result<Value, EvalError> {
        match code {
            Code::Constant(value) => Ok(value.clone()),
            Code::Extra(index) => Ok(self.extras.get(*index).cloned().unwrap_or_default()),
            Code::Free(name) => self
                .context
                .get(name)
                .ok_or_else(|| EvalError::Reference(name.clone())),
            Code::Unresolved(name) => Err(EvalError::Reference(name.clone())),
            Code::This => Ok(Value::Context(self.context.clone())),
            Code::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(items))
            }
            Code::Object(fields) => {
                let object = Object::new();
                for (name, value) in fields {
                    object.set(name.as_str(), self.evaluate(value)?);
                }
                Ok(Value::Object(object))
            }
            Code::Member { object, property } => {
                let object = self.evaluate(object)?;
                read_property(&object, property)
            }
            Code::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                read_index(&object, &index)
            }
            Code::Call { callee, arguments } => self.call(callee, arguments),
            Code::Unary { operator, operand } => self.unary(*operator, operand),
            Code::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary(*operator, &left, &right))
            }
            Code::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuits = match operator {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                    LogicalOperator::Nullish => !left.is_nullish(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Code::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test)?.is_truthy() {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            Code::Assign { target, value } => self.assign(target, value),
            Code::Sequence(codes) => {
                let mut last = Value::Undefined;
                for code in codes {
                    last = self.evaluate(code)?;
                }
                Ok(last)
            }
        }
    }

    fn call(&mut self, callee: &Code, arguments: &[Code]) -> Result<Value, EvalError> {
        let (receiver, function) = match callee {
            Code::Member { object, property } => {
                let receiver = self.evaluate(object)?;
                let function = read_property(&receiver, property)?;
                (receiver, function)
            }
            Code::Index { object, index } => {
                let receiver = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let function = read_index(&receiver, &index)?;
                (receiver, function)
            }
            // Bare calls run with the context as receiver.
            Code::Free(_) | Code::Unresolved(_) | Code::Extra(_) => {
                (Value::Context(self.context.clone()), self.evaluate(callee)?)
            }
            other => (Value::Undefined, self.evaluate(other)?),
        };
        let Value::Function(function) = function else {
            return Err(EvalError::NotCallable(describe(callee)));
        };
        let arguments = arguments
            .iter()
            .map(|argument| self.evaluate(argument))
            .collect::<Result<Vec<_>, _>>()?;
        function.call(&receiver, &arguments)
    }

    fn unary(&mut self, operator: UnaryOperator, operand: &Code) -> Result<Value, EvalError> {
        if let (UnaryOperator::TypeOf, Code::Unresolved(_)) = (operator, operand) {
            return Ok(Value::from("undefined"));
        }
        let operand = self.evaluate(operand)?;
        Ok(match operator {
            UnaryOperator::Not => Value::Bool(!operand.is_truthy()),
            UnaryOperator::Negate => Value::Number(-operand.to_number()),
            UnaryOperator::Plus => Value::Number(operand.to_number()),
            UnaryOperator::TypeOf => Value::from(operand.type_of()),
        })
    }

    fn assign(&mut self, target: &Target, value: &Code) -> Result<Value, EvalError> {
        match target {
            Target::Extra(index) => {
                let value = self.evaluate(value)?;
                if let Some(slot) = self.extras.get_mut(*index) {
                    *slot = value.clone();
                }
                Ok(value)
            }
            Target::Free(name) => {
                let value = self.evaluate(value)?;
                self.context.assign(name, value.clone())?;
                Ok(value)
            }
            Target::Unresolved(name) => Err(EvalError::Reference(name.clone())),
            Target::Member { object, property } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                write_property(&object, property, value.clone())?;
                Ok(value)
            }
            Target::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                write_property(&object, &index.to_string(), value.clone())?;
                Ok(value)
            }
        }
    }
}

fn describe(code: &Code) -> String {
    match code {
        Code::Free(name) | Code::Unresolved(name) => name.clone(),
        Code::Member { object, property } => format!("{}.{property}", describe(object)),
        Code::This => "this".to_owned(),
        Code::Extra(index) => format!("argument {index}"),
        _ => "expression".to_owned(),
    }
}

fn read_property(object: &Value, property: &str) -> Result<Value, EvalError> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "cannot read property `{property}` of {object}"
        ))),
        Value::Object(object) => Ok(object.get(property).unwrap_or_default()),
        Value::Context(context) => Ok(context.get(property).unwrap_or_default()),
        Value::List(items) if property == "length" => Ok(Value::from(items.len())),
        Value::Text(text) if property == "length" => Ok(Value::from(text.chars().count())),
        _ => Ok(Value::Undefined),
    }
}

fn read_index(object: &Value, index: &Value) -> Result<Value, EvalError> {
    match (object, index) {
        (Value::List(items), Value::Number(number)) => Ok(list_position(*number, items.len())
            .and_then(|position| items.get(position).cloned())
            .unwrap_or_default()),
        (Value::Text(text), Value::Number(number)) => Ok(list_position(*number, usize::MAX)
            .and_then(|position| text.chars().nth(position))
            .map(|character| Value::from(character.to_string()))
            .unwrap_or_default()),
        _ => read_property(object, &index.to_string()),
    }
}

fn list_position(number: f64, len: usize) -> Option<usize> {
    (number >= 0.0 && number.fract() == 0.0 && number < len as f64).then_some(number as usize)
}

fn write_property(object: &Value, property: &str, value: Value) -> Result<(), EvalError> {
    match object {
        Value::Object(object) => {
            object.set(property, value);
            Ok(())
        }
        Value::Context(context) => {
            context.define(property, value);
            Ok(())
        }
        other => Err(EvalError::Type(format!(
            "cannot set property `{property}` of {}",
            other.type_of()
        ))),
    }
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOperator::Add => match (left, right) {
            (Value::Number(left), Value::Number(right)) => Value::Number(left + right),
            _ if is_textual(left) || is_textual(right) => Value::from(format!("{left}{right}")),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Less => compare(left, right, |ordering| ordering.is_lt()),
        BinaryOperator::LessOrEqual => compare(left, right, |ordering| ordering.is_le()),
        BinaryOperator::Greater => compare(left, right, |ordering| ordering.is_gt()),
        BinaryOperator::GreaterOrEqual => compare(left, right, |ordering| ordering.is_ge()),
        BinaryOperator::Equal => Value::Bool(left.loose_equals(right)),
        BinaryOperator::NotEqual => Value::Bool(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => Value::Bool(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => Value::Bool(!left.strict_equals(right)),
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::Text(_) | Value::List(_) | Value::Object(_) | Value::Context(_)
    )
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::Text(left), Value::Text(right)) => Some(left.cmp(right)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Scope;

    fn evaluate(code: &Code) -> Result<Value, EvalError> {
        let context = Scope::with_variables([("count", Value::from(2))]);
        Frame {
            context: &context,
            extras: vec![],
        }
        .evaluate(code)
    }

    fn number(number: f64) -> Box<Code> {
        Box::new(Code::Constant(Value::Number(number)))
    }

    #[test]
    fn test_addition_concatenates_text() {
        let code = Code::Binary {
            operator: BinaryOperator::Add,
            left: Box::new(Code::Constant(Value::from("n="))),
            right: Box::new(Code::Free("count".to_owned())),
        };
        assert_eq!(evaluate(&code).unwrap().to_string(), "n=2");
    }

    #[test]
    fn test_comparisons_with_nan_are_false() {
        let code = Code::Binary {
            operator: BinaryOperator::Less,
            left: number(f64::NAN),
            right: number(1.0),
        };
        assert!(!evaluate(&code).unwrap().is_truthy());
    }

    #[test]
    fn test_logical_short_circuits() {
        let code = Code::Logical {
            operator: LogicalOperator::Or,
            left: number(1.0),
            right: Box::new(Code::Unresolved("boom".to_owned())),
        };
        assert_eq!(evaluate(&code).unwrap().to_string(), "1");
    }

    #[test]
    fn test_reading_unresolved_name_fails() {
        assert_eq!(
            evaluate(&Code::Unresolved("nope".to_owned())),
            Err(EvalError::Reference("nope".to_owned()))
        );
    }

    #[test]
    fn test_member_of_undefined_is_a_type_error() {
        let code = Code::Member {
            object: Box::new(Code::Constant(Value::Undefined)),
            property: "name".to_owned(),
        };
        assert!(matches!(evaluate(&code), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_text_length_and_index_count_chars() {
        let text = || Box::new(Code::Constant(Value::from("a😀b")));
        let length = Code::Member {
            object: text(),
            property: "length".to_owned(),
        };
        assert_eq!(evaluate(&length), Ok(Value::from(3)));
        let last = Code::Index {
            object: text(),
            index: number(2.0),
        };
        assert_eq!(evaluate(&last), Ok(Value::from("b")));
        let emoji = Code::Index {
            object: text(),
            index: number(1.0),
        };
        assert_eq!(evaluate(&emoji), Ok(Value::from("😀")));
    }

    #[test]
    fn test_calling_a_non_function() {
        let code = Code::Call {
            callee: Box::new(Code::Free("count".to_owned())),
            arguments: vec![],
        };
        assert_eq!(
            evaluate(&code),
            Err(EvalError::NotCallable("count".to_owned()))
        );
    }
}
