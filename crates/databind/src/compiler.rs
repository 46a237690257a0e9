//! Turns expression text into callables bound to a context.
//!
//! Every identifier is bound once, at compile time: first to a declared extra
//! argument, then to a name visible through the context, otherwise it stays
//! unresolved and fails when read. The context names therefore never change
//! for the lifetime of a compiled expression.

use crate::context::{Context, ScopeId};
use crate::evaluator::{Code, EvalError, Frame, Target};
use crate::parser::{self, Expression, Literal, Spanned, SyntaxError};
use crate::resolver::Names;
use crate::value::Value;
use ariadne::{Config, Label, Report, ReportKind, Source};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;
use thiserror::Error;

const FILENAME: &str = "expression";

/// A context variable an expression reads, identified by the layer defining it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub scope: ScopeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error in `{expression}`\n{report}")]
    Syntax {
        expression: String,
        errors: Vec<SyntaxError>,
        report: String,
    },
    #[error("invalid assignment target in `{expression}`\n{report}")]
    InvalidAssignment {
        expression: String,
        span: Range<usize>,
        report: String,
    },
}

#[derive(Clone)]
pub struct CompiledExpression {
    source: Rc<str>,
    code: Rc<Code>,
    context: Context,
    parameters: Rc<[String]>,
    dependencies: SmallVec<[Dependency; 2]>,
    unresolved: SmallVec<[String; 1]>,
    dynamic: bool,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Names that were not visible when compiled.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Whether the result may change without any tracked variable changing,
    /// e.g. it reads object fields, calls functions or uses `this`.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Runs the expression. Missing extras are `undefined`.
    pub fn call(&self, extras: &[Value]) -> Result<Value, EvalError> {
        if extras.len() > self.parameters.len() {
            return Err(EvalError::Arity {
                expected: self.parameters.len(),
                actual: extras.len(),
            });
        }
        let mut extras = extras.to_vec();
        extras.resize(self.parameters.len(), Value::Undefined);
        Frame {
            context: &self.context,
            extras,
        }
        .evaluate(&self.code)
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .field("parameters", &self.parameters)
            .field("dependencies", &self.dependencies)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Compiles expressions, caching parse results by source text.
#[derive(Default)]
pub struct Compiler {
    parsed: FxHashMap<String, Result<Rc<Spanned<Expression>>, CompileError>>,
}

impl Compiler {
    pub fn compile(
        &mut self,
        source: &str,
        context: &Context,
        names: &Names,
        extras: &[&str],
    ) -> Result<CompiledExpression, CompileError> {
        let expression = self.parse(source)?;
        let mut binder = Binder {
            source,
            context,
            names,
            extras,
            dependencies: SmallVec::new(),
            unresolved: SmallVec::new(),
            dynamic: false,
        };
        let code = binder.bind(&expression)?;
        Ok(CompiledExpression {
            source: source.into(),
            code: Rc::new(code),
            context: context.clone(),
            parameters: extras.iter().map(|extra| extra.to_string()).collect(),
            dependencies: binder.dependencies,
            unresolved: binder.unresolved,
            dynamic: binder.dynamic,
        })
    }

    pub fn cached(&self) -> usize {
        self.parsed.len()
    }

    fn parse(&mut self, source: &str) -> Result<Rc<Spanned<Expression>>, CompileError> {
        if let Some(parsed) = self.parsed.get(source) {
            return parsed.clone();
        }
        let parsed = parser::parse(source)
            .map(Rc::new)
            .map_err(|errors| syntax_error(source, errors));
        self.parsed.insert(source.to_owned(), parsed.clone());
        parsed
    }
}

/// Compiles `source` without a parse cache.
pub fn compile(
    source: &str,
    context: &Context,
    names: &Names,
    extras: &[&str],
) -> Result<CompiledExpression, CompileError> {
    Compiler::default().compile(source, context, names, extras)
}

struct Binder<'a> {
    source: &'a str,
    context: &'a Context,
    names: &'a Names,
    extras: &'a [&'a str],
    dependencies: SmallVec<[Dependency; 2]>,
    unresolved: SmallVec<[String; 1]>,
    dynamic: bool,
}

impl Binder<'_> {
    fn bind(&mut self, expression: &Spanned<Expression>) -> Result<Code, CompileError> {
        Ok(match &expression.node {
            Expression::Literal(literal) => Code::Constant(match literal {
                Literal::Number(number) => Value::Number(*number),
                Literal::Text(text) => Value::from(text.as_str()),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expression::Identifier(name) => self.identifier(name),
            Expression::This => {
                self.dynamic = true;
                Code::This
            }
            Expression::Array(items) => Code::Array(self.bind_all(items)?),
            Expression::Object(fields) => Code::Object(
                fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.bind(value)?)))
                    .collect::<Result<_, CompileError>>()?,
            ),
            Expression::Member { object, property } => {
                self.dynamic = true;
                Code::Member {
                    object: Box::new(self.bind(object)?),
                    property: property.clone(),
                }
            }
            Expression::Index { object, index } => {
                self.dynamic = true;
                Code::Index {
                    object: Box::new(self.bind(object)?),
                    index: Box::new(self.bind(index)?),
                }
            }
            Expression::Call { callee, arguments } => {
                self.dynamic = true;
                Code::Call {
                    callee: Box::new(self.bind(callee)?),
                    arguments: self.bind_all(arguments)?,
                }
            }
            Expression::Unary { operator, operand } => Code::Unary {
                operator: *operator,
                operand: Box::new(self.bind(operand)?),
            },
            Expression::Binary {
                operator,
                left,
                right,
            } => Code::Binary {
                operator: *operator,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            },
            Expression::Logical {
                operator,
                left,
                right,
            } => Code::Logical {
                operator: *operator,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            },
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => Code::Conditional {
                test: Box::new(self.bind(test)?),
                consequent: Box::new(self.bind(consequent)?),
                alternate: Box::new(self.bind(alternate)?),
            },
            Expression::Assign { target, value } => Code::Assign {
                target: self.target(target)?,
                value: Box::new(self.bind(value)?),
            },
            Expression::Sequence(expressions) => Code::Sequence(self.bind_all(expressions)?),
        })
    }

    fn bind_all(&mut self, expressions: &[Spanned<Expression>]) -> Result<Vec<Code>, CompileError> {
        expressions
            .iter()
            .map(|expression| self.bind(expression))
            .collect()
    }

    fn identifier(&mut self, name: &str) -> Code {
        if let Some(index) = self.extras.iter().position(|extra| *extra == name) {
            return Code::Extra(index);
        }
        if self.names.contains(name) {
            if let Some(layer) = self.context.defining_layer(name) {
                let dependency = Dependency {
                    scope: layer.id(),
                    name: name.to_owned(),
                };
                if !self.dependencies.contains(&dependency) {
                    self.dependencies.push(dependency);
                }
            }
            return Code::Free(name.to_owned());
        }
        if !self.unresolved.iter().any(|unresolved| unresolved == name) {
            self.unresolved.push(name.to_owned());
        }
        Code::Unresolved(name.to_owned())
    }

    fn target(&mut self, target: &Spanned<Expression>) -> Result<Target, CompileError> {
        match &target.node {
            Expression::Identifier(name) => Ok(match self.identifier(name) {
                Code::Extra(index) => Target::Extra(index),
                Code::Free(name) => Target::Free(name),
                _ => Target::Unresolved(name.clone()),
            }),
            Expression::Member { object, property } => {
                self.dynamic = true;
                Ok(Target::Member {
                    object: Box::new(self.bind(object)?),
                    property: property.clone(),
                })
            }
            Expression::Index { object, index } => {
                self.dynamic = true;
                Ok(Target::Index {
                    object: Box::new(self.bind(object)?),
                    index: Box::new(self.bind(index)?),
                })
            }
            _ => {
                let span = target.span.into_range();
                Err(CompileError::InvalidAssignment {
                    expression: self.source.to_owned(),
                    report: report(
                        self.source,
                        &[(span.clone(), "cannot assign to this".to_owned())],
                        "Invalid assignment target",
                    ),
                    span,
                })
            }
        }
    }
}

fn syntax_error(source: &str, errors: Vec<SyntaxError>) -> CompileError {
    let labels = errors
        .iter()
        .map(|error| (error.span.clone(), error.message.clone()))
        .collect::<Vec<_>>();
    CompileError::Syntax {
        expression: source.to_owned(),
        report: report(source, &labels, "Syntax error"),
        errors,
    }
}

/// Renders an uncolored diagnostic with one label per span.
fn report(source: &str, labels: &[(Range<usize>, String)], message: &str) -> String {
    let primary = labels.first().map(|(span, _)| span.clone()).unwrap_or(0..0);
    let mut output = Vec::new();
    let written = Report::build(ReportKind::Error, (FILENAME, primary))
        .with_config(Config::default().with_color(false))
        .with_message(message)
        .with_labels(
            labels
                .iter()
                .map(|(span, label)| Label::new((FILENAME, span.clone())).with_message(label)),
        )
        .finish()
        .write((FILENAME, Source::from(source)), &mut output);
    match written {
        Ok(()) => String::from_utf8_lossy(&output).into_owned(),
        Err(_) => message.to_owned(),
    }
}
