//! Parser for the binding expression language.
//!
//! Binding expressions are a small subset of JavaScript expressions: literals,
//! arrays and objects, identifiers and `this`, member access, indexing, calls,
//! the unary, arithmetic, comparison, logical and nullish operators, the
//! conditional operator, assignments and comma sequences.

use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;

mod lexer;
pub use lexer::{Token, lexer, unescape};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    This,
    Array(Vec<Spanned<Expression>>),
    Object(Vec<(String, Spanned<Expression>)>),
    Member {
        object: Box<Spanned<Expression>>,
        property: String,
    },
    Index {
        object: Box<Spanned<Expression>>,
        index: Box<Spanned<Expression>>,
    },
    Call {
        callee: Box<Spanned<Expression>>,
        arguments: Vec<Spanned<Expression>>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Spanned<Expression>>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Spanned<Expression>>,
        right: Box<Spanned<Expression>>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Spanned<Expression>>,
        right: Box<Spanned<Expression>>,
    },
    Conditional {
        test: Box<Spanned<Expression>>,
        consequent: Box<Spanned<Expression>>,
        alternate: Box<Spanned<Expression>>,
    },
    Assign {
        target: Box<Spanned<Expression>>,
        value: Box<Spanned<Expression>>,
    },
    Sequence(Vec<Spanned<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

/// Operators that may skip evaluating their right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Nullish,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let operator = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Remainder => "%",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
        };
        f.write_str(operator)
    }
}

/// Parses a token stream into a single expression.
/// A top-level comma list becomes an [`Expression::Sequence`].
pub fn parser<'code, I>()
-> impl Parser<'code, I, Spanned<Expression>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    expression()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|expressions, extra| into_sequence(expressions, extra.span()))
        .then_ignore(end())
}

fn into_sequence(mut expressions: Vec<Spanned<Expression>>, span: Span) -> Spanned<Expression> {
    if expressions.len() == 1 {
        expressions.remove(0)
    } else {
        Spanned {
            span,
            node: Expression::Sequence(expressions),
        }
    }
}

fn expression<'code, I>()
-> impl Parser<'code, I, Spanned<Expression>, extra::Err<ParseError<'code, Token<'code>>>> + Clone
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    recursive(|expression| {
        let identifier = select! { Token::Identifier(identifier) => identifier };

        let literal = select! {
            Token::Number(number) => Literal::Number(number),
            Token::Text(raw) => Literal::Text(unescape(raw)),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
            Token::Undefined => Literal::Undefined,
        }
        .map(Expression::Literal);

        let array = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expression::Array);

        let property_name = select! {
            Token::Identifier(identifier) => identifier.to_owned(),
            Token::Text(raw) => unescape(raw),
        };

        let object = property_name
            .then_ignore(just(Token::Colon))
            .then(expression.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(Expression::Object);

        let parenthesized = expression
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
            .map_with(|expressions, extra| into_sequence(expressions, extra.span()));

        let atom = choice((
            literal,
            just(Token::This).to(Expression::This),
            identifier.map(|identifier: &str| Expression::Identifier(identifier.to_owned())),
            array,
            object,
        ))
        .map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        })
        .or(parenthesized);

        let arguments = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let index = expression
            .clone()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose));

        let conditional = just(Token::Question)
            .ignore_then(expression.clone())
            .then_ignore(just(Token::Colon));

        atom.pratt((
            postfix(
                10,
                just(Token::Dot).ignore_then(identifier),
                |object, property: &str, extra| Spanned {
                    span: extra.span(),
                    node: Expression::Member {
                        object: Box::new(object),
                        property: property.to_owned(),
                    },
                },
            ),
            postfix(10, index, |object, index, extra| Spanned {
                span: extra.span(),
                node: Expression::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                },
            }),
            postfix(10, arguments, |callee, arguments, extra| Spanned {
                span: extra.span(),
                node: Expression::Call {
                    callee: Box::new(callee),
                    arguments,
                },
            }),
            prefix(
                9,
                select! {
                    Token::Bang => UnaryOperator::Not,
                    Token::Minus => UnaryOperator::Negate,
                    Token::Plus => UnaryOperator::Plus,
                    Token::Typeof => UnaryOperator::TypeOf,
                },
                |operator, operand, extra| Spanned {
                    span: extra.span(),
                    node: Expression::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                },
            ),
            infix(
                left(8),
                select! {
                    Token::Asterisk => BinaryOperator::Multiply,
                    Token::Slash => BinaryOperator::Divide,
                    Token::Percent => BinaryOperator::Remainder,
                },
                |left, operator, right, extra| binary(left, operator, right, extra.span()),
            ),
            infix(
                left(7),
                select! {
                    Token::Plus => BinaryOperator::Add,
                    Token::Minus => BinaryOperator::Subtract,
                },
                |left, operator, right, extra| binary(left, operator, right, extra.span()),
            ),
            infix(
                left(6),
                select! {
                    Token::Less => BinaryOperator::Less,
                    Token::LessOrEqual => BinaryOperator::LessOrEqual,
                    Token::Greater => BinaryOperator::Greater,
                    Token::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
                },
                |left, operator, right, extra| binary(left, operator, right, extra.span()),
            ),
            infix(
                left(5),
                select! {
                    Token::Equal => BinaryOperator::Equal,
                    Token::NotEqual => BinaryOperator::NotEqual,
                    Token::StrictEqual => BinaryOperator::StrictEqual,
                    Token::StrictNotEqual => BinaryOperator::StrictNotEqual,
                },
                |left, operator, right, extra| binary(left, operator, right, extra.span()),
            ),
            infix(
                left(4),
                just(Token::And).to(LogicalOperator::And),
                |left, operator, right, extra| logical(left, operator, right, extra.span()),
            ),
            infix(
                left(3),
                select! {
                    Token::Or => LogicalOperator::Or,
                    Token::Nullish => LogicalOperator::Nullish,
                },
                |left, operator, right, extra| logical(left, operator, right, extra.span()),
            ),
            infix(right(2), conditional, |test, consequent, alternate, extra| {
                Spanned {
                    span: extra.span(),
                    node: Expression::Conditional {
                        test: Box::new(test),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    },
                }
            }),
            infix(right(1), just(Token::Assign), |target, _, value, extra| {
                Spanned {
                    span: extra.span(),
                    node: Expression::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                }
            }),
        ))
    })
}

fn binary(
    left: Spanned<Expression>,
    operator: BinaryOperator,
    right: Spanned<Expression>,
    span: Span,
) -> Spanned<Expression> {
    Spanned {
        span,
        node: Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(
    left: Spanned<Expression>,
    operator: LogicalOperator,
    right: Spanned<Expression>,
    span: Span,
) -> Spanned<Expression> {
    Spanned {
        span,
        node: Expression::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

/// Lexes and parses `code`, returning the expression or every error found.
pub fn parse(code: &str) -> Result<Spanned<Expression>, Vec<SyntaxError>> {
    let (tokens, lex_errors) = lexer().parse(code).into_output_errors();
    let mut errors: Vec<SyntaxError> = lex_errors.iter().map(SyntaxError::from_rich).collect();
    let Some(tokens) = tokens else {
        return Err(errors);
    };
    let end = code.len();
    let (expression, parse_errors) = parser()
        .parse(
            tokens
                .as_slice()
                .map((end..end).into(), |Spanned { node, span }| (node, span)),
        )
        .into_output_errors();
    errors.extend(parse_errors.iter().map(SyntaxError::from_rich));
    match expression {
        Some(expression) if errors.is_empty() => Ok(expression),
        _ => Err(errors),
    }
}

/// A lexing or parsing failure located in the expression source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub span: std::ops::Range<usize>,
    pub message: String,
}

impl SyntaxError {
    fn from_rich<T: fmt::Display>(error: &ParseError<'_, T>) -> Self {
        Self {
            span: error.span().into_range(),
            message: error.reason().to_string(),
        }
    }
}
