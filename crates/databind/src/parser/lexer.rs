use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Comma,
    Dot,
    Colon,
    Question,
    Number(f64),
    /// Raw text between the quotes, escapes not yet processed.
    Text(&'code str),
    Identifier(&'code str),
    True,
    False,
    Null,
    Undefined,
    This,
    Typeof,
    Nullish,
    Or,
    And,
    StrictEqual,
    StrictNotEqual,
    Equal,
    NotEqual,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Bang,
    Assign,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::BraceOpen => "{".into(),
            Self::BraceClose => "}".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Colon => ":".into(),
            Self::Question => "?".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => format!("'{text}'").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Null => "null".into(),
            Self::Undefined => "undefined".into(),
            Self::This => "this".into(),
            Self::Typeof => "typeof".into(),
            Self::Nullish => "??".into(),
            Self::Or => "||".into(),
            Self::And => "&&".into(),
            Self::StrictEqual => "===".into(),
            Self::StrictNotEqual => "!==".into(),
            Self::Equal => "==".into(),
            Self::NotEqual => "!=".into(),
            Self::LessOrEqual => "<=".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Less => "<".into(),
            Self::Greater => ">".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Bang => "!".into(),
            Self::Assign => "=".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let bracket = choice((
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
        just('{').to(Token::BraceOpen),
        just('}').to(Token::BraceClose),
    ));

    // Longest operators first so `===` never lexes as `==` `=`.
    let operator = choice((
        just("===").to(Token::StrictEqual),
        just("!==").to(Token::StrictNotEqual),
        just("==").to(Token::Equal),
        just("!=").to(Token::NotEqual),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just("&&").to(Token::And),
        just("||").to(Token::Or),
        just("??").to(Token::Nullish),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('=').to(Token::Assign),
        just('!').to(Token::Bang),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('?').to(Token::Question),
        just(':').to(Token::Colon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
    ));

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    let quoted = |quote: char| {
        let escape = just('\\').then(any()).ignored();
        let plain = any()
            .filter(move |character: &char| *character != quote && *character != '\\')
            .ignored();
        just(quote)
            .ignore_then(escape.or(plain).repeated().to_slice())
            .then_ignore(just(quote))
            .map(Token::Text)
    };
    let text = quoted('\'').or(quoted('"'));

    let word = any()
        .filter(|character: &char| {
            character.is_ascii_alphabetic() || *character == '_' || *character == '$'
        })
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            "this" => Token::This,
            "typeof" => Token::Typeof,
            identifier => Token::Identifier(identifier),
        });

    let token = choice((bracket, number, text, word, operator));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded()
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

/// Resolves backslash escapes of a raw text token.
pub fn unescape(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut characters = raw.chars();
    while let Some(character) = characters.next() {
        if character != '\\' {
            text.push(character);
            continue;
        }
        match characters.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('r') => text.push('\r'),
            Some('0') => text.push('\0'),
            Some(other) => text.push(other),
            None => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(code: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(code)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|token| token.node)
            .collect()
    }

    #[test]
    fn test_operators_prefer_longest_match() {
        assert_eq!(
            tokens("a === b !== c == d = e"),
            vec![
                Token::Identifier("a"),
                Token::StrictEqual,
                Token::Identifier("b"),
                Token::StrictNotEqual,
                Token::Identifier("c"),
                Token::Equal,
                Token::Identifier("d"),
                Token::Assign,
                Token::Identifier("e"),
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("this.$el _x true nullable"),
            vec![
                Token::This,
                Token::Dot,
                Token::Identifier("$el"),
                Token::Identifier("_x"),
                Token::True,
                Token::Identifier("nullable"),
            ]
        );
    }

    #[test]
    fn test_numbers_and_texts() {
        assert_eq!(
            tokens(r#"2.5 'it\'s' "a""#),
            vec![Token::Number(2.5), Token::Text(r"it\'s"), Token::Text("a")]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"it\'s\n"), "it's\n");
        assert_eq!(unescape(r"back\\slash"), r"back\slash");
    }

    #[test]
    fn test_unterminated_text_is_an_error() {
        let (_, errors) = lexer().parse("'open").into_output_errors();
        assert!(!errors.is_empty());
    }
}
