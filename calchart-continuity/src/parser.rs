use crate::ast::{PointRef, Procedure, Value};
use std::error;
use std::fmt;

/// A parse failure, located by line/column (1-indexed) in the source text
/// (§4.4).
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Correction callback: given the text that failed to parse and the
/// diagnostic, optionally return replacement text to retry with (§6's
/// "continuity-correction handler").
pub trait ContinuityCorrection {
    fn correct(&self, original_text: &str, diagnostic: &ParseError) -> Option<String>;
}

/// A correction handler that never offers a correction, for non-interactive
/// callers (§9: "implementers may pass no-op structs when non-interactive").
pub struct NoCorrection;
impl ContinuityCorrection for NoCorrection {
    fn correct(&self, _original_text: &str, _diagnostic: &ParseError) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Number(f32),
    Plus,
    Minus,
    Star,
    Slash,
    Equals,
    LParen,
    RParen,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            col: 1,
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        next
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize, usize)>, ParseError> {
        let mut out = Vec::new();
        loop {
            while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
                self.advance();
            }
            let (start_line, start_col) = (self.line, self.col);
            let (idx, c) = match self.chars.peek().copied() {
                None => break,
                Some(p) => p,
            };
            match c {
                '+' => {
                    self.advance();
                    out.push((Token::Plus, start_line, start_col));
                }
                '-' => {
                    self.advance();
                    out.push((Token::Minus, start_line, start_col));
                }
                '*' => {
                    self.advance();
                    out.push((Token::Star, start_line, start_col));
                }
                '/' => {
                    self.advance();
                    out.push((Token::Slash, start_line, start_col));
                }
                '=' => {
                    self.advance();
                    out.push((Token::Equals, start_line, start_col));
                }
                '(' => {
                    self.advance();
                    out.push((Token::LParen, start_line, start_col));
                }
                ')' => {
                    self.advance();
                    out.push((Token::RParen, start_line, start_col));
                }
                _ if c.is_ascii_digit() || c == '.' => {
                    let mut end = idx + c.len_utf8();
                    self.advance();
                    while matches!(self.chars.peek(), Some((_, c)) if c.is_ascii_digit() || *c == '.')
                    {
                        if let Some((i, c)) = self.advance() {
                            end = i + c.len_utf8();
                        }
                    }
                    let text = &self.src[idx..end];
                    let n: f32 = text.parse().map_err(|_| ParseError {
                        line: start_line,
                        column: start_col,
                        message: format!("invalid number {:?}", text),
                    })?;
                    out.push((Token::Number(n), start_line, start_col));
                }
                _ if c.is_alphabetic() => {
                    let mut end = idx + c.len_utf8();
                    self.advance();
                    while matches!(self.chars.peek(), Some((_, c)) if c.is_alphanumeric()) {
                        if let Some((i, c)) = self.advance() {
                            end = i + c.len_utf8();
                        }
                    }
                    let text = &self.src[idx..end];
                    out.push((Token::Ident(text.to_string()), start_line, start_col));
                }
                other => {
                    return Err(ParseError {
                        line: start_line,
                        column: start_col,
                        message: format!("unexpected character {:?}", other),
                    })
                }
            }
        }
        Ok(out)
    }
}

/// The legacy text-continuity parser: free-form, case-insensitive,
/// whitespace-tolerant (§4.4).
pub struct Parser<'a> {
    tokens: Vec<(Token, usize, usize)>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn err_at(&self, pos: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = self
            .tokens
            .get(pos)
            .map(|(_, l, c)| (*l, *c))
            .unwrap_or((1, 1));
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _, _)| t)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _, _)| t.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            _ => Err(self.err_at(self.pos.saturating_sub(1), "expected a keyword")),
        }
    }

    fn ident_upper(s: &str) -> String {
        s.to_ascii_uppercase()
    }

    fn parse_point_or_direction(&mut self, ident: &str) -> Option<Value> {
        match Self::ident_upper(ident).as_str() {
            "SP" => Some(Value::Point(PointRef::StartPoint)),
            "NP" => Some(Value::Point(PointRef::NextPoint)),
            "R1" => Some(Value::Point(PointRef::Reference(1))),
            "R2" => Some(Value::Point(PointRef::Reference(2))),
            "R3" => Some(Value::Point(PointRef::Reference(3))),
            "N" => Some(Value::Direction(0.0)),
            "NE" => Some(Value::Direction(45.0)),
            "E" => Some(Value::Direction(90.0)),
            "SE" => Some(Value::Direction(135.0)),
            "S" => Some(Value::Direction(180.0)),
            "SW" => Some(Value::Direction(225.0)),
            "W" => Some(Value::Direction(270.0)),
            "NW" => Some(Value::Direction(315.0)),
            _ => None,
        }
    }

    fn parse_factor(&mut self) -> Result<Value, ParseError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::LParen) => {
                let v = self.parse_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err(self.err_at(self.pos.saturating_sub(1), "expected ')'")),
                }
            }
            Some(Token::Ident(s)) => {
                if let Some(v) = self.parse_point_or_direction(&s) {
                    Ok(v)
                } else if s.len() == 1 && s.chars().next().unwrap().is_ascii_alphabetic() {
                    Ok(Value::Variable(s.chars().next().unwrap().to_ascii_uppercase()))
                } else {
                    Err(self.err_at(
                        self.pos.saturating_sub(1),
                        format!("unrecognized value {:?}", s),
                    ))
                }
            }
            _ => Err(self.err_at(self.pos.saturating_sub(1), "expected a value")),
        }
    }

    fn parse_term(&mut self) -> Result<Value, ParseError> {
        let mut lhs = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    let rhs = self.parse_factor()?;
                    lhs = Value::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.bump();
                    let rhs = self.parse_factor()?;
                    lhs = Value::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_expr(&mut self) -> Result<Value, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    let rhs = self.parse_term()?;
                    lhs = Value::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.bump();
                    let rhs = self.parse_term()?;
                    lhs = Value::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_procedure(&mut self) -> Result<Procedure, ParseError> {
        let start = self.pos;
        let keyword = self.expect_ident()?;
        match Self::ident_upper(&keyword).as_str() {
            "MT" => Ok(Procedure::MarkTime {
                beats: self.parse_expr()?,
                direction: self.parse_expr()?,
            }),
            "CLOSE" => Ok(Procedure::Close {
                beats: self.parse_expr()?,
                direction: self.parse_expr()?,
            }),
            "EM" | "EVEN" => Ok(Procedure::EvenMarch {
                steps: self.parse_expr()?,
                direction: self.parse_expr()?,
            }),
            "FM" => Ok(Procedure::FlowTo {
                beats: self.parse_expr()?,
                direction: self.parse_expr()?,
            }),
            "FMTO" => Ok(Procedure::FlowToPoint {
                to: self.parse_expr()?,
                beats: self.parse_expr()?,
            }),
            "MAGIC" => Ok(Procedure::MagicMove {
                to: self.parse_expr()?,
            }),
            "CM" => Ok(Procedure::Countermarch {
                pivot: self.parse_expr()?,
                steps: self.parse_expr()?,
                direction: self.parse_expr()?,
            }),
            "EXPAND" => Ok(Procedure::ExpandedMarch {
                steps: self.parse_expr()?,
                direction: self.parse_expr()?,
                spacing: self.parse_expr()?,
            }),
            "GRID" => Ok(Procedure::GridSnap {
                size: self.parse_expr()?,
            }),
            _ if keyword.len() == 1 && keyword.chars().next().unwrap().is_ascii_alphabetic() => {
                match self.bump() {
                    Some(Token::Equals) => Ok(Procedure::SetVariable {
                        var: keyword.chars().next().unwrap().to_ascii_uppercase(),
                        value: self.parse_expr()?,
                    }),
                    _ => Err(self.err_at(start, "expected '=' after variable name")),
                }
            }
            other => Err(self.err_at(start, format!("unknown procedure {:?}", other))),
        }
    }

    /// Parse zero or more procedures from `src`. Whitespace-only input
    /// yields an empty list, not an error (§8: boundary behaviour for an
    /// empty continuity).
    pub fn parse(src: &'a str) -> Result<Vec<Procedure>, ParseError> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            src,
        };
        let mut procedures = Vec::new();
        while parser.peek().is_some() {
            procedures.push(parser.parse_procedure()?);
        }
        Ok(procedures)
    }

    /// Parse with a correction callback: on failure, ask `handler` for
    /// replacement text and retry exactly once.
    pub fn parse_with_correction(
        src: &str,
        handler: &dyn ContinuityCorrection,
    ) -> Result<Vec<Procedure>, ParseError> {
        match Parser::parse(src) {
            Ok(procs) => Ok(procs),
            Err(e) => match handler.correct(src, &e) {
                Some(replacement) => Parser::parse(&replacement).map_err(|mut e2| {
                    e2.message = format!("{} (after correction attempt)", e2.message);
                    e2
                }),
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mark_time() {
        let procs = Parser::parse("MT 4 E").unwrap();
        assert_eq!(
            procs,
            vec![Procedure::MarkTime {
                beats: Value::Number(4.0),
                direction: Value::Direction(90.0)
            }]
        );
    }

    #[test]
    fn parses_even_march() {
        let procs = Parser::parse("EM 8 E").unwrap();
        assert_eq!(
            procs,
            vec![Procedure::EvenMarch {
                steps: Value::Number(8.0),
                direction: Value::Direction(90.0)
            }]
        );
    }

    #[test]
    fn is_case_insensitive_and_whitespace_tolerant() {
        let a = Parser::parse("mt   4\tE").unwrap();
        let b = Parser::parse("MT 4 E").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_parses_to_empty_list() {
        assert_eq!(Parser::parse("   ").unwrap(), vec![]);
        assert_eq!(Parser::parse("").unwrap(), vec![]);
    }

    #[test]
    fn unknown_procedure_reports_location() {
        let err = Parser::parse("BOGUS 1 2").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn variable_assignment_parses() {
        let procs = Parser::parse("A = 10 * 9").unwrap();
        assert_eq!(
            procs,
            vec![Procedure::SetVariable {
                var: 'A',
                value: Value::Mul(Box::new(Value::Number(10.0)), Box::new(Value::Number(9.0)))
            }]
        );
    }

    #[test]
    fn correction_handler_can_repair_a_bad_parse() {
        struct FixIt;
        impl ContinuityCorrection for FixIt {
            fn correct(&self, _original: &str, _diag: &ParseError) -> Option<String> {
                Some("MT 4 E".to_string())
            }
        }
        let procs = Parser::parse_with_correction("BOGUS", &FixIt).unwrap();
        assert_eq!(procs.len(), 1);
    }

    #[test]
    fn no_correction_propagates_original_error() {
        let err = Parser::parse_with_correction("BOGUS", &NoCorrection).unwrap_err();
        assert!(err.message.contains("unknown procedure"));
    }
}
