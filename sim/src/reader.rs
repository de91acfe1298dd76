//! Reader for the subset of Lisp syntax the simulated host understands.

use crate::heap::{Heap, NIL, ObjRef, Object, SimInt};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Datum {
    Int(SimInt),
    Float(f64),
    Str(String),
    Symbol(String),
    List(Vec<Datum>, Option<Box<Datum>>),
    Vector(Vec<Datum>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReadError {
    /// Unbalanced or misplaced syntax, carrying the offending text.
    InvalidSyntax(String),
    EndOfFile,
    Overflow(String),
}

pub(crate) fn read(source: &str) -> Result<Datum, ReadError> {
    let mut reader = Reader {
        chars: source.chars().collect(),
        pos: 0,
    };
    reader.datum()
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | '\'' | ';')
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn datum(&mut self) -> Result<Datum, ReadError> {
        self.skip_blank();
        let Some(c) = self.peek() else {
            return Err(ReadError::EndOfFile);
        };
        match c {
            '(' => {
                self.pos += 1;
                self.list()
            }
            '[' => {
                self.pos += 1;
                self.vector()
            }
            ')' | ']' => {
                self.pos += 1;
                Err(ReadError::InvalidSyntax(c.to_string()))
            }
            '\'' => {
                self.pos += 1;
                let quoted = self.datum()?;
                Ok(Datum::List(vec![Datum::Symbol("quote".into()), quoted], None))
            }
            '"' => {
                self.pos += 1;
                self.string()
            }
            _ => self.atom(),
        }
    }

    fn list(&mut self) -> Result<Datum, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            match self.peek() {
                None => return Err(ReadError::EndOfFile),
                Some(')') => {
                    self.pos += 1;
                    return Ok(Datum::List(items, None));
                }
                Some(']') => {
                    self.pos += 1;
                    return Err(ReadError::InvalidSyntax("]".into()));
                }
                Some('.') if self.chars.get(self.pos + 1).is_none_or(|&c| is_delimiter(c)) => {
                    self.pos += 1;
                    if items.is_empty() {
                        return Err(ReadError::InvalidSyntax(".".into()));
                    }
                    let tail = self.datum()?;
                    self.skip_blank();
                    return match self.peek() {
                        Some(')') => {
                            self.pos += 1;
                            Ok(Datum::List(items, Some(Box::new(tail))))
                        }
                        None => Err(ReadError::EndOfFile),
                        Some(c) => Err(ReadError::InvalidSyntax(c.to_string())),
                    };
                }
                Some(_) => items.push(self.datum()?),
            }
        }
    }

    fn vector(&mut self) -> Result<Datum, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_blank();
            match self.peek() {
                None => return Err(ReadError::EndOfFile),
                Some(']') => {
                    self.pos += 1;
                    return Ok(Datum::Vector(items));
                }
                Some(')') => {
                    self.pos += 1;
                    return Err(ReadError::InvalidSyntax(")".into()));
                }
                Some(_) => items.push(self.datum()?),
            }
        }
    }

    fn string(&mut self) -> Result<Datum, ReadError> {
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ReadError::EndOfFile);
            };
            self.pos += 1;
            match c {
                '"' => return Ok(Datum::Str(out)),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(ReadError::EndOfFile);
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn atom(&mut self) -> Result<Datum, ReadError> {
        let mut token = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.pos += 1;
            if c == '\\' {
                escaped = true;
                if let Some(next) = self.peek() {
                    self.pos += 1;
                    token.push(next);
                }
                continue;
            }
            token.push(c);
        }
        if escaped {
            return Ok(Datum::Symbol(token));
        }
        parse_number(&token).unwrap_or_else(|| Ok(Datum::Symbol(token)))
    }
}

/// Integers are `[+-]?digits` with an optional trailing dot; floats are
/// anything else Rust parses as `f64` that contains a digit.
fn parse_number(token: &str) -> Option<Result<Datum, ReadError>> {
    let (negative, body) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let digits = body.strip_suffix('.').unwrap_or(body);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Some(match digits.parse::<u128>() {
            Ok(magnitude) => Ok(Datum::Int(SimInt::new(negative, magnitude))),
            Err(_) => Err(ReadError::Overflow(token.to_string())),
        });
    }
    let looks_numeric = body.bytes().any(|b| b.is_ascii_digit())
        && body.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if looks_numeric && let Ok(d) = token.parse::<f64>() {
        return Some(Ok(Datum::Float(d)));
    }
    None
}

/// Allocates `datum` on the heap.
pub(crate) fn build(heap: &mut Heap, datum: &Datum) -> ObjRef {
    match datum {
        Datum::Int(n) => heap.int(*n),
        Datum::Float(d) => heap.alloc(Object::Float(*d)),
        Datum::Str(s) => heap.string(s.clone()),
        Datum::Symbol(name) => heap.intern(name),
        Datum::List(items, tail) => {
            let tail = tail.as_ref().map_or(NIL, |t| build(heap, t));
            let items: Vec<ObjRef> = items.iter().map(|item| build(heap, item)).collect();
            items.into_iter().rev().fold(tail, |acc, item| heap.cons(item, acc))
        }
        Datum::Vector(items) => {
            let items = items.iter().map(|item| build(heap, item)).collect();
            heap.alloc(Object::Vector(items))
        }
    }
}
