//! Character-level scanner over one line (or several) of RPN text.
//!
//! The scanner borrows the caller's text and hands out slices of it; only
//! string literals with escapes get an owned, decoded copy.

use alloc::{borrow::Cow, string::String};

use crate::{
  errors::{Error, ProcessingError},
  parsing::number,
  value::Value,
};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
  Word,
  Number(Value),
  String,
  /// `&name`: created on first use.
  Variable,
  /// `$name`: must already be bound.
  BoundVariable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token<'a> {
  pub kind : TokenKind,
  /// Word text, decoded string contents, or variable name without sigil.
  pub text : Cow<'a, str>,
  /// Byte offset of the token's first character.
  pub offset : usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
  Idle,
  InWord,
  InNumber,
  InString,
  InVariable,
}

/// Running shape of a numeric token; decides when it stops being a number.
#[derive(Clone, Copy, Debug, Default)]
struct Shape {
  digits : bool,
  dot : bool,
  exp : bool,
  suffix : bool,
  last : Option<char>,
}

impl Shape {
  fn accepts(&self, c : char, next : Option<char>) -> bool {
    if self.suffix {
      return false;
    }
    match c {
      '0'..='9' => true,
      '.' => !self.dot && !self.exp,
      'e' | 'E' => self.digits && !self.exp,
      '+' | '-' => matches!(self.last, Some('e' | 'E')),
      'i' | 'u' => self.digits && next.map_or(true, char::is_whitespace),
      _ => false,
    }
  }

  fn feed(&mut self, c : char) {
    match c {
      '0'..='9' => self.digits = true,
      '.' => self.dot = true,
      'e' | 'E' => self.exp = true,
      'i' | 'u' => self.suffix = true,
      _ => {}
    }
    self.last = Some(c);
  }
}

/// Lazy token sequence. Stops for good after the first error.
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
  text : &'a str,
  pos : usize,
  done : bool,
}

impl<'a> Tokenizer<'a> {
  /// Fails with `InputBufferOverflow` if `text` is longer than `capacity`
  /// bytes; nothing is scanned in that case.
  pub fn new(text : &'a str, capacity : usize) -> Result<Self, Error> {
    if text.len() > capacity {
      return Err(Error::at(ProcessingError::InputBufferOverflow, capacity));
    }
    Ok(Tokenizer { text, pos : 0, done : false })
  }

  #[inline] fn peek(&self) -> Option<char> { self.text[self.pos..].chars().next() }

  #[inline] fn peek2(&self) -> Option<char> {
    let mut it = self.text[self.pos..].chars();
    it.next();
    it.next()
  }

  #[inline] fn bump(&mut self, c : char) { self.pos += c.len_utf8(); }

  fn scan(&mut self) -> Option<Result<Token<'a>, Error>> {
    let mut state = State::Idle;
    let mut start = self.pos;
    let mut shape = Shape::default();
    let mut decoded = String::new();

    loop {
      let c = self.peek();
      match state {
        State::Idle => match c {
          None => return None,
          Some(c) if c.is_whitespace() => self.bump(c),
          Some(c) => {
            start = self.pos;
            state = match c {
              '"' => State::InString,
              '&' | '$' => State::InVariable,
              '0'..='9' | '+' | '-' | '.' => {
                shape.feed(c);
                State::InNumber
              }
              _ => State::InWord,
            };
            self.bump(c);
          }
        },

        State::InWord | State::InVariable => match c {
          Some(c) if !c.is_whitespace() => self.bump(c),
          _ => return Some(self.finish(state, start)),
        },

        State::InNumber => match c {
          Some(c) if !c.is_whitespace() => {
            if shape.accepts(c, self.peek2()) {
              shape.feed(c);
            } else {
              state = State::InWord;
            }
            self.bump(c);
          }
          _ => return Some(self.finish(state, start)),
        },

        State::InString => match c {
          None => return Some(Err(Error::at(ProcessingError::InvalidToken, start))),
          Some('"') => {
            self.bump('"');
            let text = core::mem::take(&mut decoded);
            return Some(Ok(Token { kind : TokenKind::String, text : Cow::Owned(text), offset : start }));
          }
          Some('\\') => {
            let at = self.pos;
            self.bump('\\');
            match self.escape() {
              Some(e) => decoded.push(e),
              None => return Some(Err(Error::at(ProcessingError::UnknownToken, at))),
            }
          }
          Some(c) => {
            decoded.push(c);
            self.bump(c);
          }
        },
      }
    }
  }

  /// Decodes the escape following a backslash.
  fn escape(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.bump(c);
    match c {
      'n' => Some('\n'),
      't' => Some('\t'),
      'r' => Some('\r'),
      '\\' => Some('\\'),
      '"' => Some('"'),
      'x' => {
        let hi = self.peek().filter(char::is_ascii_hexdigit)?;
        self.bump(hi);
        let lo = self.peek().filter(char::is_ascii_hexdigit)?;
        self.bump(lo);
        let byte = (hi.to_digit(16)? << 4) | lo.to_digit(16)?;
        char::from_u32(byte)
      }
      _ => None,
    }
  }

  fn finish(&self, state : State, start : usize) -> Result<Token<'a>, Error> {
    let text = &self.text[start..self.pos];
    let kind = match state {
      State::InVariable => {
        let name = &text[1..];
        if name.is_empty() {
          return Err(Error::at(ProcessingError::InvalidToken, start));
        }
        let kind = if text.starts_with('$') { TokenKind::BoundVariable } else { TokenKind::Variable };
        return Ok(Token { kind, text : Cow::Borrowed(name), offset : start });
      }
      State::InNumber => match number::scan(text) {
        Some(Ok(v)) => TokenKind::Number(v),
        Some(Err(e)) => return Err(Error::at(e, start)),
        None => TokenKind::Word,
      },
      _ => TokenKind::Word,
    };
    Ok(Token { kind, text : Cow::Borrowed(text), offset : start })
  }
}

impl<'a> Iterator for Tokenizer<'a> {
  type Item = Result<Token<'a>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let next = self.scan();
    if !matches!(next, Some(Ok(_))) {
      self.done = true;
    }
    next
  }
}
