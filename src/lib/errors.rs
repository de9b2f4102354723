use alloc::{
  format,
  string::{String, ToString},
};
use thiserror::Error;

/// Failures detected while turning text into dispatched tokens.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingError {
  #[error("unknown token")]
  UnknownToken,
  #[error("invalid token")]
  InvalidToken,
  #[error("variable does not exist")]
  VariableDoesNotExist,
  #[error("unknown operator")]
  UnknownOperator,
  #[error("no more stacks to close")]
  NoMoreStacks,
  /// Never raised by `Context::process`, which handles every token kind the
  /// tokenizer produces. Host callbacks driving their own token loop use it
  /// for tokens they decline.
  #[error("token not handled")]
  TokenNotHandled,
  #[error("input buffer overflow")]
  InputBufferOverflow,
}

/// Failures raised by operator dispatch or by an operator callback.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorError {
  #[error("cannot continue")]
  CannotContinue,
  #[error("argument count mismatch")]
  ArgumentCountMismatch,
  #[error("invalid type")]
  InvalidType,
  #[error("invalid argument")]
  InvalidArgument,
}

/// Failures carried inside `Value::Error`.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueError {
  #[error("invalid operation")]
  InvalidOperation,
  #[error("type mismatch")]
  TypeMismatch,
  #[error("divide by zero")]
  DivideByZero,
  #[error("IEEE 754 violation")]
  IEEE754,
  #[error("value is null")]
  IsNull,
  #[error("not an error")]
  NotAnError,
  #[error("out of range conversion")]
  OutOfRangeConversion,
  #[error("impossible conversion")]
  ImpossibleConversion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
  Processing,
  Operator,
  Value,
}

impl core::fmt::Display for Category {
  fn fmt(&self, f : &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Category::Processing => write!(f, "processing"),
      Category::Operator => write!(f, "operator"),
      Category::Value => write!(f, "value"),
    }
  }
}

/// One error code tagged with the category whose code space it belongs to.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  #[error("processing error: {0}")]
  Processing(#[from] ProcessingError),
  #[error("operator error: {0}")]
  Operator(#[from] OperatorError),
  #[error("value error: {0}")]
  Value(#[from] ValueError),
}

impl ErrorKind {
  pub fn category(&self) -> Category {
    match self {
      ErrorKind::Processing(_) => Category::Processing,
      ErrorKind::Operator(_) => Category::Operator,
      ErrorKind::Value(_) => Category::Value,
    }
  }
}

/// The ambient error of a `process` call.
///
/// `position` is the byte offset, inside the processed text, of the token
/// being handled when the failure was detected.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{kind}{}", offset_suffix(.position))]
pub struct Error {
  pub kind : ErrorKind,
  pub position : Option<usize>,
}

fn offset_suffix(position : &Option<usize>) -> String {
  match position {
    Some(p) => format!(" at offset {}", p),
    None => String::new(),
  }
}

impl Error {
  pub fn new(kind : impl Into<ErrorKind>) -> Self {
    Error { kind : kind.into(), position : None }
  }

  pub fn at(kind : impl Into<ErrorKind>, position : usize) -> Self {
    Error { kind : kind.into(), position : Some(position) }
  }

  #[inline] pub fn category(&self) -> Category { self.kind.category() }

  /// Human readable message for the error.
  pub fn decode(&self) -> String { self.to_string() }
}

macro_rules! error_from {
  ($($code:ty),*) => {$(
    impl From<$code> for Error {
      fn from(e : $code) -> Self { Error::new(e) }
    }
  )*};
}

error_from!(ErrorKind, ProcessingError, OperatorError, ValueError);
