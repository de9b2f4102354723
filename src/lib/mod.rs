//! Embeddable RPN expression engine.
//!
//! A [`Context`] owns a stack of typed [`Value`]s, a registry of named
//! variables and a table of operators. Text handed to [`Context::process`]
//! is tokenized and evaluated left to right:
//!
//! ```
//! use librpncalc::{Context, Value};
//!
//! let mut ctx = Context::default();
//! ctx.process("1 3 dup unrot swap - *", false).unwrap();
//! assert_eq!(ctx.pop(), Some(Value::Float(6.0)));
//! ```
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
extern crate alloc;

pub mod config;
pub mod context;
pub mod errors;
#[cfg(feature = "math")]
pub mod math;
pub mod operators;
pub mod parsing;
pub mod state;
pub mod value;


pub use config::{Config, Float, Int, Uint};
pub use context::{Context, Trace, TraceHook};
pub use errors::{Category, Error, ErrorKind, OperatorError, ProcessingError, ValueError};
pub use operators::{Callback, Operator, Operators};
pub use state::{Slot, Stack, State, Variable, Variables};
pub use value::Value;
