use alloc::boxed::Box;

use tracing::{debug, trace};

use crate::{
  config::Config,
  errors::{Error, ErrorKind, ProcessingError},
  operators::{self, Callback, Operators},
  parsing::{number, Token, TokenKind, Tokenizer},
  state::{Slot, Stack, State},
  value::Value,
};

/// What the trace hook sees before each token is dispatched.
#[derive(Clone, Copy, Debug)]
pub struct Trace<'t> {
  pub offset : usize,
  pub kind : &'t TokenKind,
  pub text : &'t str,
  /// Elements across all stack segments.
  pub depth : usize,
}

pub type TraceHook = Box<dyn FnMut(&Trace<'_>)>;

/// One evaluator: a stack, its variables, the operator table and the error
/// left by the last `process` call.
pub struct Context {
  state : State,
  operators : Operators,
  config : Config,
  error : Option<Error>,
  hook : Option<TraceHook>,
}

#[cfg(feature = "math")]
fn install_math(operators : &mut Operators) { crate::math::install(operators) }

#[cfg(not(feature = "math"))]
fn install_math(_ : &mut Operators) {}

impl Default for Context {
  fn default() -> Self { Context::new(Config::default()) }
}

impl core::fmt::Debug for Context {
  fn fmt(&self, f : &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Context")
      .field("state", &self.state)
      .field("operators", &self.operators.len())
      .field("config", &self.config)
      .field("error", &self.error)
      .finish()
  }
}

impl Context {
  pub fn new(config : Config) -> Self {
    let mut operators = Operators::new();
    if config.install_builtins {
      operators::install_builtins(&mut operators);
    }
    if config.install_math {
      install_math(&mut operators);
    }
    Context { state : State::new(), operators, config, error : None, hook : None }
  }

  #[inline] pub fn config(&self) -> &Config { &self.config }

  /// Evaluates `text` token by token, stopping at the first failure.
  ///
  /// `&name` references create missing variables unless
  /// `variable_must_exist` is set; `$name` references never do. Whatever
  /// the outcome, variables left null and unreferenced are pruned
  /// afterwards. The error is also kept as [`Context::error`].
  #[tracing::instrument(level = "debug", skip(self, text), fields(len = text.len()))]
  pub fn process(&mut self, text : &str, variable_must_exist : bool) -> Result<(), Error> {
    self.error = None;
    let result = self.run(text, variable_must_exist);
    let pruned = self.state.variables.prune();
    if pruned > 0 {
      debug!(pruned, "pruned unused variables");
    }
    if let Err(e) = result {
      debug!(error = %e, "processing stopped");
      self.error = Some(e);
    }
    result
  }

  fn run(&mut self, text : &str, variable_must_exist : bool) -> Result<(), Error> {
    for token in Tokenizer::new(text, self.config.buffer_capacity)? {
      let token = token?;
      let offset = token.offset;
      let depth = self.state.stack.depth();
      trace!(offset, text = %token.text, depth, "token");
      if let Some(hook) = self.hook.as_mut() {
        hook(&Trace { offset, kind : &token.kind, text : &token.text, depth });
      }
      self.dispatch(token, variable_must_exist).map_err(|kind| Error::at(kind, offset))?;
    }
    Ok(())
  }

  fn dispatch(&mut self, token : Token<'_>, variable_must_exist : bool) -> Result<(), ErrorKind> {
    match token.kind {
      TokenKind::Number(v) => self.state.stack.push(v),
      TokenKind::String => self.state.stack.push(Value::String(token.text.into_owned())),
      TokenKind::Variable => self.state.push_variable(&token.text, !variable_must_exist)?,
      TokenKind::BoundVariable => self.state.push_variable(&token.text, false)?,
      TokenKind::Word => self.word(&token.text)?,
    }
    Ok(())
  }

  fn word(&mut self, name : &str) -> Result<(), ErrorKind> {
    match name {
      "[" => {
        self.state.stack.open();
        debug!(segments = self.state.stack.segments(), "stack opened");
        return Ok(());
      }
      "]" => {
        self.state.stack.close()?;
        debug!(segments = self.state.stack.segments(), "stack closed");
        return Ok(());
      }
      _ => {}
    }

    if let Some(op) = self.operators.find(name) {
      op.dispatch(&mut self.state)?;
      if let Ok(Slot::Value(Value::Error(e))) = self.state.stack.at(1) {
        return Err(ErrorKind::Value(*e));
      }
      return Ok(());
    }

    if self.state.variables.lookup(name).is_some() {
      self.state.push_variable(name, false)?;
      return Ok(());
    }

    if number::looks_numeric(name) {
      Err(ProcessingError::UnknownToken.into())
    } else {
      Err(ProcessingError::UnknownOperator.into())
    }
  }

  /// Error left by the last `process` call, if it failed.
  #[inline] pub fn error(&self) -> Option<&Error> { self.error.as_ref() }

  /// Empties the stack and the variables; operators stay registered.
  pub fn clear(&mut self) {
    self.state.stack.clear();
    self.state.variables.clear();
    self.error = None;
  }

  pub fn set_trace_hook(&mut self, hook : impl FnMut(&Trace<'_>) + 'static) {
    self.hook = Some(Box::new(hook));
  }

  pub fn clear_trace_hook(&mut self) { self.hook = None; }

  // operators

  pub fn register(&mut self, name : &str, arity : u8, callback : Callback) {
    self.operators.register(name, arity, callback);
  }

  #[inline] pub fn operators(&self) -> &Operators { &self.operators }

  pub fn operator_names(&self) -> impl Iterator<Item = &str> + '_ { self.operators.names() }

  // stack

  #[inline] pub fn stack(&self) -> &Stack { &self.state.stack }

  #[inline] pub fn push(&mut self, value : impl Into<Value>) { self.state.stack.push(value.into()) }

  pub fn pop(&mut self) -> Option<Value> { self.state.stack.pop().ok() }

  /// Value `n` positions from the top of the active segment, 1-based.
  pub fn peek(&self, n : usize) -> Option<Value> { self.state.stack.peek(n).ok() }

  #[inline] pub fn stack_size(&self) -> usize { self.state.stack.size() }

  /// Values of every slot, bottom first.
  pub fn stack_values(&self) -> impl Iterator<Item = Value> + '_ {
    self.state.stack.iter().map(Slot::value)
  }

  // variables

  pub fn set_variable(&mut self, name : &str, value : impl Into<Value>) {
    self.state.variables.set(name, value.into());
  }

  pub fn get_variable(&self, name : &str) -> Option<Value> { self.state.variables.get(name) }

  pub fn delete_variable(&mut self, name : &str) -> Result<(), Error> {
    self.state.variables.purge(name).map(|_| ()).map_err(Error::from)
  }

  #[inline] pub fn variable_count(&self) -> usize { self.state.variables.len() }

  /// `(name, value)` pairs in name order.
  pub fn variables(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
    self.state.variables.iter().map(|v| (v.name(), v.get()))
  }

  #[inline] pub fn state(&self) -> &State { &self.state }

  #[inline] pub fn state_mut(&mut self) -> &mut State { &mut self.state }
}
