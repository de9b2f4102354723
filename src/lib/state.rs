use alloc::{
  collections::BTreeMap,
  rc::Rc,
  string::String,
  vec::Vec,
};
use core::cell::RefCell;

use crate::{
  config::Uint,
  errors::{OperatorError, ProcessingError},
  value::Value,
};

/// A named value cell. Clones share the cell: writing through one clone is
/// seen by every other, and the cell lives until the last clone is dropped.
#[derive(Clone, Debug)]
pub struct Variable {
  name : Rc<str>,
  cell : Rc<RefCell<Value>>,
}

impl Variable {
  pub fn new(name : &str, value : Value) -> Self {
    Variable { name : name.into(), cell : Rc::new(RefCell::new(value)) }
  }

  #[inline] pub fn name(&self) -> &str { &self.name }

  #[inline] pub fn get(&self) -> Value { self.cell.borrow().clone() }

  #[inline] pub fn set(&self, value : Value) { *self.cell.borrow_mut() = value; }

  #[inline] pub fn is_null(&self) -> bool { self.cell.borrow().is_null() }

  /// Whether both handles point at the same cell.
  #[inline] pub fn aliases(&self, other : &Variable) -> bool { Rc::ptr_eq(&self.cell, &other.cell) }

  /// Number of live handles (registry entry and stack slots).
  #[inline] pub fn holders(&self) -> usize { Rc::strong_count(&self.cell) }
}

impl PartialEq for Variable {
  fn eq(&self, rhs : &Self) -> bool { self.aliases(rhs) }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
  Value(Value),
  Variable(Variable),
}

impl Slot {
  /// The value seen through this slot.
  pub fn value(&self) -> Value {
    match self {
      Slot::Value(v) => v.clone(),
      Slot::Variable(var) => var.get(),
    }
  }

  pub fn into_value(self) -> Value {
    match self {
      Slot::Value(v) => v,
      Slot::Variable(var) => var.get(),
    }
  }

  pub fn as_variable(&self) -> Option<&Variable> {
    match self {
      Slot::Variable(var) => Some(var),
      Slot::Value(_) => None,
    }
  }
}

impl From<Value> for Slot {
  fn from(v : Value) -> Self { Slot::Value(v) }
}

impl From<Variable> for Slot {
  fn from(v : Variable) -> Self { Slot::Variable(v) }
}

/// Stack of stacks. Only the active segment is reachable by operators; the
/// parked ones below it wait for the matching close.
#[derive(Clone, Debug, Default)]
pub struct Stack {
  active : Vec<Slot>,
  parked : Vec<Vec<Slot>>,
}

const EMPTY : OperatorError = OperatorError::ArgumentCountMismatch;

impl Stack {
  pub fn new() -> Self { Self::default() }

  #[inline] pub fn push(&mut self, v : Value) { self.active.push(Slot::Value(v)) }

  #[inline] pub fn push_slot(&mut self, s : Slot) { self.active.push(s) }

  /// Removes the top slot and hands back the value seen through it.
  #[inline] pub fn pop(&mut self) -> Result<Value, OperatorError> {
    self.pop_slot().map(Slot::into_value)
  }

  #[inline] pub fn pop_slot(&mut self) -> Result<Slot, OperatorError> {
    self.active.pop().ok_or(EMPTY)
  }

  /// Slot `n` positions from the top, 1-based.
  #[inline] pub fn at(&self, n : usize) -> Result<&Slot, OperatorError> {
    if n == 0 || n > self.active.len() {
      Err(EMPTY)
    } else {
      Ok(&self.active[self.active.len() - n])
    }
  }

  #[inline] pub fn peek(&self, n : usize) -> Result<Value, OperatorError> {
    self.at(n).map(Slot::value)
  }

  /// Elements in the active segment.
  #[inline] pub fn size(&self) -> usize { self.active.len() }

  /// Elements across every segment.
  pub fn depth(&self) -> usize {
    self.parked.iter().map(Vec::len).sum::<usize>() + self.active.len()
  }

  /// Number of open segments, the root included.
  #[inline] pub fn segments(&self) -> usize { self.parked.len() + 1 }

  #[inline] pub fn is_empty(&self) -> bool { self.depth() == 0 }

  /// Every slot, bottom of the root segment first.
  pub fn iter(&self) -> impl Iterator<Item = &Slot> + '_ {
    self.parked.iter().flatten().chain(self.active.iter())
  }

  /// Drops every segment but an empty root, releasing held variables.
  pub fn clear(&mut self) {
    self.active.clear();
    self.parked.clear();
  }

  pub fn open(&mut self) {
    let outer = core::mem::take(&mut self.active);
    self.parked.push(outer);
  }

  /// Merges the active segment into its parent, followed by its length.
  pub fn close(&mut self) -> Result<(), ProcessingError> {
    let parent = self.parked.pop().ok_or(ProcessingError::NoMoreStacks)?;
    let closed = core::mem::replace(&mut self.active, parent);
    let count = closed.len() as Uint;
    self.active.extend(closed);
    self.push(Value::Unsigned(count));
    Ok(())
  }

  #[inline] pub fn pop_n(&mut self, n : usize) -> Result<Vec<Slot>, OperatorError> {
    if n > self.active.len() {
      Err(EMPTY)
    } else {
      Ok(self.active.split_off(self.active.len() - n))
    }
  }

  #[inline] pub fn push_n(&mut self, mut e : Vec<Slot>) {
    self.active.append(&mut e);
  }

  #[inline] pub fn rotate(&mut self, n : usize, amount : usize) -> Result<(), OperatorError> {
    let mut part = self.pop_n(n)?;
    if n > 0 {
      part.rotate_right(amount % n);
    }
    self.push_n(part);
    Ok(())
  }

  #[inline] pub fn rotate_down(&mut self, n : usize, amount : usize) -> Result<(), OperatorError> {
    let mut part = self.pop_n(n)?;
    if n > 0 {
      part.rotate_left(amount % n);
    }
    self.push_n(part);
    Ok(())
  }

  /// `a b c -> c a b` for `n = 3`.
  #[inline] pub fn roll(&mut self, n : usize) -> Result<(), OperatorError> { self.rotate(n, 1) }

  /// `a b c -> b c a` for `n = 3`.
  #[inline] pub fn rolld(&mut self, n : usize) -> Result<(), OperatorError> {
    self.rotate_down(n, 1)
  }

  #[inline] pub fn rot(&mut self) -> Result<(), OperatorError> { self.rolld(3) }

  #[inline] pub fn unrot(&mut self) -> Result<(), OperatorError> { self.roll(3) }

  #[inline] pub fn swap(&mut self) -> Result<(), OperatorError> { self.roll(2) }

  /// Copies slot `n` to the top; variable slots copy the reference.
  #[inline] pub fn pick(&mut self, n : usize) -> Result<(), OperatorError> {
    let s = self.at(n)?.clone();
    self.push_slot(s);
    Ok(())
  }

  #[inline] pub fn dup(&mut self) -> Result<(), OperatorError> { self.pick(1) }

  #[inline] pub fn over(&mut self) -> Result<(), OperatorError> { self.pick(2) }

  #[inline] pub fn dup2(&mut self) -> Result<(), OperatorError> {
    self.pick(2)?;
    self.pick(2)
  }

  #[inline] pub fn drop(&mut self) -> Result<(), OperatorError> { self.pop_slot().map(|_| ()) }
}

/// Name to cell registry.
#[derive(Clone, Debug, Default)]
pub struct Variables(BTreeMap<String, Variable>);

impl Variables {
  pub fn new() -> Self { Self::default() }

  #[inline] pub fn get(&self, name : &str) -> Option<Value> { self.0.get(name).map(Variable::get) }

  #[inline] pub fn lookup(&self, name : &str) -> Option<&Variable> { self.0.get(name) }

  /// Upsert; an existing cell is written in place so aliases see the update.
  pub fn set(&mut self, name : &str, value : Value) {
    match self.0.get(name) {
      Some(var) => var.set(value),
      None => {
        self.0.insert(name.into(), Variable::new(name, value));
      }
    }
  }

  /// Handle to `name`, registering a null cell first when it is unknown.
  pub fn vivify(&mut self, name : &str) -> Variable {
    if let Some(var) = self.0.get(name) {
      return var.clone();
    }
    tracing::debug!(name, "creating variable");
    let var = Variable::new(name, Value::Null);
    self.0.insert(name.into(), var.clone());
    var
  }

  /// Removes the registry entry only. Stack slots already holding the cell
  /// keep it alive.
  #[inline] pub fn purge(&mut self, name : &str) -> Result<Variable, ProcessingError> {
    self.0.remove(name).ok_or(ProcessingError::VariableDoesNotExist)
  }

  /// Erases entries that are still null and held by nobody but the
  /// registry. Returns how many went away.
  pub fn prune(&mut self) -> usize {
    let before = self.0.len();
    self.0.retain(|_, var| !(var.is_null() && var.holders() == 1));
    before - self.0.len()
  }

  #[inline] pub fn len(&self) -> usize { self.0.len() }

  #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

  #[inline] pub fn clear(&mut self) { self.0.clear() }

  /// Entries in name order.
  pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ { self.0.values() }
}

/// Everything an operator callback may touch.
#[derive(Clone, Debug, Default)]
pub struct State {
  pub stack : Stack,
  pub variables : Variables,
}

impl State {
  pub fn new() -> Self { Self::default() }

  /// Pushes a reference to `name`, creating the variable when `create` is
  /// set.
  pub fn push_variable(&mut self, name : &str, create : bool) -> Result<(), ProcessingError> {
    let var = if create {
      self.variables.vivify(name)
    } else {
      self.variables.lookup(name).cloned().ok_or(ProcessingError::VariableDoesNotExist)?
    };
    self.stack.push_slot(Slot::Variable(var));
    Ok(())
  }
}
