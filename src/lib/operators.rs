use alloc::{string::String, vec::Vec};
use core::cmp::Ordering;

#[cfg(all(not(feature = "std"), not(test)))]
use num_traits::Float as _;

use crate::{
  config::{consts, Float, Int, Uint},
  errors::{ErrorKind, OperatorError, ValueError},
  state::{Slot, State},
  value::Value,
};

/// Operator body. It receives the stack and the variables, pops what it
/// needs and pushes its results.
pub type Callback = fn(&mut State) -> Result<(), ErrorKind>;

#[derive(Clone)]
pub struct Operator {
  name : String,
  arity : u8,
  callback : Callback,
}

impl core::fmt::Debug for Operator {
  fn fmt(&self, f : &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}/{} @ {:#x}", self.name, self.arity, self.callback as usize)
  }
}

impl Operator {
  #[inline] pub fn name(&self) -> &str { &self.name }

  #[inline] pub fn arity(&self) -> u8 { self.arity }

  /// Runs the callback if the active segment holds at least `arity`
  /// elements.
  pub fn dispatch(&self, state : &mut State) -> Result<(), ErrorKind> {
    if state.stack.size() < self.arity as usize {
      return Err(OperatorError::ArgumentCountMismatch.into());
    }
    (self.callback)(state)
  }
}

/// Append-only operator table. Lookups return the earliest registration.
#[derive(Clone, Debug, Default)]
pub struct Operators(Vec<Operator>);

impl Operators {
  pub fn new() -> Self { Self::default() }

  pub fn register(&mut self, name : &str, arity : u8, callback : Callback) {
    tracing::trace!(name, arity, "registering operator");
    self.0.push(Operator { name : name.into(), arity, callback });
  }

  #[inline] pub fn find(&self, name : &str) -> Option<&Operator> {
    self.0.iter().find(|op| op.name == name)
  }

  #[inline] pub fn len(&self) -> usize { self.0.len() }

  #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &Operator> + '_ { self.0.iter() }

  /// Names in registration order, duplicates included.
  pub fn names(&self) -> impl Iterator<Item = &str> + '_ { self.0.iter().map(Operator::name) }
}

/// Integral argument of `index` and `round`.
fn integral(v : &Value) -> Result<Int, OperatorError> {
  match v {
    Value::Float(x) if x.fract() != 0.0 => Err(OperatorError::InvalidArgument),
    v => v.checked_to_int().map_err(|_| OperatorError::InvalidArgument),
  }
}

/// Applies a float function, leaving integral representations untouched.
fn float_map(v : Value, f : impl Fn(Float) -> Float) -> Value {
  match v {
    Value::Float(x) => Value::Float(f(x)),
    Value::Integer(_) | Value::Unsigned(_) | Value::Error(_) => v,
    Value::Boolean(b) => Value::Integer(b as Int),
    Value::Null => Value::Error(ValueError::IsNull),
    Value::String(_) => Value::Error(ValueError::InvalidOperation),
  }
}

/// `x` rounded to `digits` decimal places; negative `digits` round to tens,
/// hundreds and so on.
fn round_to(x : Float, digits : i32) -> Float {
  if !x.is_finite() {
    return x;
  }
  let p = (10.0 as Float).powi(digits.saturating_abs());
  if digits >= 0 {
    let scaled = x * p;
    if scaled.is_finite() { scaled.round() / p } else { x }
  } else if p.is_finite() {
    (x / p).round() * p
  } else {
    0.0
  }
}

fn sign(lhs : &Value, rhs : &Value) -> Value {
  match lhs.compare(rhs) {
    Ok(Ordering::Less) => Value::Integer(-1),
    Ok(Ordering::Equal) => Value::Integer(0),
    Ok(Ordering::Greater) => Value::Integer(1),
    Err(e) => Value::Error(e),
  }
}

/// Registers the standard operator set.
pub fn install_builtins(ops : &mut Operators) {
  macro_rules! binary_op {
    ($name:expr, $fun:ident = $a:ident $b:ident -> $res:expr) => {{
      fn $fun(state : &mut State) -> Result<(), ErrorKind> {
        let $b = state.stack.pop()?;
        let $a = state.stack.pop()?;
        state.stack.push($res);
        Ok(())
      }
      ops.register($name, 2, $fun)
    }};
  }

  macro_rules! unary_op {
    ($name:expr, $fun:ident = $a:ident -> $res:expr) => {{
      fn $fun(state : &mut State) -> Result<(), ErrorKind> {
        let $a = state.stack.pop()?;
        state.stack.push($res);
        Ok(())
      }
      ops.register($name, 1, $fun)
    }};
  }

  macro_rules! constant {
    ($name:expr, $fun:ident = $res:expr) => {{
      fn $fun(state : &mut State) -> Result<(), ErrorKind> {
        state.stack.push($res);
        Ok(())
      }
      ops.register($name, 0, $fun)
    }};
  }

  macro_rules! shuffle {
    ($name:expr, $arity:expr, $method:ident) => {{
      fn $method(state : &mut State) -> Result<(), ErrorKind> {
        state.stack.$method()?;
        Ok(())
      }
      ops.register($name, $arity, $method)
    }};
  }

  binary_op!("+", add = a b -> a + b);
  binary_op!("-", sub = a b -> a - b);
  binary_op!("*", mul = a b -> a * b);
  binary_op!("/", div = a b -> a / b);
  binary_op!("mod", modulo = a b -> a % b);
  unary_op!("abs", abs = a -> a.abs());

  ops.register("round", 2, round);
  unary_op!("ceil", ceil = a -> float_map(a, <Float as num_traits::Float>::ceil));
  unary_op!("floor", floor = a -> float_map(a, <Float as num_traits::Float>::floor));
  unary_op!("int", int = a -> match a {
    Value::Error(_) => a,
    a => a.checked_to_int().into(),
  });

  binary_op!("eq", eq = a b -> Value::Boolean(a == b));
  binary_op!("ne", ne = a b -> Value::Boolean(a != b));
  binary_op!("gt", gt = a b -> Value::Boolean(a.gt(&b)));
  binary_op!("ge", ge = a b -> Value::Boolean(a.ge(&b)));
  binary_op!("lt", lt = a b -> Value::Boolean(a.lt(&b)));
  binary_op!("le", le = a b -> Value::Boolean(a.le(&b)));
  binary_op!("cmp", cmp = a b -> sign(&a, &b));

  fn cmp3(state : &mut State) -> Result<(), ErrorKind> {
    let upper = state.stack.pop()?;
    let lower = state.stack.pop()?;
    let value = state.stack.pop()?;
    let r = match (value.compare(&lower), value.compare(&upper)) {
      (Err(e), _) | (_, Err(e)) => Value::Error(e),
      (Ok(Ordering::Less), _) => Value::Integer(-1),
      (_, Ok(Ordering::Greater)) => Value::Integer(1),
      _ => Value::Integer(0),
    };
    state.stack.push(r);
    Ok(())
  }
  ops.register("cmp3", 3, cmp3);

  binary_op!("and", and = a b -> Value::Boolean(a.to_boolean() && b.to_boolean()));
  binary_op!("or", or = a b -> Value::Boolean(a.to_boolean() || b.to_boolean()));
  binary_op!("xor", xor = a b -> Value::Boolean(a.to_boolean() ^ b.to_boolean()));
  unary_op!("not", not = a -> Value::Boolean(!a.to_boolean()));

  shuffle!("dup", 1, dup);
  shuffle!("dup2", 2, dup2);
  shuffle!("over", 2, over);
  shuffle!("swap", 2, swap);
  shuffle!("rot", 3, rot);
  shuffle!("unrot", 3, unrot);
  shuffle!("drop", 1, drop);

  fn depth(state : &mut State) -> Result<(), ErrorKind> {
    let n = state.stack.size() as Uint;
    state.stack.push(Value::Unsigned(n));
    Ok(())
  }
  ops.register("depth", 0, depth);

  constant!("pi", pi = Value::Float(consts::PI));
  constant!("e", e = Value::Float(consts::E));

  ops.register("index", 2, index);
  ops.register("map", 5, map);
  ops.register("constrain", 3, constrain);
  ops.register("exists", 1, exists);
  ops.register("=", 2, assign);
  ops.register("ifn", 3, ifn);
  ops.register("end", 1, end);

  tracing::debug!(count = ops.len(), "built-in operators installed");
}

/// `v digits -> v'`. Integral representations pass through untouched.
fn round(state : &mut State) -> Result<(), ErrorKind> {
  let digits = state.stack.peek(1)?;
  if let Value::Error(e) = digits {
    return Err(e.into());
  }
  let digits = integral(&digits)?;
  let digits = i32::try_from(digits).map_err(|_| OperatorError::InvalidArgument)?;
  state.stack.pop_slot()?;
  let v = state.stack.pop()?;
  state.stack.push(float_map(v, |x| round_to(x, digits)));
  Ok(())
}

/// `i x0 .. xn-1 n -> x[i]`; a negative `i` counts from the end.
fn index(state : &mut State) -> Result<(), ErrorKind> {
  let count = integral(&state.stack.peek(1)?)?;
  let n = usize::try_from(count).map_err(|_| OperatorError::InvalidArgument)?;
  if state.stack.size() < n + 2 {
    return Err(OperatorError::InvalidArgument.into());
  }
  let at = integral(&state.stack.peek(n + 2)?)? as i128;
  let i = if at < 0 { at + n as i128 } else { at };
  if i < 0 || i >= n as i128 {
    return Err(OperatorError::InvalidArgument.into());
  }
  state.stack.pop_slot()?;
  let mut items = state.stack.pop_n(n)?;
  state.stack.pop_slot()?;
  state.stack.push_slot(items.swap_remove(i as usize));
  Ok(())
}

/// `v from_lo from_hi to_lo to_hi -> v'`, with `v` clamped to the source
/// range first.
fn map(state : &mut State) -> Result<(), ErrorKind> {
  let mut args = [0.0 as Float; 5];
  for (k, slot) in args.iter_mut().enumerate() {
    *slot = state.stack.peek(5 - k)?.float_operand()?;
  }
  let [v, from_lo, from_hi, to_lo, to_hi] = args;
  if Value::Float(from_lo) == Value::Float(from_hi) {
    return Err(OperatorError::InvalidArgument.into());
  }
  state.stack.pop_n(5)?;
  let v = v.max(from_lo.min(from_hi)).min(from_lo.max(from_hi));
  let r = to_lo + (v - from_lo) * (to_hi - to_lo) / (from_hi - from_lo);
  state.stack.push(Value::Float(r));
  Ok(())
}

/// `v lo hi -> v` clamped into `[lo, hi]`.
fn constrain(state : &mut State) -> Result<(), ErrorKind> {
  let upper = state.stack.pop_slot()?;
  let lower = state.stack.pop_slot()?;
  let value = state.stack.pop_slot()?;
  let v = value.value();
  let pick = if v.lt(&lower.value()) {
    lower
  } else if v.gt(&upper.value()) {
    upper
  } else {
    value
  };
  state.stack.push_slot(pick);
  Ok(())
}

/// Guard on the top reference; it stays on the stack.
fn exists(state : &mut State) -> Result<(), ErrorKind> {
  match state.stack.at(1)? {
    Slot::Variable(var) if var.is_null() => Err(OperatorError::CannotContinue.into()),
    Slot::Variable(_) => Ok(()),
    Slot::Value(_) => Err(OperatorError::InvalidType.into()),
  }
}

/// `value ref ->`: writes into the cell behind `ref`.
fn assign(state : &mut State) -> Result<(), ErrorKind> {
  let target = match state.stack.at(1)? {
    Slot::Variable(var) => var.clone(),
    Slot::Value(_) => return Err(OperatorError::InvalidType.into()),
  };
  state.stack.pop_slot()?;
  let value = state.stack.pop()?;
  tracing::trace!(name = target.name(), %value, "assign");
  target.set(value);
  Ok(())
}

fn ifn(state : &mut State) -> Result<(), ErrorKind> {
  let otherwise = state.stack.pop_slot()?;
  let then = state.stack.pop_slot()?;
  let cond = state.stack.pop()?;
  state.stack.push_slot(if cond.to_boolean() { then } else { otherwise });
  Ok(())
}

fn end(state : &mut State) -> Result<(), ErrorKind> {
  if state.stack.pop()?.to_boolean() {
    Ok(())
  } else {
    Err(OperatorError::CannotContinue.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn builtins() -> Operators {
    let mut ops = Operators::new();
    install_builtins(&mut ops);
    ops
  }

  fn run(state : &mut State, ops : &Operators, name : &str) -> Result<(), ErrorKind> {
    ops.find(name).unwrap().dispatch(state)
  }

  #[test]
  fn first_registration_wins() {
    fn one(state : &mut State) -> Result<(), ErrorKind> {
      state.stack.push(Value::Integer(1));
      Ok(())
    }
    fn two(state : &mut State) -> Result<(), ErrorKind> {
      state.stack.push(Value::Integer(2));
      Ok(())
    }
    let mut ops = Operators::new();
    ops.register("k", 0, one);
    ops.register("k", 0, two);
    let mut st = State::new();
    run(&mut st, &ops, "k").unwrap();
    assert_eq!(st.stack.pop(), Ok(Value::Integer(1)));
    assert_eq!(ops.names().filter(|n| *n == "k").count(), 2);
  }

  #[test]
  fn arity_is_checked_before_the_callback() {
    let ops = builtins();
    let mut st = State::new();
    st.stack.push(Value::Float(1.0));
    assert_eq!(
      run(&mut st, &ops, "+"),
      Err(ErrorKind::Operator(OperatorError::ArgumentCountMismatch))
    );
    assert_eq!(st.stack.size(), 1);
  }

  #[test]
  fn index_rejects_bad_counts_and_positions() {
    let ops = builtins();
    for (at, count) in [(5.0, 3.0), (-4.0, 3.0), (0.0, -1.0), (0.0, 9.0), (0.5, 3.0)] {
      let mut st = State::new();
      for x in [at, 1.0, 2.0, 3.0, count] {
        st.stack.push(Value::Float(x));
      }
      assert_eq!(
        run(&mut st, &ops, "index"),
        Err(ErrorKind::Operator(OperatorError::InvalidArgument)),
        "{} {}",
        at,
        count
      );
      assert_eq!(st.stack.size(), 5);
    }
  }

  #[test]
  fn map_rescales_and_clamps() {
    let ops = builtins();
    let mut st = State::new();
    for x in [15.0, 0.0, 10.0, 0.0, 100.0] {
      st.stack.push(Value::Float(x));
    }
    run(&mut st, &ops, "map").unwrap();
    assert_eq!(st.stack.pop(), Ok(Value::Float(100.0)));

    for x in [2.5, 0.0, 10.0, 100.0, 0.0] {
      st.stack.push(Value::Float(x));
    }
    run(&mut st, &ops, "map").unwrap();
    assert_eq!(st.stack.pop(), Ok(Value::Float(75.0)));

    for x in [1.0, 3.0, 3.0, 0.0, 1.0] {
      st.stack.push(Value::Float(x));
    }
    assert_eq!(
      run(&mut st, &ops, "map"),
      Err(ErrorKind::Operator(OperatorError::InvalidArgument))
    );
  }

  #[test]
  fn constrain_keeps_representation() {
    let ops = builtins();
    let mut st = State::new();
    for v in [Value::Integer(12), Value::Integer(0), Value::Integer(10)] {
      st.stack.push(v);
    }
    run(&mut st, &ops, "constrain").unwrap();
    assert!(matches!(st.stack.pop(), Ok(Value::Integer(10))));
  }

  #[test]
  fn assign_needs_a_reference_on_top() {
    let ops = builtins();
    let mut st = State::new();
    st.stack.push(Value::Float(1.0));
    st.stack.push(Value::Float(2.0));
    assert_eq!(run(&mut st, &ops, "="), Err(ErrorKind::Operator(OperatorError::InvalidType)));

    st.stack.clear();
    st.stack.push(Value::Float(4.0));
    st.push_variable("x", true).unwrap();
    run(&mut st, &ops, "=").unwrap();
    assert!(st.stack.is_empty());
    assert_eq!(st.variables.get("x"), Some(Value::Float(4.0)));
  }

  #[test]
  fn exists_guards_references() {
    let ops = builtins();
    let mut st = State::new();
    st.push_variable("x", true).unwrap();
    assert_eq!(run(&mut st, &ops, "exists"), Err(ErrorKind::Operator(OperatorError::CannotContinue)));
    st.variables.set("x", Value::Integer(3));
    run(&mut st, &ops, "exists").unwrap();
    assert_eq!(st.stack.size(), 1);
    st.stack.push(Value::Integer(3));
    assert_eq!(run(&mut st, &ops, "exists"), Err(ErrorKind::Operator(OperatorError::InvalidType)));
  }

  #[test]
  fn rounding() {
    let ops = builtins();
    let mut st = State::new();
    st.stack.push(Value::Float(3.14159));
    st.stack.push(Value::Float(2.0));
    run(&mut st, &ops, "round").unwrap();
    assert_eq!(st.stack.pop(), Ok(Value::Float(3.14)));

    st.stack.push(Value::Float(-2.5));
    run(&mut st, &ops, "floor").unwrap();
    assert_eq!(st.stack.pop(), Ok(Value::Float(-3.0)));

    st.stack.push(Value::Float(-2.5));
    run(&mut st, &ops, "int").unwrap();
    assert!(matches!(st.stack.pop(), Ok(Value::Integer(-2))));

    st.stack.push(Value::Unsigned(7));
    run(&mut st, &ops, "ceil").unwrap();
    assert!(matches!(st.stack.pop(), Ok(Value::Unsigned(7))));
  }

  #[test]
  fn rounding_with_extreme_digit_counts() {
    let ops = builtins();
    let mut st = State::new();
    let mut round = |x : Float, d : Value| {
      st.stack.clear();
      st.stack.push(Value::Float(x));
      st.stack.push(d);
      run(&mut st, &ops, "round").map(|_| st.stack.pop().unwrap())
    };
    assert_eq!(round(1.5, Value::Float(400.0)), Ok(Value::Float(1.5)));
    assert_eq!(round(1.5, Value::Float(-400.0)), Ok(Value::Float(0.0)));
    assert_eq!(round(1234.5, Value::Integer(-2)), Ok(Value::Float(1200.0)));
    assert_eq!(
      round(3.14159, Value::Float(4294967298.0)),
      Err(ErrorKind::Operator(OperatorError::InvalidArgument))
    );
    assert_eq!(round(3.14159, Value::Float(0.5)), Err(ErrorKind::Operator(OperatorError::InvalidArgument)));
    assert_eq!(
      round(3.14159, Value::Error(ValueError::DivideByZero)),
      Err(ErrorKind::Value(ValueError::DivideByZero))
    );
  }

  #[test]
  fn map_passes_error_operands_through() {
    let ops = builtins();
    let mut st = State::new();
    st.stack.push(Value::Error(ValueError::DivideByZero));
    for x in [0.0, 10.0, 0.0, 100.0] {
      st.stack.push(Value::Float(x));
    }
    assert_eq!(run(&mut st, &ops, "map"), Err(ErrorKind::Value(ValueError::DivideByZero)));
    assert_eq!(st.stack.size(), 5);
  }

  #[test]
  fn cmp_reports_unordered_operands() {
    let ops = builtins();
    let mut st = State::new();
    let mut cmp = |name : &str, args : &[Value]| {
      st.stack.clear();
      for a in args {
        st.stack.push(a.clone());
      }
      run(&mut st, &ops, name).unwrap();
      st.stack.pop().unwrap()
    };
    assert_eq!(cmp("cmp", &[Value::from("a"), Value::Float(1.0)]), Value::Error(ValueError::TypeMismatch));
    assert_eq!(cmp("cmp", &[Value::Null, Value::Float(1.0)]), Value::Error(ValueError::IsNull));
    assert_eq!(cmp("cmp", &[Value::Float(Float::NAN), Value::Float(1.0)]), Value::Error(ValueError::IEEE754));
    assert!(matches!(cmp("cmp", &[Value::from("a"), Value::from("b")]), Value::Integer(-1)));
    assert_eq!(
      cmp("cmp3", &[Value::Float(5.0), Value::from("lo"), Value::Float(10.0)]),
      Value::Error(ValueError::TypeMismatch)
    );
  }
}
