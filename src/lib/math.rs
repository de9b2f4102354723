//! Transcendental operators. They go through `Operators::register` like any
//! embedder-supplied operator; the float backend is whatever `num-traits`
//! resolves to (`libm` without `std`).

#[cfg(all(not(feature = "std"), not(test)))]
use num_traits::Float as _;

use crate::{
  config::Float,
  errors::{ErrorKind, ValueError},
  operators::Operators,
  state::State,
  value::Value,
};

/// Non-finite results from finite input are reported, not pushed.
fn checked(x : Float) -> Value {
  if x.is_finite() {
    Value::Float(x)
  } else {
    Value::Error(ValueError::IEEE754)
  }
}

fn unary(state : &mut State, f : fn(Float) -> Float) -> Result<(), ErrorKind> {
  let a = state.stack.pop()?;
  let r = match a.float_operand() {
    Ok(x) if x.is_finite() => checked(f(x)),
    Ok(_) => Value::Error(ValueError::IEEE754),
    Err(e) => Value::Error(e),
  };
  state.stack.push(r);
  Ok(())
}

fn binary(state : &mut State, f : fn(Float, Float) -> Value) -> Result<(), ErrorKind> {
  let b = state.stack.pop()?;
  let a = state.stack.pop()?;
  let r = match (a.float_operand(), b.float_operand()) {
    (Ok(x), Ok(y)) => f(x, y),
    (Err(e), _) | (_, Err(e)) => Value::Error(e),
  };
  state.stack.push(r);
  Ok(())
}

pub fn install(ops : &mut Operators) {
  macro_rules! unary_fn {
    ($name:expr, $fun:ident) => {{
      fn $fun(state : &mut State) -> Result<(), ErrorKind> { unary(state, <Float as num_traits::Float>::$fun) }
      ops.register($name, 1, $fun)
    }};
  }

  unary_fn!("sqrt", sqrt);
  unary_fn!("log", ln);
  unary_fn!("log10", log10);
  unary_fn!("exp", exp);
  unary_fn!("sin", sin);
  unary_fn!("cos", cos);
  unary_fn!("tan", tan);

  fn fmod(state : &mut State) -> Result<(), ErrorKind> {
    binary(state, |x, y| {
      if y == 0.0 {
        Value::Error(ValueError::DivideByZero)
      } else {
        checked(x % y)
      }
    })
  }
  ops.register("fmod", 2, fmod);

  fn pow(state : &mut State) -> Result<(), ErrorKind> { binary(state, |x, y| checked(x.powf(y))) }
  ops.register("pow", 2, pow);

  tracing::debug!(count = ops.len(), "math operators installed");
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn eval(args : &[Value], name : &str) -> Value {
    let mut ops = Operators::new();
    install(&mut ops);
    let mut st = State::new();
    for a in args {
      st.stack.push(a.clone());
    }
    ops.find(name).unwrap().dispatch(&mut st).unwrap();
    st.stack.pop().unwrap()
  }

  #[test]
  fn evaluates_through_the_registry() {
    assert_eq!(eval(&[Value::Float(9.0)], "sqrt"), Value::Float(3.0));
    assert_eq!(eval(&[Value::Integer(100)], "log10"), Value::Float(2.0));
    assert_eq!(eval(&[Value::Float(2.0), Value::Float(10.0)], "pow"), Value::Float(1024.0));
    assert_eq!(eval(&[Value::Float(-7.0), Value::Float(3.0)], "fmod"), Value::Float(-1.0));
    assert_eq!(eval(&[Value::Float(0.0)], "cos"), Value::Float(1.0));
  }

  #[test]
  fn domain_errors_become_error_values() {
    assert_eq!(eval(&[Value::Float(-1.0)], "sqrt"), Value::Error(ValueError::IEEE754));
    assert_eq!(eval(&[Value::Float(0.0)], "log"), Value::Error(ValueError::IEEE754));
    assert_eq!(
      eval(&[Value::Float(1.0), Value::Float(0.0)], "fmod"),
      Value::Error(ValueError::DivideByZero)
    );
    assert_eq!(eval(&[Value::Null], "exp"), Value::Error(ValueError::ImpossibleConversion));
  }

  #[test]
  fn error_operands_keep_their_code() {
    let carried = Value::Error(ValueError::DivideByZero);
    assert_eq!(eval(&[carried.clone(), Value::Float(2.0)], "pow"), carried);
    assert_eq!(eval(&[Value::Float(2.0), carried.clone()], "fmod"), carried);
    assert_eq!(eval(&[carried.clone()], "sqrt"), carried);
  }
}
