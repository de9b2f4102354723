use alloc::string::String;
use core::ops::{Add, Div, Mul, Rem, Sub};

#[cfg(all(not(feature = "std"), not(test)))]
use num_traits::Float as _;
use num_traits::{NumCast, ToPrimitive, Zero};

use crate::{
  config::{Float, Int, Uint},
  errors::ValueError,
  parsing::number,
};

/// A stack cell.
///
/// `Error` values are ordinary values: they flow through arithmetic until
/// something looks at the tag.
#[derive(Clone, Debug, Default)]
pub enum Value {
  #[default]
  Null,
  Error(ValueError),
  Boolean(bool),
  Integer(Int),
  Unsigned(Uint),
  Float(Float),
  String(String),
}

impl From<bool> for Value {
  fn from(v : bool) -> Self { Value::Boolean(v) }
}

impl From<Int> for Value {
  fn from(v : Int) -> Self { Value::Integer(v) }
}

impl From<Uint> for Value {
  fn from(v : Uint) -> Self { Value::Unsigned(v) }
}

impl From<Float> for Value {
  fn from(v : Float) -> Self { Value::Float(v) }
}

impl From<String> for Value {
  fn from(v : String) -> Self { Value::String(v) }
}

impl From<&str> for Value {
  fn from(v : &str) -> Self { Value::String(v.into()) }
}

impl From<ValueError> for Value {
  fn from(e : ValueError) -> Self { Value::Error(e) }
}

impl<T : Into<Value>> From<Result<T, ValueError>> for Value {
  fn from(r : Result<T, ValueError>) -> Self {
    match r {
      Ok(v) => v.into(),
      Err(e) => Value::Error(e),
    }
  }
}

impl core::fmt::Display for Value {
  fn fmt(&self, f : &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    use Value::*;
    match self {
      Null => write!(f, "null"),
      Error(e) => write!(f, "error: {}", e),
      Boolean(b) => write!(f, "{}", b),
      Integer(i) => write!(f, "{}", i),
      Unsigned(u) => write!(f, "{}", u),
      Float(x) => write!(f, "{:?}", x),
      String(s) => f.write_str(s),
    }
  }
}

/// Relative tolerance used by float equality.
fn approx_eq(a : Float, b : Float) -> bool {
  if !a.is_finite() || !b.is_finite() {
    return false;
  }
  let scale = a.abs().max(b.abs()).max(1.0);
  (a - b).abs() <= Float::EPSILON * scale
}

/// Both operands as exact integers, when neither side is a float.
fn exact_pair(lhs : &Value, rhs : &Value) -> Option<(i128, i128)> {
  fn exact(v : &Value) -> Option<i128> {
    match *v {
      Value::Boolean(b) => Some(b as i128),
      Value::Integer(i) => i.to_i128(),
      Value::Unsigned(u) => u.to_i128(),
      _ => None,
    }
  }
  Some((exact(lhs)?, exact(rhs)?))
}

fn numeric(v : &Value) -> bool {
  matches!(v, Value::Boolean(_) | Value::Integer(_) | Value::Unsigned(_) | Value::Float(_))
}

impl PartialEq for Value {
  fn eq(&self, rhs : &Self) -> bool {
    use Value::*;
    match (self, rhs) {
      (Null, Null) => true,
      (Null, _) | (_, Null) => false,
      (Error(a), Error(b)) => a == b,
      (Error(_), _) | (_, Error(_)) => false,
      (String(a), String(b)) => a == b,
      (String(_), _) | (_, String(_)) => false,
      (a, b) => match exact_pair(a, b) {
        Some((x, y)) => x == y,
        None => approx_eq(a.to_float(), b.to_float()),
      },
    }
  }
}

impl Value {
  #[inline] pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

  #[inline] pub fn is_error(&self) -> bool { matches!(self, Value::Error(_)) }

  #[inline] pub fn is_string(&self) -> bool { matches!(self, Value::String(_)) }

  /// The carried error code, or `NotAnError` for any other kind of value.
  pub fn error(&self) -> ValueError {
    match self {
      Value::Error(e) => *e,
      _ => ValueError::NotAnError,
    }
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Error(_) => "error",
      Value::Boolean(_) => "boolean",
      Value::Integer(_) => "integer",
      Value::Unsigned(_) => "unsigned",
      Value::Float(_) => "float",
      Value::String(_) => "string",
    }
  }

  // Best-effort coercions. These never fail; unusable sources give the
  // target's zero.

  pub fn to_boolean(&self) -> bool {
    use Value::*;
    match self {
      Null | Error(_) => false,
      Boolean(b) => *b,
      Integer(i) => *i != 0,
      Unsigned(u) => *u != 0,
      Float(x) => !x.is_nan() && *x != 0.0,
      String(s) => !s.is_empty(),
    }
  }

  pub fn to_int(&self) -> Int {
    use Value::*;
    match self {
      Null | Error(_) => 0,
      Boolean(b) => *b as Int,
      Integer(i) => *i,
      Unsigned(u) => *u as Int,
      Float(x) => *x as Int,
      String(s) => number::parse_value(s).map(|v| v.to_int()).unwrap_or(0),
    }
  }

  pub fn to_uint(&self) -> Uint {
    use Value::*;
    match self {
      Null | Error(_) => 0,
      Boolean(b) => *b as Uint,
      Integer(i) => *i as Uint,
      Unsigned(u) => *u,
      Float(x) => *x as Uint,
      String(s) => number::parse_value(s).map(|v| v.to_uint()).unwrap_or(0),
    }
  }

  pub fn to_float(&self) -> Float {
    match self {
      Value::Null | Value::Error(_) => 0.0,
      Value::Boolean(true) => 1.0,
      Value::Boolean(false) => 0.0,
      Value::Integer(i) => *i as Float,
      Value::Unsigned(u) => *u as Float,
      Value::Float(x) => *x,
      Value::String(s) => number::parse_value(s).map(|v| v.to_float()).unwrap_or(0.0),
    }
  }

  // Checked conversions: the magnitude is validated before anything is
  // cast.

  pub fn checked_to_int(&self) -> Result<Int, ValueError> {
    use Value::*;
    match self {
      Null | Error(_) | String(_) => Err(ValueError::ImpossibleConversion),
      Boolean(b) => Ok(*b as Int),
      Integer(i) => Ok(*i),
      Unsigned(u) => <Int as NumCast>::from(*u).ok_or(ValueError::OutOfRangeConversion),
      Float(x) => float_to_integer::<Int>(*x),
    }
  }

  pub fn checked_to_uint(&self) -> Result<Uint, ValueError> {
    use Value::*;
    match self {
      Null | Error(_) | String(_) => Err(ValueError::ImpossibleConversion),
      Boolean(b) => Ok(*b as Uint),
      Integer(i) => <Uint as NumCast>::from(*i).ok_or(ValueError::OutOfRangeConversion),
      Unsigned(u) => Ok(*u),
      Float(x) => float_to_integer::<Uint>(*x),
    }
  }

  pub fn checked_to_float(&self) -> Result<Float, ValueError> {
    use Value::*;
    match self {
      Null | Error(_) | String(_) => Err(ValueError::ImpossibleConversion),
      Boolean(_) | Integer(_) | Unsigned(_) => Ok(self.to_float()),
      Float(x) => Ok(*x),
    }
  }

  /// Strict ordering; false whenever either side is null, an error, or the
  /// two sides are not comparable.
  pub fn lt(&self, rhs : &Value) -> bool {
    self.ordering(rhs) == Some(core::cmp::Ordering::Less)
  }

  pub fn gt(&self, rhs : &Value) -> bool {
    self.ordering(rhs) == Some(core::cmp::Ordering::Greater)
  }

  pub fn le(&self, rhs : &Value) -> bool { self.lt(rhs) || (self.comparable(rhs) && self == rhs) }

  pub fn ge(&self, rhs : &Value) -> bool { self.gt(rhs) || (self.comparable(rhs) && self == rhs) }

  fn comparable(&self, rhs : &Value) -> bool {
    (numeric(self) && numeric(rhs)) || (self.is_string() && rhs.is_string())
  }

  fn ordering(&self, rhs : &Value) -> Option<core::cmp::Ordering> {
    match (self, rhs) {
      (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
      (a, b) if numeric(a) && numeric(b) => match exact_pair(a, b) {
        Some((x, y)) => Some(x.cmp(&y)),
        None => a.to_float().partial_cmp(&b.to_float()),
      },
      _ => None,
    }
  }

  /// Three-way comparison. Null and error operands, pairs of different
  /// kinds and NaN have no order and report why.
  pub fn compare(&self, rhs : &Value) -> Result<core::cmp::Ordering, ValueError> {
    match (self, rhs) {
      (Value::Error(e), _) | (_, Value::Error(e)) => Err(*e),
      (Value::Null, _) | (_, Value::Null) => Err(ValueError::IsNull),
      (a, b) => match a.ordering(b) {
        Some(o) => Ok(o),
        None if a.comparable(b) => Err(ValueError::IEEE754),
        None => Err(ValueError::TypeMismatch),
      },
    }
  }

  /// Float view of an operand of a float-only operator. An error operand
  /// hands back the code it carries.
  pub fn float_operand(&self) -> Result<Float, ValueError> {
    match self {
      Value::Error(e) => Err(*e),
      v => v.checked_to_float(),
    }
  }

  /// Shared front half of every arithmetic operator: error propagation and
  /// operand category checks. `Some` is the final result.
  fn precheck(&self, rhs : &Value, op : Op) -> Option<Value> {
    use Value::*;
    match (self, rhs) {
      (Error(e), _) | (_, Error(e)) => Some(Error(*e)),
      (Null, _) | (_, Null) => Some(Error(ValueError::IsNull)),
      (Boolean(_), String(_)) | (String(_), Boolean(_)) => Some(Error(ValueError::InvalidOperation)),
      (String(a), String(b)) => Some(match op {
        Op::Add => {
          let mut s = a.clone();
          s.push_str(b);
          String(s)
        }
        _ => Error(ValueError::InvalidOperation),
      }),
      (String(_), _) | (_, String(_)) => Some(match op {
        Op::Add => Error(ValueError::TypeMismatch),
        _ => Error(ValueError::InvalidOperation),
      }),
      _ => None,
    }
  }

  fn arith(&self, rhs : &Value, op : Op) -> Value {
    use Value::*;
    if let Some(v) = self.precheck(rhs, op) {
      return v;
    }
    match (self, rhs) {
      (Boolean(a), Boolean(b)) => int_op(*a as Int, *b as Int, op),
      (Boolean(a), rhs) => Integer(*a as Int).arith(rhs, op),
      (Integer(a), rhs) => match rhs.checked_to_int() {
        Ok(b) => int_op(*a, b, op),
        Err(e) => Error(e),
      },
      (Unsigned(a), rhs) => match rhs.checked_to_uint() {
        Ok(b) => uint_op(*a, b, op),
        Err(e) => Error(e),
      },
      (Float(a), rhs) => match rhs.checked_to_float() {
        Ok(b) => float_op(*a, b, op),
        Err(e) => Error(e),
      },
      _ => Error(ValueError::InvalidOperation),
    }
  }

  /// Absolute value, keeping the representation.
  pub fn abs(&self) -> Value {
    use Value::*;
    match self {
      Null => Error(ValueError::IsNull),
      Error(e) => Error(*e),
      Boolean(b) => Integer(*b as Int),
      Integer(i) => Integer(i.wrapping_abs()),
      Unsigned(u) => Unsigned(*u),
      Float(x) => Float(x.abs()),
      String(_) => Error(ValueError::InvalidOperation),
    }
  }
}

fn float_to_integer<T : NumCast>(x : Float) -> Result<T, ValueError> {
  if !x.is_finite() {
    return Err(ValueError::OutOfRangeConversion);
  }
  <T as NumCast>::from(x.trunc()).ok_or(ValueError::OutOfRangeConversion)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
}

fn int_op(a : Int, b : Int, op : Op) -> Value {
  match op {
    Op::Add => Value::Integer(a.wrapping_add(b)),
    Op::Sub => Value::Integer(a.wrapping_sub(b)),
    Op::Mul => Value::Integer(a.wrapping_mul(b)),
    Op::Div if b == 0 => Value::Error(ValueError::DivideByZero),
    Op::Div => Value::Integer(a.wrapping_div(b)),
    Op::Rem if b == 0 => Value::Error(ValueError::DivideByZero),
    Op::Rem => {
      // floored: the result takes the sign of the divisor
      let r = a.wrapping_rem(b);
      if r != 0 && ((r < 0) != (b < 0)) {
        Value::Integer(r.wrapping_add(b))
      } else {
        Value::Integer(r)
      }
    }
  }
}

fn uint_op(a : Uint, b : Uint, op : Op) -> Value {
  match op {
    Op::Add => Value::Unsigned(a.wrapping_add(b)),
    Op::Sub => Value::Unsigned(a.wrapping_sub(b)),
    Op::Mul => Value::Unsigned(a.wrapping_mul(b)),
    Op::Div | Op::Rem if b == 0 => Value::Error(ValueError::DivideByZero),
    Op::Div => Value::Unsigned(a / b),
    Op::Rem => Value::Unsigned(a % b),
  }
}

fn float_op(a : Float, b : Float, op : Op) -> Value {
  match op {
    Op::Add => Value::Float(a + b),
    Op::Sub => Value::Float(a - b),
    Op::Mul => Value::Float(a * b),
    Op::Div | Op::Rem if b.is_zero() => Value::Error(ValueError::DivideByZero),
    Op::Div | Op::Rem if !b.is_finite() => Value::Error(ValueError::IEEE754),
    Op::Div => Value::Float(a / b),
    Op::Rem => Value::Float(a - (a / b).floor() * b),
  }
}

macro_rules! value_op {
  ($tr:ident, $fun:ident, $op:expr) => {
    impl<'a> $tr<&'a Value> for &'a Value {
      type Output = Value;
      fn $fun(self, rhs : &'a Value) -> Value { self.arith(rhs, $op) }
    }

    impl $tr for Value {
      type Output = Value;
      fn $fun(self, rhs : Value) -> Value { self.arith(&rhs, $op) }
    }
  };
}

value_op!(Add, add, Op::Add);
value_op!(Sub, sub, Op::Sub);
value_op!(Mul, mul, Op::Mul);
value_op!(Div, div, Op::Div);
value_op!(Rem, rem, Op::Rem);

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn add_then_sub_round_trips_per_representation() {
    let cases = [
      (Value::Integer(-17), Value::Integer(40)),
      (Value::Unsigned(17), Value::Unsigned(40)),
      (Value::Float(0.1), Value::Float(0.2)),
      (Value::Integer(Int::MAX), Value::Integer(5)),
      (Value::Unsigned(3), Value::Unsigned(Uint::MAX)),
    ];
    for (a, b) in cases.iter() {
      let back = &(a + b) - b;
      assert_eq!(back.type_name(), a.type_name());
      assert_eq!(&back, a);
    }
  }

  #[test]
  fn right_operand_follows_left_representation() {
    assert!(matches!(Value::Integer(7) + Value::Float(2.9), Value::Integer(9)));
    assert!(matches!(Value::Unsigned(7) + Value::Integer(2), Value::Unsigned(9)));
    assert!(matches!(Value::Float(1.5) + Value::Unsigned(2), Value::Float(x) if x == 3.5));
    assert_eq!(
      Value::Unsigned(7) + Value::Integer(-2),
      Value::Error(ValueError::OutOfRangeConversion)
    );
    assert_eq!(
      Value::Integer(1) + Value::Float(1e300),
      Value::Error(ValueError::OutOfRangeConversion)
    );
  }

  #[test]
  fn string_rules() {
    assert_eq!(Value::from("ab") + Value::from("cd"), Value::from("abcd"));
    assert_eq!(Value::from("ab") - Value::from("cd"), Value::Error(ValueError::InvalidOperation));
    assert_eq!(Value::from("ab") + Value::Integer(1), Value::Error(ValueError::TypeMismatch));
    assert_eq!(Value::Float(1.0) * Value::from("x"), Value::Error(ValueError::InvalidOperation));
    assert_eq!(Value::Boolean(true) + Value::from("a"), Value::Error(ValueError::InvalidOperation));
    assert_eq!(Value::from("a") + Value::Boolean(false), Value::Error(ValueError::InvalidOperation));
  }

  #[test]
  fn null_and_error_operands() {
    assert_eq!(Value::Null + Value::Integer(1), Value::Error(ValueError::IsNull));
    assert_eq!(Value::Integer(1) / Value::Null, Value::Error(ValueError::IsNull));
    let e = Value::Error(ValueError::IEEE754);
    assert_eq!(e.clone() + Value::Null, e);
    assert_eq!(Value::from("x") * e.clone(), e);
  }

  #[test]
  fn division_by_zero_in_every_representation() {
    let zero_div = Value::Error(ValueError::DivideByZero);
    assert_eq!(Value::Integer(1) / Value::Integer(0), zero_div);
    assert_eq!(Value::Unsigned(1) / Value::Unsigned(0), zero_div);
    assert_eq!(Value::Float(1.0) / Value::Float(0.0), zero_div);
    assert_eq!(Value::Integer(1) % Value::Integer(0), zero_div);
    assert_eq!(Value::Unsigned(1) % Value::Unsigned(0), zero_div);
    assert_eq!(Value::Float(1.0) % Value::Float(-0.0), zero_div);
    assert_eq!(
      Value::Float(1.0) / Value::Float(Float::INFINITY),
      Value::Error(ValueError::IEEE754)
    );
    assert_eq!(Value::Float(1.0) % Value::Float(Float::NAN), Value::Error(ValueError::IEEE754));
  }

  #[test]
  fn modulo_is_floored() {
    assert_eq!(Value::Integer(-7) % Value::Integer(3), Value::Integer(2));
    assert_eq!(Value::Integer(7) % Value::Integer(-3), Value::Integer(-2));
    assert_eq!(Value::Float(-7.0) % Value::Float(3.0), Value::Float(2.0));
    assert_eq!(Value::Float(13.0) % Value::Float(5.0), Value::Float(3.0));
  }

  #[test]
  fn equality_and_ordering() {
    assert_eq!(Value::Null, Value::Null);
    assert_ne!(Value::Null, Value::Integer(0));
    assert_ne!(Value::Float(Float::INFINITY), Value::Float(Float::INFINITY));
    assert_ne!(Value::Float(Float::NAN), Value::Float(Float::NAN));
    assert_eq!(Value::Float(0.1 + 0.2), Value::Float(0.3));
    assert_eq!(Value::Integer(-1), Value::Float(-1.0));
    assert_ne!(Value::Integer(-1), Value::Unsigned(Uint::MAX));
    assert_eq!(Value::Error(ValueError::IsNull), Value::Error(ValueError::IsNull));
    assert_ne!(Value::Error(ValueError::IsNull), Value::Error(ValueError::TypeMismatch));

    assert!(Value::Integer(-1).lt(&Value::Unsigned(0)));
    assert!(Value::Float(2.5).gt(&Value::Integer(2)));
    assert!(!Value::Null.lt(&Value::Integer(1)));
    assert!(!Value::Integer(1).gt(&Value::Null));
    assert!(Value::from("abc").lt(&Value::from("abd")));
    assert!(Value::Integer(3).ge(&Value::Float(3.0)));
    assert!(!Value::Null.le(&Value::Null));
  }

  #[test]
  fn compare_refuses_unordered_pairs() {
    use core::cmp::Ordering;
    assert_eq!(Value::Integer(18).compare(&Value::Float(24.0)), Ok(Ordering::Less));
    assert_eq!(Value::from("b").compare(&Value::from("a")), Ok(Ordering::Greater));
    assert_eq!(Value::from("a").compare(&Value::Integer(1)), Err(ValueError::TypeMismatch));
    assert_eq!(Value::Null.compare(&Value::Integer(1)), Err(ValueError::IsNull));
    assert_eq!(Value::Float(Float::NAN).compare(&Value::Float(1.0)), Err(ValueError::IEEE754));
    assert_eq!(
      Value::Integer(1).compare(&Value::Error(ValueError::DivideByZero)),
      Err(ValueError::DivideByZero)
    );
  }

  #[test]
  fn float_operand_keeps_carried_errors() {
    assert_eq!(Value::Error(ValueError::DivideByZero).float_operand(), Err(ValueError::DivideByZero));
    assert_eq!(Value::Null.float_operand(), Err(ValueError::ImpossibleConversion));
    assert_eq!(Value::Unsigned(3).float_operand(), Ok(3.0));
  }

  #[test]
  fn checked_conversions() {
    assert_eq!(Value::from("1").checked_to_int(), Err(ValueError::ImpossibleConversion));
    assert_eq!(Value::Null.checked_to_float(), Err(ValueError::ImpossibleConversion));
    assert_eq!(Value::Integer(-1).checked_to_uint(), Err(ValueError::OutOfRangeConversion));
    assert_eq!(Value::Unsigned(Uint::MAX).checked_to_int(), Err(ValueError::OutOfRangeConversion));
    assert_eq!(Value::Float(Float::NAN).checked_to_int(), Err(ValueError::OutOfRangeConversion));
    assert_eq!(Value::Float(-2.9).checked_to_int(), Ok(-2));
    assert_eq!(Value::Boolean(true).checked_to_uint(), Ok(1));
  }

  #[test]
  fn best_effort_coercions() {
    assert!(!Value::from("").to_boolean());
    assert!(Value::from("no").to_boolean());
    assert!(!Value::Float(0.0).to_boolean());
    assert!(!Value::Null.to_boolean());
    assert_eq!(Value::from("42").to_int(), 42);
    assert_eq!(Value::from("42u").to_uint(), 42);
    assert_eq!(Value::from("nope").to_float(), 0.0);
    assert_eq!(Value::Float(6.0).to_string(), "6.0");
    assert_eq!(Value::Error(ValueError::IsNull).to_string(), "error: value is null");
  }

  #[test]
  fn error_accessor() {
    assert_eq!(Value::Error(ValueError::DivideByZero).error(), ValueError::DivideByZero);
    assert_eq!(Value::Integer(0).error(), ValueError::NotAnError);
  }
}
