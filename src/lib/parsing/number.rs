use nom::{
  branch::alt,
  character::complete::{char, digit0, digit1, one_of},
  combinator::{all_consuming, opt, recognize},
  sequence::{pair, tuple},
  IResult,
};

use crate::{
  config::{Float, Int, Uint},
  errors::ProcessingError,
  value::Value,
};

/// A numeric literal split into its parts, borrowed from the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Literal<'a> {
  pub sign : Option<char>,
  pub mantissa : &'a str,
  pub exponent : Option<&'a str>,
  pub suffix : Option<char>,
}

impl<'a> Literal<'a> {
  fn integral(&self) -> bool { self.exponent.is_none() && !self.mantissa.contains('.') }
}

fn mantissa(input : &str) -> IResult<&str, &str> {
  alt((
    recognize(pair(digit1, opt(pair(char('.'), digit0)))),
    recognize(pair(char('.'), digit1)),
  ))(input)
}

fn exponent(input : &str) -> IResult<&str, &str> {
  recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

/// `[+-]? mantissa exponent? [iu]?`
pub fn literal(input : &str) -> IResult<&str, Literal<'_>> {
  let (rest, (sign, mantissa, exponent, suffix)) =
    tuple((opt(one_of("+-")), mantissa, opt(exponent), opt(one_of("iu"))))(input)?;
  Ok((rest, Literal { sign, mantissa, exponent, suffix }))
}

/// Classifies a whole token.
///
/// `None` means the text is not a numeric literal at all and should be
/// treated as a word. `Some(Err(_))` is a literal whose suffix cannot apply
/// or whose magnitude does not fit the selected representation.
pub fn scan(text : &str) -> Option<Result<Value, ProcessingError>> {
  let (_, lit) = all_consuming(literal)(text).ok()?;
  let body = text.strip_suffix(|c| c == 'i' || c == 'u').unwrap_or(text);
  let body = body.strip_prefix('+').unwrap_or(body);
  Some(match lit.suffix {
    None => body.parse::<Float>().map(Value::Float).map_err(|_| ProcessingError::InvalidToken),
    Some(_) if !lit.integral() => Err(ProcessingError::InvalidToken),
    Some('i') => body.parse::<Int>().map(Value::Integer).map_err(|_| ProcessingError::InvalidToken),
    Some(_) if lit.sign == Some('-') => Err(ProcessingError::InvalidToken),
    Some(_) => body.parse::<Uint>().map(Value::Unsigned).map_err(|_| ProcessingError::InvalidToken),
  })
}

/// Literal value of `text`, if it is a well-formed number that fits.
pub fn parse_value(text : &str) -> Option<Value> { scan(text.trim())?.ok() }

/// Whether an unresolved word was meant as a number.
pub fn looks_numeric(text : &str) -> bool {
  let mut chars = text.chars();
  match chars.next() {
    Some(c) if c.is_ascii_digit() => true,
    Some('+' | '-' | '.') => chars.next().map_or(false, |c| c.is_ascii_digit()),
    _ => false,
  }
}
