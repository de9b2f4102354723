//! Numeric widths and construction-time knobs.
//!
//! The widths of the three numeric cells are picked at compile time through
//! the `int32` and `float32` cargo features; everything else is a plain
//! [`Config`] handed to [`Context::new`](crate::context::Context::new).

#[cfg(not(feature = "int32"))]
pub type Int = i64;
#[cfg(not(feature = "int32"))]
pub type Uint = u64;

#[cfg(feature = "int32")]
pub type Int = i32;
#[cfg(feature = "int32")]
pub type Uint = u32;

#[cfg(not(feature = "float32"))]
pub type Float = f64;
#[cfg(feature = "float32")]
pub type Float = f32;

#[cfg(not(feature = "float32"))]
pub use core::f64::consts;
#[cfg(feature = "float32")]
pub use core::f32::consts;

/// Longest line `process` accepts unless told otherwise.
pub const DEFAULT_BUFFER_CAPACITY : usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Maximum input length in bytes.
  pub buffer_capacity : usize,
  /// Register the standard operator set on construction.
  pub install_builtins : bool,
  /// Register the transcendental operators on construction.
  /// Ignored without the `math` feature.
  pub install_math : bool,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      buffer_capacity : DEFAULT_BUFFER_CAPACITY,
      install_builtins : true,
      install_math : true,
    }
  }
}

impl Config {
  pub fn new() -> Self { Self::default() }

  /// A context with no operators at all; the embedder registers its own.
  pub fn bare() -> Self {
    Config { install_builtins : false, install_math : false, ..Self::default() }
  }

  pub fn with_buffer_capacity(mut self, capacity : usize) -> Self {
    self.buffer_capacity = capacity;
    self
  }

  pub fn with_builtins(mut self, install : bool) -> Self {
    self.install_builtins = install;
    self
  }

  pub fn with_math(mut self, install : bool) -> Self {
    self.install_math = install;
    self
  }
}
