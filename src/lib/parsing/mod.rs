pub mod number;
pub mod tokenizer;

pub use tokenizer::{Token, TokenKind, Tokenizer};
