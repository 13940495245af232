//! A stateful, longest-match regex tokenizer: named start-conditions, a
//! stack of input streams, per-token actions and state transitions.

mod error;
mod location;
mod matcher;
mod token;
mod tokenizer;

pub use error::{BuildError, Error};
pub use location::Location;
pub use token::Token;
pub use tokenizer::{Tokenizer, TokenHandle, DEFAULT_STATE};
