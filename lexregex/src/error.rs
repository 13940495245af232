use std::fmt;

use crate::location::Location;

/// Errors raised while declaring or preparing a [`crate::tokenizer::Tokenizer`].
#[derive(Debug)]
pub enum BuildError {
    EmptyPattern,
    Regex(String, regex::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::EmptyPattern => write!(dest, "empty pattern is not allowed"),
            BuildError::Regex(pattern, error) => {
                write!(dest, "bad pattern \"{}\": {}", pattern, error)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Raised by `next_token` when the current start-condition's patterns match
/// nothing at the cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub text: String,
    pub location: Location,
    pub state: String,
}

impl fmt::Display for Error {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        write!(
            dest,
            "no token matches \"{}\" at {} (start-condition \"{}\")",
            self.text, self.location, self.state
        )
    }
}

impl std::error::Error for Error {}
