use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display};

use crate::report::ParserReport;
use crate::symbol::SymbolId;

/// Errors raised while declaring a grammar, before automaton construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    DuplicateSymbolName(String),
    UnknownSymbol(SymbolId),
    StartSymbolNotSet,
    StartSymbolMustBeNonterminal(SymbolId),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrammarError::DuplicateSymbolName(name) => {
                write!(dest, "symbol \"{}\" already declared with a different kind", name)
            }
            GrammarError::UnknownSymbol(id) => write!(dest, "unknown symbol {}", id),
            GrammarError::StartSymbolNotSet => write!(dest, "no start symbol has been set"),
            GrammarError::StartSymbolMustBeNonterminal(id) => {
                write!(dest, "start symbol {} must be a nonterminal", id)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// Raised by `ACTION`/`GOTO` table construction when the automaton violates
/// an invariant the table builder relies on (a generator bug, not a user
/// error — see the propagation rules in the design notes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    GotoCollision,
    AcceptCollision,
}

impl fmt::Display for BuildError {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::GotoCollision => write!(dest, "GOTO table collision (generator bug)"),
            BuildError::AcceptCollision => write!(dest, "ACCEPT placed over an existing action (generator bug)"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Errors surfaced while parsing a concrete input.
#[derive(Debug, Clone)]
pub enum ParseError<T: Debug + Display + Copy + Eq> {
    Syntax {
        unexpected: lexregex::Token<T>,
        expected: BTreeSet<T>,
    },
    Tokenization(lexregex::Error),
}

impl<T: Debug + Display + Copy + Eq> fmt::Display for ParseError<T> {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Syntax { unexpected, expected } => {
                write!(dest, "syntax error: unexpected {}, expected one of {:?}", unexpected, expected)
            }
            ParseError::Tokenization(error) => write!(dest, "{}", error),
        }
    }
}

impl<T: Debug + Display + Copy + Eq> std::error::Error for ParseError<T> {}

/// Errors [`crate::parser::Parser::prepare`] can return before a parse is
/// ever attempted (§6, §7): either the grammar itself is incomplete, or the
/// tokenizer's patterns failed to compile.
#[derive(Debug)]
pub enum PrepareError {
    Grammar(GrammarError),
    Tokenizer(lexregex::BuildError),
    /// Returned only by [`crate::parser::Parser::prepare_strict`]: the table
    /// was built (and is usable) but carries shift/reduce or reduce/reduce
    /// conflicts the caller asked to treat as fatal (§6, §7).
    Conflicts(ParserReport),
}

impl fmt::Display for PrepareError {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrepareError::Grammar(error) => write!(dest, "{}", error),
            PrepareError::Tokenizer(error) => write!(dest, "{}", error),
            PrepareError::Conflicts(report) => write!(dest, "unresolved grammar conflicts:\n{}", report),
        }
    }
}

impl std::error::Error for PrepareError {}

impl From<GrammarError> for PrepareError {
    fn from(error: GrammarError) -> Self {
        PrepareError::Grammar(error)
    }
}

impl From<lexregex::BuildError> for PrepareError {
    fn from(error: lexregex::BuildError) -> Self {
        PrepareError::Tokenizer(error)
    }
}
