use std::fmt;

use crate::grammar::{Grammar, RuleId};
use crate::symbol::SymbolId;

/// An LR(0) item: a rule together with how far a state has read into its
/// rhs. Ordered by `(rule, pos)` so it can live in a `BTreeSet` and give
/// every state's item set (and therefore its kernel) a canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    pub rule: RuleId,
    pub pos: usize,
}

impl Item {
    pub fn start(rule: RuleId) -> Self {
        Self { rule, pos: 0 }
    }

    pub fn advance(&self) -> Self {
        Self {
            rule: self.rule,
            pos: self.pos + 1,
        }
    }

    pub fn next_symbol<V>(&self, grammar: &Grammar<V>) -> Option<SymbolId> {
        grammar.rule(self.rule).rhs.get(self.pos).copied()
    }

    pub fn is_final<V>(&self, grammar: &Grammar<V>) -> bool {
        self.pos >= grammar.rule(self.rule).rhs.len()
    }

    /// True for items that are not the initial item of a non-start rule,
    /// i.e. items a closure adds rather than ones carried between states.
    pub fn is_kernel<V>(&self, grammar: &Grammar<V>) -> bool {
        self.pos > 0 || grammar.rule(self.rule).is_start
    }

    /// True iff the next symbol to be read is `@end` — i.e. this item sits
    /// one shift away from completing the augmented start rule. The table
    /// builder installs `ACTION[Q, @end] := Accept` for such an item instead
    /// of the ordinary shift its `@end` transition would otherwise produce
    /// (see [`crate::table::ParsingTable::build`]).
    pub fn is_accepting<V>(&self, grammar: &Grammar<V>) -> bool {
        self.next_symbol(grammar) == Some(grammar.end_symbol())
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.rule, self.pos)
    }
}
