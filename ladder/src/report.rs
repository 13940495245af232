use std::fmt;

use crate::automaton::StateId;
use crate::grammar::RuleId;
use crate::symbol::SymbolId;

/// How a shift/reduce conflict was settled (§4.8). `KeptShift` and
/// `InstalledReduce` mean the rule's and the lookahead's precedence
/// compared cleanly and decided the winner; these are not reported as
/// conflicts (§9: "reductions see and may override shifts only via
/// precedence"). `DefaultShift` and `Removed` are the genuinely unresolved
/// cases that do get reported — see [`crate::table::ParsingTable::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Precedence compared cleanly in the lookahead's favour.
    KeptShift,
    /// Precedence compared cleanly in the rule's favour.
    InstalledReduce,
    /// Neither side had a usable precedence; the default (favour shift)
    /// was applied.
    DefaultShift,
    /// Both actions removed: the lookahead and the rule share a
    /// non-associative precedence level, so neither wins.
    Removed,
}

impl Resolution {
    /// True for the two outcomes precedence did not actually decide —
    /// the only ones worth surfacing in a [`ShiftReduceConflict`].
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::DefaultShift | Resolution::Removed)
    }
}

#[derive(Debug, Clone)]
pub struct ShiftReduceConflict {
    pub state: StateId,
    pub symbol: SymbolId,
    pub rule: RuleId,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
pub struct ReduceReduceConflict {
    pub state: StateId,
    pub symbol: SymbolId,
    pub kept_rule: RuleId,
    pub discarded_rule: RuleId,
}

/// Non-fatal diagnostics produced while building a [`crate::table::ParsingTable`]
/// (§7, §10). Callers decide for themselves whether any conflicts are
/// acceptable; the table is always built to completion regardless.
#[derive(Debug, Clone, Default)]
pub struct ParserReport {
    pub shift_reduce_conflicts: Vec<ShiftReduceConflict>,
    pub reduce_reduce_conflicts: Vec<ReduceReduceConflict>,
}

impl ParserReport {
    pub fn is_clean(&self) -> bool {
        self.shift_reduce_conflicts.is_empty() && self.reduce_reduce_conflicts.is_empty()
    }
}

impl fmt::Display for ParserReport {
    fn fmt(&self, dest: &mut fmt::Formatter) -> fmt::Result {
        for conflict in &self.shift_reduce_conflicts {
            writeln!(
                dest,
                "shift/reduce conflict in state {} on {}: rule {} ({:?})",
                conflict.state, conflict.symbol, conflict.rule, conflict.resolution
            )?;
        }
        for conflict in &self.reduce_reduce_conflicts {
            writeln!(
                dest,
                "reduce/reduce conflict in state {} on {}: kept rule {}, discarded rule {}",
                conflict.state, conflict.symbol, conflict.kept_rule, conflict.discarded_rule
            )?;
        }
        Ok(())
    }
}
