use std::collections::{BTreeMap, BTreeSet};

use crate::automaton::{Automaton, StateId};
use crate::grammar::{Grammar, RuleId};
use crate::symbol::SymbolId;

pub type StateSymbol = (StateId, SymbolId);

/// The four DeRemer-Pennello relations the lookahead computation in
/// [`crate::operations`] runs its digraph/SCC pass over (§4.3):
///
/// - `direct_read(p,A)`: terminals immediately shiftable from `goto(p,A)`.
/// - `reads(p,A)`: nullable-nonterminal transitions out of `goto(p,A)`, the
///   edges `Read` propagates across.
/// - `includes(p,A)`: `(p',B)` such that some rule `B → β A γ` has `γ`
///   nullable and `p' --β--> p`, the edges `Follow` propagates across.
/// - `lookback(q, A→α)`: `(p,A)` such that `p --α--> q`, used to turn a
///   completed rule's `Follow` sets into the lookahead for its reduction.
pub struct Relations {
    pub direct_read: BTreeMap<StateSymbol, BTreeSet<SymbolId>>,
    pub reads: BTreeMap<StateSymbol, BTreeSet<StateSymbol>>,
    pub includes: BTreeMap<StateSymbol, BTreeSet<StateSymbol>>,
    pub lookback: BTreeMap<(StateId, RuleId), BTreeSet<StateSymbol>>,
}

fn forward_walk(automaton: &Automaton, start: StateId, seq: &[SymbolId]) -> Option<StateId> {
    let mut cur = start;
    for &sym in seq {
        cur = automaton.goto(cur, sym)?;
    }
    Some(cur)
}

fn backward_walk(automaton: &Automaton, target: StateId, seq: &[SymbolId]) -> BTreeSet<StateId> {
    match seq.split_last() {
        None => std::iter::once(target).collect(),
        Some((&last, rest)) => {
            let mut result = BTreeSet::new();
            for &pred in automaton.predecessors(target, last) {
                result.extend(backward_walk(automaton, pred, rest));
            }
            result
        }
    }
}

impl Relations {
    pub fn compute<V>(grammar: &Grammar<V>, automaton: &Automaton) -> Self {
        let mut direct_read: BTreeMap<StateSymbol, BTreeSet<SymbolId>> = BTreeMap::new();
        let mut reads: BTreeMap<StateSymbol, BTreeSet<StateSymbol>> = BTreeMap::new();
        let mut includes: BTreeMap<StateSymbol, BTreeSet<StateSymbol>> = BTreeMap::new();
        let mut lookback: BTreeMap<(StateId, RuleId), BTreeSet<StateSymbol>> = BTreeMap::new();

        for state in automaton.states() {
            for (&sym, &target) in automaton.transitions(state.id) {
                if !grammar.symbol(sym).is_nonterminal() {
                    continue;
                }
                let pair = (state.id, sym);
                let mut dr = BTreeSet::new();
                let mut rd = BTreeSet::new();
                for (&t, _) in automaton.transitions(target) {
                    if grammar.symbol(t).is_terminal() {
                        dr.insert(t);
                    } else if grammar.empty_of(t) {
                        rd.insert((target, t));
                    }
                }
                direct_read.insert(pair, dr);
                reads.insert(pair, rd);
            }
        }

        for rule in grammar.rules() {
            for (i, &sym) in rule.rhs.iter().enumerate() {
                if !grammar.symbol(sym).is_nonterminal() {
                    continue;
                }
                let beta = &rule.rhs[..i];
                let gamma = &rule.rhs[i + 1..];
                if !grammar.empty(gamma) {
                    continue;
                }
                for state in automaton.states() {
                    if let Some(p) = forward_walk(automaton, state.id, beta) {
                        includes.entry((p, sym)).or_default().insert((state.id, rule.lhs));
                    }
                }
            }
        }

        for state in automaton.states() {
            for item in &state.items {
                if item.is_final(grammar) {
                    let rule = grammar.rule(item.rule);
                    let sources = backward_walk(automaton, state.id, &rule.rhs);
                    let entry = lookback.entry((state.id, item.rule)).or_default();
                    for p in sources {
                        entry.insert((p, rule.lhs));
                    }
                }
            }
        }

        Self {
            direct_read,
            reads,
            includes,
            lookback,
        }
    }
}
