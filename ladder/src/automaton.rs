use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::grammar::Grammar;
use crate::item::Item;
use crate::symbol::SymbolId;

/// Dense, zero-based identity of a [`State`] within an [`Automaton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

pub struct State {
    pub id: StateId,
    pub items: BTreeSet<Item>,
}

/// The LR(0) automaton: one state per distinct kernel item set reachable
/// from the augmented start item, built breadth-first (§4.2). States are
/// deduplicated on their kernel (not their full closure), matching the
/// canonical LR(0) construction.
pub struct Automaton {
    states: Vec<State>,
    goto: Vec<BTreeMap<SymbolId, StateId>>,
    back: Vec<BTreeMap<SymbolId, Vec<StateId>>>,
}

impl Automaton {
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0 as usize]
    }

    pub fn initial_state(&self) -> StateId {
        StateId(0)
    }

    pub fn goto(&self, id: StateId, sym: SymbolId) -> Option<StateId> {
        self.goto[id.0 as usize].get(&sym).copied()
    }

    pub fn transitions(&self, id: StateId) -> &BTreeMap<SymbolId, StateId> {
        &self.goto[id.0 as usize]
    }

    /// States that transition into `id` on `sym`, in the order discovered;
    /// used by the backtracking relation walks in [`crate::relations`].
    pub fn predecessors(&self, id: StateId, sym: SymbolId) -> &[StateId] {
        self.back[id.0 as usize]
            .get(&sym)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn closure<V>(grammar: &Grammar<V>, kernel: BTreeSet<Item>) -> BTreeSet<Item> {
        let mut items = kernel;
        let mut worklist: VecDeque<Item> = items.iter().copied().collect();
        while let Some(item) = worklist.pop_front() {
            if let Some(sym) = item.next_symbol(grammar) {
                if grammar.symbol(sym).is_nonterminal() {
                    for &rule_id in grammar.rules_for_lhs(sym) {
                        let new_item = Item::start(rule_id);
                        if items.insert(new_item) {
                            worklist.push_back(new_item);
                        }
                    }
                }
            }
        }
        items
    }

    fn kernel_after<V>(grammar: &Grammar<V>, items: &BTreeSet<Item>, sym: SymbolId) -> BTreeSet<Item> {
        items
            .iter()
            .filter_map(|item| {
                if item.next_symbol(grammar) == Some(sym) {
                    Some(item.advance())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn build<V>(grammar: &Grammar<V>) -> Self {
        let start_rule = grammar
            .start_rule()
            .expect("start symbol must be set before building the automaton");

        let initial_kernel: BTreeSet<Item> = std::iter::once(Item::start(start_rule)).collect();
        let initial_items = Self::closure(grammar, initial_kernel.clone());

        let mut states = vec![State {
            id: StateId(0),
            items: initial_items,
        }];
        let mut goto: Vec<BTreeMap<SymbolId, StateId>> = vec![BTreeMap::new()];
        let mut kernel_index: BTreeMap<BTreeSet<Item>, StateId> = BTreeMap::new();
        kernel_index.insert(initial_kernel, StateId(0));

        let mut queue: VecDeque<StateId> = VecDeque::new();
        queue.push_back(StateId(0));

        while let Some(state_id) = queue.pop_front() {
            let items = states[state_id.0 as usize].items.clone();
            let mut symbols: BTreeSet<SymbolId> = BTreeSet::new();
            for item in &items {
                if let Some(sym) = item.next_symbol(grammar) {
                    // `@end` never gets a goto transition: the item that
                    // reads it (`@start → user_start · @end`) is handled by
                    // installing Accept in the table, not by shifting into a
                    // fresh state (§4.2).
                    if !grammar.symbol(sym).is_end() {
                        symbols.insert(sym);
                    }
                }
            }
            for sym in symbols {
                let kernel = Self::kernel_after(grammar, &items, sym);
                if kernel.is_empty() {
                    continue;
                }
                let target_id = if let Some(&existing) = kernel_index.get(&kernel) {
                    existing
                } else {
                    let target_items = Self::closure(grammar, kernel.clone());
                    let id = StateId(states.len() as u32);
                    states.push(State { id, items: target_items });
                    goto.push(BTreeMap::new());
                    kernel_index.insert(kernel, id);
                    queue.push_back(id);
                    id
                };
                goto[state_id.0 as usize].insert(sym, target_id);
            }
        }

        let mut back: Vec<BTreeMap<SymbolId, Vec<StateId>>> = vec![BTreeMap::new(); states.len()];
        for (from_idx, transitions) in goto.iter().enumerate() {
            let from_id = StateId(from_idx as u32);
            for (&sym, &to_id) in transitions {
                back[to_id.0 as usize].entry(sym).or_default().push(from_id);
            }
        }

        Self { states, goto, back }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolKind;

    fn expr_grammar() -> Grammar<()> {
        let mut g: Grammar<()> = Grammar::new();
        let expr = g.add_symbol(SymbolKind::Nonterminal, "Expr").unwrap();
        let plus = g.add_symbol(SymbolKind::Terminal, "+").unwrap();
        let num = g.add_symbol(SymbolKind::Terminal, "num").unwrap();
        g.add_rule(expr, vec![expr, plus, expr], None);
        g.add_rule(expr, vec![num], None);
        g.set_start_symbol(expr).unwrap();
        g
    }

    #[test]
    fn initial_state_closure_includes_every_expr_rule() {
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        let expr = g.start_symbol().unwrap();
        let initial = automaton.state(automaton.initial_state());
        let count = initial
            .items
            .iter()
            .filter(|item| g.rule(item.rule).lhs == expr)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn kernels_are_deduplicated_across_states() {
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        // Expr + Expr . Expr and Expr . Expr both goto the same num-shift state.
        let mut kernel_sets: BTreeSet<BTreeSet<Item>> = BTreeSet::new();
        for state in automaton.states() {
            kernel_sets.insert(state.items.iter().filter(|i| i.is_kernel(&g)).copied().collect());
        }
        assert_eq!(kernel_sets.len(), automaton.states().len());
    }

    #[test]
    fn goto_and_predecessors_agree() {
        let g = expr_grammar();
        let automaton = Automaton::build(&g);
        let num = g
            .symbols()
            .iter()
            .find(|s| s.name == "num")
            .unwrap()
            .id;
        for state in automaton.states() {
            if let Some(target) = automaton.goto(state.id, num) {
                assert!(automaton.predecessors(target, num).contains(&state.id));
            }
        }
    }
}
