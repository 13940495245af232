use std::fmt;

/// Dense, zero-based identity of a [`Symbol`] within a [`crate::grammar::Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Terminal,
    Nonterminal,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    NonAssoc,
    Left,
    Right,
}

/// A precedence level plus the associativity used to break shift/reduce
/// ties at that level. Levels compare by `level` first; the associativity
/// only matters when two precedences share a level, which is handled
/// explicitly by the conflict-resolution logic in [`crate::table`] rather
/// than folded into a derived total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence {
    pub level: u32,
    pub assoc: Associativity,
}

impl Precedence {
    pub fn new(level: u32, assoc: Associativity) -> Self {
        Self { level, assoc }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub description: Option<String>,
    pub precedence: Option<Precedence>,
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal | SymbolKind::End)
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Nonterminal)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, SymbolKind::End)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
