use symdec_core::Clause;

/// The current path condition: an ordered sequence of clauses.
///
/// Purely structural; no validity checking happens here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assumptions {
    clauses: Vec<Clause>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Replace the whole store.
    pub fn set(&mut self, clauses: Vec<Clause>) {
        self.clauses = clauses;
    }

    pub fn clear(&mut self) {
        self.clauses.clear();
    }

    /// A copy of the store, unaffected by later mutation.
    pub fn snapshot(&self) -> Vec<Clause> {
        self.clauses.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_detached() {
        let mut store = Assumptions::new();
        store.push(Clause::initialized("Foo"));
        let snap = store.snapshot();
        store.clear();
        assert_eq!(snap, vec![Clause::initialized("Foo")]);
        assert!(store.is_empty());
    }

    #[test]
    fn set_replaces() {
        let mut store = Assumptions::new();
        store.push(Clause::initialized("Foo"));
        store.set(vec![Clause::not_initialized("Bar"), Clause::initialized("Baz")]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().next(), Some(&Clause::not_initialized("Bar")));
    }
}
