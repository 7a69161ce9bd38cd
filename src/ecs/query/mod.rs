//! Compiled include/exclude predicates over a [`Signature`].

use std::collections::HashMap;

use crate::ecs::component::Component;
use crate::ecs::signature::Signature;

/// A single query predicate: a component must be present, or must be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Include(Component),
    Exclude(Component),
}

impl Clause {
    fn subject(&self) -> Component {
        match self {
            Clause::Include(c) | Clause::Exclude(c) => *c,
        }
    }
}

/// Builds a [`Query`] from `with`/`without` calls.
///
/// Duplicate calls for the same component collapse to the last one, matching
/// the "duplicates of the same component collapse to the last call" rule —
/// a second `with(c)` after a `without(c)` (or vice versa) simply replaces
/// the clause rather than accumulating both.
#[derive(Debug, Default)]
pub struct Builder {
    clauses: HashMap<Component, Clause>,
}

impl Builder {
    pub fn new() -> Self {
        Self { clauses: HashMap::new() }
    }

    /// Require `c` to be present in a matching signature.
    pub fn with(&mut self, c: Component) -> &mut Self {
        self.clauses.insert(c, Clause::Include(c));
        self
    }

    /// Require `c` to be absent from a matching signature.
    pub fn without(&mut self, c: Component) -> &mut Self {
        self.clauses.insert(c, Clause::Exclude(c));
        self
    }

    /// Finalize the builder into a [`Query`], sorting clauses by component id
    /// so matching can run as a single linear scan against a sorted signature.
    pub fn build(&self) -> Query {
        let mut clauses: Vec<Clause> = self.clauses.values().copied().collect();
        clauses.sort_by_key(|clause| clause.subject());
        Query { clauses }
    }
}

/// A compiled, sorted sequence of include/exclude clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Whether `signature` satisfies every clause in this query.
    ///
    /// Both `clauses` and `signature` are sorted by component id, so this
    /// runs as a single two-cursor linear scan.
    pub fn matches(&self, signature: &Signature) -> bool {
        let ids = signature.ids();
        let mut i_clause = 0;
        let mut i_type = 0;

        while i_clause < self.clauses.len() {
            let clause = self.clauses[i_clause];
            if i_type >= ids.len() {
                match clause {
                    Clause::Include(_) => return false,
                    Clause::Exclude(_) => i_clause += 1,
                }
                continue;
            }

            match ids[i_type].cmp(&clause.subject()) {
                std::cmp::Ordering::Equal => match clause {
                    Clause::Exclude(_) => return false,
                    Clause::Include(_) => {
                        i_clause += 1;
                        i_type += 1;
                    }
                },
                std::cmp::Ordering::Less => i_type += 1,
                std::cmp::Ordering::Greater => match clause {
                    Clause::Include(_) => return false,
                    Clause::Exclude(_) => i_clause += 1,
                },
            }
        }
        true
    }
}

/// Build a [`Query`] with a closure over a [`Builder`], mirroring the
/// `select_entities { with(c); without(c); }` surface from the engine API.
pub fn select_entities(f: impl FnOnce(&mut Builder)) -> Query {
    let mut builder = Builder::new();
    f(&mut builder);
    builder.build()
}
