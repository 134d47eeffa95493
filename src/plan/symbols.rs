// src/plan/symbols.rs

//! Variables and the per-plan symbol table.
//!
//! Writer/reader sets are fixed once the plan is built. Usage counters and
//! loop depths are atomics because the lifetime analysis fills them in on a
//! plan that may already be shared.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::types::NodeId;

/// `user_count` sentinel for variables whose consumers cannot be bounded
/// statically (query result, `Select`/`Loop` outputs).
pub const UNBOUNDED_USERS: u64 = u64::MAX;

/// A named result slot.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    /// Nodes that may produce this variable. More than one only when
    /// control-flow branches converge on the same name.
    pub written_by: BTreeSet<NodeId>,
    /// Nodes that consume this variable.
    pub read_by: BTreeSet<NodeId>,
    user_count: AtomicU64,
    loop_layers: AtomicUsize,
}

impl Variable {
    fn new(name: String) -> Self {
        Self {
            name,
            written_by: BTreeSet::new(),
            read_by: BTreeSet::new(),
            user_count: AtomicU64::new(0),
            loop_layers: AtomicUsize::new(0),
        }
    }

    pub fn user_count(&self) -> u64 {
        self.user_count.load(Ordering::Relaxed)
    }

    pub fn is_unbounded(&self) -> bool {
        self.user_count() == UNBOUNDED_USERS
    }

    pub fn loop_layers(&self) -> usize {
        self.loop_layers.load(Ordering::Relaxed)
    }

    /// Whether the single consumer may take the value instead of copying it.
    ///
    /// Only covers the writer side; a reader inside a loop still copies.
    pub fn is_movable(&self) -> bool {
        self.user_count() == 1 && self.loop_layers() == 0
    }

    /// Count one more consumer; saturates at [`UNBOUNDED_USERS`].
    pub(crate) fn add_user(&self) {
        let _ = self
            .user_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n == UNBOUNDED_USERS {
                    None
                } else {
                    Some(n + 1)
                }
            });
    }

    pub(crate) fn mark_unbounded(&self) {
        self.user_count.store(UNBOUNDED_USERS, Ordering::Relaxed);
    }

    /// Keeps the deepest layer any writer runs in.
    pub(crate) fn set_loop_layers(&self, layers: usize) {
        self.loop_layers.fetch_max(layers, Ordering::Relaxed);
    }
}

/// All variables referenced by one plan, keyed by name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: HashMap<String, Variable>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `name` if it does not exist yet. Returns `true` if it was new.
    pub fn new_variable(&mut self, name: &str) -> bool {
        if self.vars.contains_key(name) {
            return false;
        }
        self.vars
            .insert(name.to_string(), Variable::new(name.to_string()));
        true
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn vars(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    pub(crate) fn written_by(&mut self, name: &str, node: NodeId) {
        self.new_variable(name);
        if let Some(var) = self.vars.get_mut(name) {
            var.written_by.insert(node);
        }
    }

    pub(crate) fn delete_written_by(&mut self, name: &str, node: NodeId) {
        if let Some(var) = self.vars.get_mut(name) {
            var.written_by.remove(&node);
        }
    }

    pub(crate) fn delete_read_by(&mut self, name: &str, node: NodeId) {
        if let Some(var) = self.vars.get_mut(name) {
            var.read_by.remove(&node);
        }
    }

    pub(crate) fn read_by(&mut self, name: &str, node: NodeId) {
        self.new_variable(name);
        if let Some(var) = self.vars.get_mut(name) {
            var.read_by.insert(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_user_saturates_at_sentinel() {
        let mut table = SymbolTable::new();
        table.new_variable("x");
        let x = table.get_var("x").unwrap();

        x.add_user();
        assert_eq!(x.user_count(), 1);
        assert!(x.is_movable());

        x.mark_unbounded();
        x.add_user();
        assert!(x.is_unbounded());
        assert!(!x.is_movable());
    }

    #[test]
    fn writers_accumulate_per_name() {
        let mut table = SymbolTable::new();
        table.written_by("x", 1);
        table.written_by("x", 2);
        table.read_by("x", 3);
        table.delete_written_by("x", 1);

        let x = table.get_var("x").unwrap();
        assert_eq!(x.written_by.iter().copied().collect::<Vec<_>>(), vec![2]);
        assert!(x.read_by.contains(&3));
    }
}
