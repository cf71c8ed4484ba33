//! Per-evaluation variable storage: an ordered table of `(handle, value)`
//! slots, binary-searched by handle, with a generation counter used to
//! lazily invalidate undeclared floating variables across compound blocks
//! without having to walk and clear them all up front.

use tracing::trace;

use crate::message::{Message, VariableHandle, VariableKind};
use crate::value::Value;

/// Upper bound on [`Scope`]'s generation counter (fits a 20-bit field in the
/// source runtime's scope struct; kept here purely to preserve the
/// overflow-panics-eventually contract rather than letting it wrap silently).
pub const MAX_GENERATION: u32 = (1 << 20) - 1;

#[derive(Debug, Clone)]
pub struct Variable {
    handle: VariableHandle,
    value: Option<Value>,
    generation: u32,
    declared: bool,
    assigned: bool,
}

impl Variable {
    fn new(handle: VariableHandle, value: Option<Value>, generation: u32) -> Self {
        Variable {
            handle,
            value,
            generation,
            declared: false,
            assigned: false,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    pub fn set_value(&mut self, value: Option<Value>, assigned: bool) {
        self.value = value;
        if assigned {
            self.assigned = true;
        }
    }

    pub fn unassign(&mut self) {
        self.assigned = false;
    }

    pub fn unset(&mut self) {
        self.value = None;
        self.assigned = true;
    }

    fn is_same_generation(&self, generation: u32) -> bool {
        self.generation == generation
    }
}

/// Per-evaluation variable table.
///
/// Message-tied variables (`syncable = true` once any are registered) get
/// written back to the host [`Message`] on [`Scope::sync`]; floating
/// variables never are. Undeclared floating variables are only considered
/// "present" while their slot's generation matches the scope's current
/// generation -- this is how a bare `x = 1` local inside one compound block
/// doesn't leak into an unrelated sibling block without the cost of
/// actually clearing the table between them.
#[derive(Debug, Clone)]
pub struct Scope {
    variables: Vec<Variable>,
    generation: u32,
    write_protected: bool,
    dirty: bool,
    syncable: bool,
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            variables: Vec::with_capacity(16),
            generation: 0,
            write_protected: false,
            dirty: false,
            syncable: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    fn binary_search(&self, handle: VariableHandle) -> Result<usize, usize> {
        self.variables.binary_search_by_key(&handle, |v| v.handle)
    }

    fn is_valid(&self, v: &Variable) -> bool {
        if v.handle.is_floating() && !v.declared && !v.is_same_generation(self.generation) {
            return false;
        }
        if !v.handle.is_floating() && v.is_same_generation(0) && self.syncable {
            return false;
        }
        true
    }

    pub fn lookup_variable(&self, handle: VariableHandle) -> Option<&Variable> {
        match self.binary_search(handle) {
            Ok(idx) => {
                let v = &self.variables[idx];
                if self.is_valid(v) { Some(v) } else { None }
            }
            Err(_) => None,
        }
    }

    pub fn lookup_variable_mut(&mut self, handle: VariableHandle) -> Option<&mut Variable> {
        match self.binary_search(handle) {
            Ok(idx) => {
                if self.is_valid(&self.variables[idx]) {
                    Some(&mut self.variables[idx])
                } else {
                    None
                }
            }
            Err(_) => None,
        }
    }

    fn register(&mut self, handle: VariableHandle, initial_value: Option<Value>) -> usize {
        match self.binary_search(handle) {
            Ok(idx) => {
                if !self.variables[idx].is_same_generation(self.generation) {
                    self.variables[idx].generation = self.generation;
                    self.variables[idx].value = initial_value;
                    self.variables[idx].unassign();
                }
                idx
            }
            Err(insert_at) => {
                self.variables.insert(insert_at, Variable::new(handle, initial_value, self.generation));
                insert_at
            }
        }
    }

    pub fn register_variable(&mut self, handle: VariableHandle, initial_value: Option<Value>) -> &Variable {
        let idx = self.register(handle, initial_value);
        self.variables[idx].declared = false;
        if !handle.is_floating() {
            self.syncable = true;
        }
        &self.variables[idx]
    }

    pub fn register_declared_variable(&mut self, handle: VariableHandle, initial_value: Option<Value>) -> &Variable {
        debug_assert!(handle.is_floating());
        let idx = self.register(handle, initial_value);
        self.variables[idx].declared = true;
        &self.variables[idx]
    }

    pub fn foreach_variable(&self, mut f: impl FnMut(&Variable)) {
        for v in &self.variables {
            if v.value.is_none() && !v.assigned {
                continue;
            }
            if !self.is_valid(v) {
                continue;
            }
            f(v);
        }
    }

    /// Writes every changed message-tied variable back to `msg`, unsets
    /// whiteouts, and leaves floating variables untouched (their lifetime is
    /// governed by the generation counter instead, see module docs).
    pub fn sync(&mut self, msg: &mut Message, names: &crate::message::HandleTable) {
        if !self.dirty {
            trace!("scope sync skipped: not dirty");
            return;
        }
        if !self.syncable {
            trace!("scope sync skipped: no message-tied variables");
            self.dirty = false;
            return;
        }
        for v in &mut self.variables {
            if v.handle.is_floating() {
                continue;
            }
            match &v.value {
                None => {
                    trace!(variable = names.name_of(v.handle), "unsetting whiteout variable");
                    msg.unset_value(v.handle);
                    v.unassign();
                }
                Some(value) => {
                    let modified_in_place = match value {
                        Value::List(xref) | Value::Dict(xref) => xref.is_modified_in_place(),
                        _ => false,
                    };
                    if v.assigned || modified_in_place {
                        trace!(variable = names.name_of(v.handle), "syncing changed variable");
                        let (buffer, type_tag) = value.marshal();
                        msg.set_value_with_type(v.handle, buffer, type_tag);
                        if let Value::List(xref) | Value::Dict(xref) = value {
                            xref.clear_modified_in_place();
                        }
                        v.unassign();
                    }
                }
            }
        }
        self.dirty = false;
    }

    pub fn write_protect(&mut self) {
        self.write_protected = true;
    }

    /// Returns a writable scope: a clone of `self` if currently write
    /// protected (the copy keeps only declared or message-tied variables,
    /// per `filterx_scope_clone`), then bumps the generation counter so
    /// undeclared floating variables from the previous generation become
    /// invisible again.
    pub fn make_writable(&mut self) {
        if self.write_protected {
            *self = self.clone_for_write();
        }
        self.generation += 1;
        assert!(self.generation < MAX_GENERATION, "scope generation counter exhausted");
    }

    fn clone_for_write(&self) -> Scope {
        let mut clone = Scope::new();
        for v in &self.variables {
            if v.declared || !v.handle.is_floating() {
                let mut cloned = v.clone();
                cloned.generation = 0;
                cloned.value = v.value.as_ref().map(Value::deep_clone);
                clone.variables.push(cloned);
            }
        }
        if !self.variables.is_empty() {
            clone.dirty = self.dirty;
        }
        clone.syncable = self.syncable;
        clone
    }

    /// Forces every message-tied variable to re-pull from the message on
    /// next lookup, used when the message itself was mutated externally
    /// (outside this scope's knowledge).
    pub fn invalidate_log_msg_cache(&mut self) {
        for v in &mut self.variables {
            if !v.handle.is_floating() && self.syncable {
                v.generation = 0;
            }
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

pub fn variable_kind_is_declarable(kind: VariableKind) -> bool {
    matches!(kind, VariableKind::Floating | VariableKind::DeclaredFloating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HandleTable;

    fn floating_handle(names: &mut HandleTable, name: &str) -> VariableHandle {
        let h = names.intern(name);
        assert!(h.is_floating(), "test fixture expected a floating name");
        h
    }

    #[test]
    fn undeclared_floating_variable_does_not_cross_a_generation_bump() {
        let mut names = HandleTable::new();
        let handle = floating_handle(&mut names, "tmp");
        let mut scope = Scope::new();

        scope.register_variable(handle, Some(Value::Int(1)));
        assert!(scope.lookup_variable(handle).is_some());

        scope.make_writable();
        assert!(
            scope.lookup_variable(handle).is_none(),
            "an undeclared floating variable from the previous generation must not be visible"
        );
    }

    #[test]
    fn declared_floating_variable_survives_a_generation_bump() {
        let mut names = HandleTable::new();
        let handle = floating_handle(&mut names, "kept");
        names.declare(handle);
        let mut scope = Scope::new();

        scope.register_declared_variable(handle, Some(Value::Int(7)));
        scope.make_writable();

        let var = scope.lookup_variable(handle).expect("declared variable must survive");
        assert!(matches!(var.value(), Some(Value::Int(7))));
    }

    #[test]
    fn write_protected_scope_clones_on_make_writable_and_keeps_only_declared_or_tied() {
        let mut names = HandleTable::new();
        let declared = floating_handle(&mut names, "kept");
        names.declare(declared);
        let undeclared = floating_handle(&mut names, "dropped");
        let mut scope = Scope::new();
        scope.register_declared_variable(declared, Some(Value::Int(1)));
        scope.register_variable(undeclared, Some(Value::Int(2)));
        scope.write_protect();

        scope.make_writable();

        assert!(scope.lookup_variable(declared).is_some());
        assert!(scope.lookup_variable(undeclared).is_none());
    }

    #[test]
    fn binary_search_keeps_the_table_sorted_regardless_of_insertion_order() {
        let mut names = HandleTable::new();
        let mut scope = Scope::new();
        let handles: Vec<_> = ["c", "a", "b"].iter().map(|n| floating_handle(&mut names, n)).collect();
        for h in &handles {
            names.declare(*h);
            scope.register_declared_variable(*h, Some(Value::Int(0)));
        }
        for h in &handles {
            assert!(scope.lookup_variable(*h).is_some());
        }
    }
}
