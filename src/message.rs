//! Stand-in for the host log message this runtime reads fields from and
//! writes fields back to. A real deployment plugs in whatever pipeline
//! message type it has; this crate only needs the narrow read/write/unset
//! contract [`filterx_scope_sync`](crate::scope::Scope::sync) relies on,
//! so that is all that is modeled here.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::value::TypeTag;

/// How a variable name maps onto scope/message storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Tied to a field on the host message (e.g. `$MESSAGE`, `$HOST`).
    MessageTied,
    /// A plain local, not backed by the message (e.g. `$$local` / `let` target).
    Floating,
    /// A floating variable that has been explicitly declared (`let x = ...`),
    /// which exempts it from the generation-based lazy-invalidation rule
    /// that otherwise hides undeclared floating variables across blocks.
    DeclaredFloating,
}

/// Interned handle for a variable name, with the variable's kind folded
/// into the high bit so scope code can test floating-ness without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableHandle(u32);

const FLOATING_BIT: u32 = 1 << 31;

impl VariableHandle {
    pub fn is_floating(&self) -> bool {
        self.0 & FLOATING_BIT != 0
    }

    pub fn index(&self) -> u32 {
        self.0 & !FLOATING_BIT
    }
}

/// Assigns stable handles to variable names, distinguishing message-tied
/// names from floating (local) ones by convention: a leading `$` followed
/// by an uppercase letter or digit names a message field; anything else
/// (including `$$name`) is floating. This mirrors `filterx_map_varname_to_handle`.
#[derive(Debug, Default)]
pub struct HandleTable {
    by_name: AHashMap<String, VariableHandle>,
    names: Vec<String>,
    kinds: Vec<VariableKind>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> VariableHandle {
        if let Some(h) = self.by_name.get(name) {
            return *h;
        }
        let floating = !is_message_tied_name(name);
        let index = self.names.len() as u32;
        let bits = if floating { index | FLOATING_BIT } else { index };
        let handle = VariableHandle(bits);
        self.names.push(name.to_string());
        self.kinds.push(if floating {
            VariableKind::Floating
        } else {
            VariableKind::MessageTied
        });
        self.by_name.insert(name.to_string(), handle);
        handle
    }

    pub fn name_of(&self, handle: VariableHandle) -> &str {
        &self.names[handle.index() as usize]
    }

    pub fn kind_of(&self, handle: VariableHandle) -> VariableKind {
        self.kinds[handle.index() as usize]
    }

    pub fn declare(&mut self, handle: VariableHandle) {
        let idx = handle.index() as usize;
        debug_assert!(handle.is_floating());
        self.kinds[idx] = VariableKind::DeclaredFloating;
    }
}

fn is_message_tied_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('$')) && !matches!(chars.next(), Some('$'))
}

/// A raw, unmarshalled message field as the host stores it: a text buffer
/// plus the wire type it should be interpreted as.
#[derive(Debug, Clone)]
pub struct RawField {
    pub buffer: String,
    pub type_tag: TypeTag,
}

/// The message a single evaluation is bound to.
#[derive(Debug, Default)]
pub struct Message {
    fields: IndexMap<VariableHandle, RawField>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value_if_set(&self, handle: VariableHandle) -> Option<&RawField> {
        self.fields.get(&handle)
    }

    pub fn is_value_set(&self, handle: VariableHandle) -> bool {
        self.fields.contains_key(&handle)
    }

    pub fn set_value_with_type(&mut self, handle: VariableHandle, buffer: String, type_tag: TypeTag) {
        self.fields.insert(handle, RawField { buffer, type_tag });
    }

    pub fn unset_value(&mut self, handle: VariableHandle) {
        self.fields.shift_remove(&handle);
    }
}
