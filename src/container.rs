//! Copy-on-write wrapper ("ref"/"xref") around the two mutable container
//! kinds (list, dict).
//!
//! A bare `Container` is never handed out to callers directly once it has
//! been stored anywhere; it is always wrapped in an [`XRef`]. The wrapper
//! tracks how many independent handles currently alias the *same* container
//! (`share_count`, via `Rc::strong_count` on the inner cell -- this plays the
//! role the source runtime's separate atomic `fx_ref_cnt` counter plays,
//! without needing a second counter) and a weak link to whichever container
//! last stored this value (`parent`), so a write deep in a path can walk
//! back up and fork every shared ancestor, not just the immediate target.
//!
//! Two distinct operations matter:
//! - [`XRef::fork_for_store`]: called whenever a value is being *stored*
//!   somewhere (assignment, dict/list write). Produces a new, floating
//!   handle sharing the same underlying data, leaving the original handle
//!   (e.g. a variable the RHS was read from) untouched.
//! - [`XRef::cow_touch`]: called before a handle is mutated in place. Clones
//!   the container if it is shared, then walks the parent chain doing the
//!   same, so the mutation cannot leak into siblings of an ancestor.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{ErrorKind, FilterxError};
use crate::value::Value;

/// Dict storage: insertion-ordered (matching the source's dict iteration
/// order) and `ahash`-hashed rather than the default SipHash, the same
/// tradeoff the teacher makes for its own hot interpreter-loop maps.
pub type DictMap = IndexMap<Rc<str>, Value, ahash::RandomState>;

#[derive(Debug, Clone)]
pub enum Container {
    List(Vec<Value>),
    Dict(DictMap),
}

impl Container {
    pub fn empty_list() -> Self {
        Container::List(Vec::new())
    }

    pub fn empty_dict() -> Self {
        Container::Dict(DictMap::default())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Container::List(_) => "list",
            Container::Dict(_) => "dict",
        }
    }
}

struct XRefInner {
    value: RefCell<Rc<RefCell<Container>>>,
    parent: RefCell<Option<Weak<XRefInner>>>,
    floating: Cell<bool>,
    readonly: Cell<bool>,
    modified_in_place: Cell<bool>,
}

/// A handle to a mutable container, implementing copy-on-write sharing.
#[derive(Clone)]
pub struct XRef(Rc<XRefInner>);

impl XRef {
    pub fn new(container: Container) -> Self {
        XRef(Rc::new(XRefInner {
            value: RefCell::new(Rc::new(RefCell::new(container))),
            parent: RefCell::new(None),
            floating: Cell::new(true),
            readonly: Cell::new(false),
            modified_in_place: Cell::new(false),
        }))
    }

    /// Number of distinct `XRef` handles presently aliasing the same
    /// underlying container. Mirrors the source runtime's `fx_ref_cnt`.
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.0.value.borrow())
    }

    pub fn is_floating(&self) -> bool {
        self.0.floating.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.readonly.get()
    }

    pub fn make_readonly(&self) {
        self.0.readonly.set(true);
    }

    pub fn is_modified_in_place(&self) -> bool {
        self.0.modified_in_place.get()
    }

    pub fn clear_modified_in_place(&self) {
        self.0.modified_in_place.set(false);
    }

    fn identity(&self) -> *const XRefInner {
        Rc::as_ptr(&self.0)
    }

    fn parent_is(&self, container: &XRef) -> bool {
        match self.0.parent.borrow().as_ref().and_then(Weak::upgrade) {
            Some(p) => std::ptr::eq(Rc::as_ptr(&p), container.identity()),
            None => false,
        }
    }

    fn set_parent(&self, container: &XRef) {
        *self.0.parent.borrow_mut() = Some(Rc::downgrade(&container.0));
    }

    /// Produces a value suitable for storing into some slot (a variable, or
    /// a dict/list entry): the original handle is left untouched, and the
    /// returned handle is a fresh, floating wrapper sharing the same data.
    /// This is the "cow_fork2" step that makes `a.b = b` independent of
    /// future mutation of `b`.
    pub fn fork_for_store(&self) -> XRef {
        XRef(Rc::new(XRefInner {
            value: RefCell::new(Rc::clone(&self.0.value.borrow())),
            parent: RefCell::new(None),
            floating: Cell::new(true),
            readonly: Cell::new(false),
            modified_in_place: Cell::new(false),
        }))
    }

    /// Marks this handle as having been grounded into `container` (called
    /// right after a successful setattr/set_subscript/list-append).
    pub fn ground_in(&self, container: &XRef) {
        self.0.floating.set(false);
        self.set_parent(container);
    }

    fn clone_value_if_shared(&self) {
        if self.share_count() > 1 {
            let cloned = self.0.value.borrow().borrow().clone();
            *self.0.value.borrow_mut() = Rc::new(RefCell::new(cloned));
        }
    }

    /// Walks the parent chain from the root down to `self`, forking any
    /// ancestor whose container is itself shared, then forks `self`. Must be
    /// called before any in-place mutation.
    pub fn cow_touch(&self) -> FxCowResult<()> {
        if let Some(parent) = self.0.parent.borrow().as_ref().and_then(Weak::upgrade) {
            XRef(parent).cow_touch()?;
        }
        if self.is_readonly() {
            return Err(FilterxError::new(ErrorKind::Readonly, "Object is readonly"));
        }
        self.clone_value_if_shared();
        self.0.modified_in_place.set(true);
        Ok(())
    }

    pub fn with_container<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        let rc = self.0.value.borrow();
        let inner = rc.borrow();
        f(&inner)
    }

    pub fn with_container_mut<R>(&self, f: impl FnOnce(&mut Container) -> R) -> R {
        let rc = self.0.value.borrow();
        let mut inner = rc.borrow_mut();
        f(&mut inner)
    }

    /// Implements the "replace a shared xref with a floating one" protocol
    /// used by reads (getattr/get_subscript): if this handle is not already
    /// at home in `container` (parent mismatch, or `container` is itself
    /// shared), a new floating handle sharing the same data is returned
    /// instead of handing out the stored handle directly.
    pub fn read_through(&self, container: &XRef) -> XRef {
        if self.parent_is(container) && container.share_count() <= 1 {
            self.clone()
        } else {
            let floated = XRef(Rc::new(XRefInner {
                value: RefCell::new(Rc::clone(&self.0.value.borrow())),
                parent: RefCell::new(Some(Rc::downgrade(&container.0))),
                floating: Cell::new(true),
                readonly: Cell::new(self.is_readonly()),
                modified_in_place: Cell::new(false),
            }));
            floated
        }
    }

    pub fn deep_clone(&self) -> XRef {
        let cloned = self.with_container(|c| c.clone());
        XRef::new(cloned)
    }
}

pub type FxCowResult<T> = Result<T, FilterxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_for_store_leaves_original_untouched() {
        let original = XRef::new(Container::empty_list());
        original.with_container_mut(|c| {
            if let Container::List(v) = c {
                v.push(crate::value::Value::Int(1));
            }
        });

        let forked = original.fork_for_store();
        assert_eq!(original.share_count(), 2);

        forked.cow_touch().unwrap();
        forked.with_container_mut(|c| {
            if let Container::List(v) = c {
                v.push(crate::value::Value::Int(2));
            }
        });

        let original_len = original.with_container(|c| match c {
            Container::List(v) => v.len(),
            _ => unreachable!(),
        });
        let forked_len = forked.with_container(|c| match c {
            Container::List(v) => v.len(),
            _ => unreachable!(),
        });
        assert_eq!(original_len, 1, "mutating the fork must not leak into the original");
        assert_eq!(forked_len, 2);
    }

    #[test]
    fn cow_touch_on_unshared_ref_does_not_clone() {
        let xref = XRef::new(Container::empty_dict());
        xref.cow_touch().unwrap();
        assert_eq!(xref.share_count(), 1);
        assert!(xref.is_modified_in_place());
    }

    #[test]
    fn cow_touch_rejects_readonly() {
        let xref = XRef::new(Container::empty_list());
        xref.make_readonly();
        assert!(xref.cow_touch().is_err());
    }

    #[test]
    fn read_through_floats_a_value_read_out_of_a_shared_parent() {
        let parent = XRef::new(Container::empty_dict());
        let child = XRef::new(Container::empty_list());
        child.ground_in(&parent);
        assert!(!child.is_floating());

        let shared_parent = parent.clone();
        let _ = shared_parent.share_count();
        let floated = child.read_through(&parent);
        assert!(floated.is_floating());
    }
}
