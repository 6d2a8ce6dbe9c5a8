//! Scope frames with lexical parent chaining. A frame maps symbols to values
//! and optionally points at the frame it was created in; `lookup` and `set`
//! walk that chain outward to the root. Frames are reference-counted and
//! shared: every closure created inside a frame holds the same frame, so a
//! `define` or `set!` executed later is observed by all of them. This is what
//! makes recursion through `define` and stateful closures work.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Value;

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A handle to one scope frame. Cloning the handle shares the frame; use
/// [`Environment::child`] to create a new nested scope.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

impl Environment {
    /// Create a root frame with no parent.
    pub fn new() -> Self {
        Environment::default()
    }

    /// Allocate a new frame whose parent is this one. Used for function
    /// application and `let`.
    pub fn child(&self) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Install or overwrite a binding in this frame only. Ancestor frames
    /// are never consulted; this is how both local and global bindings are
    /// introduced.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Resolve a symbol by searching this frame and then its ancestors.
    /// Reaching the root without a match is an error, not a default value.
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let frame = env.frame.borrow();
            if let Some(value) = frame.bindings.get(name) {
                return Ok(value.clone());
            }
            current = frame.parent.clone();
        }
        Err(Error::UnboundSymbol(name.to_owned()))
    }

    /// Mutate an existing binding in the frame where the symbol is already
    /// bound. Unlike `define`, this never creates a binding: an unbound
    /// target is an error.
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let mut frame = env.frame.borrow_mut();
            if let Some(slot) = frame.bindings.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            let parent = frame.parent.clone();
            drop(frame);
            current = parent;
        }
        Err(Error::UnboundSymbol(name.to_owned()))
    }

    /// Two handles are equal when they reference the same frame.
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.same_frame(other)
    }
}

// Frames can reference themselves through closure bindings, so Debug prints
// only the direct binding names, never the stored values or the parent.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let frame = self.frame.borrow();
        let mut names: Vec<&str> = frame.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::val;

    #[test]
    fn test_define_and_lookup() {
        let env = Environment::new();
        env.define("x", val(1));
        assert_eq!(env.lookup("x").unwrap(), val(1));
        assert_eq!(env.lookup("y"), Err(Error::UnboundSymbol("y".into())));
    }

    #[test]
    fn test_redefine_overwrites_in_same_frame() {
        let env = Environment::new();
        env.define("x", val(1));
        env.define("x", val(2));
        assert_eq!(env.lookup("x").unwrap(), val(2));
    }

    #[test]
    fn test_child_chain_lookup_and_shadowing() {
        let root = Environment::new();
        root.define("x", val(1));
        root.define("y", val(10));

        let child = root.child();
        child.define("x", val(2));

        // first match wins, outward search
        assert_eq!(child.lookup("x").unwrap(), val(2));
        assert_eq!(child.lookup("y").unwrap(), val(10));
        // parent unaffected by the shadow
        assert_eq!(root.lookup("x").unwrap(), val(1));
    }

    #[test]
    fn test_define_in_child_does_not_leak_to_parent() {
        let root = Environment::new();
        let child = root.child();
        child.define("local", val(42));
        assert!(root.lookup("local").is_err());
    }

    #[test]
    fn test_set_mutates_owning_frame() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = root.child();

        // set! from the child mutates the frame where x is bound
        child.set("x", val(99)).unwrap();
        assert_eq!(root.lookup("x").unwrap(), val(99));

        // set! on an unbound name errors instead of creating a global
        assert_eq!(
            child.set("nope", val(0)),
            Err(Error::UnboundSymbol("nope".into()))
        );
        assert!(root.lookup("nope").is_err());
    }

    #[test]
    fn test_set_prefers_innermost_binding() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = root.child();
        child.define("x", val(2));

        child.set("x", val(3)).unwrap();
        assert_eq!(child.lookup("x").unwrap(), val(3));
        assert_eq!(root.lookup("x").unwrap(), val(1));
    }

    #[test]
    fn test_shared_frame_identity() {
        let env = Environment::new();
        let alias = env.clone();
        alias.define("x", val(7));
        assert_eq!(env.lookup("x").unwrap(), val(7));
        assert!(env.same_frame(&alias));
        assert!(!env.same_frame(&env.child()));
    }
}
