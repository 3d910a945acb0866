//! The "is this instance still valid" predicate consulted by every deferred callback.
//!
//! A [`Lifecycle`] is owned by a scene and is alive from construction until teardown
//! begins. Deferred work holds a [`Guard`], a cheap read-only view of the same flag, and
//! returns without touching anything once the guard reports the owner gone.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug)]
pub struct Lifecycle {
    alive: Rc<Cell<bool>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Hands out a view of the flag for deferred callbacks to check.
    pub fn guard(&self) -> Guard {
        Guard {
            alive: Rc::clone(&self.alive),
        }
    }

    /// Flips the flag to dead. Returns `true` only for the call that actually flipped it,
    /// so the caller knows whether the rest of its teardown still has to run.
    pub fn begin_teardown(&self) -> bool {
        self.alive.replace(false)
    }
}

// A dropped owner can never be revived, so outstanding guards must see it dead.
impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.alive.set(false);
    }
}

/// A read-only view of a [`Lifecycle`] flag.
#[derive(Debug, Clone)]
pub struct Guard {
    alive: Rc<Cell<bool>>,
}

impl Guard {
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// A guard that is always alive, for work not owned by any scene.
    pub fn detached() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }
}
