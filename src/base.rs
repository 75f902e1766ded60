use core::alloc::Layout;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc;

use crossbeam_epoch::{pin, Guard, Owned};
use crossbeam_utils::{Backoff, CachePadded};

use crate::error::TryPushError;

/// Number of failed attempts after which a single push or pop is reported as heavily contended.
pub const CONTENDED_RETRIES: usize = 1024;

/// A stack node.
///
/// The payload and the `next` link are written once before the node is published and never
/// change afterwards.
#[derive(Debug)]
pub struct Node<T> {
    pub(crate) data: T,
    pub(crate) next: *const Node<T>,
}

impl<T> From<T> for Node<T> {
    fn from(t: T) -> Self {
        Self {
            data: t,
            next: ptr::null(),
        }
    }
}

impl<T> Node<T> {
    /// Allocates a node for `t` without aborting on allocation failure.
    pub(crate) fn try_alloc(t: T) -> Result<Owned<Self>, TryPushError<T>> {
        let layout = Layout::new::<Self>();

        // SAFETY: `Node<T>` always contains a pointer, so `layout` is not zero-sized.
        let raw = unsafe { alloc::alloc(layout) }.cast::<Self>();
        if raw.is_null() {
            return Err(TryPushError::new(t, layout));
        }

        // SAFETY: `raw` is a fresh allocation with the layout of `Node<T>`, which is what `Box`
        // (and hence `Owned`) would have allocated.
        unsafe {
            raw.write(Self::from(t));
            Ok(Owned::from_raw(raw))
        }
    }
}

/// Failed-CAS counters of a stack.
#[derive(Debug, Default)]
pub struct Contention {
    push: CachePadded<AtomicUsize>,
    pop: CachePadded<AtomicUsize>,
}

/// A snapshot of [`Contention`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryStats {
    /// Number of push attempts that lost their CAS.
    pub push: usize,
    /// Number of pop attempts that lost their CAS.
    pub pop: usize,
}

impl RetryStats {
    /// Total number of lost CASes.
    pub fn total(&self) -> usize {
        self.push + self.pop
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
    Push,
    Pop,
}

impl Op {
    #[cfg(feature = "tracing")]
    fn as_str(self) -> &'static str {
        match self {
            Op::Push => "push",
            Op::Pop => "pop",
        }
    }
}

impl Contention {
    /// Records that the `attempt`-th try of `op` lost its CAS.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub(crate) fn record(&self, op: Op, attempt: usize) {
        let counter = match op {
            Op::Push => &self.push,
            Op::Pop => &self.pop,
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        {
            tracing::trace!(op = op.as_str(), attempt, "CAS lost, retrying");
            if attempt == CONTENDED_RETRIES {
                tracing::warn!(op = op.as_str(), attempt, "stack operation is heavily contended");
            }
        }
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> RetryStats {
        RetryStats {
            push: self.push.load(Ordering::Relaxed),
            pop: self.pop.load(Ordering::Relaxed),
        }
    }
}

/// Concurrent stack types.
///
/// Implementors provide single CAS attempts; the retry loops are shared.
pub trait Stack<T>: Default {
    /// Tries to install `node` as the new head.
    ///
    /// Returns `Ok(())` if the node is pushed; `Err(node)` if CAS failed, handing the node back
    /// for the next attempt.
    fn try_push_node(&self, node: Owned<Node<T>>, guard: &Guard) -> Result<(), Owned<Node<T>>>;

    /// Tries to pop a value from the stack.
    ///
    /// Returns `Ok(Some(v))` if `v` is popped; `Ok(None)` if the stack is empty; and `Err(())` if
    /// CAS failed.
    fn try_pop(&self, guard: &Guard) -> Result<Option<T>, ()>
    where
        T: Clone;

    /// Returns a reference to the value on top of the stack, valid while `guard` is pinned.
    fn top<'g>(&'g self, guard: &'g Guard) -> Option<&'g T>;

    /// Returns the number of values in the stack.
    ///
    /// The count is maintained next to every successful CAS, so it reflects some recent state
    /// rather than the exact state at the time of the call.
    fn size(&self) -> usize;

    /// Returns the failed-CAS counters of this stack.
    fn contention(&self) -> &Contention;

    /// Returns `true` if the stack is empty.
    fn is_empty(&self) -> bool {
        let guard = pin();
        self.top(&guard).is_none()
    }

    /// Pushes a value on top of the stack. Always returns `true`.
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the node cannot be allocated.
    fn push(&self, t: T) -> bool {
        push_node(self, Owned::new(Node::from(t)));
        true
    }

    /// Pushes a value on top of the stack, returning it inside the error if its node cannot be
    /// allocated.
    fn try_push(&self, t: T) -> Result<(), TryPushError<T>> {
        push_node(self, Node::try_alloc(t)?);
        Ok(())
    }

    /// Pops a value from the stack.
    ///
    /// Returns `Some(v)` if `v` is popped; `None` if the stack is empty.
    fn pop(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = pin();
        let backoff = Backoff::new();
        let mut attempt = 0;
        loop {
            if let Ok(result) = self.try_pop(&guard) {
                return result;
            }
            attempt += 1;
            self.contention().record(Op::Pop, attempt);
            backoff.spin();
        }
    }

    /// Returns a copy of the value on top of the stack without removing it.
    ///
    /// The value may already have been popped by the time the caller looks at it.
    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = pin();
        self.top(&guard).cloned()
    }

    /// Returns how many push and pop attempts have lost their CAS so far.
    fn retries(&self) -> RetryStats {
        self.contention().snapshot()
    }
}

fn push_node<T, S: Stack<T> + ?Sized>(stack: &S, mut node: Owned<Node<T>>) {
    let guard = pin();
    let backoff = Backoff::new();
    let mut attempt = 0;
    loop {
        match stack.try_push_node(node, &guard) {
            Ok(()) => return,
            Err(n) => node = n,
        }
        attempt += 1;
        stack.contention().record(Op::Push, attempt);
        backoff.spin();
    }
}
