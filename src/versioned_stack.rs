//! Treiber's stack with a version-tagged head.
//!
//! The head pointer and a version counter are compared and swapped as one unit, and every
//! successful push or pop bumps the version. A thread that read head `(X, k)`, got preempted while
//! others popped `X` and later pushed a different node at `X`'s address, fails its CAS because the
//! head is now `(X, k + n)`.

use core::sync::atomic::AtomicIsize;

use crossbeam_epoch::{Guard, Owned, Shared};
use crossbeam_utils::CachePadded;
use portable_atomic::Ordering;

use crate::base::{Contention, Node, Stack};
use crate::tagged::TaggedHead;

/// Lock-free stack whose head carries a version counter.
///
/// Same contract as [`TreiberStack`](crate::TreiberStack).
#[derive(Debug)]
pub struct VersionedStack<T> {
    head: CachePadded<TaggedHead<T>>,
    len: CachePadded<AtomicIsize>,
    contention: Contention,
}

unsafe impl<T: Send> Send for VersionedStack<T> {}
unsafe impl<T: Send + Sync> Sync for VersionedStack<T> {}

impl<T> Default for VersionedStack<T> {
    fn default() -> Self {
        Self {
            head: CachePadded::new(TaggedHead::default()),
            len: CachePadded::new(AtomicIsize::new(0)),
            contention: Contention::default(),
        }
    }
}

impl<T> VersionedStack<T> {
    /// Creates a new, empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful pushes and pops so far, modulo 2^64.
    #[cfg(test)]
    pub(crate) fn version(&self) -> u64 {
        self.head.load(Ordering::Acquire).version()
    }
}

impl<T> Stack<T> for VersionedStack<T> {
    fn try_push_node(
        &self,
        mut node: Owned<Node<T>>,
        guard: &Guard,
    ) -> Result<(), Owned<Node<T>>> {
        let head = self.head.load(Ordering::Relaxed);
        node.next = head.ptr();
        let node = node.into_shared(guard);

        match self
            .head
            .compare_exchange(head, node.as_raw(), Ordering::Release, Ordering::Relaxed)
        {
            Ok(_) => {
                let _ = self.len.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            // SAFETY: the CAS failed, so `node` was never published.
            Err(_) => Err(unsafe { node.into_owned() }),
        }
    }

    fn try_pop(&self, guard: &Guard) -> Result<Option<T>, ()>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: `guard` was pinned before `head` was read, so the node is not reclaimed yet.
        let Some(h) = (unsafe { head.as_ref() }) else {
            return Ok(None);
        };

        let _ = self
            .head
            .compare_exchange(head, h.next, Ordering::Relaxed, Ordering::Relaxed)
            .map_err(|_| ())?;
        let _ = self.len.fetch_sub(1, Ordering::Relaxed);

        let result = h.data.clone();

        // SAFETY: `head` is unreachable, and we no longer access it.
        unsafe { guard.defer_destroy(Shared::from(head.ptr())) };

        Ok(Some(result))
    }

    fn top<'g>(&'g self, _guard: &'g Guard) -> Option<&'g T> {
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: nodes reachable from `head` are only destroyed after `_guard` is unpinned.
        unsafe { head.as_ref() }.map(|h| &h.data)
    }

    fn size(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    fn contention(&self) -> &Contention {
        &self.contention
    }
}

impl<T> Drop for VersionedStack<T> {
    fn drop(&mut self) {
        let mut curr = self.head.take().ptr();
        #[cfg(feature = "tracing")]
        let mut released = 0usize;

        while !curr.is_null() {
            // SAFETY: every node in the chain came from `Owned`, and `&mut self` means nobody else
            // can reach it.
            let node = unsafe { Shared::from(curr).into_owned() }.into_box();
            curr = node.next;
            #[cfg(feature = "tracing")]
            {
                released += 1;
            }
        }

        #[cfg(feature = "tracing")]
        {
            if released > 0 {
                tracing::debug!(released, "dropped non-empty versioned stack");
            }
        }
    }
}
