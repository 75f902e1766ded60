use core::mem;
use core::sync::atomic::{AtomicIsize, Ordering};

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use crossbeam_utils::CachePadded;

use crate::base::{Contention, Node, Stack};

/// Treiber's lock-free stack.
///
/// Usable with any number of producers and consumers. Popped nodes are reclaimed through
/// `crossbeam_epoch`.
#[derive(Debug)]
pub struct TreiberStack<T> {
    head: CachePadded<Atomic<Node<T>>>,
    len: CachePadded<AtomicIsize>,
    contention: Contention,
}

// Payloads are moved in by `push` and shared by `peek`, so `Sync` needs `T: Sync` as well.
unsafe impl<T: Send> Send for TreiberStack<T> {}
unsafe impl<T: Send + Sync> Sync for TreiberStack<T> {}

impl<T> Default for TreiberStack<T> {
    fn default() -> Self {
        Self {
            head: CachePadded::new(Atomic::null()),
            len: CachePadded::new(AtomicIsize::new(0)),
            contention: Contention::default(),
        }
    }
}

impl<T> TreiberStack<T> {
    /// Creates a new, empty stack.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Stack<T> for TreiberStack<T> {
    fn try_push_node(
        &self,
        mut node: Owned<Node<T>>,
        guard: &Guard,
    ) -> Result<(), Owned<Node<T>>> {
        let head = self.head.load(Ordering::Relaxed, guard);
        node.next = head.as_raw();

        self.head
            .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, guard)
            .map(|_| {
                let _ = self.len.fetch_add(1, Ordering::Relaxed);
            })
            .map_err(|e| e.new)
    }

    fn try_pop(&self, guard: &Guard) -> Result<Option<T>, ()>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Acquire, guard);
        let Some(h) = (unsafe { head.as_ref() }) else {
            return Ok(None);
        };
        let next = Shared::from(h.next);

        let _ = self
            .head
            .compare_exchange(head, next, Ordering::Relaxed, Ordering::Relaxed, guard)
            .map_err(|_| ())?;
        let _ = self.len.fetch_sub(1, Ordering::Relaxed);

        // `head` is unreachable now, but concurrent `top` callers may still be reading its payload,
        // so the payload stays in place and is dropped together with the node.
        let result = h.data.clone();

        // SAFETY: `head` is unreachable, and we no longer access `head`.
        unsafe { guard.defer_destroy(head) };

        Ok(Some(result))
    }

    fn top<'g>(&'g self, guard: &'g Guard) -> Option<&'g T> {
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: nodes reachable from `head` are only destroyed after `guard` is unpinned.
        unsafe { head.as_ref() }.map(|h| &h.data)
    }

    fn size(&self) -> usize {
        // A pop may decrement before the matching push increments.
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    fn contention(&self) -> &Contention {
        &self.contention
    }
}

impl<T> Drop for TreiberStack<T> {
    fn drop(&mut self) {
        let mut o_curr = mem::take(&mut *self.head);
        #[cfg(feature = "tracing")]
        let mut released = 0usize;

        // SAFETY: All non-null nodes made were valid, and we have unique ownership via `&mut self`.
        while let Some(curr) = unsafe { o_curr.try_into_owned() }.map(Owned::into_box) {
            o_curr = curr.next.into();
            #[cfg(feature = "tracing")]
            {
                released += 1;
            }
        }

        #[cfg(feature = "tracing")]
        {
            if released > 0 {
                tracing::debug!(released, "dropped non-empty treiber stack");
            }
        }
    }
}
