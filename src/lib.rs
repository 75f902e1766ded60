//! Lock-free LIFO stacks.
//!
//! [`TreiberStack`] swaps a single head pointer with CAS. [`VersionedStack`] pairs the head
//! pointer with a version counter that every successful push or pop bumps, so a stale CAS fails
//! even if the head address comes back (the ABA problem).
//!
//! Both stacks reclaim popped nodes with `crossbeam_epoch`: a node unlinked by `pop` is freed only
//! after every thread that might still be reading it has unpinned. A node owns its payload until it
//! is freed, so `pop` and `peek` return clones; push `Arc<T>` for payloads that are not `Clone`.
//!
//! ```
//! use lockfree_stack::{Stack, TreiberStack};
//!
//! let stack = TreiberStack::new();
//! stack.push(1);
//! stack.push(2);
//! assert_eq!(stack.peek(), Some(2));
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.size(), 1);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::result_unit_err)]
#![deny(unsafe_op_in_unsafe_fn)]

mod base;
mod error;
mod tagged;
mod treiber_stack;
mod versioned_stack;

pub use base::{Contention, Node, RetryStats, Stack, CONTENDED_RETRIES};
pub use error::TryPushError;
pub use treiber_stack::TreiberStack;
pub use versioned_stack::VersionedStack;
