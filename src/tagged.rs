//! A head pointer paired with a version counter, swapped as one 128-bit word.
//!
//! The pointer occupies the low 64 bits and the version the high 64 bits. Every successful
//! [`TaggedHead::compare_exchange`] installs `version + 1`, so a stale snapshot never matches again
//! even if the same address comes back as head.

use core::marker::PhantomData;
use core::mem;
use core::ptr;

use portable_atomic::{AtomicU128, Ordering};
use static_assertions::const_assert;

use crate::base::Node;

const_assert!(mem::size_of::<usize>() <= mem::size_of::<u64>());

const VERSION_SHIFT: u32 = 64;

/// A snapshot of a [`TaggedHead`].
#[derive(Debug)]
pub(crate) struct Tagged<T> {
    ptr: *const Node<T>,
    version: u64,
}

impl<T> Clone for Tagged<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Tagged<T> {}

impl<T> PartialEq for Tagged<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.version == other.version
    }
}

impl<T> Eq for Tagged<T> {}

impl<T> Tagged<T> {
    pub(crate) fn new(ptr: *const Node<T>, version: u64) -> Self {
        Self { ptr, version }
    }

    pub(crate) fn ptr(&self) -> *const Node<T> {
        self.ptr
    }

    #[cfg(test)]
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    #[cfg(test)]
    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Dereferences the pointer.
    ///
    /// # Safety
    ///
    /// The pointer should be null or point to a node that is not yet reclaimed.
    pub(crate) unsafe fn as_ref<'g>(&self) -> Option<&'g Node<T>> {
        unsafe { self.ptr.as_ref() }
    }

    fn into_word(self) -> u128 {
        (self.ptr as usize as u128) | (u128::from(self.version) << VERSION_SHIFT)
    }

    fn from_word(word: u128) -> Self {
        Self {
            ptr: word as u64 as usize as *const Node<T>,
            version: (word >> VERSION_SHIFT) as u64,
        }
    }
}

/// An atomic (pointer, version) pair.
#[derive(Debug)]
pub(crate) struct TaggedHead<T> {
    word: AtomicU128,
    _marker: PhantomData<*const Node<T>>,
}

impl<T> Default for TaggedHead<T> {
    fn default() -> Self {
        Self {
            word: AtomicU128::new(Tagged::<T>::new(ptr::null(), 0).into_word()),
            _marker: PhantomData,
        }
    }
}

impl<T> TaggedHead<T> {
    /// Loads the current pointer and version.
    pub(crate) fn load(&self, ord: Ordering) -> Tagged<T> {
        Tagged::from_word(self.word.load(ord))
    }

    /// Stores `new` with the version following `current`'s if the head still equals `current`,
    /// comparing the pointer and the version together.
    ///
    /// Returns the installed pair on success and the actual current pair on failure.
    pub(crate) fn compare_exchange(
        &self,
        current: Tagged<T>,
        new: *const Node<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Tagged<T>, Tagged<T>> {
        let next = Tagged::new(new, current.version.wrapping_add(1));
        self.word
            .compare_exchange(current.into_word(), next.into_word(), success, failure)
            .map(|_| next)
            .map_err(Tagged::from_word)
    }

    /// Takes the pair out, leaving a null head with version 0.
    pub(crate) fn take(&mut self) -> Tagged<T> {
        Tagged::from_word(mem::take(self.word.get_mut()))
    }
}
