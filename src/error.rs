use core::alloc::Layout;
use core::fmt;

use thiserror::Error;

/// The error returned by [`Stack::try_push`](crate::Stack::try_push) when the node for the value
/// could not be allocated.
///
/// The value that was being pushed is handed back to the caller.
#[derive(Error)]
#[error("failed to allocate a stack node of {} bytes", .layout.size())]
pub struct TryPushError<T> {
    value: T,
    layout: Layout,
}

impl<T> TryPushError<T> {
    pub(crate) fn new(value: T, layout: Layout) -> Self {
        Self { value, layout }
    }

    /// Returns the layout of the allocation that failed.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Recovers the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.value
    }
}

// `T` need not be `Debug`; the payload is not printed.
impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryPushError")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
