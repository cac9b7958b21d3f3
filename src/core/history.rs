//! Bounded chronological history for back-navigation.

use std::num::NonZeroUsize;

/// Fixed-capacity stack of past states with overwrite-oldest semantics.
///
/// Pushing past capacity silently evicts the oldest entry rather than failing,
/// so a long-running interactive session keeps only the most recent N states
/// reachable by back-navigation. The buffer is a classic ring: a circular
/// top/bottom index pair with modulo addressing, O(1) push, and no shifting of
/// existing elements.
///
/// # Example
///
/// ```rust
/// use std::num::NonZeroUsize;
/// use machina::BoundedHistory;
///
/// let mut history = BoundedHistory::new(NonZeroUsize::new(2).unwrap());
///
/// history.push("a");
/// history.push("b");
/// history.push("c"); // evicts "a"
///
/// assert_eq!(history.peek(), Some(&"c"));
/// assert_eq!(history.pop(), Some("c"));
/// assert_eq!(history.pop(), Some("b"));
/// assert_eq!(history.pop(), None);
/// ```
#[derive(Debug)]
pub struct BoundedHistory<T> {
    items: Vec<Option<T>>,
    top: usize,
    bottom: usize,
    capacity: NonZeroUsize,
}

impl<T> BoundedHistory<T> {
    /// Create an empty history with a fixed capacity.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: (0..capacity.get()).map(|_| None).collect(),
            top: 0,
            bottom: 0,
            capacity,
        }
    }

    /// Push an item onto the logical top, evicting the oldest entry first
    /// when the buffer is full. Returns a reference to the stored item.
    pub fn push(&mut self, item: T) -> &mut T {
        if self.top != self.bottom && self.top - self.bottom == self.capacity.get() {
            self.bottom += 1;
        }

        self.top += 1;
        let slot = (self.top - 1) % self.capacity.get();
        self.items[slot].insert(item)
    }

    /// Most recently pushed, not-yet-popped item.
    pub fn peek(&self) -> Option<&T> {
        if self.top == self.bottom {
            None
        } else {
            self.items[(self.top - 1) % self.capacity.get()].as_ref()
        }
    }

    /// Remove and return the logical top. Empty history yields `None`.
    pub fn pop(&mut self) -> Option<T> {
        if self.top == self.bottom {
            return None;
        }

        let item = self.items[(self.top - 1) % self.capacity.get()].take();
        self.top -= 1;
        item
    }

    /// Number of retrievable entries.
    pub fn len(&self) -> usize {
        self.top - self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.top == self.bottom
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
