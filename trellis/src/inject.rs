use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Slot for a dependency that is assigned after its owner has been constructed.
///
/// Field injection lets two components refer to each other: the owner is built
/// first with an empty slot, and the container wires the slot once the outermost
/// resolution finishes. A slot is written at most once.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use trellis::Autowired;
///
/// let slot = Autowired::<String>::new();
/// assert!(slot.get().is_none());
///
/// assert!(slot.wire(Arc::new("ready".to_string())));
/// assert!(!slot.wire(Arc::new("ignored".to_string())));
/// assert_eq!(slot.get().as_deref().map(String::as_str), Some("ready"));
/// ```
pub struct Autowired<C: ?Sized> {
    cell: OnceCell<Arc<C>>,
}

impl<C: ?Sized> Autowired<C> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the wired value, `None` until the container has assigned it.
    pub fn get(&self) -> Option<Arc<C>> {
        self.cell.get().cloned()
    }

    /// Assigns the value. Returns `false` if the slot was already wired.
    pub fn wire(&self, value: Arc<C>) -> bool {
        self.cell.set(value).is_ok()
    }

    pub fn is_wired(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<C: ?Sized> Default for Autowired<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for Autowired<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autowired")
            .field("wired", &self.is_wired())
            .finish()
    }
}
