use std::{cell::Cell, rc::Rc};

/// Counts how many [Tracked] values have been dropped
///
/// Clones share the same count.
#[derive(Clone, Debug, Default)]
pub struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    /// Makes a new counter, starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a new value that increments this counter when it's dropped
    pub fn track(&self, id: i64) -> Tracked {
        Tracked {
            id,
            counter: self.clone(),
        }
    }

    /// Returns the number of tracked values that have been dropped
    pub fn drops(&self) -> usize {
        self.0.get()
    }
}

/// A value that reports its destruction to a [DropCounter]
#[derive(Debug)]
pub struct Tracked {
    /// An identifier that tests can use to tell values apart
    pub id: i64,
    counter: DropCounter,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let drops = &self.counter.0;
        drops.set(drops.get() + 1);
        log::trace!("dropped tracked value {}", self.id);
    }
}
