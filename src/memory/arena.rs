/// Contiguous owner of a fixed set of values released together.
///
/// Values are only ever appended; slots keep their position for the arena's
/// whole lifetime so positions can stand in for pointers.
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends `value`, returning the position it will keep.
    pub fn allocate(&mut self, value: T) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
