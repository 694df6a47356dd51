//! Consumption-ordered response slots.

/// Responses declared for one expectation, handed out in declaration order.
///
/// Slots before `cursor` are consumed, the rest are not. Consumption only
/// ever moves the cursor forward, so a slot flips from unconsumed to
/// consumed exactly once and the first unconsumed slot is always next.
#[derive(Debug, Clone)]
pub struct ResponseSlots<R> {
    slots: Vec<R>,
    cursor: usize,
}

impl<R> Default for ResponseSlots<R> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
        }
    }
}

impl<R> ResponseSlots<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: R) {
        self.slots.push(response);
    }

    pub fn has_unconsumed(&self) -> bool {
        self.cursor < self.slots.len()
    }

    /// Mark the first unconsumed slot consumed and return it.
    pub fn consume(&mut self) -> Option<&R> {
        let slot = self.slots.get(self.cursor)?;
        self.cursor += 1;
        Some(slot)
    }

    pub fn unconsumed(&self) -> &[R] {
        &self.slots[self.cursor..]
    }

    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
