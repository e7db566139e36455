use shared::domain::Roster;

/// Which roster entry is on the display. Nothing is selected until the first
/// scroll, and marks are refused until then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionCursor {
    selected: Option<usize>,
}

impl SelectionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Selects the next student, wrapping to the first after the last.
    pub fn advance(&mut self, roster: &Roster) -> usize {
        let len = roster.len().max(1);
        let next = match self.selected {
            None => 0,
            Some(index) => (index + 1) % len,
        };
        self.selected = Some(next);
        next
    }
}

#[cfg(test)]
#[path = "tests/cursor_tests.rs"]
mod tests;
