use super::turn::Turn;

/// Ordered, append-only log of turns for one session.
///
/// Turns are never edited or removed individually; `reset` is the only way
/// to shrink the store and it always clears everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStore {
    turns: Vec<Turn>,
}

impl TurnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        let last = self.turns.len() - 1;
        &self.turns[last]
    }

    pub fn snapshot(&self) -> &[Turn] {
        self.turns.as_slice()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
