use crate::state::GameState;

/// Linear undo/redo over full board snapshots. `cursor` always points at the
/// current snapshot; saving truncates anything after it.
#[derive(Clone, Debug, Default)]
pub struct UndoManager {
    history: Vec<GameState>,
    cursor: usize,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self, state: &GameState) {
        if !self.history.is_empty() {
            self.history.truncate(self.cursor + 1);
        }
        self.history.push(state.clone());
        self.cursor = self.history.len() - 1;
    }

    pub fn undo(&mut self) -> Option<&GameState> {
        if !self.has_undo() {
            return None;
        }
        self.cursor -= 1;
        self.history.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&GameState> {
        if !self.has_redo() {
            return None;
        }
        self.cursor += 1;
        self.history.get(self.cursor)
    }

    pub fn has_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn has_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    pub fn current(&self) -> Option<&GameState> {
        self.history.get(self.cursor)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Ruleset;

    fn state_with_score(score: i32) -> GameState {
        let mut state = GameState::new(Ruleset::default());
        state.score = score;
        state
    }

    #[test]
    fn empty_history_has_nothing_to_undo() {
        let mut undo = UndoManager::new();
        assert!(!undo.has_undo());
        assert!(!undo.has_redo());
        assert!(undo.undo().is_none());
        assert!(undo.redo().is_none());
    }

    #[test]
    fn undo_then_redo_walks_the_cursor() {
        let mut undo = UndoManager::new();
        (0..3).for_each(|score| undo.save_state(&state_with_score(score)));

        assert_eq!(undo.undo().map(|s| s.score), Some(1));
        assert_eq!(undo.undo().map(|s| s.score), Some(0));
        assert!(undo.undo().is_none());
        assert_eq!(undo.redo().map(|s| s.score), Some(1));
        assert!(undo.has_redo());
    }

    #[test]
    fn saving_truncates_forward_history() {
        let mut undo = UndoManager::new();
        (0..3).for_each(|score| undo.save_state(&state_with_score(score)));
        undo.undo();
        undo.undo();
        undo.save_state(&state_with_score(10));

        assert_eq!(undo.len(), 2);
        assert!(!undo.has_redo());
        assert_eq!(undo.current().map(|s| s.score), Some(10));
    }

    #[test]
    fn snapshots_do_not_alias() {
        let mut undo = UndoManager::new();
        let mut state = state_with_score(0);
        undo.save_state(&state);
        state.tableau[0].push(crate::card::full_deck()[0]);
        assert!(undo.current().unwrap().tableau[0].is_empty());
    }
}
