//! The stateful game: one live board plus its history, timer and identity.
//! Every player action goes through here and is all-or-nothing.

use crate::codec::{self, SavedGame};
use crate::error::CodecError;
use crate::identity;
use crate::moves::{legal_moves, prioritized_moves, Move, SolverResult};
use crate::rng::shuffled_deck;
use crate::rules::Ruleset;
use crate::solver::{SolverLimits, Strategy};
use crate::state::{DrawResult, GameState};
use crate::stats::{Outcome, SolveStats};
use crate::undo::UndoManager;
use crate::unsolvable::{
    inherent_unsolvability, play_state_unwinnability, LayoutLedger, UnsolvableReason,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now_ms)))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct GameEngine<C: Clock = SystemClock> {
    state: GameState,
    seed: Option<u64>,
    deal_id: Option<String>,
    // The original deal, when the seed is known.
    initial_state: Option<GameState>,
    undo: UndoManager,
    ledger: LayoutLedger,
    move_count: u32,
    started_at: Option<u64>,
    paused_at: Option<u64>,
    total_paused_ms: u64,
    finished_at: Option<u64>,
    clock: C,
}

impl GameEngine<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for GameEngine<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> GameEngine<C> {
    /// An engine with an empty board; call `start_game` to deal.
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: GameState::new(Ruleset::default()),
            seed: None,
            deal_id: None,
            initial_state: None,
            undo: UndoManager::new(),
            ledger: LayoutLedger::default(),
            move_count: 0,
            started_at: None,
            paused_at: None,
            total_paused_ms: 0,
            finished_at: None,
            clock,
        }
    }

    pub fn start_game(&mut self, seed: u64, rules: Ruleset) {
        let deck = shuffled_deck(seed);
        self.state = GameState::deal(&deck, rules);
        self.seed = Some(seed);
        self.deal_id = Some(identity::deal_id(&rules, seed, &deck));
        self.initial_state = Some(self.state.clone());
        self.move_count = 0;
        self.started_at = None;
        self.paused_at = None;
        self.total_paused_ms = 0;
        self.finished_at = None;
        self.undo.clear();
        self.undo.save_state(&self.state);
        self.ledger.clear();
        self.ledger.record(&self.state);
        log::debug!(
            "dealt seed {} as {}",
            seed,
            self.deal_id.as_deref().unwrap_or_default()
        );
    }

    /// Bookkeeping after a successful mutation.
    fn commit(&mut self) {
        let now = self.clock.now_ms();
        self.move_count += 1;
        self.started_at.get_or_insert(now);
        self.undo.save_state(&self.state);
        self.ledger.record(&self.state);
        if self.state.is_game_over && self.finished_at.is_none() {
            self.finished_at = Some(now);
            log::debug!("game won after {} moves", self.move_count);
        }
    }

    fn committed(&mut self, moved: bool) -> bool {
        if moved {
            self.commit();
        }
        moved
    }

    pub fn can_draw(&self) -> bool {
        self.state.can_draw()
    }

    /// Recycles the waste when the stock is empty, then turns cards over.
    /// A draw that changes nothing is not a move.
    pub fn draw(&mut self) -> DrawResult {
        let result = self.state.draw();
        self.committed(result.changed());
        result
    }

    pub fn can_move_tableau_to_tableau(&self, from: usize, to: usize) -> bool {
        self.state.sequence_start_for(from, to).is_some()
    }

    /// Moves the longest run from `from` that fits on `to`.
    pub fn move_tableau_to_tableau(&mut self, from: usize, to: usize) -> bool {
        match self.state.sequence_start_for(from, to) {
            Some(card_index) => self.move_tableau_to_tableau_from_index(from, card_index, to),
            None => false,
        }
    }

    pub fn can_move_tableau_to_tableau_from_index(
        &self,
        from: usize,
        card_index: usize,
        to: usize,
    ) -> bool {
        self.state.can_move_tableau_run(from, card_index, to)
    }

    pub fn move_tableau_to_tableau_from_index(
        &mut self,
        from: usize,
        card_index: usize,
        to: usize,
    ) -> bool {
        let moved = self.state.move_tableau_run(from, card_index, to);
        self.committed(moved)
    }

    pub fn can_move_tableau_to_foundation(&self, from: usize, foundation: usize) -> bool {
        self.state.can_move_tableau_to_foundation(from, foundation)
    }

    pub fn move_tableau_to_foundation(&mut self, from: usize, foundation: usize) -> bool {
        let moved = self.state.move_tableau_to_foundation(from, foundation);
        self.committed(moved)
    }

    pub fn can_move_foundation_to_tableau(&self, foundation: usize, to: usize) -> bool {
        self.state.can_move_foundation_to_tableau(foundation, to)
    }

    pub fn move_foundation_to_tableau(&mut self, foundation: usize, to: usize) -> bool {
        let moved = self.state.move_foundation_to_tableau(foundation, to);
        self.committed(moved)
    }

    pub fn can_move_waste_to_tableau(&self, to: usize) -> bool {
        self.state.can_move_waste_to_tableau(to)
    }

    pub fn move_waste_to_tableau(&mut self, to: usize) -> bool {
        let moved = self.state.move_waste_to_tableau(to);
        self.committed(moved)
    }

    pub fn can_move_waste_to_foundation(&self, foundation: usize) -> bool {
        self.state.can_move_waste_to_foundation(foundation)
    }

    pub fn move_waste_to_foundation(&mut self, foundation: usize) -> bool {
        let moved = self.state.move_waste_to_foundation(foundation);
        self.committed(moved)
    }

    /// Replays one move through the regular executors.
    pub fn apply(&mut self, mv: &Move) -> bool {
        match *mv {
            Move::TableauToTableau {
                from,
                card_index,
                to,
            } => self.move_tableau_to_tableau_from_index(from, card_index, to),
            Move::TableauToFoundation { from, foundation } => {
                self.move_tableau_to_foundation(from, foundation)
            }
            Move::WasteToTableau { to } => self.move_waste_to_tableau(to),
            Move::WasteToFoundation { foundation } => self.move_waste_to_foundation(foundation),
            Move::FoundationToTableau { foundation, to } => {
                self.move_foundation_to_tableau(foundation, to)
            }
            Move::Draw => self.draw().changed(),
        }
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.state)
    }

    pub fn hint(&self) -> Option<Move> {
        prioritized_moves(&self.state).into_iter().next()
    }

    // Snapshots carry the board; the redeal counter stays where play left it.
    fn restore_snapshot(&mut self, snapshot: GameState) {
        let redeals_remaining = self.state.redeals_remaining;
        self.state = snapshot;
        self.state.redeals_remaining = redeals_remaining;
        self.move_count += 1;
    }

    pub fn undo(&mut self) -> bool {
        match self.undo.undo().cloned() {
            Some(snapshot) => {
                self.restore_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.undo.redo().cloned() {
            Some(snapshot) => {
                self.restore_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn has_undo(&self) -> bool {
        self.undo.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.undo.has_redo()
    }

    /// Only a running, unfinished game can be paused.
    pub fn pause(&mut self) -> bool {
        if self.started_at.is_none() || self.finished_at.is_some() || self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(self.clock.now_ms());
        true
    }

    pub fn resume(&mut self) -> bool {
        match self.paused_at.take() {
            Some(paused_at) => {
                self.total_paused_ms += self.clock.now_ms().saturating_sub(paused_at);
                true
            }
            None => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn elapsed_ms(&self) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let end = self
            .finished_at
            .or(self.paused_at)
            .unwrap_or_else(|| self.clock.now_ms());
        end.saturating_sub(started_at)
            .saturating_sub(self.total_paused_ms)
    }

    pub fn save_to_string(&self) -> String {
        codec::encode(&SavedGame {
            state: self.state.clone(),
            seed: self.seed,
            deal_id: self.deal_id.clone(),
            move_count: self.move_count,
            started_at: self.started_at,
            paused_at: self.paused_at,
            total_paused_ms: self.total_paused_ms,
            finished_at: self.finished_at,
        })
    }

    /// Replaces the live game with a saved one. The undo history is kept and
    /// gains the restored board as its newest entry. Layouts seen so far are
    /// forgotten unless the save continues the same deal. On error nothing
    /// changes.
    pub fn restore_from_string(&mut self, saved: &str) -> Result<(), CodecError> {
        let saved = codec::decode(saved)?;
        let rules = saved.state.rules;
        let initial_deck = saved.seed.map(shuffled_deck);

        let deal_id = saved.deal_id.or_else(|| {
            saved
                .seed
                .zip(initial_deck.as_deref())
                .map(|(seed, deck)| identity::deal_id(&rules, seed, deck))
        });
        if deal_id.is_none() || deal_id != self.deal_id {
            self.ledger.clear();
        }
        self.deal_id = deal_id;
        self.initial_state = initial_deck.map(|deck| GameState::deal(&deck, rules));
        self.state = saved.state;
        self.seed = saved.seed;
        self.move_count = saved.move_count;
        self.started_at = saved.started_at;
        self.paused_at = saved.paused_at;
        self.total_paused_ms = saved.total_paused_ms;
        self.finished_at = saved.finished_at;
        self.undo.save_state(&self.state);
        self.ledger.record(&self.state);
        log::debug!("restored game {:?} at move {}", self.deal_id, self.move_count);
        Ok(())
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn rules(&self) -> &Ruleset {
        &self.state.rules
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn deal_id(&self) -> Option<&str> {
        self.deal_id.as_deref()
    }

    pub fn layout_id(&self) -> String {
        identity::layout_id(&self.state)
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn score(&self) -> i32 {
        self.state.score
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<u64> {
        self.finished_at
    }

    /// Structural verdict on the original deal, or on the current board when
    /// the deal is unknown.
    pub fn inherent_unsolvability(&self) -> Option<UnsolvableReason> {
        inherent_unsolvability(self.initial_state.as_ref().unwrap_or(&self.state))
    }

    pub fn play_state_verdict(&self) -> Option<UnsolvableReason> {
        play_state_unwinnability(&self.state, &self.ledger)
    }

    /// Searches from a private copy of the current board. Apply the returned
    /// moves with `apply` to replay them.
    pub fn solve(&self, strategy: Strategy, limits: &SolverLimits) -> SolverResult {
        strategy.solve(&self.state.clone(), limits)
    }

    /// Summary record for the solve log; `None` until a deal is known.
    pub fn solve_stats(
        &self,
        outcome: Outcome,
        client: &str,
        platform: &str,
    ) -> Option<SolveStats> {
        let deal_id = self.deal_id.clone()?;
        Some(SolveStats {
            deal_id,
            seed: self.seed,
            rules: self.state.rules,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(|| self.clock.now_ms()),
            duration_ms: self.elapsed_ms(),
            move_count: self.move_count,
            outcome,
            score: self.state.score,
            layout_id: self.layout_id(),
            client: client.to_string(),
            platform: platform.to_string(),
        })
    }
}
