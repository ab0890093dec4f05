//! Structural proofs that a game cannot be won.
//!
//! Two separate questions are answered here. Inherent unsolvability is a
//! property of a deal: some set of tableau piles blocks itself, or a King can
//! never find a column. Play-state unwinnability belongs to the current point
//! in a game: no move is left, or the board has been seen before.

use crate::card::{Card, Rank, Suit};
use crate::moves::legal_moves;
use crate::state::{GameState, NUM_TABLEAU};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;

/// Largest pile combination examined for mutual blocks.
pub const MAX_BLOCK_PILES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnsolvableReason {
    /// The exposed cards of these piles only wait on cards buried inside them.
    IrretrievablePiles { piles: Vec<usize> },
    /// The King on this pile covers its own Queen and no column can be emptied.
    KingIrretrievable { pile: usize },
    DeadEnd,
    StateCycle,
}

impl fmt::Display for UnsolvableReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnsolvableReason::IrretrievablePiles { piles } => {
                write!(f, "piles {:?} block each other", piles)
            }
            UnsolvableReason::KingIrretrievable { pile } => {
                write!(f, "king on pile {} can never reach an empty column", pile)
            }
            UnsolvableReason::DeadEnd => write!(f, "no legal moves left"),
            UnsolvableReason::StateCycle => write!(f, "layout repeated"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Location {
    Tableau { pile: usize, face_up: bool },
    Foundation,
    Stock,
    Waste,
}

/// Layouts visited during one game, by `GameState::layout_key`.
#[derive(Clone, Debug, Default)]
pub struct LayoutLedger {
    visits: HashMap<String, u32>,
}

impl LayoutLedger {
    pub fn record(&mut self, state: &GameState) {
        *self.visits.entry(state.layout_key()).or_insert(0) += 1;
    }

    pub fn visits(&self, state: &GameState) -> u32 {
        self.visits.get(&state.layout_key()).copied().unwrap_or(0)
    }

    /// The current layout was already reached earlier in the game.
    pub fn is_revisit(&self, state: &GameState) -> bool {
        self.visits(state) > 1
    }

    pub fn clear(&mut self) {
        self.visits.clear();
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}

pub struct UnsolvableDetector<'a> {
    state: &'a GameState,
    locations: HashMap<Card, Location>,
}

impl<'a> UnsolvableDetector<'a> {
    pub fn new(state: &'a GameState) -> Self {
        let mut locations = HashMap::new();
        for (pile, cards) in state.tableau.iter().enumerate() {
            for card in cards {
                locations.insert(
                    *card,
                    Location::Tableau {
                        pile,
                        face_up: card.face_up,
                    },
                );
            }
        }
        for card in state.foundation.iter().flatten() {
            locations.insert(*card, Location::Foundation);
        }
        for card in &state.stock {
            locations.insert(*card, Location::Stock);
        }
        for card in &state.waste {
            locations.insert(*card, Location::Waste);
        }
        Self { state, locations }
    }

    /// Deal-level check: N-pile blocks for N up to `MAX_BLOCK_PILES`, then
    /// King deadlocks.
    pub fn inherent_reason(&self) -> Option<UnsolvableReason> {
        self.irretrievable_piles()
            .map(|piles| UnsolvableReason::IrretrievablePiles { piles })
            .or_else(|| {
                self.king_irretrievable()
                    .map(|pile| UnsolvableReason::KingIrretrievable { pile })
            })
    }

    pub fn is_dead_end(&self) -> bool {
        legal_moves(self.state).is_empty()
    }

    /// Play-state check against the game's own layout ledger.
    pub fn play_state_reason(&self, ledger: &LayoutLedger) -> Option<UnsolvableReason> {
        if self.is_dead_end() {
            Some(UnsolvableReason::DeadEnd)
        } else if ledger.is_revisit(self.state) {
            Some(UnsolvableReason::StateCycle)
        } else {
            None
        }
    }

    fn buried_in(&self, card: &Card, piles: &[usize]) -> bool {
        matches!(
            self.locations.get(card),
            Some(Location::Tableau { pile, face_up: false }) if piles.contains(pile)
        )
    }

    /// Index of the deepest face-up card, only for piles that still hide
    /// face-down cards beneath it.
    fn exposed_index(&self, pile: usize) -> Option<usize> {
        self.state.tableau[pile]
            .iter()
            .position(|card| card.face_up)
            .filter(|index| *index > 0)
    }

    fn foundation_path_blocked(&self, card: &Card, piles: &[usize]) -> bool {
        let reached = self.state.foundation_height(card.suit);
        ((reached + 1)..card.rank.value())
            .filter_map(Rank::from_value)
            .any(|rank| self.buried_in(&Card::new(card.suit, rank), piles))
    }

    fn tableau_path_blocked(&self, card: &Card, piles: &[usize]) -> bool {
        let Some(target_rank) = Rank::from_value(card.rank.value() + 1) else {
            // Kings wait on an empty column instead.
            return false;
        };
        Suit::ALL
            .iter()
            .filter(|suit| suit.is_red() != card.is_red())
            .all(|suit| {
                let target = Card::new(*suit, target_rank);
                self.buried_in(&target, piles)
                    || (self.locations.get(&target) == Some(&Location::Foundation)
                        && !self.state.rules.allow_foundation_to_tableau)
            })
    }

    fn is_irretrievable(&self, card: &Card, piles: &[usize]) -> bool {
        self.foundation_path_blocked(card, piles) && self.tableau_path_blocked(card, piles)
    }

    fn irretrievable_piles(&self) -> Option<Vec<usize>> {
        let candidates: Vec<usize> = (0..NUM_TABLEAU)
            .filter(|pile| self.exposed_index(*pile).is_some())
            .collect();
        (1..=MAX_BLOCK_PILES.min(candidates.len())).find_map(|size| {
            candidates.iter().copied().combinations(size).find(|piles| {
                piles.iter().all(|pile| {
                    self.exposed_index(*pile)
                        .map(|index| self.state.tableau[*pile][index])
                        .map_or(false, |card| self.is_irretrievable(&card, piles))
                })
            })
        })
    }

    fn king_irretrievable(&self) -> Option<usize> {
        if self.state.tableau.iter().any(Vec::is_empty) {
            return None;
        }
        (0..NUM_TABLEAU).find(|pile| {
            let Some(index) = self.exposed_index(*pile) else {
                return false;
            };
            let king = self.state.tableau[*pile][index];
            king.is_king()
                && self.buried_in(&Card::new(king.suit, Rank::Queen), &[*pile])
                && !(0..NUM_TABLEAU)
                    .filter(|other| other != pile)
                    .any(|other| self.can_empty(other, &mut vec![*pile]))
        })
    }

    /// Optimistic: a pile can be emptied unless its deepest face-up card is
    /// stuck on cards buried in `blocking` or in the pile itself. A King at
    /// the bottom can only leave through its foundation.
    fn can_empty(&self, pile: usize, blocking: &mut Vec<usize>) -> bool {
        let cards = &self.state.tableau[pile];
        let Some(index) = cards.iter().position(|card| card.face_up) else {
            return cards.is_empty();
        };
        let card = cards[index];
        if card.is_king() && index == 0 {
            return !self.foundation_path_blocked(&card, blocking);
        }
        blocking.push(pile);
        let result = if card.is_king() {
            !self.foundation_path_blocked(&card, blocking)
                || (0..NUM_TABLEAU)
                    .filter(|other| !blocking.contains(other))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .any(|other| self.can_empty(other, blocking))
        } else {
            !self.is_irretrievable(&card, blocking)
        };
        blocking.pop();
        result
    }
}

pub fn inherent_unsolvability(state: &GameState) -> Option<UnsolvableReason> {
    UnsolvableDetector::new(state).inherent_reason()
}

pub fn play_state_unwinnability(
    state: &GameState,
    ledger: &LayoutLedger,
) -> Option<UnsolvableReason> {
    UnsolvableDetector::new(state).play_state_reason(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::full_deck;
    use crate::rules::Ruleset;

    fn up(suit: Suit, rank: Rank) -> Card {
        Card::face_up(suit, rank)
    }

    fn down(suit: Suit, rank: Rank) -> Card {
        Card::new(suit, rank)
    }

    /// Puts every card not already placed into the stock.
    fn fill_stock(state: &mut GameState) {
        let placed: Vec<Card> = state.tableau.iter().flatten().copied().collect();
        state.stock = full_deck()
            .into_iter()
            .filter(|card| !placed.contains(card))
            .collect();
    }

    fn mutual_block() -> GameState {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            down(Suit::Hearts, Rank::Six),
            down(Suit::Clubs, Rank::Two),
            up(Suit::Spades, Rank::Five),
        ];
        state.tableau[1] = vec![
            down(Suit::Diamonds, Rank::Six),
            down(Suit::Spades, Rank::Two),
            up(Suit::Clubs, Rank::Five),
        ];
        fill_stock(&mut state);
        state
    }

    #[test]
    fn two_piles_blocking_each_other() {
        let state = mutual_block();
        assert_eq!(
            inherent_unsolvability(&state),
            Some(UnsolvableReason::IrretrievablePiles { piles: vec![0, 1] })
        );
    }

    #[test]
    fn block_dissolves_when_a_card_is_in_the_stock() {
        let mut state = mutual_block();
        // swap the buried two of spades for a stock card
        let nine = down(Suit::Spades, Rank::Nine);
        state.tableau[1][1] = nine;
        state.stock.retain(|card| *card != nine);
        state.stock.push(down(Suit::Spades, Rank::Two));
        assert_eq!(state.total_cards(), 52);
        assert_eq!(inherent_unsolvability(&state), None);
    }

    #[test]
    fn single_pile_self_block() {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            down(Suit::Diamonds, Rank::Eight),
            down(Suit::Hearts, Rank::Eight),
            down(Suit::Clubs, Rank::Three),
            up(Suit::Clubs, Rank::Seven),
        ];
        fill_stock(&mut state);
        assert_eq!(
            inherent_unsolvability(&state),
            Some(UnsolvableReason::IrretrievablePiles { piles: vec![0] })
        );
    }

    fn king_deadlock() -> GameState {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            down(Suit::Spades, Rank::Queen),
            down(Suit::Diamonds, Rank::Queen),
            down(Suit::Hearts, Rank::Queen),
            down(Suit::Clubs, Rank::Queen),
            down(Suit::Spades, Rank::Two),
            up(Suit::Spades, Rank::King),
        ];
        state.tableau[1] = vec![up(Suit::Hearts, Rank::King)];
        state.tableau[2] = vec![up(Suit::Diamonds, Rank::King)];
        state.tableau[3] = vec![up(Suit::Clubs, Rank::King)];
        state.tableau[4] = vec![down(Suit::Clubs, Rank::Three), up(Suit::Spades, Rank::Jack)];
        state.tableau[5] = vec![
            down(Suit::Hearts, Rank::Jack),
            down(Suit::Diamonds, Rank::Jack),
            up(Suit::Spades, Rank::Ten),
        ];
        state.tableau[6] = vec![
            down(Suit::Hearts, Rank::Ten),
            down(Suit::Diamonds, Rank::Ten),
            up(Suit::Spades, Rank::Nine),
        ];
        fill_stock(&mut state);
        state
    }

    #[test]
    fn king_with_no_column_to_land_on() {
        let state = king_deadlock();
        assert_eq!(state.total_cards(), 52);
        assert_eq!(
            inherent_unsolvability(&state),
            Some(UnsolvableReason::KingIrretrievable { pile: 0 })
        );
    }

    #[test]
    fn king_is_fine_when_a_column_can_be_cleared() {
        let mut state = king_deadlock();
        let freed: Vec<Card> = state.tableau[6].drain(..).collect();
        state.stock.extend(freed.into_iter().map(|card| card.flipped(false)));
        assert_eq!(inherent_unsolvability(&state), None);

        let mut state = king_deadlock();
        // nine of spades can now climb onto the red ten in the stock
        state.tableau[6][0] = down(Suit::Clubs, Rank::Ten);
        state.stock.retain(|card| *card != down(Suit::Clubs, Rank::Ten));
        state.stock.push(down(Suit::Hearts, Rank::Ten));
        assert_eq!(inherent_unsolvability(&state), None);
    }

    #[test]
    fn lone_king_can_leave_through_its_foundation() {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            down(Suit::Spades, Rank::Queen),
            down(Suit::Diamonds, Rank::Three),
            down(Suit::Spades, Rank::Six),
            down(Suit::Clubs, Rank::Six),
            down(Suit::Spades, Rank::Eight),
            down(Suit::Clubs, Rank::Eight),
            down(Suit::Spades, Rank::Ten),
            down(Suit::Clubs, Rank::Ten),
            up(Suit::Spades, Rank::King),
        ];
        state.tableau[1] = vec![up(Suit::Hearts, Rank::King)];
        state.tableau[2] = vec![up(Suit::Diamonds, Rank::King)];
        state.tableau[3] = vec![up(Suit::Clubs, Rank::King)];
        state.tableau[4] = vec![up(Suit::Diamonds, Rank::Five)];
        state.tableau[5] = vec![up(Suit::Diamonds, Rank::Seven)];
        state.tableau[6] = vec![up(Suit::Diamonds, Rank::Nine)];
        fill_stock(&mut state);
        assert_eq!(inherent_unsolvability(&state), None);

        // burying a heart in pile 0 closes the heart King's way out
        state.stock.retain(|card| *card != down(Suit::Hearts, Rank::Three));
        state.tableau[0].insert(1, down(Suit::Hearts, Rank::Three));
        assert_eq!(state.total_cards(), 52);
        assert_eq!(
            inherent_unsolvability(&state),
            Some(UnsolvableReason::KingIrretrievable { pile: 0 })
        );
    }

    #[test]
    fn fresh_deals_are_checked_deterministically() {
        let state = GameState::deal(&crate::rng::shuffled_deck(42), Ruleset::default());
        assert_eq!(inherent_unsolvability(&state), inherent_unsolvability(&state.clone()));
    }

    #[test]
    fn dead_end_and_cycle() {
        let mut state = GameState::new(Ruleset::default().with_redeals(0));
        state.tableau[0] = vec![up(Suit::Hearts, Rank::Five)];
        state.waste = vec![up(Suit::Hearts, Rank::Nine)];
        let mut ledger = LayoutLedger::default();
        ledger.record(&state);
        assert_eq!(
            play_state_unwinnability(&state, &ledger),
            Some(UnsolvableReason::DeadEnd)
        );

        let mut open = state.clone();
        open.rules = Ruleset::default();
        let mut ledger = LayoutLedger::default();
        ledger.record(&open);
        assert_eq!(play_state_unwinnability(&open, &ledger), None);
        ledger.record(&open);
        assert_eq!(
            play_state_unwinnability(&open, &ledger),
            Some(UnsolvableReason::StateCycle)
        );
    }
}
