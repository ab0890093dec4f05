use crate::card::{Card, Suit, NUM_CARDS_DECK, NUM_RANKS};
use crate::rules::{self, RecycleMode, Ruleset};
use arrayvec::ArrayVec;
use std::fmt;

pub const NUM_TABLEAU: usize = 7;
pub const NUM_FOUNDATIONS: usize = 4;

pub const SCORE_TABLEAU_TO_FOUNDATION: i32 = 10;
pub const SCORE_WASTE_TO_FOUNDATION: i32 = 10;
pub const SCORE_WASTE_TO_TABLEAU: i32 = 5;
pub const SCORE_FOUNDATION_TO_TABLEAU: i32 = -15;

pub type FoundationPile = ArrayVec<Card, NUM_RANKS>;

/// A full board. Every clone owns independent piles, so snapshots never alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    pub tableau: [Vec<Card>; NUM_TABLEAU],
    pub foundation: [FoundationPile; NUM_FOUNDATIONS],
    /// Top is the last card.
    pub stock: Vec<Card>,
    /// Top is the last card.
    pub waste: Vec<Card>,
    pub is_game_over: bool,
    pub score: i32,
    pub redeals_remaining: i32,
    pub rules: Ruleset,
}

/// What a single `draw` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawResult {
    pub recycled: bool,
    pub drawn: usize,
}

impl DrawResult {
    pub fn changed(&self) -> bool {
        self.recycled || self.drawn > 0
    }
}

impl GameState {
    pub fn new(rules: Ruleset) -> Self {
        Self {
            tableau: Default::default(),
            foundation: Default::default(),
            stock: Vec::new(),
            waste: Vec::new(),
            is_game_over: false,
            score: 0,
            redeals_remaining: rules.initial_redeals_remaining(),
            rules,
        }
    }

    /// Column i takes i + 1 cards from the front of `deck`, only the last one
    /// face up; the rest becomes the face-down stock.
    pub fn deal(deck: &[Card], rules: Ruleset) -> Self {
        let mut state = Self::new(rules);
        let mut cards = deck.iter().copied();
        for (column, pile) in state.tableau.iter_mut().enumerate() {
            for row in 0..=column {
                if let Some(card) = cards.next() {
                    pile.push(card.flipped(row == column));
                }
            }
        }
        state.stock = cards.map(|card| card.flipped(false)).collect();
        state
    }

    pub fn total_cards(&self) -> usize {
        self.tableau.iter().map(Vec::len).sum::<usize>()
            + self.foundation.iter().map(ArrayVec::len).sum::<usize>()
            + self.stock.len()
            + self.waste.len()
    }

    pub fn foundation_cards(&self) -> usize {
        self.foundation.iter().map(ArrayVec::len).sum()
    }

    pub fn is_complete_deck(&self) -> bool {
        self.total_cards() == NUM_CARDS_DECK
    }

    pub fn can_recycle(&self) -> bool {
        !self.waste.is_empty()
            && (self.rules.has_unlimited_redeals() || self.redeals_remaining > 0)
    }

    fn recycle(&mut self) -> bool {
        if !self.stock.is_empty() || !self.can_recycle() {
            return false;
        }
        let mut recycled: Vec<Card> =
            self.waste.drain(..).map(|card| card.flipped(false)).collect();
        if self.rules.recycle == RecycleMode::Reverse {
            recycled.reverse();
        }
        self.stock = recycled;
        if !self.rules.has_unlimited_redeals() {
            self.redeals_remaining = (self.redeals_remaining - 1).max(0);
        }
        true
    }

    pub fn can_draw(&self) -> bool {
        !self.stock.is_empty() || self.can_recycle()
    }

    /// Recycles the waste if the stock is empty, then turns up to
    /// `rules.draw` cards onto the waste.
    pub fn draw(&mut self) -> DrawResult {
        let recycled = self.stock.is_empty() && self.recycle();
        let count = (self.rules.draw as usize).min(self.stock.len());
        for _ in 0..count {
            if let Some(card) = self.stock.pop() {
                self.waste.push(card.flipped(true));
            }
        }
        DrawResult {
            recycled,
            drawn: count,
        }
    }

    /// Deepest index of the movable run on `from` whose lead fits `to`.
    pub fn sequence_start_for(&self, from: usize, to: usize) -> Option<usize> {
        if from == to || to >= NUM_TABLEAU {
            return None;
        }
        let source = self.tableau.get(from)?;
        let run = rules::get_movable_sequence(source);
        let offset = source.len() - run.len();
        (0..run.len())
            .find(|lead| rules::can_move_sequence_to_tableau(&run[*lead..], &self.tableau[to]))
            .map(|lead| offset + lead)
    }

    pub fn can_move_tableau_run(&self, from: usize, card_index: usize, to: usize) -> bool {
        if from == to || from >= NUM_TABLEAU || to >= NUM_TABLEAU {
            return false;
        }
        let source = &self.tableau[from];
        let run = rules::get_movable_sequence(source);
        let offset = source.len() - run.len();
        card_index >= offset
            && card_index < source.len()
            && rules::can_move_sequence_to_tableau(&source[card_index..], &self.tableau[to])
    }

    pub fn move_tableau_run(&mut self, from: usize, card_index: usize, to: usize) -> bool {
        if !self.can_move_tableau_run(from, card_index, to) {
            return false;
        }
        let moved: Vec<Card> = self.tableau[from].drain(card_index..).collect();
        self.tableau[to].extend(moved);
        self.reveal_top(from);
        true
    }

    pub fn can_move_tableau_to_foundation(&self, from: usize, foundation: usize) -> bool {
        match (self.tableau.get(from), self.foundation.get(foundation)) {
            (Some(source), Some(pile)) => rules::can_move_tableau_to_foundation(source, pile),
            _ => false,
        }
    }

    pub fn move_tableau_to_foundation(&mut self, from: usize, foundation: usize) -> bool {
        if !self.can_move_tableau_to_foundation(from, foundation) {
            return false;
        }
        let Some(card) = self.tableau[from].pop() else {
            return false;
        };
        self.foundation[foundation].push(card.flipped(true));
        self.reveal_top(from);
        self.add_score(SCORE_TABLEAU_TO_FOUNDATION);
        self.update_game_over();
        true
    }

    pub fn can_move_waste_to_tableau(&self, to: usize) -> bool {
        match (self.waste.last(), self.tableau.get(to)) {
            (Some(card), Some(target)) => rules::can_move_card_to_tableau(card, target),
            _ => false,
        }
    }

    pub fn move_waste_to_tableau(&mut self, to: usize) -> bool {
        if !self.can_move_waste_to_tableau(to) {
            return false;
        }
        let Some(card) = self.waste.pop() else {
            return false;
        };
        self.tableau[to].push(card.flipped(true));
        self.add_score(SCORE_WASTE_TO_TABLEAU);
        true
    }

    pub fn can_move_waste_to_foundation(&self, foundation: usize) -> bool {
        match (self.waste.last(), self.foundation.get(foundation)) {
            (Some(card), Some(pile)) => rules::can_move_card_to_foundation(card, pile),
            _ => false,
        }
    }

    pub fn move_waste_to_foundation(&mut self, foundation: usize) -> bool {
        if !self.can_move_waste_to_foundation(foundation) {
            return false;
        }
        let Some(card) = self.waste.pop() else {
            return false;
        };
        self.foundation[foundation].push(card.flipped(true));
        self.add_score(SCORE_WASTE_TO_FOUNDATION);
        self.update_game_over();
        true
    }

    pub fn can_move_foundation_to_tableau(&self, foundation: usize, to: usize) -> bool {
        if !self.rules.allow_foundation_to_tableau {
            return false;
        }
        match (self.foundation.get(foundation), self.tableau.get(to)) {
            (Some(pile), Some(target)) => rules::can_move_foundation_to_tableau(pile, target),
            _ => false,
        }
    }

    pub fn move_foundation_to_tableau(&mut self, foundation: usize, to: usize) -> bool {
        if !self.can_move_foundation_to_tableau(foundation, to) {
            return false;
        }
        let Some(card) = self.foundation[foundation].pop() else {
            return false;
        };
        self.tableau[to].push(card);
        self.add_score(SCORE_FOUNDATION_TO_TABLEAU);
        self.update_game_over();
        true
    }

    /// First foundation pile that accepts `card`.
    pub fn foundation_for(&self, card: &Card) -> Option<usize> {
        self.foundation
            .iter()
            .position(|pile| rules::can_move_card_to_foundation(card, pile))
    }

    /// Rank value reached by the foundation holding `suit`, 0 if not started.
    pub fn foundation_height(&self, suit: Suit) -> u8 {
        self.foundation
            .iter()
            .filter_map(|pile| pile.last())
            .find(|top| top.suit == suit)
            .map_or(0, |top| top.rank.value())
    }

    fn reveal_top(&mut self, pile: usize) {
        if let Some(top) = self.tableau[pile].last_mut() {
            top.face_up = true;
        }
    }

    fn add_score(&mut self, delta: i32) {
        self.score = (self.score + delta).max(0);
    }

    fn update_game_over(&mut self) {
        self.is_game_over = rules::is_game_won(self);
    }

    /// Compact text of every zone including face state. Two boards with the
    /// same key are indistinguishable to a player.
    pub fn layout_key(&self) -> String {
        fn pile(cards: &[Card]) -> String {
            cards.iter().map(Card::code).collect::<Vec<_>>().join(",")
        }
        let tableau = self.tableau.iter().map(|p| pile(p)).collect::<Vec<_>>().join("/");
        let foundation = self.foundation.iter().map(|p| pile(p)).collect::<Vec<_>>().join("/");
        format!(
            "{}|{}|{}|{}",
            tableau,
            foundation,
            pile(&self.stock),
            pile(&self.waste)
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use crate::card::pretty_string;

        writeln!(f, "\n--------- Foundations ---------")?;
        self.foundation.iter().try_for_each(|pile| {
            write!(f, "[{}]\t", pile.last().map_or_else(|| " ".to_string(), pretty_string))
        })?;
        writeln!(f)?;
        writeln!(f, "--------- Tableaus ------------")?;
        self.tableau.iter().try_for_each(|pile| {
            pile.iter().try_for_each(|card| write!(f, "{}\t", pretty_string(card)))?;
            writeln!(f)
        })?;
        writeln!(f, "--------- Stock ---------------")?;
        writeln!(f, "{} cards", self.stock.len())?;
        writeln!(f, "--------- Waste ---------------")?;
        self.waste.iter().try_for_each(|card| write!(f, "{} ", pretty_string(card)))?;
        writeln!(f)?;
        write!(f, "Score: {}", self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{full_deck, Rank};

    fn up(suit: Suit, rank: Rank) -> Card {
        Card::face_up(suit, rank)
    }

    #[test]
    fn deal_layout() {
        let state = GameState::deal(&full_deck(), Ruleset::default());
        for (column, pile) in state.tableau.iter().enumerate() {
            assert_eq!(pile.len(), column + 1);
            assert!(pile.last().unwrap().face_up);
            assert!(pile[..column].iter().all(|card| !card.face_up));
        }
        assert_eq!(state.stock.len(), 24);
        assert!(state.stock.iter().all(|card| !card.face_up));
        assert!(state.waste.is_empty());
        assert!(state.foundation.iter().all(|pile| pile.is_empty()));
        assert!(state.is_complete_deck());
    }

    #[test]
    fn moving_a_run_reveals_the_card_below() {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            Card::new(Suit::Clubs, Rank::Two),
            up(Suit::Hearts, Rank::Nine),
            up(Suit::Clubs, Rank::Eight),
        ];
        state.tableau[1] = vec![up(Suit::Spades, Rank::Ten)];

        assert_eq!(state.sequence_start_for(0, 1), Some(1));
        assert!(state.move_tableau_run(0, 1, 1));
        assert_eq!(state.tableau[1].len(), 3);
        assert_eq!(state.tableau[0].len(), 1);
        assert!(state.tableau[0][0].face_up);
    }

    #[test]
    fn failed_moves_leave_state_untouched() {
        let mut state = GameState::deal(&full_deck(), Ruleset::default());
        let before = state.clone();
        assert!(!state.move_tableau_run(0, 0, 0));
        assert!(!state.move_tableau_run(9, 0, 1));
        assert!(!state.move_waste_to_tableau(0));
        assert!(!state.move_waste_to_foundation(0));
        assert!(!state.move_foundation_to_tableau(0, 0));
        assert!(!state.move_tableau_to_foundation(0, 7));
        assert_eq!(state.layout_key(), before.layout_key());
        assert_eq!(state.score, before.score);
    }

    #[test]
    fn score_floors_at_zero() {
        let mut state = GameState::new(Ruleset::default());
        state.foundation[0].push(up(Suit::Spades, Rank::Ace));
        state.foundation[0].push(up(Suit::Spades, Rank::Two));
        state.tableau[0] = vec![up(Suit::Hearts, Rank::Three)];
        assert!(state.move_foundation_to_tableau(0, 0));
        assert_eq!(state.score, 0);
        assert_eq!(state.tableau[0].len(), 2);
        assert!(state.move_tableau_to_foundation(0, 0));
        assert_eq!(state.score, SCORE_TABLEAU_TO_FOUNDATION);
    }

    #[test]
    fn foundation_to_tableau_respects_ruleset() {
        let mut state = GameState::new(Ruleset::default().with_foundation_to_tableau(false));
        state.foundation[0].push(up(Suit::Spades, Rank::Ace));
        state.foundation[0].push(up(Suit::Spades, Rank::Two));
        state.tableau[0] = vec![up(Suit::Hearts, Rank::Three)];
        assert!(!state.can_move_foundation_to_tableau(0, 0));
        assert!(!state.move_foundation_to_tableau(0, 0));
    }

    #[test]
    fn draw_three_turns_up_three() {
        let mut state = GameState::deal(&full_deck(), Ruleset::draw_three());
        let result = state.draw();
        assert_eq!(result.drawn, 3);
        assert!(!result.recycled);
        assert_eq!(state.waste.len(), 3);
        assert!(state.waste.iter().all(|card| card.face_up));
    }
}
