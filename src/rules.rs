//! Klondike move legality. Everything here is a pure predicate over card
//! slices; callers decide what to do with the answer.

use crate::card::{can_be_placed_on_top_of, Card};
use crate::state::GameState;
use serde::{Deserialize, Serialize};

pub const UNLIMITED_REDEALS: i32 = -1;

/// Order in which the waste is turned back into the stock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecycleMode {
    /// Waste bottom-to-top becomes stock bottom-to-top: the old waste top is
    /// drawn first.
    Keep,
    /// The waste is flipped over: the old waste bottom is drawn first.
    Reverse,
}

impl RecycleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecycleMode::Keep => "KEEP",
            RecycleMode::Reverse => "REVERSE",
        }
    }

    pub fn parse(value: &str) -> Option<RecycleMode> {
        match value {
            "KEEP" => Some(RecycleMode::Keep),
            "REVERSE" => Some(RecycleMode::Reverse),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Cards turned per draw, 1 or 3.
    pub draw: u8,
    /// `-1` for unlimited, otherwise the number of recycles allowed.
    pub redeals: i32,
    pub recycle: RecycleMode,
    pub allow_foundation_to_tableau: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            draw: 1,
            redeals: UNLIMITED_REDEALS,
            recycle: RecycleMode::Keep,
            allow_foundation_to_tableau: true,
        }
    }
}

impl Ruleset {
    pub fn draw_three() -> Self {
        Self {
            draw: 3,
            ..Self::default()
        }
    }

    pub fn with_redeals(self, redeals: i32) -> Self {
        Self { redeals, ..self }
    }

    pub fn with_recycle(self, recycle: RecycleMode) -> Self {
        Self { recycle, ..self }
    }

    pub fn with_foundation_to_tableau(self, allow: bool) -> Self {
        Self {
            allow_foundation_to_tableau: allow,
            ..self
        }
    }

    pub fn has_unlimited_redeals(&self) -> bool {
        self.redeals < 0
    }

    /// Starting value of the redeal countdown.
    pub fn initial_redeals_remaining(&self) -> i32 {
        if self.has_unlimited_redeals() {
            UNLIMITED_REDEALS
        } else {
            self.redeals
        }
    }
}

fn fits_on_tableau(card: &Card, target: &[Card]) -> bool {
    match target.last() {
        None => card.is_king(),
        Some(target_top) => can_be_placed_on_top_of(target_top, card),
    }
}

fn fits_on_foundation(card: &Card, foundation_pile: &[Card]) -> bool {
    match foundation_pile.last() {
        None => card.is_ace(),
        Some(foundation_top) => {
            foundation_top.suit == card.suit
                && card.rank.value() == foundation_top.rank.value() + 1
        }
    }
}

pub fn can_move_tableau_to_tableau(source: &[Card], target: &[Card]) -> bool {
    source
        .last()
        .map_or(false, |card| card.face_up && fits_on_tableau(card, target))
}

pub fn can_move_tableau_to_foundation(source: &[Card], foundation_pile: &[Card]) -> bool {
    source
        .last()
        .map_or(false, |card| card.face_up && fits_on_foundation(card, foundation_pile))
}

/// Same color/rank rule as tableau to tableau. Whether the move is allowed at
/// all is `Ruleset::allow_foundation_to_tableau`, checked by the caller.
pub fn can_move_foundation_to_tableau(foundation_pile: &[Card], target: &[Card]) -> bool {
    foundation_pile
        .last()
        .map_or(false, |card| fits_on_tableau(card, target))
}

/// Top card of the waste onto a tableau column.
pub fn can_move_card_to_tableau(card: &Card, target: &[Card]) -> bool {
    fits_on_tableau(card, target)
}

pub fn can_move_card_to_foundation(card: &Card, foundation_pile: &[Card]) -> bool {
    fits_on_foundation(card, foundation_pile)
}

/// The longest face-up run at the end of `pile` where every card sits one rank
/// below its predecessor in the alternate color. Empty if the top card is face
/// down.
pub fn get_movable_sequence(pile: &[Card]) -> &[Card] {
    match pile.last() {
        Some(top) if top.face_up => {}
        _ => return &[],
    }
    let mut start = pile.len() - 1;
    while start > 0 {
        let below = &pile[start - 1];
        if !below.face_up || !can_be_placed_on_top_of(below, &pile[start]) {
            break;
        }
        start -= 1;
    }
    &pile[start..]
}

pub fn can_move_sequence_to_tableau(sequence: &[Card], target: &[Card]) -> bool {
    sequence
        .first()
        .map_or(false, |lead| lead.face_up && fits_on_tableau(lead, target))
}

pub fn is_game_won(state: &GameState) -> bool {
    state.foundation.iter().all(|pile| pile.len() == 13)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};

    fn up(suit: Suit, rank: Rank) -> Card {
        Card::face_up(suit, rank)
    }

    fn down(suit: Suit, rank: Rank) -> Card {
        Card::new(suit, rank)
    }

    #[test]
    fn only_kings_go_to_empty_columns() {
        assert!(can_move_tableau_to_tableau(&[up(Suit::Spades, Rank::King)], &[]));
        assert!(!can_move_tableau_to_tableau(&[up(Suit::Spades, Rank::Queen)], &[]));
    }

    #[test]
    fn tableau_to_tableau_needs_face_up_source() {
        let target = [up(Suit::Hearts, Rank::Nine)];
        assert!(can_move_tableau_to_tableau(&[up(Suit::Clubs, Rank::Eight)], &target));
        assert!(!can_move_tableau_to_tableau(&[down(Suit::Clubs, Rank::Eight)], &target));
        assert!(!can_move_tableau_to_tableau(&[up(Suit::Diamonds, Rank::Eight)], &target));
        assert!(!can_move_tableau_to_tableau(&[], &target));
    }

    #[test]
    fn foundation_builds_up_by_suit_from_ace() {
        assert!(can_move_tableau_to_foundation(&[up(Suit::Hearts, Rank::Ace)], &[]));
        assert!(!can_move_tableau_to_foundation(&[up(Suit::Hearts, Rank::Two)], &[]));
        let hearts = [up(Suit::Hearts, Rank::Ace)];
        assert!(can_move_tableau_to_foundation(&[up(Suit::Hearts, Rank::Two)], &hearts));
        assert!(!can_move_tableau_to_foundation(&[up(Suit::Diamonds, Rank::Two)], &hearts));
        assert!(!can_move_tableau_to_foundation(&[down(Suit::Hearts, Rank::Two)], &hearts));
    }

    #[test]
    fn foundation_to_tableau_mirrors_tableau_rule() {
        let foundation = [up(Suit::Spades, Rank::Ace), up(Suit::Spades, Rank::Two)];
        assert!(can_move_foundation_to_tableau(&foundation, &[up(Suit::Hearts, Rank::Three)]));
        assert!(!can_move_foundation_to_tableau(&foundation, &[up(Suit::Clubs, Rank::Three)]));
        assert!(!can_move_foundation_to_tableau(&[], &[up(Suit::Hearts, Rank::Three)]));
    }

    #[test]
    fn movable_sequence_stops_at_face_down_and_breaks() {
        let pile = [
            down(Suit::Clubs, Rank::Two),
            up(Suit::Spades, Rank::Ten),
            up(Suit::Hearts, Rank::Nine),
            up(Suit::Clubs, Rank::Eight),
            up(Suit::Diamonds, Rank::Seven),
        ];
        assert_eq!(get_movable_sequence(&pile).len(), 4);

        let broken = [
            up(Suit::Spades, Rank::Ten),
            up(Suit::Clubs, Rank::Nine),
            up(Suit::Hearts, Rank::Eight),
        ];
        assert_eq!(get_movable_sequence(&broken), &broken[1..]);

        let gap = [up(Suit::Spades, Rank::Ten), up(Suit::Hearts, Rank::Eight)];
        assert_eq!(get_movable_sequence(&gap), &gap[1..]);

        assert!(get_movable_sequence(&[down(Suit::Spades, Rank::Ten)]).is_empty());
        assert!(get_movable_sequence(&[]).is_empty());
    }

    #[test]
    fn sequence_lead_decides() {
        let sequence = [up(Suit::Spades, Rank::King), up(Suit::Hearts, Rank::Queen)];
        assert!(can_move_sequence_to_tableau(&sequence, &[]));
        assert!(!can_move_sequence_to_tableau(&sequence[1..], &[]));
        assert!(can_move_sequence_to_tableau(&sequence[1..], &[up(Suit::Clubs, Rank::King)]));
    }
}
