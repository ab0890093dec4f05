use colored::Colorize;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NUM_CARDS_DECK: usize = 52;
pub const NUM_RANKS: usize = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }

    pub fn code(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }

    pub fn from_code(code: &str) -> Option<Suit> {
        match code {
            "S" => Some(Suit::Spades),
            "H" => Some(Suit::Hearts),
            "D" => Some(Suit::Diamonds),
            "C" => Some(Suit::Clubs),
            _ => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Suit::Spades => "♠",
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rank {
    Ace = 1,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; NUM_RANKS] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Ordinal value, 1 for Ace up to 13 for King.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Rank> {
        Rank::ALL.get((value as usize).checked_sub(1)?).copied()
    }

    pub fn code(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }

    pub fn from_code(code: &str) -> Option<Rank> {
        Rank::ALL.iter().copied().find(|rank| rank.code() == code)
    }
}

/// A playing card. Identity is suit and rank only; `face_up` is presentation
/// state and takes no part in equality or hashing.
#[derive(Derivative, Clone, Copy, Debug, Serialize, Deserialize)]
#[derivative(PartialEq, Eq, Hash)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub face_up: bool,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self {
            suit,
            rank,
            face_up: false,
        }
    }

    pub fn face_up(suit: Suit, rank: Rank) -> Self {
        Self {
            suit,
            rank,
            face_up: true,
        }
    }

    pub fn is_red(&self) -> bool {
        self.suit.is_red()
    }

    pub fn is_king(&self) -> bool {
        self.rank == Rank::King
    }

    pub fn is_ace(&self) -> bool {
        self.rank == Rank::Ace
    }

    pub fn flipped(self, face_up: bool) -> Self {
        Self { face_up, ..self }
    }

    /// `SUIT:RANK`, without face state. Used by deal identity.
    pub fn identity_code(&self) -> String {
        format!("{}:{}", self.suit.code(), self.rank.code())
    }

    /// `SUIT:RANK:FACE` with FACE in {u, d}.
    pub fn code(&self) -> String {
        format!(
            "{}:{}:{}",
            self.suit.code(),
            self.rank.code(),
            if self.face_up { 'u' } else { 'd' }
        )
    }

    pub fn from_code(code: &str) -> Option<Card> {
        let mut parts = code.split(':');
        let suit = Suit::from_code(parts.next()?)?;
        let rank = Rank::from_code(parts.next()?)?;
        let face_up = match parts.next()? {
            "u" => true,
            "d" => false,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Card {
            suit,
            rank,
            face_up,
        })
    }
}

pub fn are_card_colors_different(card1: &Card, card2: &Card) -> bool {
    card1.is_red() != card2.is_red()
}

/// Whether `top` may be stacked on `bottom` in a tableau column.
pub fn can_be_placed_on_top_of(bottom: &Card, top: &Card) -> bool {
    are_card_colors_different(bottom, top) && bottom.rank.value() == top.rank.value() + 1
}

/// Canonical 52-card deck, suits in `Suit::ALL` order, Ace to King within a suit.
pub fn full_deck() -> Vec<Card> {
    Suit::ALL
        .iter()
        .flat_map(|suit| Rank::ALL.iter().map(move |rank| Card::new(*suit, *rank)))
        .collect()
}

pub fn pretty_string(card: &Card) -> String {
    if !card.face_up {
        return "##".dimmed().to_string();
    }
    let label = format!("{}{}", card.rank.code(), card.suit.symbol());
    if card.is_red() {
        label.red().to_string()
    } else {
        label.bright_white().to_string()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank.code(), self.suit.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn full_deck_has_every_card_once() {
        let deck = full_deck();
        assert_eq!(deck.len(), NUM_CARDS_DECK);
        let unique: HashSet<Card> = deck.iter().copied().collect();
        assert_eq!(unique.len(), NUM_CARDS_DECK);
        assert!(deck.iter().all(|card| !card.face_up));
    }

    #[test]
    fn equality_ignores_face() {
        let down = Card::new(Suit::Hearts, Rank::Seven);
        assert_eq!(down, down.flipped(true));
        assert_ne!(down, Card::new(Suit::Diamonds, Rank::Seven));
    }

    #[test]
    fn card_codes_round_trip() {
        let card = Card::face_up(Suit::Diamonds, Rank::Ten);
        assert_eq!(card.code(), "D:10:u");
        let parsed = Card::from_code("D:10:u").unwrap();
        assert_eq!(parsed, card);
        assert!(parsed.face_up);
        assert!(Card::from_code("X:10:u").is_none());
        assert!(Card::from_code("D:1:u").is_none());
        assert!(Card::from_code("D:10:x").is_none());
        assert!(Card::from_code("D:10:u:u").is_none());
    }

    #[test]
    fn stacking_needs_alternate_color_and_one_rank_lower() {
        let black_eight = Card::face_up(Suit::Clubs, Rank::Eight);
        assert!(can_be_placed_on_top_of(&black_eight, &Card::face_up(Suit::Hearts, Rank::Seven)));
        assert!(!can_be_placed_on_top_of(&black_eight, &Card::face_up(Suit::Spades, Rank::Seven)));
        assert!(!can_be_placed_on_top_of(&black_eight, &Card::face_up(Suit::Hearts, Rank::Six)));
    }

    #[test]
    fn rank_values() {
        assert_eq!(Rank::Ace.value(), 1);
        assert_eq!(Rank::King.value(), 13);
        assert_eq!(Rank::from_value(12), Some(Rank::Queen));
        assert_eq!(Rank::from_value(0), None);
        assert_eq!(Rank::from_value(14), None);
    }
}
