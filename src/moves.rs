use crate::card::{pretty_string, Card, Suit};
use crate::rules;
use crate::state::{GameState, NUM_FOUNDATIONS, NUM_TABLEAU};
use crate::unsolvable::UnsolvableReason;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    TableauToTableau {
        from: usize,
        card_index: usize,
        to: usize,
    },
    TableauToFoundation {
        from: usize,
        foundation: usize,
    },
    WasteToTableau {
        to: usize,
    },
    WasteToFoundation {
        foundation: usize,
    },
    FoundationToTableau {
        foundation: usize,
        to: usize,
    },
    Draw,
}

impl Move {
    /// Card picked up by this move in `state`, if any.
    pub fn moving_card(&self, state: &GameState) -> Option<Card> {
        match *self {
            Move::TableauToTableau {
                from, card_index, ..
            } => state.tableau.get(from)?.get(card_index).copied(),
            Move::TableauToFoundation { from, .. } => state.tableau.get(from)?.last().copied(),
            Move::WasteToTableau { .. } | Move::WasteToFoundation { .. } => {
                state.waste.last().copied()
            }
            Move::FoundationToTableau { foundation, .. } => {
                state.foundation.get(foundation)?.last().copied()
            }
            Move::Draw => None,
        }
    }

    pub fn pretty_string(&self, state: &GameState) -> String {
        match self.moving_card(state) {
            Some(card) => format!("{} {}", self, pretty_string(&card)),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Move::TableauToTableau {
                from,
                card_index,
                to,
            } => write!(f, "T{}[{}] -> T{}", from, card_index, to),
            Move::TableauToFoundation { from, foundation } => {
                write!(f, "T{} -> F{}", from, foundation)
            }
            Move::WasteToTableau { to } => write!(f, "W -> T{}", to),
            Move::WasteToFoundation { foundation } => write!(f, "W -> F{}", foundation),
            Move::FoundationToTableau { foundation, to } => {
                write!(f, "F{} -> T{}", foundation, to)
            }
            Move::Draw => write!(f, "Draw"),
        }
    }
}

/// Frontier entry shared by the solvers. Ordered so that a `BinaryHeap` pops
/// the lowest `priority` first, oldest first among equals.
#[derive(Clone, Debug)]
pub struct SearchNode {
    pub state: GameState,
    pub path: Vec<Move>,
    pub priority: i64,
    pub serial: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.serial == other.serial
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.serial.cmp(&self.serial))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolverResult {
    Success {
        moves: Vec<Move>,
        states_explored: usize,
    },
    /// Frontier exhausted without a win.
    Unsolvable { states_explored: usize },
    /// Proven unwinnable before searching.
    InherentlyUnsolvable { reason: UnsolvableReason },
    Timeout { states_explored: usize },
    /// State budget exceeded.
    TooComplex { states_explored: usize },
}

impl SolverResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SolverResult::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SolverResult::Success { .. } => "SOLVED",
            SolverResult::Unsolvable { .. } => "UNSOLVABLE",
            SolverResult::InherentlyUnsolvable { .. } => "INHERENTLY_UNSOLVABLE",
            SolverResult::Timeout { .. } => "TIMEOUT",
            SolverResult::TooComplex { .. } => "TOO_COMPLEX",
        }
    }
}

/// Applies `mv` to `state` in place with the same semantics as the engine.
/// Leaves `state` untouched and returns false when the move is illegal.
pub fn apply_move_in_place(state: &mut GameState, mv: &Move) -> bool {
    match *mv {
        Move::TableauToTableau {
            from,
            card_index,
            to,
        } => state.move_tableau_run(from, card_index, to),
        Move::TableauToFoundation { from, foundation } => {
            state.move_tableau_to_foundation(from, foundation)
        }
        Move::WasteToTableau { to } => state.move_waste_to_tableau(to),
        Move::WasteToFoundation { foundation } => state.move_waste_to_foundation(foundation),
        Move::FoundationToTableau { foundation, to } => {
            state.move_foundation_to_tableau(foundation, to)
        }
        Move::Draw => state.draw().changed(),
    }
}

/// Side-effect-free transition: the successor of `state` under `mv`, or
/// `None` if `mv` is illegal there.
pub fn apply_move(state: &GameState, mv: &Move) -> Option<GameState> {
    let mut next = state.clone();
    apply_move_in_place(&mut next, mv).then_some(next)
}

/// Coarse search fingerprint: full tableau with face state, foundation and
/// stock sizes, waste top. Distinct states can share a hash.
pub fn state_hash(state: &GameState) -> u64 {
    let mut hasher = DefaultHasher::new();
    for pile in &state.tableau {
        pile.len().hash(&mut hasher);
        for card in pile {
            (card.suit, card.rank, card.face_up).hash(&mut hasher);
        }
    }
    for pile in &state.foundation {
        pile.len().hash(&mut hasher);
    }
    state.stock.len().hash(&mut hasher);
    state
        .waste
        .last()
        .map(|card| (card.suit, card.rank))
        .hash(&mut hasher);
    hasher.finish()
}

/// Every legal move, without equivalent duplicates: a card bound for an empty
/// column or foundation only targets the first empty one, and a King already
/// at the bottom of its column is never moved to another empty column.
pub fn legal_moves(state: &GameState) -> Vec<Move> {
    let mut moves = Vec::new();
    let first_empty_column = state.tableau.iter().position(Vec::is_empty);
    let redundant_empty =
        |to: usize| state.tableau[to].is_empty() && Some(to) != first_empty_column;

    for from in 0..NUM_TABLEAU {
        if let Some(card) = state.tableau[from].last() {
            if let Some(foundation) = state.foundation_for(card) {
                if state.can_move_tableau_to_foundation(from, foundation) {
                    moves.push(Move::TableauToFoundation { from, foundation });
                }
            }
        }
    }

    if let Some(card) = state.waste.last() {
        if let Some(foundation) = state.foundation_for(card) {
            moves.push(Move::WasteToFoundation { foundation });
        }
        for to in 0..NUM_TABLEAU {
            if !redundant_empty(to) && state.can_move_waste_to_tableau(to) {
                moves.push(Move::WasteToTableau { to });
            }
        }
    }

    for from in 0..NUM_TABLEAU {
        let pile = &state.tableau[from];
        let run_start = pile.len() - rules::get_movable_sequence(pile).len();
        for card_index in run_start..pile.len() {
            for to in 0..NUM_TABLEAU {
                if redundant_empty(to) || (card_index == 0 && state.tableau[to].is_empty()) {
                    continue;
                }
                if state.can_move_tableau_run(from, card_index, to) {
                    moves.push(Move::TableauToTableau {
                        from,
                        card_index,
                        to,
                    });
                }
            }
        }
    }

    if state.rules.allow_foundation_to_tableau {
        for foundation in 0..NUM_FOUNDATIONS {
            for to in 0..NUM_TABLEAU {
                if !redundant_empty(to) && state.can_move_foundation_to_tableau(foundation, to) {
                    moves.push(Move::FoundationToTableau { foundation, to });
                }
            }
        }
    }

    if state.can_draw() {
        moves.push(Move::Draw);
    }
    moves
}

/// A foundation card nobody will need as a tableau target later. Aces to
/// threes always are; higher cards only once both opposite-color foundations
/// are within two ranks.
pub fn is_safe_foundation_card(state: &GameState, card: &Card) -> bool {
    let rank = card.rank.value();
    rank <= 3
        || Suit::ALL
            .iter()
            .filter(|suit| suit.is_red() != card.is_red())
            .all(|suit| state.foundation_height(*suit) + 2 >= rank)
}

fn reveals_card(state: &GameState, from: usize, card_index: usize) -> bool {
    card_index > 0
        && state
            .tableau
            .get(from)
            .and_then(|pile| pile.get(card_index - 1))
            .map_or(false, |below| !below.face_up)
}

fn is_empty_column(state: &GameState, pile: usize) -> bool {
    state.tableau.get(pile).map_or(false, Vec::is_empty)
}

const LAST_TIER: u8 = 5;

/// Ordering tier of a move, lower is tried first. Moves naming a pile that
/// does not exist sort last.
pub fn move_tier(state: &GameState, mv: &Move) -> u8 {
    match *mv {
        Move::TableauToFoundation { from, .. } => {
            let Some(pile) = state.tableau.get(from) else {
                return LAST_TIER;
            };
            match pile.last() {
                Some(card) if is_safe_foundation_card(state, card) => 0,
                _ if reveals_card(state, from, pile.len().saturating_sub(1)) => 1,
                _ => 3,
            }
        }
        Move::WasteToFoundation { .. } => match state.waste.last() {
            Some(card) if is_safe_foundation_card(state, card) => 0,
            _ => 4,
        },
        Move::TableauToTableau {
            from,
            card_index,
            to,
        } => {
            if from.max(to) >= NUM_TABLEAU {
                LAST_TIER
            } else if reveals_card(state, from, card_index) {
                1
            } else if is_empty_column(state, to) {
                2
            } else {
                3
            }
        }
        Move::WasteToTableau { to } if is_empty_column(state, to) => 2,
        Move::WasteToTableau { .. } => 4,
        Move::FoundationToTableau { .. } => 3,
        Move::Draw => LAST_TIER,
    }
}

/// `legal_moves` in solver order: safe foundation moves, moves that turn a
/// card, Kings to empty columns, other tableau moves, waste moves, draw.
pub fn prioritized_moves(state: &GameState) -> Vec<Move> {
    let mut moves = legal_moves(state);
    moves.sort_by_key(|mv| move_tier(state, mv));
    moves
}
