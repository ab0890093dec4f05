//! Graph search over the move space: breadth-first and A*, plus a parallel
//! batch analysis of many seeds.

use crate::card::{Rank, Suit, NUM_CARDS_DECK};
use crate::identity::deal_id;
use crate::moves::{
    apply_move, legal_moves, prioritized_moves, state_hash, Move, SearchNode, SolverResult,
};
use crate::rng::shuffled_deck;
use crate::rules::{self, Ruleset};
use crate::state::GameState;
use crate::unsolvable::inherent_unsolvability;
use rayon::prelude::*;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

const TRACE_EVERY: usize = 10_000;

/// Bounds every search so it always terminates with a typed result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverLimits {
    pub max_depth: usize,
    pub max_states: usize,
    pub timeout: Duration,
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self {
            max_depth: 300,
            max_states: 200_000,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SolverLimits {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    Bfs,
    #[default]
    AStar,
}

impl Strategy {
    pub fn parse(value: &str) -> Option<Strategy> {
        match value.to_ascii_lowercase().as_str() {
            "bfs" => Some(Strategy::Bfs),
            "astar" | "a*" => Some(Strategy::AStar),
            _ => None,
        }
    }

    pub fn solve(self, state: &GameState, limits: &SolverLimits) -> SolverResult {
        match self {
            Strategy::Bfs => solve_bfs(state, limits),
            Strategy::AStar => solve_astar(state, limits),
        }
    }
}

fn won_at_start(state: &GameState) -> Option<SolverResult> {
    rules::is_game_won(state).then(|| SolverResult::Success {
        moves: Vec::new(),
        states_explored: 0,
    })
}

fn extend_path(path: &[Move], mv: Move) -> Vec<Move> {
    let mut extended = Vec::with_capacity(path.len() + 1);
    extended.extend_from_slice(path);
    extended.push(mv);
    extended
}

/// Level-order search. Returns the first win found, which is one with the
/// fewest moves among the states the coarse hash keeps apart.
pub fn solve_bfs(initial: &GameState, limits: &SolverLimits) -> SolverResult {
    if let Some(result) = won_at_start(initial) {
        return result;
    }
    let started = Instant::now();
    let mut visited = HashSet::from([state_hash(initial)]);
    let mut queue = VecDeque::from([SearchNode {
        state: initial.clone(),
        path: Vec::new(),
        priority: 0,
        serial: 0,
    }]);
    let mut explored = 0;

    while let Some(node) = queue.pop_front() {
        if started.elapsed() >= limits.timeout {
            log::info!("bfs timed out after {} states", explored);
            return SolverResult::Timeout {
                states_explored: explored,
            };
        }
        explored += 1;
        if explored > limits.max_states {
            log::info!("bfs gave up after {} states", limits.max_states);
            return SolverResult::TooComplex {
                states_explored: explored,
            };
        }
        if explored % TRACE_EVERY == 0 {
            log::trace!(
                "bfs: {} states, queue {}, depth {}",
                explored,
                queue.len(),
                node.path.len()
            );
        }
        if node.path.len() >= limits.max_depth {
            continue;
        }

        for mv in legal_moves(&node.state) {
            let Some(next) = apply_move(&node.state, &mv) else {
                continue;
            };
            if !visited.insert(state_hash(&next)) {
                continue;
            }
            let path = extend_path(&node.path, mv);
            if rules::is_game_won(&next) {
                log::info!("bfs solved in {} moves after {} states", path.len(), explored);
                return SolverResult::Success {
                    moves: path,
                    states_explored: explored,
                };
            }
            queue.push_back(SearchNode {
                priority: path.len() as i64,
                state: next,
                path,
                serial: 0,
            });
        }
    }
    log::info!("bfs exhausted after {} states", explored);
    SolverResult::Unsolvable {
        states_explored: explored,
    }
}

/// Cards above the next card each foundation needs, when that card is in the
/// tableau.
fn blocking_count(state: &GameState) -> usize {
    state
        .foundation
        .iter()
        .filter_map(|pile| pile.last())
        .filter_map(|top| Rank::from_value(top.rank.value() + 1).map(|rank| (top.suit, rank)))
        .chain(
            Suit::ALL
                .into_iter()
                .filter(|suit| state.foundation_height(*suit) == 0)
                .map(|suit| (suit, Rank::Ace)),
        )
        .map(|(suit, rank)| {
            state
                .tableau
                .iter()
                .find_map(|pile| {
                    pile.iter()
                        .position(|card| card.suit == suit && card.rank == rank)
                        .map(|index| pile.len() - 1 - index)
                })
                .unwrap_or(0)
        })
        .sum()
}

/// Estimated distance to a win. Lower is better; a won board scores 0.
pub fn heuristic(state: &GameState) -> i64 {
    let outside = (NUM_CARDS_DECK - state.foundation_cards().min(NUM_CARDS_DECK)) as i64;
    let talon = (state.stock.len() + state.waste.len()) as i64;
    let face_down = state
        .tableau
        .iter()
        .flatten()
        .filter(|card| !card.face_up)
        .count() as i64;
    let empty_columns = state.tableau.iter().filter(|pile| pile.is_empty()).count() as i64;
    let kings_waiting = state
        .tableau
        .iter()
        .flat_map(|pile| pile.iter().skip(1))
        .filter(|card| card.is_king())
        .count() as i64;
    let column_band = match (kings_waiting, empty_columns) {
        (0, _) => 0,
        (_, 0) => 8,
        (kings, empty) => -4 * kings.min(empty),
    };

    10 * outside + 5 * blocking_count(state) as i64 + 2 * talon + column_band + 3 * face_down
}

/// Best-first search on `moves so far + heuristic`, refusing deals the
/// structural check already proves unwinnable.
pub fn solve_astar(initial: &GameState, limits: &SolverLimits) -> SolverResult {
    if let Some(result) = won_at_start(initial) {
        return result;
    }
    if let Some(reason) = inherent_unsolvability(initial) {
        log::info!("a* skipped: {}", reason);
        return SolverResult::InherentlyUnsolvable { reason };
    }
    let started = Instant::now();
    let mut best_depth = HashMap::from([(state_hash(initial), 0usize)]);
    let mut frontier = BinaryHeap::from([SearchNode {
        state: initial.clone(),
        path: Vec::new(),
        priority: heuristic(initial),
        serial: 0,
    }]);
    let mut serial = 0;
    let mut explored = 0;

    while let Some(node) = frontier.pop() {
        if started.elapsed() >= limits.timeout {
            log::info!("a* timed out after {} states", explored);
            return SolverResult::Timeout {
                states_explored: explored,
            };
        }
        if rules::is_game_won(&node.state) {
            log::info!("a* solved in {} moves after {} states", node.path.len(), explored);
            return SolverResult::Success {
                moves: node.path,
                states_explored: explored,
            };
        }
        explored += 1;
        if explored > limits.max_states {
            log::info!("a* gave up after {} states", limits.max_states);
            return SolverResult::TooComplex {
                states_explored: explored,
            };
        }
        if explored % TRACE_EVERY == 0 {
            log::trace!(
                "a*: {} states, frontier {}, f {}",
                explored,
                frontier.len(),
                node.priority
            );
        }
        let depth = node.path.len() + 1;
        if depth > limits.max_depth {
            continue;
        }

        for mv in prioritized_moves(&node.state) {
            let Some(next) = apply_move(&node.state, &mv) else {
                continue;
            };
            let hash = state_hash(&next);
            if best_depth.get(&hash).is_some_and(|known| *known <= depth) {
                continue;
            }
            best_depth.insert(hash, depth);
            serial += 1;
            frontier.push(SearchNode {
                priority: depth as i64 + heuristic(&next),
                state: next,
                path: extend_path(&node.path, mv),
                serial,
            });
        }
    }
    log::info!("a* exhausted after {} states", explored);
    SolverResult::Unsolvable {
        states_explored: explored,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub seed: u64,
    pub deal_id: String,
    pub result: SolverResult,
}

/// Deals and solves every seed on the rayon pool. Reports come back in the
/// order of `seeds`.
pub fn analyze_seeds(
    seeds: &[u64],
    rules: Ruleset,
    strategy: Strategy,
    limits: &SolverLimits,
) -> Vec<SeedReport> {
    seeds
        .par_iter()
        .map(|&seed| {
            let deck = shuffled_deck(seed);
            let state = GameState::deal(&deck, rules);
            let result = strategy.solve(&state, limits);
            log::debug!("seed {}: {}", seed, result.label());
            SeedReport {
                seed,
                deal_id: deal_id(&rules, seed, &deck),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{full_deck, Card};
    use crate::moves::apply_move_in_place;
    use crate::state::NUM_FOUNDATIONS;
    use crate::unsolvable::UnsolvableReason;

    /// Everything on the foundations except `missing`, which is left out.
    fn nearly_won(missing: Card) -> GameState {
        let mut state = GameState::new(Ruleset::default());
        for (pile, suit) in Suit::ALL.into_iter().enumerate().take(NUM_FOUNDATIONS) {
            for rank in Rank::ALL {
                let card = Card::face_up(suit, rank);
                if card == missing {
                    break;
                }
                state.foundation[pile].push(card);
            }
        }
        state
    }

    fn replay(state: &GameState, moves: &[Move]) -> GameState {
        let mut replayed = state.clone();
        for mv in moves {
            assert!(apply_move_in_place(&mut replayed, mv), "{} should apply", mv);
        }
        replayed
    }

    fn solvers() -> [(&'static str, fn(&GameState, &SolverLimits) -> SolverResult); 2] {
        [("bfs", solve_bfs), ("astar", solve_astar)]
    }

    #[test]
    fn one_king_left_takes_one_move() {
        let king = Card::face_up(Suit::Spades, Rank::King);
        let mut state = nearly_won(king);
        state.tableau[0].push(king);
        for (name, solve) in solvers() {
            match solve(&state, &SolverLimits::default()) {
                SolverResult::Success { moves, .. } => {
                    let expected = Move::TableauToFoundation {
                        from: 0,
                        foundation: 0,
                    };
                    assert_eq!(moves, vec![expected], "{}", name);
                    assert!(rules::is_game_won(&replay(&state, &moves)));
                }
                other => panic!("{} returned {:?}", name, other),
            }
        }
    }

    #[test]
    fn last_card_in_stock_takes_a_draw_and_a_play() {
        let king = Card::face_up(Suit::Clubs, Rank::King);
        let mut state = nearly_won(king);
        state.stock.push(king.flipped(false));
        for (name, solve) in solvers() {
            match solve(&state, &SolverLimits::default()) {
                SolverResult::Success { moves, .. } => {
                    assert_eq!(
                        moves,
                        vec![Move::Draw, Move::WasteToFoundation { foundation: 3 }],
                        "{}",
                        name
                    );
                    assert!(rules::is_game_won(&replay(&state, &moves)));
                }
                other => panic!("{} returned {:?}", name, other),
            }
        }
    }

    #[test]
    fn won_board_needs_no_moves() {
        let mut state = nearly_won(Card::face_up(Suit::Clubs, Rank::King));
        state.foundation[3].push(Card::face_up(Suit::Clubs, Rank::King));
        assert_eq!(heuristic(&state), 0);
        assert_eq!(
            solve_bfs(&state, &SolverLimits::default()),
            SolverResult::Success {
                moves: Vec::new(),
                states_explored: 0
            }
        );
    }

    #[test]
    fn limits_become_typed_results() {
        let state = GameState::deal(&shuffled_deck(42), Ruleset::default());
        let no_time = SolverLimits::default().with_timeout(Duration::ZERO);
        assert!(matches!(solve_bfs(&state, &no_time), SolverResult::Timeout { .. }));

        let one_state = SolverLimits::default().with_max_states(1);
        assert_eq!(
            solve_bfs(&state, &one_state),
            SolverResult::TooComplex { states_explored: 2 }
        );
    }

    #[test]
    fn stuck_board_is_unsolvable() {
        let mut state = GameState::new(Ruleset::default().with_redeals(0));
        state.tableau[0] = vec![Card::face_up(Suit::Hearts, Rank::Five)];
        state.waste = vec![Card::face_up(Suit::Hearts, Rank::Nine)];
        assert_eq!(
            solve_bfs(&state, &SolverLimits::default()),
            SolverResult::Unsolvable { states_explored: 1 }
        );
    }

    #[test]
    fn astar_short_circuits_structural_deadlock() {
        let mut state = GameState::new(Ruleset::default());
        state.tableau[0] = vec![
            Card::new(Suit::Hearts, Rank::Six),
            Card::new(Suit::Clubs, Rank::Two),
            Card::face_up(Suit::Spades, Rank::Five),
        ];
        state.tableau[1] = vec![
            Card::new(Suit::Diamonds, Rank::Six),
            Card::new(Suit::Spades, Rank::Two),
            Card::face_up(Suit::Clubs, Rank::Five),
        ];
        let placed: Vec<Card> = state.tableau.iter().flatten().copied().collect();
        state.stock = full_deck().into_iter().filter(|card| !placed.contains(card)).collect();

        assert_eq!(
            solve_astar(&state, &SolverLimits::default()),
            SolverResult::InherentlyUnsolvable {
                reason: UnsolvableReason::IrretrievablePiles { piles: vec![0, 1] }
            }
        );
    }

    #[test]
    fn heuristic_prefers_progress() {
        let state = GameState::deal(&shuffled_deck(5), Ruleset::default());
        let fresh = heuristic(&state);
        assert!(fresh >= 10 * NUM_CARDS_DECK as i64);

        let mut closer = nearly_won(Card::face_up(Suit::Spades, Rank::Ace));
        closer
            .stock
            .extend(Rank::ALL.into_iter().map(|rank| Card::new(Suit::Spades, rank)));
        assert_eq!(closer.total_cards(), NUM_CARDS_DECK);
        assert!(heuristic(&closer) < fresh);
    }

    #[test]
    fn batch_keeps_seed_order() {
        let seeds = [3, 1, 2];
        let limits = SolverLimits::default().with_max_states(50);
        let reports = analyze_seeds(&seeds, Ruleset::default(), Strategy::Bfs, &limits);
        assert_eq!(reports.iter().map(|r| r.seed).collect::<Vec<_>>(), seeds);
        for report in &reports {
            assert_eq!(
                report.deal_id,
                deal_id(&Ruleset::default(), report.seed, &shuffled_deck(report.seed))
            );
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(Strategy::parse("BFS"), Some(Strategy::Bfs));
        assert_eq!(Strategy::parse("astar"), Some(Strategy::AStar));
        assert_eq!(Strategy::parse("dfs"), None);
    }
}
