pub mod card;
pub mod codec;
pub mod engine;
pub mod error;
pub mod identity;
pub mod moves;
pub mod rng;
pub mod rules;
pub mod solver;
pub mod state;
pub mod stats;
pub mod undo;
pub mod unsolvable;

pub use card::{Card, Rank, Suit};
pub use engine::{Clock, GameEngine, ManualClock, SystemClock};
pub use error::CodecError;
pub use moves::{Move, SolverResult};
pub use rules::{RecycleMode, Ruleset};
pub use solver::{SolverLimits, Strategy};
pub use state::GameState;
pub use stats::{Outcome, SolveStats};
pub use unsolvable::UnsolvableReason;
