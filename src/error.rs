use thiserror::Error;

/// Failure to read a persisted string: a save, a shareable game code or a
/// solve-log line. Old saves that only lack optional fields are not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unrecognised header in `{0}`")]
    UnknownHeader(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("malformed entry `{0}`")]
    MalformedEntry(String),
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },
    #[error("invalid card code `{0}`")]
    InvalidCard(String),
    #[error("field `{field}` has {found} piles, expected {expected}")]
    PileCount {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("foundation pile holds more than 13 cards")]
    FoundationOverflow,
    #[error("board holds {0} cards, expected 52")]
    CardCount(usize),
    #[error("card `{0}` appears more than once")]
    DuplicateCard(String),
    #[error("foundation pile {0} does not run Ace upward in one suit")]
    FoundationOrder(usize),
    #[error("tableau pile {0} has a face-down top card")]
    FaceDownTop(usize),
    #[error("game over flag `{0}` disagrees with the foundations")]
    GameOverMismatch(bool),
    #[error("{remaining} redeals remaining exceeds the limit of {limit}")]
    RedealsRemaining { remaining: i32, limit: i32 },
    #[error("malformed game code `{0}`")]
    GameCode(String),
}
