//! Persisted string formats: `GS1;`/`GS2;` save strings and the 12 character
//! shareable game code.

use crate::card::{Card, NUM_CARDS_DECK};
use crate::error::CodecError;
use crate::rules::{self, RecycleMode, Ruleset};
use crate::state::{GameState, NUM_FOUNDATIONS, NUM_TABLEAU};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::{HashMap, HashSet};

pub const SAVE_HEADER: &str = "GS2";
const LEGACY_SAVE_HEADER: &str = "GS1";

const GAME_CODE_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const GAME_CODE_LEN: usize = 12;
// Redeal values representable in a game code, indexed by bucket.
const REDEAL_BUCKETS: [i32; 4] = [-1, 0, 1, 2];

/// Everything a save string carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedGame {
    pub state: GameState,
    pub seed: Option<u64>,
    pub deal_id: Option<String>,
    pub move_count: u32,
    pub started_at: Option<u64>,
    pub paused_at: Option<u64>,
    pub total_paused_ms: u64,
    pub finished_at: Option<u64>,
}

fn encode_pile(cards: &[Card]) -> String {
    cards.iter().map(Card::code).collect::<Vec<_>>().join(",")
}

fn encode_piles<'a>(piles: impl Iterator<Item = &'a [Card]>) -> String {
    piles.map(encode_pile).collect::<Vec<_>>().join("/")
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn encode(saved: &SavedGame) -> String {
    let state = &saved.state;
    let mut fields: Vec<(&str, String)> = vec![
        ("draw", state.rules.draw.to_string()),
        ("redeals", state.rules.redeals.to_string()),
        ("recycle", state.rules.recycle.as_str().to_string()),
        ("f2t", flag(state.rules.allow_foundation_to_tableau).to_string()),
        ("rr", state.redeals_remaining.to_string()),
    ];
    if let Some(seed) = saved.seed {
        fields.push(("seed", seed.to_string()));
    }
    if let Some(deal_id) = &saved.deal_id {
        fields.push(("deal", deal_id.clone()));
    }
    fields.push(("over", flag(state.is_game_over).to_string()));
    fields.push(("score", state.score.to_string()));
    fields.push(("moves", saved.move_count.to_string()));
    if let Some(started_at) = saved.started_at {
        fields.push(("start", started_at.to_string()));
    }
    fields.push(("paused", saved.total_paused_ms.to_string()));
    if let Some(paused_at) = saved.paused_at {
        fields.push(("pausedAt", paused_at.to_string()));
    }
    if let Some(finished_at) = saved.finished_at {
        fields.push(("fin", finished_at.to_string()));
    }
    fields.push(("tab", encode_piles(state.tableau.iter().map(|p| p.as_slice()))));
    fields.push(("fnd", encode_piles(state.foundation.iter().map(|p| p.as_slice()))));
    fields.push(("sto", encode_pile(&state.stock)));
    fields.push(("was", encode_pile(&state.waste)));

    let body = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(";");
    format!("{};{}", SAVE_HEADER, body)
}

/// Splits `HEADER;k=v;k=v` into its fields. Blank segments are skipped.
pub(crate) fn parse_fields<'a>(
    input: &'a str,
    headers: &[&str],
) -> Result<HashMap<&'a str, &'a str>, CodecError> {
    let mut segments = input.trim().split(';');
    let header = segments.next().unwrap_or_default();
    if !headers.contains(&header) {
        return Err(CodecError::UnknownHeader(header.to_string()));
    }
    segments
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .split_once('=')
                .ok_or_else(|| CodecError::MalformedEntry(segment.to_string()))
        })
        .collect()
}

pub(crate) fn optional<T: std::str::FromStr>(
    fields: &HashMap<&str, &str>,
    field: &'static str,
) -> Result<Option<T>, CodecError> {
    match fields.get(field) {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| CodecError::InvalidField {
            field,
            value: value.to_string(),
        }),
    }
}

pub(crate) fn required<'a>(
    fields: &HashMap<&str, &'a str>,
    field: &'static str,
) -> Result<&'a str, CodecError> {
    fields.get(field).copied().ok_or(CodecError::MissingField(field))
}

pub(crate) fn parse_flag(
    value: Option<u8>,
    field: &'static str,
    default: bool,
) -> Result<bool, CodecError> {
    match value {
        None => Ok(default),
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(CodecError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

pub(crate) fn parse_ruleset(fields: &HashMap<&str, &str>) -> Result<Ruleset, CodecError> {
    let defaults = Ruleset::default();
    let draw = optional::<u8>(fields, "draw")?.unwrap_or(defaults.draw);
    if draw != 1 && draw != 3 {
        return Err(CodecError::InvalidField {
            field: "draw",
            value: draw.to_string(),
        });
    }
    let recycle = match fields.get("recycle") {
        None => defaults.recycle,
        Some(value) => RecycleMode::parse(value).ok_or_else(|| CodecError::InvalidField {
            field: "recycle",
            value: value.to_string(),
        })?,
    };
    Ok(Ruleset {
        draw,
        redeals: optional(fields, "redeals")?.unwrap_or(defaults.redeals),
        recycle,
        allow_foundation_to_tableau: parse_flag(
            optional(fields, "f2t")?,
            "f2t",
            defaults.allow_foundation_to_tableau,
        )?,
    })
}

fn decode_pile(encoded: &str) -> Result<Vec<Card>, CodecError> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    encoded
        .split(',')
        .map(|code| Card::from_code(code).ok_or_else(|| CodecError::InvalidCard(code.to_string())))
        .collect()
}

fn decode_piles(
    encoded: &str,
    field: &'static str,
    expected: usize,
) -> Result<Vec<Vec<Card>>, CodecError> {
    let piles = encoded.split('/').map(decode_pile).collect::<Result<Vec<_>, _>>()?;
    if piles.len() != expected {
        return Err(CodecError::PileCount {
            field,
            expected,
            found: piles.len(),
        });
    }
    Ok(piles)
}

fn validate_board(state: &GameState) -> Result<(), CodecError> {
    let total = state.total_cards();
    if total != NUM_CARDS_DECK {
        return Err(CodecError::CardCount(total));
    }
    let mut seen = HashSet::new();
    let all_cards = state
        .tableau
        .iter()
        .flatten()
        .chain(state.foundation.iter().flatten())
        .chain(&state.stock)
        .chain(&state.waste);
    for card in all_cards {
        if !seen.insert(*card) {
            return Err(CodecError::DuplicateCard(card.identity_code()));
        }
    }
    for (index, pile) in state.foundation.iter().enumerate() {
        let ordered = pile.iter().enumerate().all(|(height, card)| {
            card.suit == pile[0].suit && usize::from(card.rank.value()) == height + 1
        });
        if !ordered {
            return Err(CodecError::FoundationOrder(index));
        }
    }
    if let Some(index) = state
        .tableau
        .iter()
        .position(|pile| pile.last().map_or(false, |top| !top.face_up))
    {
        return Err(CodecError::FaceDownTop(index));
    }
    Ok(())
}

fn validate_progress(state: &GameState) -> Result<(), CodecError> {
    let limit = state.rules.redeals;
    if !state.rules.has_unlimited_redeals() && !(0..=limit).contains(&state.redeals_remaining) {
        return Err(CodecError::RedealsRemaining {
            remaining: state.redeals_remaining,
            limit,
        });
    }
    if state.is_game_over != rules::is_game_won(state) {
        return Err(CodecError::GameOverMismatch(state.is_game_over));
    }
    Ok(())
}

fn rejected(err: CodecError) -> CodecError {
    log::warn!("rejected save string: {}", err);
    err
}

/// Reads a `GS1;` or `GS2;` save. Missing optional fields take defaults;
/// anything structurally wrong is an error.
pub fn decode(input: &str) -> Result<SavedGame, CodecError> {
    let fields = parse_fields(input, &[SAVE_HEADER, LEGACY_SAVE_HEADER]).map_err(rejected)?;
    let rules = parse_ruleset(&fields)?;
    let mut state = GameState::new(rules);

    for (pile, cards) in state
        .tableau
        .iter_mut()
        .zip(decode_piles(required(&fields, "tab")?, "tab", NUM_TABLEAU)?)
    {
        *pile = cards;
    }
    for (pile, cards) in state
        .foundation
        .iter_mut()
        .zip(decode_piles(required(&fields, "fnd")?, "fnd", NUM_FOUNDATIONS)?)
    {
        for card in cards {
            pile.try_push(card).map_err(|_| CodecError::FoundationOverflow)?;
        }
    }
    state.stock = decode_pile(required(&fields, "sto")?)?;
    state.waste = decode_pile(required(&fields, "was")?)?;
    validate_board(&state).map_err(rejected)?;

    state.redeals_remaining = optional(&fields, "rr")?.unwrap_or(rules.initial_redeals_remaining());
    state.is_game_over =
        parse_flag(optional(&fields, "over")?, "over", rules::is_game_won(&state))?;
    state.score = optional(&fields, "score")?.unwrap_or(0);
    validate_progress(&state).map_err(rejected)?;

    Ok(SavedGame {
        state,
        seed: optional(&fields, "seed")?,
        deal_id: fields
            .get("deal")
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string()),
        move_count: optional(&fields, "moves")?.unwrap_or(0),
        started_at: optional(&fields, "start")?,
        paused_at: optional(&fields, "pausedAt")?,
        total_paused_ms: optional(&fields, "paused")?.unwrap_or(0),
        finished_at: optional(&fields, "fin")?,
    })
}

fn redeal_bucket(redeals: i32) -> u8 {
    if redeals < 0 {
        return 0;
    }
    let bucket = REDEAL_BUCKETS
        .iter()
        .rposition(|value| *value >= 0 && *value <= redeals)
        .unwrap_or(1);
    if REDEAL_BUCKETS[bucket] != redeals {
        log::warn!(
            "redeals {} not representable in a game code, using {}",
            redeals,
            REDEAL_BUCKETS[bucket]
        );
    }
    bucket as u8
}

/// One alphabet character for the ruleset followed by the big-endian seed in
/// unpadded base64url. Redeal counts above 2 are clamped to 2.
pub fn encode_game_code(seed: u64, rules: &Ruleset) -> String {
    let bits = u8::from(rules.draw == 3)
        | redeal_bucket(rules.redeals) << 1
        | u8::from(rules.recycle == RecycleMode::Reverse) << 3
        | u8::from(rules.allow_foundation_to_tableau) << 4;
    let mut code = String::with_capacity(GAME_CODE_LEN);
    code.push(GAME_CODE_ALPHABET[bits as usize] as char);
    code.push_str(&URL_SAFE_NO_PAD.encode(seed.to_be_bytes()));
    code
}

pub fn decode_game_code(code: &str) -> Result<(u64, Ruleset), CodecError> {
    let malformed = || CodecError::GameCode(code.to_string());
    if code.len() != GAME_CODE_LEN || !code.is_ascii() {
        return Err(malformed());
    }
    let (rules_char, seed_part) = code.split_at(1);
    let bits = GAME_CODE_ALPHABET
        .iter()
        .position(|symbol| rules_char.as_bytes()[0] == *symbol)
        .filter(|bits| *bits < 32)
        .ok_or_else(malformed)? as u8;
    let seed_bytes: [u8; 8] = URL_SAFE_NO_PAD
        .decode(seed_part)
        .map_err(|_| malformed())?
        .try_into()
        .map_err(|_| malformed())?;

    let rules = Ruleset {
        draw: if bits & 1 == 1 { 3 } else { 1 },
        redeals: REDEAL_BUCKETS[((bits >> 1) & 0b11) as usize],
        recycle: if bits >> 3 & 1 == 1 {
            RecycleMode::Reverse
        } else {
            RecycleMode::Keep
        },
        allow_foundation_to_tableau: bits >> 4 & 1 == 1,
    };
    Ok((u64::from_be_bytes(seed_bytes), rules))
}
