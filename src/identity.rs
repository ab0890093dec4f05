//! Content-addressed identifiers for deals and board layouts: a canonical
//! compact JSON document, SHA-256, rendered in base58.

use crate::card::Card;
use crate::rules::Ruleset;
use crate::state::GameState;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const DEAL_ID_PREFIX: &str = "DL1_";
pub const LAYOUT_ID_PREFIX: &str = "L1_";

const DEAL_FORMAT_VERSION: u8 = 1;
const SHUFFLE_VERSION: u8 = 1;
const LAYOUT_FORMAT_VERSION: u8 = 1;

// Field order is the canonical key order.
#[derive(Serialize)]
struct CanonicalRules {
    draw: u8,
    redeals: i32,
    recycle: &'static str,
}

#[derive(Serialize)]
struct CanonicalDeal {
    v: u8,
    sv: u8,
    rules: CanonicalRules,
    seed: u64,
    deck: Vec<String>,
}

#[derive(Serialize)]
struct CanonicalLayout {
    lv: u8,
    tableau: Vec<Vec<String>>,
    foundation: Vec<Vec<String>>,
    stock: Vec<String>,
    waste: Vec<String>,
}

fn codes(cards: &[Card]) -> Vec<String> {
    cards.iter().map(Card::code).collect()
}

pub fn canonical_deal(rules: &Ruleset, seed: u64, deck: &[Card]) -> String {
    let canonical = CanonicalDeal {
        v: DEAL_FORMAT_VERSION,
        sv: SHUFFLE_VERSION,
        rules: CanonicalRules {
            draw: rules.draw,
            redeals: rules.redeals,
            recycle: rules.recycle.as_str(),
        },
        seed,
        deck: deck.iter().map(Card::identity_code).collect(),
    };
    // Plain strings and integers only; serialization cannot fail.
    serde_json::to_string(&canonical).unwrap_or_default()
}

pub fn canonical_layout(state: &GameState) -> String {
    let canonical = CanonicalLayout {
        lv: LAYOUT_FORMAT_VERSION,
        tableau: state.tableau.iter().map(|pile| codes(pile)).collect(),
        foundation: state.foundation.iter().map(|pile| codes(pile)).collect(),
        stock: codes(&state.stock),
        waste: codes(&state.waste),
    };
    serde_json::to_string(&canonical).unwrap_or_default()
}

fn hash_base58(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    bs58::encode(digest).into_string()
}

/// `DL1_` identifier of a deal: rules, seed and the shuffled deck order.
pub fn deal_id(rules: &Ruleset, seed: u64, deck: &[Card]) -> String {
    format!("{}{}", DEAL_ID_PREFIX, hash_base58(&canonical_deal(rules, seed, deck)))
}

/// `L1_` identifier of the board as it stands now.
pub fn layout_id(state: &GameState) -> String {
    format!("{}{}", LAYOUT_ID_PREFIX, hash_base58(&canonical_layout(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::shuffled_deck;

    #[test]
    fn canonical_deal_is_compact_and_ordered() {
        let deck = shuffled_deck(5);
        let canonical = canonical_deal(&Ruleset::default(), 5, &deck);
        assert!(canonical.starts_with(
            r#"{"v":1,"sv":1,"rules":{"draw":1,"redeals":-1,"recycle":"KEEP"},"seed":5,"deck":[""#
        ));
        assert!(!canonical.contains(' '));
    }

    #[test]
    fn deal_id_is_stable_and_sensitive() {
        let rules = Ruleset::default();
        let deck = shuffled_deck(42);
        let id = deal_id(&rules, 42, &deck);
        assert!(id.starts_with(DEAL_ID_PREFIX));
        assert_eq!(id, deal_id(&rules, 42, &shuffled_deck(42)));

        assert_ne!(id, deal_id(&Ruleset::draw_three(), 42, &deck));
        assert_ne!(id, deal_id(&rules, 43, &deck));
        let mut swapped = deck.clone();
        swapped.swap(0, 1);
        assert_ne!(id, deal_id(&rules, 42, &swapped));
    }

    #[test]
    fn base58_alphabet_has_no_ambiguous_characters() {
        let id = deal_id(&Ruleset::default(), 1, &shuffled_deck(1));
        let body = &id[DEAL_ID_PREFIX.len()..];
        assert!(!body.is_empty());
        assert!(body.chars().all(|c| c.is_ascii_alphanumeric() && !"0OIl".contains(c)));
    }

    #[test]
    fn layout_id_tracks_face_state() {
        let mut state = GameState::deal(&shuffled_deck(3), Ruleset::default());
        let id = layout_id(&state);
        assert!(id.starts_with(LAYOUT_ID_PREFIX));
        assert_eq!(id, layout_id(&state.clone()));
        state.tableau[6][0].face_up = true;
        assert_ne!(id, layout_id(&state));
    }
}
