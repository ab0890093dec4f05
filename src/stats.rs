//! Finished-game records, their `SV1;` log line, and the contracts of the
//! collaborators that keep and upload them.

use crate::codec::{optional, parse_fields, parse_flag, parse_ruleset, required};
use crate::error::CodecError;
use crate::rules::Ruleset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SOLVE_LOG_HEADER: &str = "SV1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Won,
    Abandoned,
    Lost,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Won => "WON",
            Outcome::Abandoned => "ABANDONED",
            Outcome::Lost => "LOST",
        }
    }

    pub fn parse(value: &str) -> Option<Outcome> {
        match value {
            "WON" => Some(Outcome::Won),
            "ABANDONED" => Some(Outcome::Abandoned),
            "LOST" => Some(Outcome::Lost),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStats {
    pub deal_id: String,
    pub seed: Option<u64>,
    pub rules: Ruleset,
    pub started_at: Option<u64>,
    pub finished_at: u64,
    pub duration_ms: u64,
    pub move_count: u32,
    pub outcome: Outcome,
    pub score: i32,
    pub layout_id: String,
    pub client: String,
    pub platform: String,
}

// Free text must not break the `k=v;` framing.
fn sanitize(value: &str) -> String {
    value.replace([';', '='], "_")
}

impl SolveStats {
    pub fn encode_line(&self) -> String {
        let mut fields = vec![format!("deal={}", self.deal_id)];
        if let Some(seed) = self.seed {
            fields.push(format!("seed={}", seed));
        }
        fields.push(format!("draw={}", self.rules.draw));
        fields.push(format!("redeals={}", self.rules.redeals));
        fields.push(format!("recycle={}", self.rules.recycle.as_str()));
        fields.push(format!(
            "f2t={}",
            u8::from(self.rules.allow_foundation_to_tableau)
        ));
        if let Some(started_at) = self.started_at {
            fields.push(format!("start={}", started_at));
        }
        fields.push(format!("end={}", self.finished_at));
        fields.push(format!("dur={}", self.duration_ms));
        fields.push(format!("moves={}", self.move_count));
        fields.push(format!("outcome={}", self.outcome.as_str()));
        fields.push(format!("score={}", self.score));
        fields.push(format!("layout={}", self.layout_id));
        fields.push(format!("client={}", sanitize(&self.client)));
        fields.push(format!("platform={}", sanitize(&self.platform)));
        format!("{};{}", SOLVE_LOG_HEADER, fields.join(";"))
    }

    pub fn decode_line(line: &str) -> Result<SolveStats, CodecError> {
        let fields = parse_fields(line, &[SOLVE_LOG_HEADER])?;
        let outcome_value = required(&fields, "outcome")?;
        let outcome = Outcome::parse(outcome_value).ok_or_else(|| CodecError::InvalidField {
            field: "outcome",
            value: outcome_value.to_string(),
        })?;
        // validates the flag even though parse_ruleset reads it again
        parse_flag(optional(&fields, "f2t")?, "f2t", true)?;
        Ok(SolveStats {
            deal_id: required(&fields, "deal")?.to_string(),
            seed: optional(&fields, "seed")?,
            rules: parse_ruleset(&fields)?,
            started_at: optional(&fields, "start")?,
            finished_at: optional(&fields, "end")?.unwrap_or(0),
            duration_ms: optional(&fields, "dur")?.unwrap_or(0),
            move_count: optional(&fields, "moves")?.unwrap_or(0),
            outcome,
            score: optional(&fields, "score")?.unwrap_or(0),
            layout_id: fields.get("layout").copied().unwrap_or_default().to_string(),
            client: fields.get("client").copied().unwrap_or_default().to_string(),
            platform: fields.get("platform").copied().unwrap_or_default().to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistorySort {
    #[default]
    Newest,
    Oldest,
    Fastest,
    FewestMoves,
    HighestScore,
}

#[derive(Clone, Debug, Default)]
pub struct HistoryQuery {
    pub outcome: Option<Outcome>,
    pub favorites_only: bool,
    pub sort: HistorySort,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Append-only store of solve records, with upload bookkeeping and a
/// browsable history.
pub trait SolveLogStore {
    fn append(&mut self, record: &SolveStats);
    /// Records not yet uploaded, oldest first.
    fn read_pending(&self) -> Vec<SolveStats>;
    fn read_all(&self) -> Vec<SolveStats>;
    fn mark_uploaded(&mut self, records: &[SolveStats]);
    fn query(&self, query: &HistoryQuery) -> Vec<SolveStats>;
    /// Returns whether the deal is a favorite afterwards.
    fn toggle_favorite(&mut self, deal_id: &str) -> bool;
    fn is_favorite(&self, deal_id: &str) -> bool;
}

#[derive(Clone, Debug)]
struct StoredLine {
    line: String,
    uploaded: bool,
}

/// `SolveLogStore` over in-memory `SV1;` lines.
#[derive(Clone, Debug, Default)]
pub struct MemorySolveLog {
    lines: Vec<StoredLine>,
    favorites: HashSet<String>,
}

impl MemorySolveLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads previously persisted lines, all considered uploaded.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .filter(|line| !line.trim().is_empty())
                .map(|line| StoredLine {
                    line: line.trim().to_string(),
                    uploaded: true,
                })
                .collect(),
            favorites: HashSet::new(),
        }
    }
}

fn decode_lines<'a>(stored: impl Iterator<Item = &'a StoredLine>) -> Vec<SolveStats> {
    stored
        .filter_map(|stored| match SolveStats::decode_line(&stored.line) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("skipping unreadable solve log line: {}", err);
                None
            }
        })
        .collect()
}

impl SolveLogStore for MemorySolveLog {
    fn append(&mut self, record: &SolveStats) {
        self.lines.push(StoredLine {
            line: record.encode_line(),
            uploaded: false,
        });
    }

    fn read_pending(&self) -> Vec<SolveStats> {
        decode_lines(self.lines.iter().filter(|stored| !stored.uploaded))
    }

    fn read_all(&self) -> Vec<SolveStats> {
        decode_lines(self.lines.iter())
    }

    fn mark_uploaded(&mut self, records: &[SolveStats]) {
        let uploaded: HashSet<String> = records.iter().map(SolveStats::encode_line).collect();
        self.lines
            .iter_mut()
            .filter(|stored| uploaded.contains(&stored.line))
            .for_each(|stored| stored.uploaded = true);
    }

    fn query(&self, query: &HistoryQuery) -> Vec<SolveStats> {
        let mut records: Vec<SolveStats> = self
            .read_all()
            .into_iter()
            .filter(|record| query.outcome.map_or(true, |outcome| record.outcome == outcome))
            .filter(|record| !query.favorites_only || self.favorites.contains(&record.deal_id))
            .collect();
        match query.sort {
            HistorySort::Newest => records.sort_by_key(|r| std::cmp::Reverse(r.finished_at)),
            HistorySort::Oldest => records.sort_by_key(|r| r.finished_at),
            HistorySort::Fastest => records.sort_by_key(|r| r.duration_ms),
            HistorySort::FewestMoves => records.sort_by_key(|r| r.move_count),
            HistorySort::HighestScore => records.sort_by_key(|r| std::cmp::Reverse(r.score)),
        }
        records
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn toggle_favorite(&mut self, deal_id: &str) -> bool {
        if self.favorites.remove(deal_id) {
            false
        } else {
            self.favorites.insert(deal_id.to_string());
            true
        }
    }

    fn is_favorite(&self, deal_id: &str) -> bool {
        self.favorites.contains(deal_id)
    }
}

/// Normalized upload body for a `SolveStats` record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub deal_id: String,
    /// Decimal string; 64-bit seeds do not survive JSON number parsing everywhere.
    pub seed: Option<String>,
    pub draw: u8,
    pub redeals: i32,
    pub recycle: String,
    pub allow_foundation_to_tableau: bool,
    pub started_at: Option<u64>,
    pub finished_at: u64,
    pub duration_ms: u64,
    pub move_count: u32,
    pub outcome: String,
    pub score: i32,
    pub layout_id: String,
    pub client: String,
    pub platform: String,
}

impl From<&SolveStats> for UploadRequest {
    fn from(stats: &SolveStats) -> Self {
        Self {
            deal_id: stats.deal_id.clone(),
            seed: stats.seed.map(|seed| seed.to_string()),
            draw: stats.rules.draw,
            redeals: stats.rules.redeals,
            recycle: stats.rules.recycle.as_str().to_lowercase(),
            allow_foundation_to_tableau: stats.rules.allow_foundation_to_tableau,
            started_at: stats.started_at,
            finished_at: stats.finished_at,
            duration_ms: stats.duration_ms,
            move_count: stats.move_count,
            outcome: stats.outcome.as_str().to_lowercase(),
            score: stats.score,
            layout_id: stats.layout_id.clone(),
            client: stats.client.trim().to_string(),
            platform: stats.platform.trim().to_lowercase(),
        }
    }
}

impl UploadRequest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receives normalized records.
pub trait UploadClient {
    type Error;

    fn upload(&mut self, request: &UploadRequest) -> Result<(), Self::Error>;
}

/// Uploads every pending record, marking the ones that went through. Stops at
/// the first failure and returns how many were uploaded before it.
pub fn upload_pending<S, U>(store: &mut S, client: &mut U) -> Result<usize, U::Error>
where
    S: SolveLogStore,
    U: UploadClient,
{
    let mut done = Vec::new();
    let mut failure = None;
    for record in store.read_pending() {
        match client.upload(&UploadRequest::from(&record)) {
            Ok(()) => done.push(record),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    store.mark_uploaded(&done);
    match failure {
        Some(err) => Err(err),
        None => Ok(done.len()),
    }
}
