//! # Fingerprint matcher
//!
//! Narrows the set of candidate variants while bus traffic is observed during
//! the identification window.
//!
//! A signature stays live while every observed ID it declares was seen with
//! the declared length. IDs a signature does not declare are not held against
//! it, unless strict mode is enabled and another signature in the database
//! does declare the ID. A variant is eliminated once none of its signatures is
//! live. IDs unknown to the whole database are ignored.
//!
//! The filtering rule is commutative: the order in which frames arrive only
//! matters for window accounting.

use crate::fingerprint::FingerprintDatabase;
use crate::VehicleVariant;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identification window limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Relevant frames that must be seen before a single remaining candidate
    /// is confirmed ahead of the window closing.
    pub min_frames: u32,
    /// Close the window after this many observed frames (relevant or not).
    pub max_frames: Option<u32>,
    /// Close the window once this much time has passed since the first
    /// timestamped observation.
    pub max_duration: Option<Duration>,
    /// Treat an ID declared elsewhere in the database but missing from a
    /// signature as falsifying that signature.
    pub reject_foreign_ids: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_frames: 50,
            max_frames: Some(20_000),
            max_duration: Some(Duration::from_secs(2)),
            reject_foreign_ids: false,
        }
    }
}

/// Outcome of identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Window still open and more than one candidate remains
    Unresolved,
    /// Exactly one variant is consistent with the traffic
    Confirmed(VehicleVariant),
    /// Window closed with several candidates still consistent
    Ambiguous(Vec<VehicleVariant>),
    /// No known variant is consistent with the traffic
    NoMatch,
}

impl MatchResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchResult::Unresolved)
    }
}

/// Single-owner identification state. Dropped once a decision is made.
pub struct FingerprintMatcher<'db> {
    db: &'db FingerprintDatabase,
    config: MatcherConfig,
    observations: BTreeMap<u32, u8>,
    // variant -> indices of its still-live signatures
    candidates: BTreeMap<VehicleVariant, Vec<usize>>,
    frames_seen: u32,
    relevant_frames: u32,
    first_timestamp: Option<Duration>,
    outcome: Option<MatchResult>,
}

impl<'db> FingerprintMatcher<'db> {
    pub fn new(db: &'db FingerprintDatabase, config: MatcherConfig) -> Self {
        let candidates: BTreeMap<_, _> = db
            .variants()
            .map(|variant| (variant, (0..db.signatures(variant).len()).collect()))
            .collect();

        let outcome = if candidates.is_empty() {
            warn!("fingerprint database is empty, nothing can match");
            Some(MatchResult::NoMatch)
        } else {
            None
        };

        Self {
            db,
            config,
            observations: BTreeMap::new(),
            candidates,
            frames_seen: 0,
            relevant_frames: 0,
            first_timestamp: None,
            outcome,
        }
    }

    /// Record one frame without a timestamp. Only `max_frames` can close the
    /// window.
    pub fn observe(&mut self, id: u32, length: u8) -> MatchResult {
        self.record(id, length, None)
    }

    /// Record one frame received at `timestamp` (monotonic, caller's origin).
    pub fn observe_at(&mut self, id: u32, length: u8, timestamp: Duration) -> MatchResult {
        self.record(id, length, Some(timestamp))
    }

    fn record(&mut self, id: u32, length: u8, timestamp: Option<Duration>) -> MatchResult {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        if let Some(ts) = timestamp {
            self.first_timestamp.get_or_insert(ts);
        }

        if self.db.is_known_id(id) {
            self.relevant_frames = self.relevant_frames.saturating_add(1);
            if let Some(previous) = self.observations.insert(id, length) {
                if previous != length {
                    warn!(id, previous, length, "payload length changed mid-session");
                }
            }
            self.eliminate(id, length);

            if self.candidates.is_empty() {
                info!(id, length, "observation falsified every candidate");
                self.outcome = Some(MatchResult::NoMatch);
            } else if self.candidates.len() == 1 && self.relevant_frames >= self.config.min_frames {
                self.close();
            }
        }

        if self.outcome.is_none() && self.window_expired(timestamp) {
            self.close();
        }

        self.result()
    }

    fn eliminate(&mut self, id: u32, length: u8) {
        let db = self.db;
        let strict = self.config.reject_foreign_ids;

        self.candidates.retain(|variant, live| {
            let signatures = db.signatures(*variant);
            live.retain(|&idx| match signatures[idx].expected_length(id) {
                Some(expected) => expected == length,
                None => !strict,
            });
            if live.is_empty() {
                debug!(%variant, id, length, "candidate eliminated");
                false
            } else {
                true
            }
        });
    }

    fn window_expired(&self, timestamp: Option<Duration>) -> bool {
        if let Some(max_frames) = self.config.max_frames {
            if self.frames_seen >= max_frames {
                return true;
            }
        }
        match (self.config.max_duration, self.first_timestamp, timestamp) {
            (Some(max), Some(first), Some(now)) => now.saturating_sub(first) >= max,
            _ => false,
        }
    }

    /// Close the identification window and fix the result.
    pub fn close(&mut self) -> MatchResult {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let mut remaining = self.candidates.keys().copied();
        let outcome = match (remaining.next(), remaining.next()) {
            (None, _) => MatchResult::NoMatch,
            (Some(variant), None) => MatchResult::Confirmed(variant),
            _ => MatchResult::Ambiguous(self.candidates.keys().copied().collect()),
        };
        info!(
            frames = self.frames_seen,
            relevant = self.relevant_frames,
            result = ?outcome,
            "identification window closed"
        );
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Current result; `Unresolved` until the window closes or a terminal
    /// state is reached early.
    pub fn result(&self) -> MatchResult {
        self.outcome.clone().unwrap_or(MatchResult::Unresolved)
    }

    /// Close the window and release the observation state.
    pub fn finish(mut self) -> MatchResult {
        self.close()
    }

    /// Variants still consistent with the traffic.
    pub fn candidates(&self) -> impl Iterator<Item = VehicleVariant> + '_ {
        self.candidates.keys().copied()
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Distinct relevant IDs observed so far with their latest length.
    pub fn observations(&self) -> &BTreeMap<u32, u8> {
        &self.observations
    }
}
