#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Challenge content bank and target-seeking evaluation rules.
//!
//! Challenges are loaded once from a declarative TOML document and cached; a
//! missing or malformed document degrades to an empty bank, and an empty bank
//! simply yields no challenge rather than an error. Unlike predictions, the
//! challenge metric is recomputed from the *live* inputs on every check: a
//! prediction tests foresight, a challenge tests tuning.

use std::collections::BTreeMap;

use rand::Rng as _;
use rand::SeedableRng as _;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use thiserror::Error;
use virtu_lab_core::{ChallengeSpec, Command, Event, Inputs, LabType};
use virtu_lab_system_lab_models as lab_models;

/// Error raised when a challenge bank document cannot be parsed.
#[derive(Debug, Error)]
pub enum BankError {
    /// The TOML document was syntactically or structurally invalid.
    #[error("failed to parse challenge bank: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Declarative challenge bank keyed by lab machine key.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct ChallengeBank {
    entries: BTreeMap<String, Vec<ChallengeSpec>>,
}

impl ChallengeBank {
    /// Creates a bank with no entries; every lab yields no challenge.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a bank from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, BankError> {
        Ok(toml::from_str(text)?)
    }

    /// Challenge specs available for the provided lab.
    #[must_use]
    pub fn specs_for(&self, lab: LabType) -> &[ChallengeSpec] {
        self.entries
            .get(lab.key())
            .map_or(&[], |specs| specs.as_slice())
    }

    /// Reports whether the bank holds no specs at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

/// Configuration parameters required to construct the challenge system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided selection seed.
    #[must_use]
    pub const fn new(rng_seed: u64) -> Self {
        Self { rng_seed }
    }
}

/// System that answers challenge requests with specs drawn from the bank.
#[derive(Debug)]
pub struct Challenges {
    bank: ChallengeBank,
    rng: ChaCha8Rng,
}

impl Challenges {
    /// Creates the system around a loaded (possibly empty) bank.
    #[must_use]
    pub fn new(config: Config, bank: ChallengeBank) -> Self {
        Self {
            bank,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Selects a spec uniformly at random for the lab, if any exist.
    #[must_use]
    pub fn select(&mut self, lab: LabType) -> Option<ChallengeSpec> {
        let specs = self.bank.specs_for(lab);
        if specs.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..specs.len());
        Some(specs[index].clone())
    }

    /// Consumes session events and responds with challenge commands.
    ///
    /// A `ChallengeRequested` event with an empty bank produces no command;
    /// the session stays in the challenge phase with no run until dismissed,
    /// which the presentation layer surfaces as "no challenge available".
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if let Event::ChallengeRequested { lab } = event {
                if let Some(spec) = self.select(*lab) {
                    out.push(Command::BeginChallenge { spec });
                }
            }
        }
    }
}

/// Recomputes the challenge's target metric from the live inputs.
#[must_use]
pub fn evaluate(spec: &ChallengeSpec, lab: LabType, inputs: &Inputs) -> Option<f64> {
    let outputs = lab_models::compute(lab, inputs);
    lab_models::resolve_metric(&spec.metric, inputs, &outputs)
}

/// Applies the acceptance band: a fraction of the target's magnitude.
///
/// Interpreting tolerance as a fraction keeps acceptance scale-invariant
/// across labs whose targets differ by many orders of magnitude.
#[must_use]
pub fn within_tolerance(spec: &ChallengeSpec, value: f64) -> bool {
    let band = spec.tolerance_percent / 100.0 * spec.target_value.abs();
    (value - spec.target_value).abs() <= band
}
