#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hint/tutor escalation engine.
//!
//! The tutor watches the session's event stream and decides what the student
//! is told and when. Two trigger families feed it: failure transitions
//! (edge-triggered, once per distinct [`FailureState`] change) and
//! danger-zone dwell (a lab-specific predicate that must hold continuously
//! for [`DANGER_DWELL`] of simulated time while running). Both share a single
//! global cooldown of [`MESSAGE_COOLDOWN`] between tutor-authored messages.
//! The explicit ask-AI pull bypasses the cooldown gate but still stamps the
//! cooldown clock, and student chat is never throttled here at all.
//!
//! Hints come from a declarative template bank with three escalation levels
//! per trigger key; `{variable}` placeholders are interpolated against the
//! *current* inputs and freshly computed outputs at emission time, so the
//! numbers a student sees are never stale.
//!
//! [`FailureState`]: virtu_lab_core::FailureState

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use virtu_lab_core::{Command, Event, FailureKind, Inputs, LabType, TriggerKind};
use virtu_lab_system_lab_models as lab_models;

/// Minimum spacing between two tutor-authored messages.
pub const MESSAGE_COOLDOWN: Duration = Duration::from_secs(30);

/// Continuous time a danger predicate must hold before the tutor speaks.
pub const DANGER_DWELL: Duration = Duration::from_secs(5);

/// Highest escalation level; template arrays are indexed `0..=2`.
pub const MAX_ESCALATION_LEVEL: u32 = 2;

/// Error raised when a hint template document cannot be parsed.
#[derive(Debug, Error)]
pub enum BankError {
    /// The TOML document was syntactically or structurally invalid.
    #[error("failed to parse hint templates: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Deserialize)]
struct LevelSet {
    levels: Vec<String>,
}

impl LevelSet {
    fn pick(&self, level: u32) -> Option<&str> {
        if self.levels.is_empty() {
            return None;
        }
        let index = (level as usize).min(self.levels.len() - 1);
        Some(self.levels[index].as_str())
    }
}

/// Declarative hint templates keyed by failure kind and by lab.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TemplateBank {
    failure: BTreeMap<String, LevelSet>,
    danger: BTreeMap<String, LevelSet>,
    ask: BTreeMap<String, String>,
    general: LevelSet,
}

impl Default for TemplateBank {
    /// Built-in fallback used when the hint document cannot be loaded: a
    /// single general ladder plus a generic ask reply, so the tutor always
    /// has something to say.
    fn default() -> Self {
        Self {
            failure: BTreeMap::new(),
            danger: BTreeMap::new(),
            ask: BTreeMap::new(),
            general: LevelSet {
                levels: vec![
                    "Try resetting to default values and adjusting one parameter at a time."
                        .to_owned(),
                    "Look at the readings carefully. Which value seems unusual?".to_owned(),
                    "Reset to defaults, then change only one slider while keeping everything \
                     else constant."
                        .to_owned(),
                ],
            },
        }
    }
}

impl TemplateBank {
    /// Parses a template bank from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, BankError> {
        Ok(toml::from_str(text)?)
    }

    fn failure_template(&self, kind: FailureKind, level: u32) -> &str {
        self.failure
            .get(kind.key())
            .and_then(|set| set.pick(level))
            .or_else(|| self.general.pick(level))
            .unwrap_or("Check your parameters!")
    }

    fn danger_template(&self, lab: LabType, level: u32) -> &str {
        self.danger
            .get(lab.key())
            .and_then(|set| set.pick(level))
            .or_else(|| self.general.pick(level))
            .unwrap_or("You're approaching dangerous values. What might happen?")
    }

    fn ask_template(&self, lab: LabType) -> &str {
        self.ask
            .get(lab.key())
            .or_else(|| self.ask.get("general"))
            .map_or(
                "Think about the relationship between your variables. What happens when you \
                 change one?",
                String::as_str,
            )
    }
}

/// Escalation counter key: trigger keys are scoped per failure kind or,
/// for danger zones, per lab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TriggerKey {
    Failure(FailureKind),
    Danger(LabType),
}

/// Stateful hint engine consuming session events and emitting tutor commands.
#[derive(Debug)]
pub struct Tutor {
    bank: TemplateBank,
    escalation: BTreeMap<TriggerKey, u32>,
    dwell_started: Option<Duration>,
    dwell_fired: bool,
    last_message_at: Option<Duration>,
    running: bool,
}

impl Tutor {
    /// Creates the engine around a loaded (possibly default) template bank.
    #[must_use]
    pub fn new(bank: TemplateBank) -> Self {
        Self {
            bank,
            escalation: BTreeMap::new(),
            dwell_started: None,
            dwell_fired: false,
            last_message_at: None,
            running: false,
        }
    }

    /// Consumes session events and responds with tutor message commands.
    ///
    /// `lab`, `inputs`, and `now` must come from the same session snapshot
    /// the events were drained from; interpolation reads them at emission
    /// time so displayed numbers are current.
    pub fn handle(
        &mut self,
        events: &[Event],
        lab: LabType,
        inputs: &Inputs,
        now: Duration,
        out: &mut Vec<Command>,
    ) {
        let mut tick_observed = false;

        for event in events {
            match event {
                Event::LabSelected { .. } => {
                    // New lab, fresh escalation ladder. The cooldown clock
                    // deliberately survives the switch.
                    self.escalation.clear();
                    self.disarm_dwell();
                }
                Event::PhaseChanged { phase } => {
                    self.running = *phase == virtu_lab_core::SessionPhase::Running;
                    if !self.running {
                        self.disarm_dwell();
                    }
                }
                Event::FailureDetected { state } => {
                    let level = self.bump_escalation(TriggerKey::Failure(state.kind()));
                    let template = self
                        .bank
                        .failure_template(state.kind(), level)
                        .to_owned();
                    if self.cooldown_elapsed(now) {
                        let hint = interpolate(&template, lab, inputs);
                        self.post(
                            format!("{}\n{hint}", state.description()),
                            TriggerKind::Failure,
                            now,
                            out,
                        );
                    }
                }
                Event::GuidanceRequested { lab: asked_lab } => {
                    // The pull action bypasses the gate but stamps the clock.
                    let reply = interpolate(self.bank.ask_template(*asked_lab), lab, inputs);
                    self.post(reply, TriggerKind::AskAi, now, out);
                }
                Event::TimeAdvanced { .. } => {
                    tick_observed = true;
                }
                _ => {}
            }
        }

        if tick_observed {
            self.evaluate_dwell(lab, inputs, now, out);
        }
    }

    fn evaluate_dwell(
        &mut self,
        lab: LabType,
        inputs: &Inputs,
        now: Duration,
        out: &mut Vec<Command>,
    ) {
        if !self.running || !lab_models::danger_zone(lab, inputs) {
            self.disarm_dwell();
            return;
        }

        let started = *self.dwell_started.get_or_insert(now);
        if self.dwell_fired || now.saturating_sub(started) < DANGER_DWELL {
            return;
        }
        self.dwell_fired = true;

        let level = self.bump_escalation(TriggerKey::Danger(lab));
        if self.cooldown_elapsed(now) {
            let hint = interpolate(self.bank.danger_template(lab, level), lab, inputs);
            self.post(
                format!("Gentle warning: you have been in the danger zone for a while.\n{hint}"),
                TriggerKind::DangerZone,
                now,
                out,
            );
        }
    }

    fn disarm_dwell(&mut self) {
        self.dwell_started = None;
        self.dwell_fired = false;
    }

    /// Returns the level for this occurrence and advances the counter.
    /// Escalation advances even when the cooldown swallows the message, so a
    /// student who keeps re-triggering gets the more specific template once
    /// the tutor may speak again.
    fn bump_escalation(&mut self, key: TriggerKey) -> u32 {
        let count = self.escalation.entry(key).or_insert(0);
        let level = (*count).min(MAX_ESCALATION_LEVEL);
        *count = count.saturating_add(1);
        level
    }

    fn cooldown_elapsed(&self, now: Duration) -> bool {
        self.last_message_at
            .map_or(true, |at| now.saturating_sub(at) >= MESSAGE_COOLDOWN)
    }

    fn post(&mut self, text: String, trigger: TriggerKind, now: Duration, out: &mut Vec<Command>) {
        self.last_message_at = Some(now);
        out.push(Command::PostTutorMessage { text, trigger });
    }
}

/// Replaces `{variable}` placeholders with current input and output values.
///
/// Outputs are recomputed here, at emission time, so a template like
/// `{current_ma}` reflects the sliders as they stand now, not as they stood
/// when the trigger armed.
#[must_use]
pub fn interpolate(template: &str, lab: LabType, inputs: &Inputs) -> String {
    let outputs = lab_models::compute(lab, inputs);
    let mut text = template.to_owned();
    for (key, value) in inputs.iter().chain(outputs.iter()) {
        let placeholder = format!("{{{key}}}");
        if text.contains(&placeholder) {
            text = text.replace(&placeholder, &format_value(value));
        }
    }
    text
}

fn format_value(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1.0e9 {
        format!("{value:.0}")
    } else {
        let formatted = format!("{value:.3}");
        formatted.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}
