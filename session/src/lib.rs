#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state management for VirtuLab.
//!
//! The [`Session`] owns every piece of mutable experiment state: the active
//! lab, its inputs and derived outputs, the failure predicate result, the
//! lifecycle phase, the frozen prediction, the challenge run, the tutor
//! transcript, and the simulation clock. Mutations happen exclusively through
//! [`apply`], one command at a time; adapters and systems read through the
//! [`query`] module. A transition attempted from an invalid phase is a silent
//! no-op so that redundant UI triggers cannot corrupt the machine.

use std::time::Duration;

use virtu_lab_core::{
    ChallengeRun, Command, Event, FailureKind, FailureState, Inputs, LabType, MessageId,
    Observation, Outputs, Prediction, Role, SessionPhase, TriggerKind, TutorMessage,
    WELCOME_BANNER,
};
use virtu_lab_system_challenge as challenge;
use virtu_lab_system_lab_models as lab_models;
use virtu_lab_system_prediction as prediction;

/// Lab a fresh session starts in.
const DEFAULT_LAB: LabType = LabType::Circuit;

/// Minimum accumulated running time for a run to earn a lab report.
const REPORT_MIN_DURATION: Duration = Duration::from_secs(30);

/// Cadence at which observation snapshots are captured while running.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(6);

/// Score deducted per failure edge observed during the session.
const MISTAKE_PENALTY: u32 = 20;

/// Canned student line appended when the ask-AI pull action fires.
const ASK_AI_PROMPT: &str = "Help me understand what's happening.";

/// Represents the authoritative VirtuLab session state.
#[derive(Debug)]
pub struct Session {
    banner: &'static str,
    lab: LabType,
    phase: SessionPhase,
    inputs: Inputs,
    outputs: Outputs,
    failure: Option<FailureState>,
    prediction: Option<Prediction>,
    challenge_run: Option<ChallengeRun>,
    transcript: Vec<TutorMessage>,
    next_message_id: u64,
    clock: Duration,
    run_duration: Duration,
    sample_accumulator: Duration,
    observations: Vec<Observation>,
    mistakes: u32,
    failures_seen: Vec<FailureKind>,
    score: u32,
}

impl Session {
    /// Creates a new session parked in the default lab, ready for commands.
    #[must_use]
    pub fn new() -> Self {
        let inputs = lab_models::default_inputs(DEFAULT_LAB);
        let outputs = lab_models::compute(DEFAULT_LAB, &inputs);
        let mut session = Self {
            banner: WELCOME_BANNER,
            lab: DEFAULT_LAB,
            phase: SessionPhase::Idle,
            inputs,
            outputs,
            failure: None,
            prediction: None,
            challenge_run: None,
            transcript: Vec::new(),
            next_message_id: 0,
            clock: Duration::ZERO,
            run_duration: Duration::ZERO,
            sample_accumulator: Duration::ZERO,
            observations: Vec::new(),
            mistakes: 0,
            failures_seen: Vec::new(),
            score: 0,
        };
        let _ = session.append_message(Role::Ai, WELCOME_BANNER, None);
        session
    }

    fn append_message(
        &mut self,
        role: Role,
        text: impl Into<String>,
        trigger: Option<TriggerKind>,
    ) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        self.transcript.push(TutorMessage {
            id,
            role,
            text: text.into(),
            timestamp: self.clock,
            trigger,
        });
        id
    }

    /// Recomputes outputs and the failure predicate, edge-detecting failure
    /// transitions. A rising edge (or a change of kind) counts one mistake
    /// and logs the kind for reporting; holding the same failure does not.
    fn refresh_derived(&mut self, out_events: &mut Vec<Event>) {
        self.outputs = lab_models::compute(self.lab, &self.inputs);
        let next = lab_models::detect_failure(self.lab, &self.inputs);
        let previous_kind = self.failure.as_ref().map(FailureState::kind);
        let next_kind = next.as_ref().map(FailureState::kind);

        if next_kind != previous_kind {
            if let Some(state) = &next {
                self.mistakes = self.mistakes.saturating_add(1);
                if !self.failures_seen.contains(&state.kind()) {
                    self.failures_seen.push(state.kind());
                }
                out_events.push(Event::FailureDetected {
                    state: state.clone(),
                });
            } else if let Some(kind) = previous_kind {
                out_events.push(Event::FailureCleared { kind });
            }
        }

        self.failure = next;
    }

    fn set_input(&mut self, key: &str, value: f64, out_events: &mut Vec<Event>) {
        self.inputs.set(key, value);
        self.refresh_derived(out_events);
        out_events.push(Event::InputChanged {
            key: key.to_owned(),
            value,
        });
    }

    fn enter_phase(&mut self, phase: SessionPhase, out_events: &mut Vec<Event>) {
        if self.phase == phase {
            return;
        }
        if self.phase == SessionPhase::Running {
            // Cancel-on-exit: no sampling accumulation may survive the phase.
            self.sample_accumulator = Duration::ZERO;
        }
        self.phase = phase;
        out_events.push(Event::PhaseChanged { phase });
    }

    fn begin_run(&mut self, out_events: &mut Vec<Event>) {
        self.run_duration = Duration::ZERO;
        self.sample_accumulator = Duration::ZERO;
        self.observations.clear();
        self.enter_phase(SessionPhase::Running, out_events);
    }

    /// Restores the lab's default state. The transcript is kept: chat history
    /// survives resets, everything experiment-scoped does not.
    fn reset_around_lab(&mut self, lab: LabType) {
        self.lab = lab;
        self.inputs = lab_models::default_inputs(lab);
        self.outputs = lab_models::compute(lab, &self.inputs);
        self.failure = None;
        self.prediction = None;
        self.challenge_run = None;
        self.run_duration = Duration::ZERO;
        self.sample_accumulator = Duration::ZERO;
        self.observations.clear();
        self.mistakes = 0;
        self.failures_seen.clear();
        self.score = 0;
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock = self.clock.saturating_add(dt);
        out_events.push(Event::TimeAdvanced { dt });

        if self.phase != SessionPhase::Running {
            return;
        }

        self.run_duration = self.run_duration.saturating_add(dt);
        self.sample_accumulator = self.sample_accumulator.saturating_add(dt);
        while self.sample_accumulator >= SAMPLE_INTERVAL {
            self.sample_accumulator -= SAMPLE_INTERVAL;
            let observation = Observation {
                at: self.clock,
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
            };
            self.observations.push(observation.clone());
            out_events.push(Event::ObservationRecorded { observation });
        }
    }

    fn stop_experiment(&mut self, out_events: &mut Vec<Event>) {
        self.score = 100_u32.saturating_sub(self.mistakes.saturating_mul(MISTAKE_PENALTY));
        self.enter_phase(SessionPhase::Comparing, out_events);

        if let Some(prediction) = &self.prediction {
            if let Some(guess) = prediction.user_guess() {
                let grade = prediction::grade(prediction.expected(), guess);
                out_events.push(Event::PredictionGraded {
                    band: grade.band,
                    gap_percent: grade.gap_percent,
                    message: grade.message,
                });
            }
        }

        out_events.push(Event::ExperimentFinished {
            lab: self.lab,
            score: self.score,
            duration: self.run_duration,
            mistakes: self.mistakes,
            failures: self.failures_seen.clone(),
        });
    }

    fn check_challenge_attempt(&mut self, out_events: &mut Vec<Event>) {
        let Some(run) = self.challenge_run.as_mut() else {
            return;
        };
        if run.completed() {
            return;
        }

        let hint_was_unlocked = run.hint_unlocked();
        run.note_attempt();
        let value = challenge::evaluate(run.spec(), self.lab, &self.inputs);
        let completed = value.is_some_and(|value| challenge::within_tolerance(run.spec(), value));
        if completed {
            run.seal_completed();
        }

        let attempts = run.attempts();
        let hint_unlocked = run.hint_unlocked();
        out_events.push(Event::ChallengeAttempted {
            attempts,
            value,
            completed,
        });
        if hint_unlocked && !hint_was_unlocked {
            out_events.push(Event::ChallengeHintUnlocked);
        }
        if completed {
            out_events.push(Event::ChallengeCompleted { attempts });
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the session, mutating state deterministically.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SelectLab { lab } => {
            session.reset_around_lab(lab);
            let previous_phase = session.phase;
            session.phase = SessionPhase::Idle;
            out_events.push(Event::LabSelected { lab });
            if previous_phase != SessionPhase::Idle {
                out_events.push(Event::PhaseChanged {
                    phase: SessionPhase::Idle,
                });
            }
        }
        Command::UpdateInput { key, value } => {
            // Non-finite values never enter the model; degrade to no effect.
            if value.is_finite() {
                session.set_input(&key, value, out_events);
            }
        }
        Command::StartExperiment => {
            if session.phase == SessionPhase::Idle {
                session.prediction = Some(prediction::generate(session.lab, &session.inputs));
                session.enter_phase(SessionPhase::Predicting, out_events);
            }
        }
        Command::SubmitPrediction { guess } => {
            if session.phase == SessionPhase::Predicting && guess.is_finite() {
                if let Some(prediction) = session.prediction.as_mut() {
                    prediction.record_guess(guess);
                }
                session.begin_run(out_events);
            }
        }
        Command::SkipPrediction => {
            if session.phase == SessionPhase::Predicting {
                session.prediction = None;
                session.begin_run(out_events);
            }
        }
        Command::StopExperiment => {
            if session.phase == SessionPhase::Running {
                session.stop_experiment(out_events);
            }
        }
        Command::FinishComparison => {
            if session.phase == SessionPhase::Comparing {
                let next = if session.run_duration >= REPORT_MIN_DURATION {
                    SessionPhase::Report
                } else {
                    SessionPhase::Idle
                };
                session.enter_phase(next, out_events);
            }
        }
        Command::DismissReport => {
            if session.phase == SessionPhase::Report {
                session.enter_phase(SessionPhase::Challenge, out_events);
                out_events.push(Event::ChallengeRequested { lab: session.lab });
            }
        }
        Command::DismissChallenge => {
            if session.phase == SessionPhase::Challenge {
                session.challenge_run = None;
                session.enter_phase(SessionPhase::Idle, out_events);
            }
        }
        Command::ResetExperiment => {
            let lab = session.lab;
            session.reset_around_lab(lab);
            let previous_phase = session.phase;
            session.phase = SessionPhase::Idle;
            out_events.push(Event::SessionReset { lab });
            if previous_phase != SessionPhase::Idle {
                out_events.push(Event::PhaseChanged {
                    phase: SessionPhase::Idle,
                });
            }
        }
        Command::Tick { dt } => session.tick(dt, out_events),
        Command::BeginChallenge { spec } => {
            if session.phase == SessionPhase::Challenge && session.challenge_run.is_none() {
                for (key, value) in spec.fixed_inputs.clone() {
                    session.set_input(&key, value, out_events);
                }
                out_events.push(Event::ChallengeStarted {
                    description: spec.description.clone(),
                });
                session.challenge_run = Some(ChallengeRun::new(spec));
            }
        }
        Command::CheckChallengeAttempt => {
            if session.phase == SessionPhase::Challenge {
                session.check_challenge_attempt(out_events);
            }
        }
        Command::AskAi => {
            let id = session.append_message(Role::Student, ASK_AI_PROMPT, None);
            out_events.push(Event::MessagePosted {
                id,
                role: Role::Student,
            });
            out_events.push(Event::GuidanceRequested { lab: session.lab });
        }
        Command::AddStudentMessage { text } => {
            let id = session.append_message(Role::Student, text, None);
            out_events.push(Event::MessagePosted {
                id,
                role: Role::Student,
            });
        }
        Command::PostTutorMessage { text, trigger } => {
            let id = session.append_message(Role::Ai, text, Some(trigger));
            out_events.push(Event::MessagePosted { id, role: Role::Ai });
        }
    }
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use std::time::Duration;

    use super::Session;
    use virtu_lab_core::{
        ChallengeRun, FailureKind, FailureState, Inputs, LabType, Observation, Outputs,
        Prediction, SessionPhase, TutorMessage,
    };

    /// Retrieves the welcome banner that adapters may display to students.
    #[must_use]
    pub fn welcome_banner(session: &Session) -> &'static str {
        session.banner
    }

    /// Lab the session is currently simulating.
    #[must_use]
    pub fn active_lab(session: &Session) -> LabType {
        session.lab
    }

    /// Lifecycle phase the session is currently in.
    #[must_use]
    pub fn phase(session: &Session) -> SessionPhase {
        session.phase
    }

    /// Read-only view of the current input parameters.
    #[must_use]
    pub fn inputs(session: &Session) -> &Inputs {
        &session.inputs
    }

    /// Read-only view of the derived metrics for the current inputs.
    #[must_use]
    pub fn outputs(session: &Session) -> &Outputs {
        &session.outputs
    }

    /// Currently active failure, if the inputs are implausible.
    #[must_use]
    pub fn failure(session: &Session) -> Option<&FailureState> {
        session.failure.as_ref()
    }

    /// Prediction created for the current run, if one exists.
    #[must_use]
    pub fn prediction(session: &Session) -> Option<&Prediction> {
        session.prediction.as_ref()
    }

    /// Challenge run in progress, if one has been installed.
    #[must_use]
    pub fn challenge_run(session: &Session) -> Option<&ChallengeRun> {
        session.challenge_run.as_ref()
    }

    /// Append-only tutor transcript in posting order.
    #[must_use]
    pub fn transcript(session: &Session) -> &[TutorMessage] {
        &session.transcript
    }

    /// Total simulated time the session has processed.
    #[must_use]
    pub fn clock(session: &Session) -> Duration {
        session.clock
    }

    /// Accumulated running time of the current or most recent run.
    #[must_use]
    pub fn run_duration(session: &Session) -> Duration {
        session.run_duration
    }

    /// Score awarded when the most recent run stopped.
    #[must_use]
    pub fn score(session: &Session) -> u32 {
        session.score
    }

    /// Number of failure edges observed since the last reset.
    #[must_use]
    pub fn mistakes(session: &Session) -> u32 {
        session.mistakes
    }

    /// Distinct failure kinds seen since the last reset, in first-seen order.
    #[must_use]
    pub fn failures_seen(session: &Session) -> &[FailureKind] {
        &session.failures_seen
    }

    /// Observation snapshots captured by the sampling tick this run.
    #[must_use]
    pub fn observations(session: &Session) -> &[Observation] {
        &session.observations
    }
}
