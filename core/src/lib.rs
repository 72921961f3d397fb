#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the VirtuLab engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative session, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the session executes those commands
//! via its `apply` entry point, and then broadcasts [`Event`] values for
//! systems to react to deterministically. Systems consume event streams,
//! query immutable snapshots, and respond exclusively with new command
//! batches.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str =
    "Welcome to VirtuLab! Start an experiment and I will guide you through it.";

/// Closed enumeration of the experiments the engine can simulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabType {
    /// Resistive circuit governed by Ohm's law.
    Circuit,
    /// Projectile launched over flat ground.
    Projectile,
    /// Simple pendulum under the small-angle approximation.
    Pendulum,
    /// Strong acid-base titration followed through its pH curve.
    Titration,
    /// Temperature-modulated Michaelis-Menten enzyme kinetics.
    Enzyme,
    /// Thin converging lens on an optical bench.
    Optics,
    /// Temperature- and concentration-driven reaction rate.
    ReactionRate,
    /// Two-input digital logic gate sandbox.
    LogicGate,
    /// Inverse-square gravitational attraction.
    Gravity,
}

impl LabType {
    /// Every lab the engine supports, in presentation order.
    pub const ALL: [LabType; 9] = [
        LabType::Circuit,
        LabType::Projectile,
        LabType::Pendulum,
        LabType::Titration,
        LabType::Enzyme,
        LabType::Optics,
        LabType::ReactionRate,
        LabType::LogicGate,
        LabType::Gravity,
    ];

    /// Stable machine key used by content banks and persisted records.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Circuit => "circuit",
            Self::Projectile => "projectile",
            Self::Pendulum => "pendulum",
            Self::Titration => "titration",
            Self::Enzyme => "enzyme",
            Self::Optics => "optics",
            Self::ReactionRate => "reaction-rate",
            Self::LogicGate => "logic-gate",
            Self::Gravity => "gravity",
        }
    }

    /// Human-readable name shown by adapters.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Circuit => "Ohm's Law & Resistance",
            Self::Projectile => "Projectile Motion",
            Self::Pendulum => "Simple Pendulum",
            Self::Titration => "Acid-Base Titration",
            Self::Enzyme => "Enzyme Kinetics",
            Self::Optics => "Optics Bench",
            Self::ReactionRate => "Rate of Reaction",
            Self::LogicGate => "Logic Gates",
            Self::Gravity => "Gravitation",
        }
    }

    /// Resolves a machine key back to its lab, if the key is known.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lab| lab.key() == key)
    }
}

/// Machine-readable names for the failure conditions labs can detect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Resistance collapsed far enough for current to run away.
    ShortCircuit,
    /// Current exceeds the safe component rating.
    Overload,
    /// Launch geometry yields effectively no horizontal range.
    ZeroRange,
    /// Angle large enough to invalidate the lab's approximation.
    LargeAngle,
    /// A quantity was driven past its practical end point.
    Overshoot,
    /// Temperature destroyed the enzyme or catalyst.
    Denatured,
    /// Object sits at the focal point, so no image forms.
    NoImage,
}

impl FailureKind {
    /// Stable machine key used by hint banks and persisted records.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ShortCircuit => "SHORT_CIRCUIT",
            Self::Overload => "OVERLOAD",
            Self::ZeroRange => "ZERO_RANGE",
            Self::LargeAngle => "LARGE_ANGLE",
            Self::Overshoot => "OVERSHOOT",
            Self::Denatured => "DENATURED",
            Self::NoImage => "NO_IMAGE",
        }
    }
}

/// Named, described physically-implausible condition detected from inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureState {
    kind: FailureKind,
    description: String,
}

impl FailureState {
    /// Creates a failure state from its machine kind and human description.
    #[must_use]
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Machine kind identifying the failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable explanation of the failure.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Lifecycle phase of an experiment session. Exactly one is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No experiment in progress; inputs may be explored freely.
    Idle,
    /// A prediction question is open and awaiting a guess or a skip.
    Predicting,
    /// The experiment is live; ticks accumulate duration and samples.
    Running,
    /// The prediction is being compared against the measured value.
    Comparing,
    /// The lab report is on display.
    Report,
    /// A target-seeking challenge is active.
    Challenge,
}

/// Ordered mapping from parameter name to its current numeric value.
///
/// Values are deliberately not clamped to physical bounds here; out-of-range
/// values are meaningful input because they are what trigger failures.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    values: BTreeMap<String, f64>,
}

impl Inputs {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter map from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs<const N: usize>(pairs: [(&str, f64); N]) -> Self {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            let _ = values.insert(key.to_owned(), value);
        }
        Self { values }
    }

    /// Stores a parameter value, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        let _ = self.values.insert(key.into(), value);
    }

    /// Retrieves a parameter value by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Retrieves a parameter value, falling back to the provided default.
    #[must_use]
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Iterates over parameters in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Number of parameters currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the map holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered mapping from derived metric name to its computed value.
///
/// Owned exclusively by the lab model registry; recomputed on every inputs
/// change and never mutated directly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    values: BTreeMap<String, f64>,
}

impl Outputs {
    /// Creates an empty metric map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a metric value, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        let _ = self.values.insert(key.into(), value);
    }

    /// Retrieves a metric value by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Iterates over metrics in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Number of metrics currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the map holds no metrics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Question/target pair created when a session enters the predict phase.
///
/// `expected` is frozen at creation time and must not be recomputed after the
/// guess is submitted, even if inputs later change, so the comparison stays
/// fair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    question: String,
    expected: f64,
    unit: String,
    user_guess: Option<f64>,
}

impl Prediction {
    /// Creates a prediction with no guess recorded yet.
    #[must_use]
    pub fn new(question: impl Into<String>, expected: f64, unit: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected,
            unit: unit.into(),
            user_guess: None,
        }
    }

    /// Question text posed to the student.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Value the model computed when the prediction was created.
    #[must_use]
    pub const fn expected(&self) -> f64 {
        self.expected
    }

    /// Unit the expected value is expressed in.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Guess recorded for this prediction, if any.
    #[must_use]
    pub const fn user_guess(&self) -> Option<f64> {
        self.user_guess
    }

    /// Records the student's guess. The frozen expected value is untouched.
    pub fn record_guess(&mut self, guess: f64) {
        self.user_guess = Some(guess);
    }
}

/// Accuracy band assigned when a prediction is graded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionBand {
    /// Within ten percent of the measured value.
    Excellent,
    /// Within thirty percent of the measured value.
    Close,
    /// More than thirty percent away from the measured value.
    Off,
}

/// Target-seeking puzzle loaded from the challenge content bank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    /// One-sentence description of what the student must achieve.
    pub description: String,
    /// Name of the metric checked against the target (outputs first, then
    /// inputs).
    pub metric: String,
    /// Value the live metric must reach.
    pub target_value: f64,
    /// Unit the target is expressed in.
    pub target_unit: String,
    /// Acceptance band as a percentage of the target's magnitude.
    pub tolerance_percent: f64,
    /// Parameters pinned when the challenge begins.
    #[serde(default)]
    pub fixed_inputs: BTreeMap<String, f64>,
    /// Hint revealed after repeated attempts.
    pub hint: String,
    /// Worked explanation shown on completion.
    pub proof: String,
}

/// Mutable state of one challenge attempt sequence.
///
/// `hint_unlocked` and `completed` latch: once set they stay set for the
/// lifetime of the run, no matter how the live inputs drift afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRun {
    spec: ChallengeSpec,
    attempts: u32,
    hint_unlocked: bool,
    completed: bool,
}

/// Number of explicit checks after which a challenge hint unlocks.
pub const CHALLENGE_HINT_THRESHOLD: u32 = 3;

impl ChallengeRun {
    /// Starts a fresh run for the provided spec.
    #[must_use]
    pub fn new(spec: ChallengeSpec) -> Self {
        Self {
            spec,
            attempts: 0,
            hint_unlocked: false,
            completed: false,
        }
    }

    /// Spec this run is attempting.
    #[must_use]
    pub const fn spec(&self) -> &ChallengeSpec {
        &self.spec
    }

    /// Number of explicit checks performed so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reports whether the hint has been revealed.
    #[must_use]
    pub const fn hint_unlocked(&self) -> bool {
        self.hint_unlocked
    }

    /// Reports whether the run has been sealed as completed.
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.completed
    }

    /// Registers one explicit check, unlocking the hint at the threshold.
    pub fn note_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= CHALLENGE_HINT_THRESHOLD {
            self.hint_unlocked = true;
        }
    }

    /// Seals the run as completed. There is no way to unseal it.
    pub fn seal_completed(&mut self) {
        self.completed = true;
    }
}

/// Unique identifier assigned to a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Creates a new message identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Message authored by the tutor engine.
    Ai,
    /// Message authored by the student.
    Student,
}

/// What caused a tutor-authored message to be emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A failure transition fired the hint engine.
    Failure,
    /// A danger-zone dwell episode elapsed.
    DangerZone,
    /// The student explicitly asked for guidance.
    AskAi,
}

/// Single entry in the append-only tutor transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TutorMessage {
    /// Identifier assigned by the session when the message was appended.
    pub id: MessageId,
    /// Author of the message.
    pub role: Role,
    /// Message text as displayed.
    pub text: String,
    /// Simulation clock reading when the message was appended.
    pub timestamp: Duration,
    /// Trigger that produced the message, for tutor-authored entries.
    pub trigger: Option<TriggerKind>,
}

/// Snapshot of inputs and derived metrics captured by the sampling tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Simulation clock reading when the sample was captured.
    pub at: Duration,
    /// Inputs as they stood at sample time.
    pub inputs: Inputs,
    /// Metrics derived from those inputs.
    pub outputs: Outputs,
}

/// Commands that express all permissible session mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Switches the active lab, resetting the session around it.
    SelectLab {
        /// Lab to make active.
        lab: LabType,
    },
    /// Updates a single input parameter and recomputes derived state.
    UpdateInput {
        /// Parameter name to update.
        key: String,
        /// New value for the parameter.
        value: f64,
    },
    /// Opens the predict phase from idle.
    StartExperiment,
    /// Records the student's guess and starts the run.
    SubmitPrediction {
        /// Numeric guess supplied by the student.
        guess: f64,
    },
    /// Starts the run with no guess recorded.
    SkipPrediction,
    /// Stops the run and moves to the comparison phase.
    StopExperiment,
    /// Leaves comparison for the report or back to idle.
    FinishComparison,
    /// Dismisses the report and requests a challenge.
    DismissReport,
    /// Dismisses the challenge and returns to idle.
    DismissChallenge,
    /// Returns to idle and restores the lab's default state.
    ResetExperiment,
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Installs a challenge selected from the content bank.
    BeginChallenge {
        /// Spec chosen by the challenge system.
        spec: ChallengeSpec,
    },
    /// Registers one explicit attempt against the active challenge.
    CheckChallengeAttempt,
    /// Student explicitly pulls for tutor guidance.
    AskAi,
    /// Appends a student-authored chat message to the transcript.
    AddStudentMessage {
        /// Message text exactly as typed.
        text: String,
    },
    /// Appends a tutor-authored message to the transcript.
    PostTutorMessage {
        /// Message text produced by the tutor engine.
        text: String,
        /// Trigger that produced the message.
        trigger: TriggerKind,
    },
}

/// Events broadcast by the session after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the active lab changed.
    LabSelected {
        /// Lab that became active.
        lab: LabType,
    },
    /// Confirms that an input parameter changed.
    InputChanged {
        /// Parameter name that changed.
        key: String,
        /// Value now stored for the parameter.
        value: f64,
    },
    /// Announces that the session entered a new phase.
    PhaseChanged {
        /// Phase that became active.
        phase: SessionPhase,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Reports a rising edge on the failure predicate.
    FailureDetected {
        /// Failure that became active.
        state: FailureState,
    },
    /// Reports a falling edge on the failure predicate.
    FailureCleared {
        /// Kind of the failure that cleared.
        kind: FailureKind,
    },
    /// Reports the grade assigned to a submitted prediction.
    PredictionGraded {
        /// Band the guess landed in.
        band: PredictionBand,
        /// Percentage gap between guess and measured value.
        gap_percent: f64,
        /// Message summarising the comparison.
        message: String,
    },
    /// Carries one observation snapshot captured by the sampling tick.
    ObservationRecorded {
        /// Snapshot of inputs and derived metrics at sample time.
        observation: Observation,
    },
    /// Summarises a finished run for the reporting collaborator.
    ExperimentFinished {
        /// Lab the run was performed in.
        lab: LabType,
        /// Score awarded for the run.
        score: u32,
        /// Accumulated running time.
        duration: Duration,
        /// Number of failure edges observed during the run.
        mistakes: u32,
        /// Distinct failure kinds in order of first occurrence.
        failures: Vec<FailureKind>,
    },
    /// Asks the challenge system to select a spec for the lab.
    ChallengeRequested {
        /// Lab a challenge is wanted for.
        lab: LabType,
    },
    /// Confirms that a challenge run began.
    ChallengeStarted {
        /// Description of the installed challenge.
        description: String,
    },
    /// Reports the outcome of one explicit challenge check.
    ChallengeAttempted {
        /// Total explicit checks performed so far.
        attempts: u32,
        /// Live metric value at check time, if it resolved.
        value: Option<f64>,
        /// Whether the run is now sealed as completed.
        completed: bool,
    },
    /// Announces that the challenge hint became available.
    ChallengeHintUnlocked,
    /// Announces that the challenge was sealed as completed.
    ChallengeCompleted {
        /// Explicit checks it took to complete the run.
        attempts: u32,
    },
    /// Asks the tutor engine for on-demand guidance.
    GuidanceRequested {
        /// Lab the student is working in.
        lab: LabType,
    },
    /// Confirms that a message was appended to the transcript.
    MessagePosted {
        /// Identifier assigned to the message.
        id: MessageId,
        /// Author of the message.
        role: Role,
    },
    /// Confirms that the session returned to its default state.
    SessionReset {
        /// Lab the session was reset around.
        lab: LabType,
    },
}
