#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Event-driven session record assembly for the reporting collaborator.
//!
//! The reporting system never reaches into the session: it consumes the
//! broadcast event stream and accumulates everything a persisted lab report
//! needs. The core hands over numbers and names only; formatting and storage
//! belong to the collaborator that consumes the [`SessionRecord`].

use serde::{Deserialize, Serialize};
use virtu_lab_core::{Event, FailureKind, LabType, Observation};

/// Completed-session summary handed to the persistence collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Lab the session was performed in.
    pub lab: LabType,
    /// Score awarded when the run stopped.
    pub score: u32,
    /// Whole seconds of accumulated running time.
    pub duration_seconds: u64,
    /// Number of failure edges observed.
    pub mistakes: u32,
    /// Distinct failure kinds in order of first occurrence.
    pub failures: Vec<FailureKind>,
    /// Observation snapshots captured by the sampling tick.
    pub observations: Vec<Observation>,
    /// Prediction accuracy percentage, when a guess was graded.
    pub prediction_accuracy: Option<f64>,
    /// Description of the challenge completed after the run, if any.
    pub challenge_completed: Option<String>,
}

/// Qualitative band assigned to a session score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// Score of eighty or above.
    Excellent,
    /// Score of sixty or above.
    Good,
    /// Anything below sixty.
    NeedsWork,
}

/// Maps a numeric score onto its qualitative band.
#[must_use]
pub const fn score_band(score: u32) -> ScoreBand {
    if score >= 80 {
        ScoreBand::Excellent
    } else if score >= 60 {
        ScoreBand::Good
    } else {
        ScoreBand::NeedsWork
    }
}

/// Pure system that assembles session records from the event stream.
#[derive(Debug, Default)]
pub struct Reporting {
    observations: Vec<Observation>,
    prediction_accuracy: Option<f64>,
    active_challenge: Option<String>,
    last_record: Option<SessionRecord>,
}

impl Reporting {
    /// Creates a reporting system with no accumulated state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record assembled for the most recently finished run, if any.
    #[must_use]
    pub fn last_record(&self) -> Option<&SessionRecord> {
        self.last_record.as_ref()
    }

    /// Consumes session events, accumulating toward the next record.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::ObservationRecorded { observation } => {
                    self.observations.push(observation.clone());
                }
                Event::PredictionGraded { gap_percent, .. } => {
                    self.prediction_accuracy = Some((100.0 - gap_percent).max(0.0));
                }
                Event::ExperimentFinished {
                    lab,
                    score,
                    duration,
                    mistakes,
                    failures,
                } => {
                    self.last_record = Some(SessionRecord {
                        lab: *lab,
                        score: *score,
                        duration_seconds: duration.as_secs(),
                        mistakes: *mistakes,
                        failures: failures.clone(),
                        observations: std::mem::take(&mut self.observations),
                        prediction_accuracy: self.prediction_accuracy.take(),
                        challenge_completed: None,
                    });
                }
                Event::ChallengeStarted { description } => {
                    self.active_challenge = Some(description.clone());
                }
                Event::ChallengeCompleted { .. } => {
                    // The challenge phase follows the finished run, so the
                    // completion is patched onto the record already built.
                    if let Some(record) = self.last_record.as_mut() {
                        record.challenge_completed = self.active_challenge.clone();
                    }
                }
                Event::SessionReset { .. } | Event::LabSelected { .. } => {
                    self.observations.clear();
                    self.prediction_accuracy = None;
                    self.active_challenge = None;
                }
                _ => {}
            }
        }
    }
}

/// Aim paragraph for the lab report header.
#[must_use]
pub const fn aim(lab: LabType) -> &'static str {
    match lab {
        LabType::Circuit => {
            "To investigate the relationship between voltage, resistance, and current in a \
             simple electrical circuit using Ohm's Law."
        }
        LabType::Projectile => {
            "To study how launch angle and speed determine the range of a projectile over \
             flat ground."
        }
        LabType::Pendulum => {
            "To investigate the relationship between string length, gravitational \
             acceleration, and the period of a simple pendulum."
        }
        LabType::Titration => {
            "To determine the equivalence point of an acid-base titration by monitoring pH \
             changes as base is added."
        }
        LabType::Enzyme => {
            "To study the effect of temperature and substrate concentration on enzyme \
             reaction rate using the Michaelis-Menten model."
        }
        LabType::Optics => {
            "To verify the thin lens equation by measuring image distances for a converging \
             lens."
        }
        LabType::ReactionRate => {
            "To explore how temperature and concentration govern the rate of a chemical \
             reaction."
        }
        LabType::LogicGate => {
            "To verify the truth tables of the basic digital logic gates."
        }
        LabType::Gravity => {
            "To explore Newton's Law of Universal Gravitation by varying mass and distance."
        }
    }
}

/// Canned result paragraph used when the collaborator has no richer text.
#[must_use]
pub const fn result_template(lab: LabType) -> &'static str {
    match lab {
        LabType::Circuit => {
            "The observations confirm Ohm's Law: current is directly proportional to voltage \
             and inversely proportional to resistance, with power following P = I^2 R."
        }
        LabType::Projectile => {
            "The experiment demonstrates that maximum range occurs at 45 degrees, consistent \
             with R = v^2 sin(2a)/g."
        }
        LabType::Pendulum => {
            "The period measurements confirm T = 2 pi sqrt(L/g): longer strings swing more \
             slowly, and the period is independent of amplitude for small angles."
        }
        LabType::Titration => {
            "The titration curve shows the characteristic sigmoidal pattern, with a rapid pH \
             transition near the 25 mL equivalence point."
        }
        LabType::Enzyme => {
            "The data follows classical Michaelis-Menten kinetics, with rate saturating at \
             high substrate concentration and Vmax peaking near 37 C."
        }
        LabType::Optics => {
            "The observations verify the thin lens equation: as the object approached the \
             focal length, the image distance grew without bound."
        }
        LabType::ReactionRate => {
            "Reaction rate increased with temperature and concentration, consistent with \
             collision theory."
        }
        LabType::LogicGate => {
            "Truth tables for all basic gates were verified, confirming Boolean algebra \
             principles."
        }
        LabType::Gravity => {
            "The force measurements followed the inverse-square law: doubling the distance \
             reduced the force by a factor of four."
        }
    }
}

/// Oral-examination questions offered alongside the report.
#[must_use]
pub const fn viva_questions(lab: LabType) -> [&'static str; 3] {
    match lab {
        LabType::Circuit => [
            "Explain Ohm's Law and how changing resistance affects current in a circuit.",
            "What is the relationship between voltage, current, and power?",
            "Why do we use fuses and circuit breakers in real electrical circuits?",
        ],
        LabType::Projectile => [
            "Why does a 45 degree launch angle maximise range over flat ground?",
            "How do the horizontal and vertical velocity components evolve in flight?",
            "What would change if the same projectile were launched on the Moon?",
        ],
        LabType::Pendulum => [
            "Derive the period formula T = 2 pi sqrt(L/g) from first principles.",
            "Why does the simple pendulum formula become inaccurate at large angles?",
            "How would the period change if you took this pendulum to the Moon?",
        ],
        LabType::Titration => [
            "What is the equivalence point of a titration and how do you identify it?",
            "Why does pH change slowly at first, then rapidly near the equivalence point?",
            "What role does an indicator play in acid-base titrations?",
        ],
        LabType::Enzyme => [
            "Describe the Michaelis-Menten model and explain what Km represents.",
            "Why does enzyme activity decrease above the optimal temperature?",
            "How does substrate concentration affect rate at low versus high levels?",
        ],
        LabType::Optics => [
            "State the thin lens equation and define each of its terms.",
            "What happens to the image as the object approaches the focal point?",
            "When does a converging lens produce a virtual image?",
        ],
        LabType::ReactionRate => [
            "How does collision theory explain the effect of concentration on rate?",
            "Why does temperature have an exponential effect on reaction rate?",
            "What limits reaction rate at very high temperatures?",
        ],
        LabType::LogicGate => [
            "Write out the truth table for a NAND gate.",
            "Why is NAND called a universal gate?",
            "How would you build an OR gate from NAND gates alone?",
        ],
        LabType::Gravity => [
            "State Newton's Law of Universal Gravitation and explain each variable.",
            "How does doubling the distance between two objects affect the force?",
            "What is orbital velocity and how does it relate to gravitational force?",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use virtu_lab_core::{Inputs, Outputs};

    fn observation(at_secs: u64) -> Observation {
        Observation {
            at: Duration::from_secs(at_secs),
            inputs: Inputs::from_pairs([("voltage", 5.0)]),
            outputs: Outputs::new(),
        }
    }

    fn finished_event() -> Event {
        Event::ExperimentFinished {
            lab: LabType::Circuit,
            score: 80,
            duration: Duration::from_secs(45),
            mistakes: 1,
            failures: vec![FailureKind::Overload],
        }
    }

    #[test]
    fn record_collects_observations_and_grades() {
        let mut reporting = Reporting::new();
        reporting.handle(&[
            Event::ObservationRecorded {
                observation: observation(6),
            },
            Event::ObservationRecorded {
                observation: observation(12),
            },
            Event::PredictionGraded {
                band: virtu_lab_core::PredictionBand::Close,
                gap_percent: 25.0,
                message: "Close, off by 25.0%.".to_owned(),
            },
            finished_event(),
        ]);

        let record = reporting.last_record().expect("record assembled");
        assert_eq!(record.lab, LabType::Circuit);
        assert_eq!(record.score, 80);
        assert_eq!(record.duration_seconds, 45);
        assert_eq!(record.observations.len(), 2);
        assert_eq!(record.failures, vec![FailureKind::Overload]);
        assert_eq!(record.prediction_accuracy, Some(75.0));
    }

    #[test]
    fn failures_arrive_through_the_summary_event() {
        let mut reporting = Reporting::new();
        reporting.handle(&[Event::ExperimentFinished {
            lab: LabType::Circuit,
            score: 60,
            duration: Duration::from_secs(10),
            mistakes: 2,
            failures: vec![FailureKind::ShortCircuit, FailureKind::Overload],
        }]);
        let record = reporting.last_record().unwrap();
        assert_eq!(
            record.failures,
            vec![FailureKind::ShortCircuit, FailureKind::Overload]
        );
    }

    #[test]
    fn challenge_completion_patches_the_finished_record() {
        let mut reporting = Reporting::new();
        reporting.handle(&[finished_event()]);
        reporting.handle(&[
            Event::ChallengeStarted {
                description: "Dial in 30 mA".to_owned(),
            },
            Event::ChallengeCompleted { attempts: 2 },
        ]);
        assert_eq!(
            reporting.last_record().unwrap().challenge_completed.as_deref(),
            Some("Dial in 30 mA")
        );
    }

    #[test]
    fn resets_discard_accumulated_state() {
        let mut reporting = Reporting::new();
        reporting.handle(&[Event::ObservationRecorded {
            observation: observation(6),
        }]);
        reporting.handle(&[Event::SessionReset {
            lab: LabType::Circuit,
        }]);
        reporting.handle(&[finished_event()]);
        assert!(reporting.last_record().unwrap().observations.is_empty());
    }

    #[test]
    fn score_bands_match_their_thresholds() {
        assert_eq!(score_band(100), ScoreBand::Excellent);
        assert_eq!(score_band(80), ScoreBand::Excellent);
        assert_eq!(score_band(79), ScoreBand::Good);
        assert_eq!(score_band(60), ScoreBand::Good);
        assert_eq!(score_band(59), ScoreBand::NeedsWork);
    }

    #[test]
    fn every_lab_has_report_scaffolding() {
        for lab in LabType::ALL {
            assert!(!aim(lab).is_empty());
            assert!(!result_template(lab).is_empty());
            assert!(viva_questions(lab).iter().all(|q| !q.is_empty()));
        }
    }
}
