#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Prediction generation and grading policy.
//!
//! A prediction is created from the inputs as they stand when the student
//! enters the predict phase; the expected value is computed through the lab
//! model registry exactly once and frozen. Grading compares the frozen value
//! against the guess, never a recomputed one, so later slider movement cannot
//! make a prediction look better or worse than it was.

use virtu_lab_core::{Inputs, LabType, Prediction, PredictionBand};
use virtu_lab_system_lab_models as lab_models;

/// Gap percentage at or below which a guess counts as excellent.
pub const EXCELLENT_GAP_PERCENT: f64 = 10.0;
/// Gap percentage at or below which a guess counts as close.
pub const CLOSE_GAP_PERCENT: f64 = 30.0;

/// Floor applied to the expected magnitude when forming the far-miss ratio.
const RATIO_FLOOR: f64 = 0.001;

/// Builds the lab-specific prediction question from the current inputs.
///
/// The expected value is computed here, at creation time, and nowhere else.
#[must_use]
pub fn generate(lab: LabType, inputs: &Inputs) -> Prediction {
    let outputs = lab_models::compute(lab, inputs);
    match lab {
        LabType::Circuit => Prediction::new(
            format!(
                "With voltage at {:.1} V and resistance at {:.1} ohms, what current in \
                 milliamperes will flow?",
                inputs.get_or("voltage", 0.0),
                inputs.get_or("resistance", 0.0)
            ),
            outputs.get("current_ma").unwrap_or(0.0),
            "mA",
        ),
        LabType::Projectile => Prediction::new(
            format!(
                "Launching at {:.1} m/s and {:.0} degrees, how far in meters will the \
                 projectile land?",
                inputs.get_or("velocity", 0.0),
                inputs.get_or("angle", 0.0)
            ),
            outputs.get("range_m").unwrap_or(0.0),
            "m",
        ),
        LabType::Pendulum => Prediction::new(
            format!(
                "With a {:.1} m string under {:.1} m/s^2 gravity, how long is one full \
                 swing in seconds?",
                inputs.get_or("length", 0.0),
                inputs.get_or("gravity", 0.0)
            ),
            outputs.get("period_s").unwrap_or(0.0),
            "s",
        ),
        LabType::Titration => Prediction::new(
            format!(
                "With {:.1} mL of base added, what pH will the meter read?",
                inputs.get_or("base_volume", 0.0)
            ),
            outputs.get("ph").unwrap_or(0.0),
            "pH",
        ),
        LabType::Enzyme => Prediction::new(
            format!(
                "At {:.0} C with {:.1} mmol/L of substrate, what reaction rate do you expect?",
                inputs.get_or("temperature", 0.0),
                inputs.get_or("substrate_conc", 0.0)
            ),
            outputs.get("reaction_rate").unwrap_or(0.0),
            "uM/s",
        ),
        LabType::Optics => Prediction::new(
            format!(
                "With a {:.1} cm lens and the object {:.1} cm away, where will the image \
                 form in centimeters?",
                inputs.get_or("focal_length", 0.0),
                inputs.get_or("object_distance", 0.0)
            ),
            outputs.get("image_distance_cm").unwrap_or(0.0),
            "cm",
        ),
        LabType::ReactionRate => Prediction::new(
            format!(
                "At {:.0} C with {:.2} mol/L of reactant, what reaction rate do you expect?",
                inputs.get_or("temperature", 0.0),
                inputs.get_or("concentration", 0.0)
            ),
            outputs.get("rate").unwrap_or(0.0),
            "mol/L/s",
        ),
        LabType::LogicGate => Prediction::new(
            "For the selected gate and input levels, what logic level (0 or 1) will the \
             output show?",
            outputs.get("output").unwrap_or(0.0),
            "",
        ),
        LabType::Gravity => Prediction::new(
            format!(
                "With a planet of {:.1} Earth masses at {:.1} units of distance, what \
                 attractive force in newtons do you expect?",
                inputs.get_or("planet_mass", 0.0),
                inputs.get_or("distance", 0.0)
            ),
            outputs.get("force_n").unwrap_or(0.0),
            "N",
        ),
    }
}

/// Grade assigned to a submitted prediction.
#[derive(Clone, Debug, PartialEq)]
pub struct Grade {
    /// Band the guess landed in.
    pub band: PredictionBand,
    /// Percentage gap between guess and the frozen expected value.
    pub gap_percent: f64,
    /// Accuracy percentage stored in the session record.
    pub accuracy_percent: f64,
    /// Message summarising the comparison for the student.
    pub message: String,
}

/// Grades a guess against the frozen expected value.
///
/// Far misses are reported as a multiplicative ratio rather than an absurd
/// percentage.
#[must_use]
pub fn grade(expected: f64, guess: f64) -> Grade {
    let gap = (guess - expected).abs();
    let gap_percent = if expected != 0.0 {
        gap / expected.abs() * 100.0
    } else if guess != 0.0 {
        100.0
    } else {
        0.0
    };

    let (band, message) = if gap_percent <= EXCELLENT_GAP_PERCENT {
        (PredictionBand::Excellent, "Excellent prediction!".to_owned())
    } else if gap_percent <= CLOSE_GAP_PERCENT {
        (
            PredictionBand::Close,
            format!("Close, off by {gap_percent:.1}%."),
        )
    } else {
        let ratio = gap / expected.abs().max(RATIO_FLOOR);
        (
            PredictionBand::Off,
            format!("Off by {ratio:.1}x. Let's understand why."),
        )
    };

    Grade {
        band,
        gap_percent,
        accuracy_percent: (100.0 - gap_percent).max(0.0),
        message,
    }
}
