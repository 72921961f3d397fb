#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure lab model registry: the single source of truth for per-lab physics.
//!
//! Every function in this crate is deterministic and total. [`compute`]
//! produces finite outputs for any finite inputs, including degenerate ones
//! like zero resistance, by clamping divisors rather than dividing by zero.
//! [`detect_failure`] applies the fixed threshold rules for each lab, and
//! [`danger_zone`] reports when inputs are approaching, but have not yet
//! crossed, a failure threshold. All numeric policy lives here so that it can
//! be tested independent of any adapter.

use std::f64::consts::PI;

use virtu_lab_core::{FailureKind, FailureState, Inputs, LabType, Outputs};

/// Resistance below which the circuit is treated as shorted, in ohms.
pub const SHORT_CIRCUIT_RESISTANCE_OHMS: f64 = 5.0;
/// Current above which circuit components overload, in milliamperes.
pub const OVERLOAD_CURRENT_MA: f64 = 240.0;
/// Current at which the circuit danger zone begins (80% of the rating).
pub const DANGER_CURRENT_MA: f64 = 192.0;

const PROJECTILE_FLAT_ANGLE_DEG: f64 = 1.0;
const PROJECTILE_VERTICAL_ANGLE_DEG: f64 = 89.0;
const PROJECTILE_STEEP_ANGLE_DEG: f64 = 80.0;
const PROJECTILE_FIELD_LIMIT_M: f64 = 100.0;
const PROJECTILE_DANGER_ANGLE_DEG: f64 = 70.0;

const PENDULUM_LARGE_ANGLE_DEG: f64 = 85.0;
const PENDULUM_DANGER_ANGLE_DEG: f64 = 70.0;

const TITRATION_EQUIVALENCE_ML: f64 = 25.0;
const TITRATION_PH_SPAN: f64 = 3.5;
const TITRATION_STEEPNESS_ML: f64 = 3.0;
const TITRATION_OVERSHOOT_ML: f64 = 45.0;
const TITRATION_DANGER_ML: f64 = 40.0;

const ENZYME_OPTIMUM_C: f64 = 37.0;
const ENZYME_PEAK_VMAX: f64 = 10.0;
const ENZYME_KM: f64 = 2.5;
const ENZYME_DENATURE_C: f64 = 65.0;
const ENZYME_DANGER_C: f64 = 55.0;

const REACTION_DEGRADE_C: f64 = 90.0;
const REACTION_DANGER_C: f64 = 75.0;

const OPTICS_FOCAL_BAND_CM: f64 = 0.5;
const OPTICS_IMAGE_SENTINEL_CM: f64 = 1.0e6;

/// Smallest magnitude a divisor is allowed to take.
const DIVISOR_FLOOR: f64 = 0.01;

/// Divides `numerator` by `denominator` with the magnitude floored, keeping
/// the result finite for degenerate inputs while preserving the sign.
fn safe_div(numerator: f64, denominator: f64) -> f64 {
    let floored = if denominator.abs() < DIVISOR_FLOOR {
        if denominator < 0.0 {
            -DIVISOR_FLOOR
        } else {
            DIVISOR_FLOOR
        }
    } else {
        denominator
    };
    numerator / floored
}

/// Default input parameters for the provided lab.
#[must_use]
pub fn default_inputs(lab: LabType) -> Inputs {
    match lab {
        LabType::Circuit => Inputs::from_pairs([("voltage", 5.0), ("resistance", 100.0)]),
        LabType::Projectile => {
            Inputs::from_pairs([("velocity", 20.0), ("angle", 45.0), ("gravity", 9.8)])
        }
        LabType::Pendulum => {
            Inputs::from_pairs([("length", 2.0), ("gravity", 9.8), ("angle", 15.0)])
        }
        LabType::Titration => Inputs::from_pairs([("base_volume", 0.0)]),
        LabType::Enzyme => Inputs::from_pairs([("temperature", 37.0), ("substrate_conc", 5.0)]),
        LabType::Optics => Inputs::from_pairs([("focal_length", 20.0), ("object_distance", 40.0)]),
        LabType::ReactionRate => {
            Inputs::from_pairs([("temperature", 25.0), ("concentration", 1.0)])
        }
        LabType::LogicGate => {
            Inputs::from_pairs([("gate_type", 1.0), ("input_a", 0.0), ("input_b", 0.0)])
        }
        LabType::Gravity => Inputs::from_pairs([("planet_mass", 10.0), ("distance", 20.0)]),
    }
}

/// Computes every derived metric for the provided lab and inputs.
///
/// Pure and deterministic: identical inputs always yield identical outputs,
/// and any finite inputs yield finite outputs.
#[must_use]
pub fn compute(lab: LabType, inputs: &Inputs) -> Outputs {
    match lab {
        LabType::Circuit => compute_circuit(inputs),
        LabType::Projectile => compute_projectile(inputs),
        LabType::Pendulum => compute_pendulum(inputs),
        LabType::Titration => compute_titration(inputs),
        LabType::Enzyme => compute_enzyme(inputs),
        LabType::Optics => compute_optics(inputs),
        LabType::ReactionRate => compute_reaction_rate(inputs),
        LabType::LogicGate => compute_logic_gate(inputs),
        LabType::Gravity => compute_gravity(inputs),
    }
}

fn compute_circuit(inputs: &Inputs) -> Outputs {
    let voltage = inputs.get_or("voltage", 0.0);
    let resistance = inputs.get_or("resistance", 0.0);
    let current_a = safe_div(voltage, resistance);
    let current_ma = current_a * 1000.0;

    let mut outputs = Outputs::new();
    outputs.set("current_ma", current_ma);
    outputs.set("power_w", voltage * current_a);
    outputs.set(
        "brightness_pct",
        (current_ma.abs() / OVERLOAD_CURRENT_MA * 100.0).clamp(0.0, 100.0),
    );
    outputs
}

fn compute_projectile(inputs: &Inputs) -> Outputs {
    let velocity = inputs.get_or("velocity", 0.0);
    let angle_rad = inputs.get_or("angle", 0.0).to_radians();
    let gravity = inputs.get_or("gravity", 9.8);

    let mut outputs = Outputs::new();
    outputs.set(
        "range_m",
        safe_div(velocity * velocity * (2.0 * angle_rad).sin(), gravity),
    );
    outputs.set(
        "flight_time_s",
        safe_div(2.0 * velocity * angle_rad.sin(), gravity),
    );
    outputs.set(
        "max_height_m",
        safe_div(velocity * velocity * angle_rad.sin().powi(2), 2.0 * gravity),
    );
    outputs
}

fn compute_pendulum(inputs: &Inputs) -> Outputs {
    let length = inputs.get_or("length", 0.0);
    let gravity = inputs.get_or("gravity", 9.8);
    let period_s = 2.0 * PI * safe_div(length, gravity).abs().sqrt();

    let mut outputs = Outputs::new();
    outputs.set("period_s", period_s);
    outputs.set("frequency_hz", safe_div(1.0, period_s));
    outputs
}

fn compute_titration(inputs: &Inputs) -> Outputs {
    let base_volume = inputs.get_or("base_volume", 0.0);
    let ph = 7.0
        + TITRATION_PH_SPAN
            * ((base_volume - TITRATION_EQUIVALENCE_ML) / TITRATION_STEEPNESS_ML).tanh();

    let mut outputs = Outputs::new();
    outputs.set("ph", ph);
    outputs
}

fn compute_enzyme(inputs: &Inputs) -> Outputs {
    let temperature = inputs.get_or("temperature", 0.0);
    let substrate = inputs.get_or("substrate_conc", 0.0);
    let vmax = ENZYME_PEAK_VMAX * (-0.01 * (temperature - ENZYME_OPTIMUM_C).powi(2)).exp();
    let reaction_rate = safe_div(vmax * substrate, ENZYME_KM + substrate);
    let normalized_rate = if vmax == 0.0 {
        0.0
    } else {
        reaction_rate / vmax
    };

    let mut outputs = Outputs::new();
    outputs.set("vmax", vmax);
    outputs.set("reaction_rate", reaction_rate);
    outputs.set("normalized_rate", normalized_rate);
    outputs
}

fn compute_optics(inputs: &Inputs) -> Outputs {
    let focal_length = inputs.get_or("focal_length", 0.0);
    let object_distance = inputs.get_or("object_distance", 0.0);

    let mut outputs = Outputs::new();
    if (object_distance - focal_length).abs() < OPTICS_FOCAL_BAND_CM {
        // Rays emerge parallel; report a finite stand-in instead of infinity.
        outputs.set("image_distance_cm", OPTICS_IMAGE_SENTINEL_CM);
        outputs.set("magnification", 0.0);
        return outputs;
    }

    let object_signed = -object_distance;
    let image_distance = safe_div(focal_length * object_signed, focal_length + object_signed);
    outputs.set("image_distance_cm", image_distance);
    outputs.set("magnification", safe_div(image_distance, object_signed));
    outputs
}

fn compute_reaction_rate(inputs: &Inputs) -> Outputs {
    let temperature = inputs.get_or("temperature", 0.0);
    let concentration = inputs.get_or("concentration", 0.0);

    let mut outputs = Outputs::new();
    outputs.set(
        "rate",
        1.1_f64.powf(temperature / 10.0) * concentration * 0.5,
    );
    outputs
}

fn compute_logic_gate(inputs: &Inputs) -> Outputs {
    let gate = inputs.get_or("gate_type", 1.0).floor().clamp(1.0, 5.0) as u8;
    let a = inputs.get_or("input_a", 0.0) > 0.5;
    let b = inputs.get_or("input_b", 0.0) > 0.5;
    let output = match gate {
        1 => a && b,
        2 => a || b,
        3 => !a,
        4 => !(a && b),
        _ => !(a || b),
    };

    let mut outputs = Outputs::new();
    outputs.set("output", if output { 1.0 } else { 0.0 });
    outputs
}

fn compute_gravity(inputs: &Inputs) -> Outputs {
    let planet_mass = inputs.get_or("planet_mass", 0.0);
    let distance = inputs.get_or("distance", 0.0);
    let scaled_distance = distance / 10.0;

    let mut outputs = Outputs::new();
    outputs.set(
        "force_n",
        safe_div(planet_mass * 10.0, scaled_distance * scaled_distance),
    );
    outputs
}

/// Applies the lab's fixed threshold rules, first match wins.
///
/// Returns `None` while the configuration is physically plausible. Thresholds
/// are constants of the model, not configurable at runtime.
#[must_use]
pub fn detect_failure(lab: LabType, inputs: &Inputs) -> Option<FailureState> {
    match lab {
        LabType::Circuit => {
            let resistance = inputs.get_or("resistance", 0.0);
            let current_ma = compute_circuit(inputs).get("current_ma").unwrap_or(0.0);
            if resistance < SHORT_CIRCUIT_RESISTANCE_OHMS {
                return Some(FailureState::new(
                    FailureKind::ShortCircuit,
                    format!(
                        "Resistance is only {resistance:.1} ohms, so the current runs away. \
                         A real circuit would blow a fuse."
                    ),
                ));
            }
            if current_ma.abs() > OVERLOAD_CURRENT_MA {
                return Some(FailureState::new(
                    FailureKind::Overload,
                    format!(
                        "Current is {current_ma:.0} mA, beyond the {OVERLOAD_CURRENT_MA:.0} mA \
                         component rating. Risk of thermal damage."
                    ),
                ));
            }
            None
        }
        LabType::Projectile => {
            let angle = inputs.get_or("angle", 0.0);
            let range = compute_projectile(inputs).get("range_m").unwrap_or(0.0);
            if angle <= PROJECTILE_FLAT_ANGLE_DEG || angle >= PROJECTILE_VERTICAL_ANGLE_DEG {
                return Some(FailureState::new(
                    FailureKind::ZeroRange,
                    format!("At {angle:.0} degrees the projectile has near-zero horizontal range."),
                ));
            }
            if angle > PROJECTILE_STEEP_ANGLE_DEG {
                return Some(FailureState::new(
                    FailureKind::LargeAngle,
                    format!(
                        "An angle of {angle:.0} degrees sends the projectile nearly straight up, \
                         which wastes range."
                    ),
                ));
            }
            if range > PROJECTILE_FIELD_LIMIT_M {
                return Some(FailureState::new(
                    FailureKind::Overshoot,
                    format!(
                        "Range {range:.1} m exceeds the {PROJECTILE_FIELD_LIMIT_M:.0} m field. \
                         The projectile went out of bounds."
                    ),
                ));
            }
            None
        }
        LabType::Pendulum => {
            let angle = inputs.get_or("angle", 0.0);
            (angle > PENDULUM_LARGE_ANGLE_DEG).then(|| {
                FailureState::new(
                    FailureKind::LargeAngle,
                    format!(
                        "At {angle:.0} degrees the small-angle approximation no longer holds."
                    ),
                )
            })
        }
        LabType::Titration => {
            let base_volume = inputs.get_or("base_volume", 0.0);
            (base_volume > TITRATION_OVERSHOOT_ML).then(|| {
                FailureState::new(
                    FailureKind::Overshoot,
                    format!(
                        "{base_volume:.1} mL of base is far past the \
                         {TITRATION_EQUIVALENCE_ML:.0} mL equivalence point. \
                         The titration overshot."
                    ),
                )
            })
        }
        LabType::Enzyme => {
            let temperature = inputs.get_or("temperature", 0.0);
            (temperature > ENZYME_DENATURE_C).then(|| {
                FailureState::new(
                    FailureKind::Denatured,
                    format!(
                        "At {temperature:.0} C the enzyme's structure breaks down and activity \
                         is lost."
                    ),
                )
            })
        }
        LabType::Optics => {
            let focal_length = inputs.get_or("focal_length", 0.0);
            let object_distance = inputs.get_or("object_distance", 0.0);
            ((object_distance - focal_length).abs() < OPTICS_FOCAL_BAND_CM).then(|| {
                FailureState::new(
                    FailureKind::NoImage,
                    format!(
                        "The object sits at the focal point ({focal_length:.1} cm), so the rays \
                         emerge parallel and no image forms."
                    ),
                )
            })
        }
        LabType::ReactionRate => {
            let temperature = inputs.get_or("temperature", 0.0);
            (temperature > REACTION_DEGRADE_C).then(|| {
                FailureState::new(
                    FailureKind::Denatured,
                    format!(
                        "At {temperature:.0} C the catalyst degrades instead of accelerating \
                         the reaction."
                    ),
                )
            })
        }
        LabType::LogicGate | LabType::Gravity => None,
    }
}

/// Reports whether inputs are approaching a failure threshold.
///
/// Always false while a failure is already active: the danger zone describes
/// the approach, not the crossing.
#[must_use]
pub fn danger_zone(lab: LabType, inputs: &Inputs) -> bool {
    if detect_failure(lab, inputs).is_some() {
        return false;
    }
    match lab {
        LabType::Circuit => {
            let current_ma = compute_circuit(inputs).get("current_ma").unwrap_or(0.0);
            current_ma.abs() > DANGER_CURRENT_MA
        }
        LabType::Projectile => inputs.get_or("angle", 0.0) > PROJECTILE_DANGER_ANGLE_DEG,
        LabType::Pendulum => inputs.get_or("angle", 0.0) > PENDULUM_DANGER_ANGLE_DEG,
        LabType::Titration => inputs.get_or("base_volume", 0.0) > TITRATION_DANGER_ML,
        LabType::Enzyme => inputs.get_or("temperature", 0.0) > ENZYME_DANGER_C,
        LabType::ReactionRate => inputs.get_or("temperature", 0.0) > REACTION_DANGER_C,
        LabType::Optics | LabType::LogicGate | LabType::Gravity => false,
    }
}

/// Resolves a metric name against the outputs first, then the inputs.
///
/// Challenge target selectors use this so a challenge can aim at either a
/// derived quantity ("current_ma") or a raw parameter ("base_volume").
#[must_use]
pub fn resolve_metric(name: &str, inputs: &Inputs, outputs: &Outputs) -> Option<f64> {
    outputs.get(name).or_else(|| inputs.get(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic_for_identical_inputs() {
        for lab in LabType::ALL {
            let inputs = default_inputs(lab);
            assert_eq!(compute(lab, &inputs), compute(lab, &inputs));
        }
    }

    #[test]
    fn compute_stays_finite_for_degenerate_inputs() {
        for lab in LabType::ALL {
            let mut inputs = default_inputs(lab);
            let keys: Vec<String> = inputs.iter().map(|(key, _)| key.to_owned()).collect();
            for key in keys {
                inputs.set(key, 0.0);
            }
            for (_, value) in compute(lab, &inputs).iter() {
                assert!(value.is_finite(), "{lab:?} produced a non-finite output");
            }
        }
    }

    #[test]
    fn default_circuit_is_healthy() {
        let inputs = default_inputs(LabType::Circuit);
        let outputs = compute(LabType::Circuit, &inputs);
        assert!((outputs.get("current_ma").unwrap() - 50.0).abs() < 1e-9);
        assert!(detect_failure(LabType::Circuit, &inputs).is_none());
        assert!(!danger_zone(LabType::Circuit, &inputs));
    }

    #[test]
    fn crossing_the_resistance_threshold_shorts_the_circuit() {
        let mut inputs = Inputs::from_pairs([("voltage", 1.0), ("resistance", 6.0)]);
        assert!(detect_failure(LabType::Circuit, &inputs).is_none());

        inputs.set("resistance", 4.0);
        let failure = detect_failure(LabType::Circuit, &inputs).expect("short expected");
        assert_eq!(failure.kind(), FailureKind::ShortCircuit);
    }

    #[test]
    fn excess_current_overloads_the_circuit() {
        let inputs = Inputs::from_pairs([("voltage", 12.0), ("resistance", 10.0)]);
        let failure = detect_failure(LabType::Circuit, &inputs).expect("overload expected");
        assert_eq!(failure.kind(), FailureKind::Overload);
    }

    #[test]
    fn zero_resistance_yields_a_finite_current_and_a_short() {
        let inputs = Inputs::from_pairs([("voltage", 5.0), ("resistance", 0.0)]);
        let outputs = compute(LabType::Circuit, &inputs);
        assert!(outputs.get("current_ma").unwrap().is_finite());
        assert_eq!(
            detect_failure(LabType::Circuit, &inputs).map(|f| f.kind()),
            Some(FailureKind::ShortCircuit)
        );
    }

    #[test]
    fn circuit_danger_zone_sits_between_health_and_overload() {
        let safe = Inputs::from_pairs([("voltage", 5.0), ("resistance", 100.0)]);
        assert!(!danger_zone(LabType::Circuit, &safe));

        let approaching = Inputs::from_pairs([("voltage", 2.0), ("resistance", 10.0)]);
        assert!(danger_zone(LabType::Circuit, &approaching));

        let overloaded = Inputs::from_pairs([("voltage", 12.0), ("resistance", 10.0)]);
        assert!(!danger_zone(LabType::Circuit, &overloaded));
    }

    #[test]
    fn projectile_range_peaks_at_forty_five_degrees() {
        let at_45 = Inputs::from_pairs([("velocity", 20.0), ("angle", 45.0), ("gravity", 9.8)]);
        let at_30 = Inputs::from_pairs([("velocity", 20.0), ("angle", 30.0), ("gravity", 9.8)]);
        let range_45 = compute(LabType::Projectile, &at_45).get("range_m").unwrap();
        let range_30 = compute(LabType::Projectile, &at_30).get("range_m").unwrap();
        assert!(range_45 > range_30);
        assert!((range_45 - 40.816).abs() < 0.01);
    }

    #[test]
    fn projectile_failure_rules_apply_in_order() {
        let vertical = Inputs::from_pairs([("velocity", 20.0), ("angle", 89.5), ("gravity", 9.8)]);
        assert_eq!(
            detect_failure(LabType::Projectile, &vertical).map(|f| f.kind()),
            Some(FailureKind::ZeroRange)
        );

        let steep = Inputs::from_pairs([("velocity", 20.0), ("angle", 82.0), ("gravity", 9.8)]);
        assert_eq!(
            detect_failure(LabType::Projectile, &steep).map(|f| f.kind()),
            Some(FailureKind::LargeAngle)
        );

        let long = Inputs::from_pairs([("velocity", 40.0), ("angle", 45.0), ("gravity", 9.8)]);
        assert_eq!(
            detect_failure(LabType::Projectile, &long).map(|f| f.kind()),
            Some(FailureKind::Overshoot)
        );
    }

    #[test]
    fn pendulum_period_matches_the_closed_form() {
        let inputs = default_inputs(LabType::Pendulum);
        let period = compute(LabType::Pendulum, &inputs).get("period_s").unwrap();
        assert!((period - 2.838).abs() < 0.001);
    }

    #[test]
    fn titration_hits_neutral_at_the_equivalence_point() {
        let inputs = Inputs::from_pairs([("base_volume", 25.0)]);
        let ph = compute(LabType::Titration, &inputs).get("ph").unwrap();
        assert!((ph - 7.0).abs() < 1e-9);

        let over = Inputs::from_pairs([("base_volume", 46.0)]);
        assert_eq!(
            detect_failure(LabType::Titration, &over).map(|f| f.kind()),
            Some(FailureKind::Overshoot)
        );
    }

    #[test]
    fn enzyme_rate_follows_michaelis_menten_at_the_optimum() {
        let inputs = default_inputs(LabType::Enzyme);
        let outputs = compute(LabType::Enzyme, &inputs);
        assert!((outputs.get("vmax").unwrap() - 10.0).abs() < 1e-9);
        assert!((outputs.get("reaction_rate").unwrap() - 10.0 * 5.0 / 7.5).abs() < 1e-9);

        let hot = Inputs::from_pairs([("temperature", 70.0), ("substrate_conc", 5.0)]);
        assert_eq!(
            detect_failure(LabType::Enzyme, &hot).map(|f| f.kind()),
            Some(FailureKind::Denatured)
        );
    }

    #[test]
    fn optics_object_at_twice_focal_length_images_at_unity() {
        let inputs = Inputs::from_pairs([("focal_length", 20.0), ("object_distance", 40.0)]);
        let outputs = compute(LabType::Optics, &inputs);
        assert!((outputs.get("image_distance_cm").unwrap() - 40.0).abs() < 1e-9);
        assert!((outputs.get("magnification").unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn optics_object_at_the_focal_point_degrades_to_a_sentinel() {
        let inputs = Inputs::from_pairs([("focal_length", 20.0), ("object_distance", 20.0)]);
        let outputs = compute(LabType::Optics, &inputs);
        assert!(outputs.get("image_distance_cm").unwrap().is_finite());
        assert_eq!(
            detect_failure(LabType::Optics, &inputs).map(|f| f.kind()),
            Some(FailureKind::NoImage)
        );
    }

    #[test]
    fn logic_gates_honor_their_truth_tables() {
        let mut inputs = Inputs::from_pairs([("gate_type", 1.0), ("input_a", 1.0), ("input_b", 1.0)]);
        assert_eq!(compute(LabType::LogicGate, &inputs).get("output"), Some(1.0));

        inputs.set("gate_type", 4.0);
        assert_eq!(compute(LabType::LogicGate, &inputs).get("output"), Some(0.0));

        inputs.set("gate_type", 5.0);
        inputs.set("input_a", 0.0);
        inputs.set("input_b", 0.0);
        assert_eq!(compute(LabType::LogicGate, &inputs).get("output"), Some(1.0));
    }

    #[test]
    fn gravity_force_follows_the_inverse_square_law() {
        let near = Inputs::from_pairs([("planet_mass", 10.0), ("distance", 20.0)]);
        let far = Inputs::from_pairs([("planet_mass", 10.0), ("distance", 40.0)]);
        let force_near = compute(LabType::Gravity, &near).get("force_n").unwrap();
        let force_far = compute(LabType::Gravity, &far).get("force_n").unwrap();
        assert!((force_near / force_far - 4.0).abs() < 1e-9);
    }

    #[test]
    fn metric_resolution_prefers_outputs_over_inputs() {
        let inputs = default_inputs(LabType::Circuit);
        let outputs = compute(LabType::Circuit, &inputs);
        assert_eq!(
            resolve_metric("current_ma", &inputs, &outputs),
            outputs.get("current_ma")
        );
        assert_eq!(resolve_metric("voltage", &inputs, &outputs), Some(5.0));
        assert_eq!(resolve_metric("unknown", &inputs, &outputs), None);
    }

    #[test]
    fn every_lab_provides_default_inputs() {
        for lab in LabType::ALL {
            assert!(!default_inputs(lab).is_empty());
        }
    }
}
