#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots the VirtuLab experience.
//!
//! The driver loads the content banks, walks a scripted session through the
//! predict/run/compare/report/challenge lifecycle for the chosen lab, and
//! prints the tutor transcript plus the assembled session record. Bank load
//! failures degrade to empty banks; the session runs on regardless.

mod record_transfer;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use virtu_lab_core::{Command, LabType, Role};
use virtu_lab_session::{self as session, query, Session};
use virtu_lab_system_challenge::{ChallengeBank, Challenges, Config as ChallengeConfig};
use virtu_lab_system_reporting::Reporting;
use virtu_lab_system_tutor::{TemplateBank, Tutor};

/// Arguments accepted by the VirtuLab demo driver.
#[derive(Debug, Parser)]
#[command(name = "virtu-lab", about = "Scripted VirtuLab session demo")]
struct Args {
    /// Lab to run the scripted session in.
    #[arg(long, default_value = "circuit")]
    lab: String,

    /// Directory holding challenges.toml and hints.toml.
    #[arg(long, default_value = "content")]
    content: PathBuf,

    /// Seed for challenge selection; drawn from entropy when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Also print the session record as a single-line transfer string.
    #[arg(long)]
    transfer: bool,

    /// Decode a previously exported transfer string and exit.
    #[arg(long)]
    decode: Option<String>,
}

/// Session plus the systems pumped against its event stream.
struct Engine {
    session: Session,
    tutor: Tutor,
    challenges: Challenges,
    reporting: Reporting,
}

impl Engine {
    /// Applies one command, then pumps system responses until quiescent.
    fn drive(&mut self, command: Command) {
        let mut pending = VecDeque::from([command]);
        while let Some(command) = pending.pop_front() {
            let mut events = Vec::new();
            session::apply(&mut self.session, command, &mut events);
            if events.is_empty() {
                continue;
            }

            self.reporting.handle(&events);

            let mut follow_ups = Vec::new();
            self.tutor.handle(
                &events,
                query::active_lab(&self.session),
                query::inputs(&self.session),
                query::clock(&self.session),
                &mut follow_ups,
            );
            self.challenges.handle(&events, &mut follow_ups);
            pending.extend(follow_ups);
        }
    }

    fn tick_seconds(&mut self, seconds: u64) {
        for _ in 0..seconds {
            self.drive(Command::Tick {
                dt: Duration::from_secs(1),
            });
        }
    }
}

/// Slider movements the scripted demo performs, in order, for each lab.
/// Each nudge is held for several ticks so danger dwell and sampling fire.
fn demo_nudges(lab: LabType) -> Vec<(&'static str, f64)> {
    match lab {
        LabType::Circuit => vec![
            ("voltage", 10.0),
            ("voltage", 21.0),
            ("resistance", 4.0),
            ("resistance", 100.0),
            ("voltage", 5.0),
        ],
        LabType::Projectile => vec![("angle", 75.0), ("angle", 85.0), ("angle", 45.0)],
        LabType::Pendulum => vec![("angle", 75.0), ("angle", 88.0), ("angle", 15.0)],
        LabType::Titration => vec![
            ("base_volume", 20.0),
            ("base_volume", 42.0),
            ("base_volume", 47.0),
            ("base_volume", 25.0),
        ],
        LabType::Enzyme => vec![
            ("temperature", 58.0),
            ("temperature", 70.0),
            ("temperature", 37.0),
        ],
        LabType::Optics => vec![
            ("object_distance", 30.0),
            ("object_distance", 20.0),
            ("object_distance", 40.0),
        ],
        LabType::ReactionRate => vec![
            ("temperature", 80.0),
            ("temperature", 95.0),
            ("temperature", 25.0),
        ],
        LabType::LogicGate => vec![("input_a", 1.0), ("input_b", 1.0), ("gate_type", 4.0)],
        LabType::Gravity => vec![("distance", 10.0), ("planet_mass", 40.0), ("distance", 20.0)],
    }
}

fn load_challenge_bank(path: &Path) -> ChallengeBank {
    match fs::read_to_string(path) {
        Ok(text) => ChallengeBank::from_toml_str(&text).unwrap_or_else(|error| {
            eprintln!("warning: {error}; continuing with an empty challenge bank");
            ChallengeBank::empty()
        }),
        Err(error) => {
            eprintln!(
                "warning: could not read {}: {error}; continuing with an empty challenge bank",
                path.display()
            );
            ChallengeBank::empty()
        }
    }
}

fn load_hint_bank(path: &Path) -> TemplateBank {
    match fs::read_to_string(path) {
        Ok(text) => TemplateBank::from_toml_str(&text).unwrap_or_else(|error| {
            eprintln!("warning: {error}; continuing with the built-in hints");
            TemplateBank::default()
        }),
        Err(error) => {
            eprintln!(
                "warning: could not read {}: {error}; continuing with the built-in hints",
                path.display()
            );
            TemplateBank::default()
        }
    }
}

/// Entry point for the VirtuLab command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(encoded) = &args.decode {
        let record = record_transfer::decode(encoded).context("decode transfer string")?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let lab = LabType::from_key(&args.lab)
        .with_context(|| format!("unknown lab key '{}'", args.lab))?;

    let challenge_bank = load_challenge_bank(&args.content.join("challenges.toml"));
    let hint_bank = load_hint_bank(&args.content.join("hints.toml"));
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut engine = Engine {
        session: Session::new(),
        tutor: Tutor::new(hint_bank),
        challenges: Challenges::new(ChallengeConfig::new(seed), challenge_bank),
        reporting: Reporting::new(),
    };

    println!("{}", query::welcome_banner(&engine.session));
    println!("== {} ==", lab.label());

    engine.drive(Command::SelectLab { lab });
    engine.drive(Command::StartExperiment);
    match query::prediction(&engine.session).map(|prediction| prediction.expected() * 1.15) {
        Some(guess) if guess.is_finite() => {
            engine.drive(Command::SubmitPrediction { guess });
        }
        _ => engine.drive(Command::SkipPrediction),
    }

    for (key, value) in demo_nudges(lab) {
        engine.tick_seconds(8);
        engine.drive(Command::UpdateInput {
            key: key.to_owned(),
            value,
        });
    }
    engine.tick_seconds(10);

    engine.drive(Command::StopExperiment);
    engine.drive(Command::FinishComparison);
    engine.drive(Command::DismissReport);
    for _ in 0..3 {
        engine.drive(Command::CheckChallengeAttempt);
        engine.tick_seconds(2);
    }
    engine.drive(Command::AskAi);
    engine.drive(Command::DismissChallenge);

    println!("-- transcript --");
    for message in query::transcript(&engine.session) {
        let author = match message.role {
            Role::Ai => "tutor",
            Role::Student => "student",
        };
        println!(
            "[{:>4}s] {author}: {}",
            message.timestamp.as_secs(),
            message.text.replace('\n', " ")
        );
    }

    if let Some(record) = engine.reporting.last_record() {
        println!("-- session record --");
        println!("{}", serde_json::to_string_pretty(record)?);
        if args.transfer {
            println!("-- transfer --");
            println!("{}", record_transfer::encode(record));
        }
    }

    Ok(())
}
