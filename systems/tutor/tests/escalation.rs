use std::time::Duration;

use virtu_lab_core::{Command, Role, TriggerKind};
use virtu_lab_session::{self as session, query, Session};
use virtu_lab_system_tutor::{TemplateBank, Tutor};

const BANK_TOML: &str = r#"
    [failure.SHORT_CIRCUIT]
    levels = [
        "gentle short hint",
        "specific short hint",
        "explicit short hint",
    ]

    [failure.OVERLOAD]
    levels = [
        "gentle overload hint at {current_ma} mA",
        "specific overload hint at {current_ma} mA",
        "explicit overload hint at {current_ma} mA",
    ]

    [danger.circuit]
    levels = [
        "danger hint at {current_ma} mA",
        "second danger hint",
        "third danger hint",
    ]

    [ask]
    circuit = "ask reply for {voltage} V"

    [general]
    levels = ["general one", "general two", "general three"]
"#;

fn pump(session: &mut Session, tutor: &mut Tutor, command: Command) {
    let mut events = Vec::new();
    session::apply(session, command, &mut events);

    let mut follow_ups = Vec::new();
    tutor.handle(
        &events,
        query::active_lab(session),
        query::inputs(session),
        query::clock(session),
        &mut follow_ups,
    );
    for command in follow_ups {
        let mut ignored = Vec::new();
        session::apply(session, command, &mut ignored);
    }
}

fn update(session: &mut Session, tutor: &mut Tutor, key: &str, value: f64) {
    pump(
        session,
        tutor,
        Command::UpdateInput {
            key: key.to_owned(),
            value,
        },
    );
}

fn tick(session: &mut Session, tutor: &mut Tutor, seconds: u64) {
    for _ in 0..seconds {
        pump(
            session,
            tutor,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
        );
    }
}

fn tutor_messages(session: &Session) -> Vec<&str> {
    query::transcript(session)
        .iter()
        .filter(|message| message.role == Role::Ai && message.trigger.is_some())
        .map(|message| message.text.as_str())
        .collect()
}

fn new_pair() -> (Session, Tutor) {
    let tutor = Tutor::new(TemplateBank::from_toml_str(BANK_TOML).expect("bank parses"));
    (Session::new(), tutor)
}

#[test]
fn failure_edges_reach_the_transcript_exactly_once() {
    let (mut session, mut tutor) = new_pair();

    update(&mut session, &mut tutor, "resistance", 2.0);
    assert_eq!(tutor_messages(&session).len(), 1);
    assert!(tutor_messages(&session)[0].contains("gentle short hint"));

    // Still shorted: same failure held must not re-fire the engine.
    update(&mut session, &mut tutor, "resistance", 1.0);
    assert_eq!(tutor_messages(&session).len(), 1);
}

#[test]
fn danger_dwell_speaks_after_five_running_seconds() {
    let (mut session, mut tutor) = new_pair();

    pump(&mut session, &mut tutor, Command::StartExperiment);
    pump(&mut session, &mut tutor, Command::SkipPrediction);

    // 200 mA: inside the danger band, below the overload threshold.
    update(&mut session, &mut tutor, "voltage", 2.0);
    update(&mut session, &mut tutor, "resistance", 10.0);
    tick(&mut session, &mut tutor, 4);
    assert!(tutor_messages(&session).is_empty());

    tick(&mut session, &mut tutor, 3);
    let messages = tutor_messages(&session);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("danger hint at 200 mA"));

    // Staying in the zone is one episode; no further message.
    tick(&mut session, &mut tutor, 20);
    assert_eq!(tutor_messages(&session).len(), 1);
}

#[test]
fn the_global_cooldown_spans_both_trigger_families() {
    let (mut session, mut tutor) = new_pair();

    pump(&mut session, &mut tutor, Command::StartExperiment);
    pump(&mut session, &mut tutor, Command::SkipPrediction);

    update(&mut session, &mut tutor, "voltage", 2.0);
    update(&mut session, &mut tutor, "resistance", 10.0);
    tick(&mut session, &mut tutor, 6);
    assert_eq!(tutor_messages(&session).len(), 1);

    // An overload edge lands inside the cooldown window and is swallowed.
    update(&mut session, &mut tutor, "voltage", 24.0);
    assert_eq!(tutor_messages(&session).len(), 1);

    // Clear, wait out the window, and trip a fresh edge: now it speaks, and
    // the earlier swallowed occurrence already advanced the ladder.
    update(&mut session, &mut tutor, "voltage", 2.0);
    tick(&mut session, &mut tutor, 31);
    update(&mut session, &mut tutor, "voltage", 24.0);
    let messages = tutor_messages(&session);
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("specific overload hint"));
}

#[test]
fn ask_ai_replies_immediately_with_fresh_numbers() {
    let (mut session, mut tutor) = new_pair();

    update(&mut session, &mut tutor, "voltage", 9.0);
    pump(&mut session, &mut tutor, Command::AskAi);

    let transcript = query::transcript(&session);
    let reply = transcript.last().expect("reply appended");
    assert_eq!(reply.role, Role::Ai);
    assert_eq!(reply.trigger, Some(TriggerKind::AskAi));
    assert!(reply.text.contains("ask reply for 9 V"));
    assert_eq!(transcript[transcript.len() - 2].role, Role::Student);
}
