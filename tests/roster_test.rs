//! Tests for roster loading and registration.

use std::io::Write;

use ticket_dispatch::engine::DispatchEngine;
use ticket_dispatch::error::Error;
use ticket_dispatch::model::CallClass;
use ticket_dispatch::roster::Roster;

const ROSTER: &str = r#"
[[agent]]
id = "ag1"
name = "Ana Silva"
capabilities = ["server_down", "production_impact"]

[[agent]]
id = "ag2"
name = "Carlos Souza"
capabilities = ["no_impact", "question"]
"#;

#[test]
fn parses_agents_in_file_order() {
    let roster = Roster::parse(ROSTER).unwrap();

    assert_eq!(roster.len(), 2);
    let agents = roster.agents();
    assert_eq!(agents[0].id, "ag1");
    assert!(agents[0].capabilities.contains(&CallClass::ServerDown));
    assert_eq!(agents[1].name, "Carlos Souza");
}

#[test]
fn loads_from_file_and_registers() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ROSTER.as_bytes()).unwrap();

    let roster = Roster::load(file.path()).unwrap();
    let engine = DispatchEngine::detached();
    roster.register_all(&engine).unwrap();

    let snap = engine.snapshot();
    let ids: Vec<&str> = snap.agents.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["ag1", "ag2"]);
    assert!(snap.agents.iter().all(|a| a.is_available()));
}

#[test]
fn empty_file_is_an_empty_roster() {
    assert!(Roster::parse("").unwrap().is_empty());
}

#[test]
fn unknown_capability_is_a_config_error() {
    let err = Roster::parse(
        r#"
[[agent]]
id = "x"
name = "X"
capabilities = ["billing"]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn agent_without_capabilities_is_rejected() {
    let err = Roster::parse(
        r#"
[[agent]]
id = "x"
name = "X"
capabilities = []
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "capabilities", .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Roster::load(&dir.path().join("nope.toml")).unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected I/O error, got {other:?}"),
    }
}

#[test]
fn malformed_file_is_a_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[[agent]]\nid = ").unwrap();

    let err = Roster::load(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn sample_roster_covers_every_call_class() {
    let roster = Roster::sample();
    for class in CallClass::ALL {
        assert!(
            roster.agents().iter().any(|a| a.capabilities.contains(&class)),
            "no sample agent handles {class}"
        );
    }
}
