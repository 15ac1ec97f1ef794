// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

const FULL_CONFIG: &str = r#"
consume_port = 4100
primary = "claude"
review = "reviewer"
max_attempts = 2

[complexity]
simple = "haiku"
complex = "opus"

[agents.claude]
command = "claude"
args = ["-p", "{prompt}"]
concurrency = 2

[agents.haiku]
command = "claude"
args = ["--model", "haiku", "-p", "{prompt}"]

[agents.opus]
command = "claude"
args = ["--model", "opus", "-p", "{prompt}"]
model = "opus"

[agents.reviewer]
command = "claude"
args = ["--review", "{task_id}"]
"#;

#[test]
fn loads_full_config() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = Config::load(&path).unwrap();

    assert_eq!(config.consume_port(), 4100);
    assert_eq!(config.primary(), "claude");
    assert_eq!(config.review(), Some("reviewer"));
    assert_eq!(config.max_attempts(), 2);
    assert_eq!(config.cap("claude"), 2);
    assert_eq!(config.cap("haiku"), 1);
    assert_eq!(config.agent("opus").unwrap().model.as_deref(), Some("opus"));
}

#[test]
fn complexity_routing_falls_back_to_primary() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = Config::load(&path).unwrap();

    assert_eq!(config.agent_for(Complexity::Simple), "haiku");
    assert_eq!(config.agent_for(Complexity::Complex), "opus");
    // No entry for moderate -> primary
    assert_eq!(config.agent_for(Complexity::Moderate), "claude");
}

#[test]
fn rejects_unregistered_primary() {
    let (_dir, path) = write_config(
        r#"
primary = "ghost"

[agents.claude]
command = "claude"
"#,
    );
    match Config::load(&path) {
        Err(ConfigError::UnknownAgent { role, agent }) => {
            assert_eq!(role, "primary");
            assert_eq!(agent, "ghost");
        }
        other => panic!("expected UnknownAgent, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn rejects_unregistered_review_agent() {
    let (_dir, path) = write_config(
        r#"
primary = "claude"
review = "ghost"

[agents.claude]
command = "claude"
"#,
    );
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::UnknownAgent { .. })
    ));
}

#[test]
fn rejects_unregistered_complexity_target() {
    let (_dir, path) = write_config(
        r#"
primary = "claude"

[complexity]
complex = "ghost"

[agents.claude]
command = "claude"
"#,
    );
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::UnknownAgent { .. })
    ));
}

#[test]
fn rejects_empty_command() {
    let (_dir, path) = write_config(
        r#"
primary = "claude"

[agents.claude]
command = "  "
"#,
    );
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::EmptyCommand(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("primary = [broken");
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("config.toml")).unwrap();

    assert_eq!(config.primary(), "claude");
    assert_eq!(config.review(), None);
    assert_eq!(config.consume_port(), DEFAULT_CONSUME_PORT);
    assert_eq!(config.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    assert!(config.agent("claude").is_some());
}

#[test]
fn unknown_top_level_keys_are_rejected() {
    let (_dir, path) = write_config(
        r#"
primary = "claude"
bogus = true

[agents.claude]
command = "claude"
"#,
    );
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
}
