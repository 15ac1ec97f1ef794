// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC wire format.
//!
//! Newline-delimited JSON, UTF-8, one record per line. Every outbound
//! record carries `type`, `instance_id` (UUIDv4 of the daemon instance),
//! and `timestamp` (RFC3339). Compact JSON encoding never emits a raw
//! newline, so framing is unambiguous.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuel_core::Event;

/// Protocol version reported in `hello` records.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Generate the UUIDv4 identifying one daemon process.
pub fn new_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Serialize)]
struct OutboundRecord<'a> {
    #[serde(flatten)]
    event: &'a Event,
    instance_id: &'a str,
    timestamp: String,
}

/// A decoded outbound record, as clients see it.
#[derive(Debug, Deserialize)]
pub struct WireEvent {
    #[serde(flatten)]
    pub event: Event,
    pub instance_id: String,
    pub timestamp: String,
}

/// Encode an event as one wire line (with trailing newline).
pub fn encode_event(event: &Event, instance_id: &str) -> Result<String, ProtocolError> {
    let record = OutboundRecord {
        event,
        instance_id,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let mut line = serde_json::to_string(&record)?;
    line.push('\n');
    Ok(line)
}

/// Decode one wire line into an event record.
pub fn decode_event(line: &str) -> Result<WireEvent, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Inbound command records from clients. `request_id` is client-chosen and
/// echoed on the matching `response` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Pause { request_id: String },
    Resume { request_id: String },
    Kill { request_id: String, task_id: String },
    Shutdown { request_id: String },
    Status { request_id: String },
}

impl Command {
    pub fn request_id(&self) -> &str {
        match self {
            Command::Pause { request_id }
            | Command::Resume { request_id }
            | Command::Kill { request_id, .. }
            | Command::Shutdown { request_id }
            | Command::Status { request_id } => request_id,
        }
    }
}

/// Decode one inbound command line.
pub fn decode_command(line: &str) -> Result<Command, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Encode a command as one wire line (client side; also used by tests).
pub fn encode_command(command: &Command) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(command)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
