// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fuel-adapters: OS process management for agent subprocesses

pub mod process;

pub use process::{
    pid_alive, AgentCommand, CompletedProcess, ProcessError, ProcessManager, KILL_GRACE,
    OUTPUT_TAIL_BYTES, SHUTDOWN_GRACE,
};
