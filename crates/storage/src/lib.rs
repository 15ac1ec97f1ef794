// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fuel-storage: durable entity store and run ledger

pub mod ledger;
pub mod paths;
pub mod store;

pub use ledger::{LedgerError, NewRun, RunDelta, RunLedger};
pub use paths::{StateDir, STATE_DIR_ENV, STATE_DIR_NAME};
pub use store::{NewTask, Store, StoreError, StoreState};
