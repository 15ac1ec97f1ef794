// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-id generation and partial-id matching.
//!
//! Every persistent entity carries an id of the form `<prefix>-<tail>`:
//! `f-` for tasks, `e-` for epics, `b-` for backlog items, `run-` for runs.
//! Tails are random base36 strings of [`TAIL_LEN`] characters; uniqueness is
//! enforced by the store with collision retry.

use rand::Rng;

/// Length of the random alphanumeric tail.
pub const TAIL_LEN: usize = 5;

const TAIL_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The kind of a persistent entity, discriminated by its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Task,
    Epic,
    Backlog,
    Run,
}

impl IdKind {
    /// The id prefix for this kind, without the separating dash.
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Task => "f",
            IdKind::Epic => "e",
            IdKind::Backlog => "b",
            IdKind::Run => "run",
        }
    }

    /// Human-readable noun for error messages.
    pub fn noun(&self) -> &'static str {
        match self {
            IdKind::Task => "task",
            IdKind::Epic => "epic",
            IdKind::Backlog => "backlog item",
            IdKind::Run => "run",
        }
    }

    /// Compose a full id from this kind and a tail.
    pub fn compose(&self, tail: &str) -> String {
        format!("{}-{}", self.prefix(), tail)
    }

    /// Returns the tail of `id` if it carries this kind's prefix.
    pub fn tail_of<'a>(&self, id: &'a str) -> Option<&'a str> {
        let rest = id.strip_prefix(self.prefix())?;
        rest.strip_prefix('-')
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.noun())
    }
}

/// Generates id tails. Split out as a trait so the store can be driven
/// deterministically in tests.
pub trait TailGen: Send {
    fn tail(&self) -> String;
}

/// Random base36 tail generator for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTail;

impl TailGen for RandomTail {
    fn tail(&self) -> String {
        let mut rng = rand::rng();
        (0..TAIL_LEN)
            .map(|_| TAIL_ALPHABET[rng.random_range(0..TAIL_ALPHABET.len())] as char)
            .collect()
    }
}

/// Sequential tail generator for testing (`00001`, `00002`, ...).
#[derive(Debug, Default)]
pub struct SequentialTail {
    counter: std::sync::atomic::AtomicU64,
}

impl TailGen for SequentialTail {
    fn tail(&self) -> String {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("{:05}", n + 1)
    }
}

/// Normalize a partial id for suffix matching against tails of `kind`.
///
/// A leading `<prefix>-` is stripped so both `f-x7k2m` and `2m` match the
/// task `f-x7k2m`.
pub fn normalize_partial<'a>(kind: IdKind, partial: &'a str) -> &'a str {
    kind.tail_of(partial).unwrap_or(partial)
}

/// Whether `partial` matches the full `id` of the given kind.
///
/// A partial matches when it is a suffix of the id's tail.
pub fn partial_matches(kind: IdKind, id: &str, partial: &str) -> bool {
    let needle = normalize_partial(kind, partial);
    if needle.is_empty() {
        return false;
    }
    match kind.tail_of(id) {
        Some(tail) => tail.ends_with(needle),
        None => false,
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
