// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: agent registry, complexity routing, ports.
//!
//! Loaded from `<state-dir>/config.toml` and read-only afterwards.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::task::Complexity;

/// Default loopback port for the consume daemon.
pub const DEFAULT_CONSUME_PORT: u16 = 3835;

/// Default number of failed runs before a task is escalated to a human.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_AGENT_CONCURRENCY: u32 = 1;

/// Errors loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{role} names unregistered agent '{agent}'")]
    UnknownAgent { role: String, agent: String },

    #[error("agent '{0}' has an empty command")]
    EmptyCommand(String),
}

/// Launch specification for one registered agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    /// Executable to launch
    pub command: String,
    /// Argument template; `{prompt}` and `{task_id}` are substituted
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the agent process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum simultaneous runs for this agent
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

fn default_concurrency() -> u32 {
    DEFAULT_AGENT_CONCURRENCY
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_port")]
    consume_port: u16,
    primary: String,
    #[serde(default)]
    review: Option<String>,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    /// complexity name -> agent name
    #[serde(default)]
    complexity: BTreeMap<Complexity, String>,
    agents: BTreeMap<String, AgentSpec>,
}

fn default_port() -> u16 {
    DEFAULT_CONSUME_PORT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Read-only view of the agent registry and daemon settings.
#[derive(Debug, Clone)]
pub struct Config {
    agents: BTreeMap<String, AgentSpec>,
    complexity: BTreeMap<Complexity, String>,
    primary: String,
    review: Option<String>,
    consume_port: u16,
    max_attempts: u32,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&text)?;
        Self::from_raw(raw)
    }

    /// Load the config file, or fall back to built-in defaults when absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        for (name, spec) in &raw.agents {
            if spec.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(name.clone()));
            }
        }
        if !raw.agents.contains_key(&raw.primary) {
            return Err(ConfigError::UnknownAgent {
                role: "primary".to_string(),
                agent: raw.primary,
            });
        }
        if let Some(ref review) = raw.review {
            if !raw.agents.contains_key(review) {
                return Err(ConfigError::UnknownAgent {
                    role: "review".to_string(),
                    agent: review.clone(),
                });
            }
        }
        for (complexity, agent) in &raw.complexity {
            if !raw.agents.contains_key(agent) {
                return Err(ConfigError::UnknownAgent {
                    role: format!("complexity.{complexity}"),
                    agent: agent.clone(),
                });
            }
        }

        Ok(Self {
            agents: raw.agents,
            complexity: raw.complexity,
            primary: raw.primary,
            review: raw.review,
            consume_port: raw.consume_port,
            max_attempts: raw.max_attempts,
        })
    }

    /// Look up a registered agent's launch spec.
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name)
    }

    /// Registered agent names.
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// The agent that handles tasks of the given complexity; falls back to
    /// the primary agent when the map has no entry.
    pub fn agent_for(&self, complexity: Complexity) -> &str {
        self.complexity
            .get(&complexity)
            .map(String::as_str)
            .unwrap_or(&self.primary)
    }

    /// Per-agent concurrency cap. Unregistered agents get a cap of 1.
    pub fn cap(&self, agent: &str) -> u32 {
        self.agents
            .get(agent)
            .map(|spec| spec.concurrency)
            .unwrap_or(DEFAULT_AGENT_CONCURRENCY)
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn review(&self) -> Option<&str> {
        self.review.as_deref()
    }

    pub fn consume_port(&self) -> u16 {
        self.consume_port
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for Config {
    /// A single `claude` primary agent, no review agent, default port.
    fn default() -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(
            "claude".to_string(),
            AgentSpec {
                command: "claude".to_string(),
                args: vec!["-p".to_string(), "{prompt}".to_string()],
                env: BTreeMap::new(),
                model: None,
                concurrency: DEFAULT_AGENT_CONCURRENCY,
            },
        );
        Self {
            agents,
            complexity: BTreeMap::new(),
            primary: "claude".to_string(),
            review: None,
            consume_port: DEFAULT_CONSUME_PORT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Builder for `Config` with test defaults.
#[cfg(any(test, feature = "test-support"))]
pub struct ConfigBuilder {
    agents: BTreeMap<String, AgentSpec>,
    complexity: BTreeMap<Complexity, String>,
    primary: String,
    review: Option<String>,
    consume_port: u16,
    max_attempts: u32,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            agents: BTreeMap::new(),
            complexity: BTreeMap::new(),
            primary: "claude".to_string(),
            review: None,
            consume_port: DEFAULT_CONSUME_PORT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ConfigBuilder {
    /// Register an agent running `command` with the given concurrency cap.
    pub fn agent(mut self, name: &str, command: &str, concurrency: u32) -> Self {
        self.agents.insert(
            name.to_string(),
            AgentSpec {
                command: command.to_string(),
                args: vec!["{prompt}".to_string()],
                env: BTreeMap::new(),
                model: None,
                concurrency,
            },
        );
        self
    }

    /// Register an agent with an explicit argument template.
    pub fn agent_with_args(
        mut self,
        name: &str,
        command: &str,
        args: &[&str],
        concurrency: u32,
    ) -> Self {
        self.agents.insert(
            name.to_string(),
            AgentSpec {
                command: command.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                env: BTreeMap::new(),
                model: None,
                concurrency,
            },
        );
        self
    }

    pub fn primary(mut self, name: &str) -> Self {
        self.primary = name.to_string();
        self
    }

    pub fn review(mut self, name: &str) -> Self {
        self.review = Some(name.to_string());
        self
    }

    pub fn route(mut self, complexity: Complexity, agent: &str) -> Self {
        self.complexity.insert(complexity, agent.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.consume_port = port;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn build(mut self) -> Config {
        if self.agents.is_empty() {
            self.agents.insert(
                self.primary.clone(),
                AgentSpec {
                    command: "true".to_string(),
                    args: Vec::new(),
                    env: BTreeMap::new(),
                    model: None,
                    concurrency: 1,
                },
            );
        }
        Config {
            agents: self.agents,
            complexity: self.complexity,
            primary: self.primary,
            review: self.review,
            consume_port: self.consume_port,
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Config {
    /// Create a builder with test defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
