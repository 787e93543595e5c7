//! Agent roster files.
//!
//! A roster is a TOML file of `[[agent]]` tables loaded at startup and
//! registered with the engine in file order, which is also the first-fit
//! order used by dispatch:
//!
//! ```toml
//! [[agent]]
//! id = "ag1"
//! name = "Ana Silva"
//! capabilities = ["server_down", "production_impact"]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::engine::DispatchEngine;
use crate::error::{Error, Result};
use crate::model::{CallClass, NewAgent};

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    agent: Vec<NewAgent>,
}

/// Agents to register, in order.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<NewAgent>,
}

impl Roster {
    pub fn empty() -> Self {
        Self { agents: Vec::new() }
    }

    /// The two-agent roster the dispatch desk started with: one on outages,
    /// one on everything else.
    pub fn sample() -> Self {
        Self {
            agents: vec![
                NewAgent::new(
                    "ag1",
                    "Ana Silva",
                    [CallClass::ServerDown, CallClass::ProductionImpact],
                ),
                NewAgent::new(
                    "ag2",
                    "Carlos Souza",
                    [CallClass::NoImpact, CallClass::Question],
                ),
            ],
        }
    }

    /// Load a roster file. A missing or unreadable file is `Error::Io`; a
    /// malformed one is `Error::Config`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad roster {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: RosterFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        for agent in &file.agent {
            agent.validate()?;
        }
        Ok(Self { agents: file.agent })
    }

    pub fn agents(&self) -> &[NewAgent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Register every agent with the engine.
    pub fn register_all(&self, engine: &DispatchEngine) -> Result<()> {
        for agent in &self.agents {
            engine.register_agent(agent.clone())?;
        }
        info!(agents = self.len(), "roster registered");
        Ok(())
    }
}
