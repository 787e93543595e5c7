//! Agent types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ticket::CallClass;
use crate::error::{Error, Result};

/// A support agent on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// Call classes this agent may be auto-assigned. Never empty.
    pub capabilities: BTreeSet<CallClass>,
    /// The ticket this agent is serving. Owned by the engine.
    pub current_ticket: Option<String>,
}

impl Agent {
    pub fn is_available(&self) -> bool {
        self.current_ticket.is_none()
    }

    pub fn can_handle(&self, call_class: CallClass) -> bool {
        self.capabilities.contains(&call_class)
    }
}

/// Registration request for an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub id: String,
    pub name: String,
    pub capabilities: BTreeSet<CallClass>,
}

impl NewAgent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = CallClass>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("id", "agent id must not be empty"));
        }
        if self.capabilities.is_empty() {
            return Err(Error::validation(
                "capabilities",
                format!("agent {} must handle at least one call class", self.id),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_agent(self) -> Agent {
        Agent {
            id: self.id,
            name: self.name,
            capabilities: self.capabilities,
            current_ticket: None,
        }
    }
}
