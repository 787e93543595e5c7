//! Ticket types: urgency classes, lifecycle status, priority key.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tickets whose call rank is at or below this are urgent.
pub const URGENT_CALL_RANK: u32 = 2;

// ---------------------------------------------------------------------------
// Call class
// ---------------------------------------------------------------------------

/// What kind of problem the ticket reports. Drives the default call rank
/// and the estimated resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallClass {
    ServerDown,
    ProductionImpact,
    NoImpact,
    Question,
}

impl CallClass {
    pub const ALL: [CallClass; 4] = [
        CallClass::ServerDown,
        CallClass::ProductionImpact,
        CallClass::NoImpact,
        CallClass::Question,
    ];

    /// Default call rank. Lower is more urgent.
    pub const fn rank(self) -> u32 {
        match self {
            CallClass::ServerDown => 1,
            CallClass::ProductionImpact => 2,
            CallClass::NoImpact => 3,
            CallClass::Question => 4,
        }
    }

    pub const fn resolution_minutes(self) -> i64 {
        match self {
            CallClass::ServerDown => 120,
            CallClass::ProductionImpact => 60,
            CallClass::NoImpact => 30,
            CallClass::Question => 15,
        }
    }

    pub fn estimated_resolution(self) -> Duration {
        Duration::minutes(self.resolution_minutes())
    }

    /// Wire token, as used by serde.
    pub const fn token(self) -> &'static str {
        match self {
            CallClass::ServerDown => "server_down",
            CallClass::ProductionImpact => "production_impact",
            CallClass::NoImpact => "no_impact",
            CallClass::Question => "question",
        }
    }

    /// Human label for dashboards and notifications.
    pub const fn label(self) -> &'static str {
        match self {
            CallClass::ServerDown => "Server down",
            CallClass::ProductionImpact => "Production impact",
            CallClass::NoImpact => "No impact",
            CallClass::Question => "Question",
        }
    }
}

impl std::fmt::Display for CallClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

impl std::str::FromStr for CallClass {
    type Err = Error;

    /// Accepts the wire token or the human label, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| matches_name(s, c.token(), c.label()))
            .ok_or_else(|| Error::validation("call_class", format!("unknown call class '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Client class
// ---------------------------------------------------------------------------

/// Commercial tier of the reporting client. Breaks ties between tickets of
/// the same call rank; never overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientClass {
    Priority,
    Standard,
    Demo,
}

impl ClientClass {
    pub const ALL: [ClientClass; 3] = [
        ClientClass::Priority,
        ClientClass::Standard,
        ClientClass::Demo,
    ];

    pub const fn rank(self) -> u32 {
        match self {
            ClientClass::Priority => 1,
            ClientClass::Standard => 2,
            ClientClass::Demo => 3,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            ClientClass::Priority => "priority",
            ClientClass::Standard => "standard",
            ClientClass::Demo => "demo",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ClientClass::Priority => "Priority",
            ClientClass::Standard => "Standard",
            ClientClass::Demo => "Demo",
        }
    }
}

impl std::fmt::Display for ClientClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

impl std::str::FromStr for ClientClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| matches_name(s, c.token(), c.label()))
            .ok_or_else(|| {
                Error::validation("client_class", format!("unknown client class '{s}'"))
            })
    }
}

fn matches_name(input: &str, token: &str, label: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case(token) || input.eq_ignore_ascii_case(label)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a ticket.
///
/// There is no reopen transition. A resolved problem that comes back is a
/// new ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Waiting in the queue, or popped by dispatch with no agent yet.
    Pending,
    /// Linked to an agent.
    InProgress,
    /// Done. Terminal; the ticket has left every active index.
    Resolved,
}

impl TicketStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (InProgress, Pending)     // bumped off its agent
                | (InProgress, InProgress)  // moved to another agent
                | (InProgress, Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Resolved)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Priority key
// ---------------------------------------------------------------------------

/// Composite urgency key. Lower sorts first; `call_rank` is primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriorityKey {
    pub call_rank: u32,
    pub client_rank: u32,
}

impl std::fmt::Display for PriorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.call_rank, self.client_rank)
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A support ticket tracked by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// `INC-<n>` when engine-assigned, otherwise the caller's id verbatim.
    pub id: String,
    pub client_name: String,
    pub description: String,
    pub client_class: ClientClass,
    pub call_class: CallClass,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,

    /// Replaces the call-class rank for ordering. Client rank is never
    /// overridden.
    pub manual_priority: Option<u32>,

    /// Set only while `status == InProgress`.
    pub assigned_agent: Option<String>,

    /// Fixed at creation from the call class.
    #[serde(with = "minutes")]
    pub estimated_resolution: Duration,
}

impl Ticket {
    pub fn call_rank(&self) -> u32 {
        self.manual_priority.unwrap_or(self.call_class.rank())
    }

    pub fn priority_key(&self) -> PriorityKey {
        PriorityKey {
            call_rank: self.call_rank(),
            client_rank: self.client_class.rank(),
        }
    }

    /// ServerDown / ProductionImpact tier, after any manual override.
    pub fn is_urgent(&self) -> bool {
        self.call_rank() <= URGENT_CALL_RANK
    }
}

/// Serializes a `chrono::Duration` as whole minutes.
mod minutes {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::minutes)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// An inbound ticket request. Class fields stay raw strings until the engine
/// validates them, so a transport layer can hand over whatever it received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTicket {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) client_name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) client_class: String,
    #[serde(default)]
    pub(crate) call_class: String,
    #[serde(default)]
    pub(crate) manual_priority: Option<u32>,
}

impl NewTicket {
    pub fn new(
        client_name: impl Into<String>,
        client_class: impl Into<String>,
        call_class: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            client_name: client_name.into(),
            description: String::new(),
            client_class: client_class.into(),
            call_class: call_class.into(),
            manual_priority: None,
        }
    }

    /// Typed shorthand for callers that already hold the enums.
    pub fn of(client_name: impl Into<String>, client: ClientClass, call: CallClass) -> Self {
        Self::new(client_name, client.token(), call.token())
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn manual_priority(mut self, rank: u32) -> Self {
        self.manual_priority = Some(rank);
        self
    }

    /// Parse and check every field. Nothing is allocated in the engine
    /// until this succeeds.
    pub(crate) fn validate(&self) -> Result<ValidTicket> {
        if self.client_name.trim().is_empty() {
            return Err(Error::validation("client_name", "must not be empty"));
        }
        let client_class = self.client_class.parse::<ClientClass>()?;
        let call_class = self.call_class.parse::<CallClass>()?;
        if let Some(rank) = self.manual_priority {
            validate_rank("manual_priority", rank)?;
        }
        // Blank counts as absent; anything else is kept verbatim.
        let id = self.id.clone().filter(|id| !id.trim().is_empty());
        Ok(ValidTicket {
            id,
            client_class,
            call_class,
        })
    }

    pub(crate) fn into_ticket(self, valid: ValidTicket, id: String, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            client_name: self.client_name,
            description: self.description,
            client_class: valid.client_class,
            call_class: valid.call_class,
            status: TicketStatus::Pending,
            created_at: now,
            manual_priority: self.manual_priority,
            assigned_agent: None,
            estimated_resolution: valid.call_class.estimated_resolution(),
        }
    }
}

/// The parsed parts of a `NewTicket`.
pub(crate) struct ValidTicket {
    pub id: Option<String>,
    pub client_class: ClientClass,
    pub call_class: CallClass,
}

pub(crate) fn validate_rank(field: &'static str, rank: u32) -> Result<()> {
    if rank == 0 {
        return Err(Error::validation(field, "rank must be 1 or greater"));
    }
    Ok(())
}
