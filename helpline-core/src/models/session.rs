//! Session records: the conversation state machine.
//!
//! A session is an append-only sequence of turn entries plus status flags.
//! The four stored flags (`end_conversation`, `transfer_conversation`,
//! `human_intervention`, `agent_expiry`) remain the storage representation
//! for compatibility with existing records; in-process code interprets them
//! only through [`SessionRecord::state`] and mutates them only through the
//! transition methods.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{HelplineError, HelplineResult};

/// Wall-clock string pattern carried by legacy role entries. Parsed as UTC;
/// the stored string has no timezone field.
pub const LEGACY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn format_legacy_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(LEGACY_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_legacy_timestamp(raw: &str) -> HelplineResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| HelplineError::InvalidTurnTimestamp(raw.to_string()))
}

/// Serde bridge keeping the legacy string format at the role-entry
/// serialization boundary only.
mod legacy_timestamp {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_legacy_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_legacy_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnKind {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai-agent")]
    AiAgent,
    #[serde(rename = "human-agent")]
    HumanAgent,
}

impl std::fmt::Display for TurnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnKind::Human => write!(f, "human"),
            TurnKind::AiAgent => write!(f, "ai-agent"),
            TurnKind::HumanAgent => write!(f, "human-agent"),
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub kind: TurnKind,

    pub text: String,

    #[serde(with = "legacy_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub input_tokens: i64,

    #[serde(default)]
    pub output_tokens: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl RoleEntry {
    pub fn new(kind: TurnKind, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            text: text.into(),
            timestamp,
            input_tokens: 0,
            output_tokens: 0,
            sentiment: None,
            agent_id: None,
            agent_name: None,
            agent_email: None,
            attachment: None,
        }
    }
}

/// Macro-state of a session at a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transfer or intervention, not ended; the bot owns the session.
    Bot,
    /// Human handoff requested, no agent has responded yet.
    Queued,
    /// An agent has responded or proactively intervened.
    AgentOwned,
    /// Terminal.
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Bot => write!(f, "bot"),
            SessionState::Queued => write!(f, "queued"),
            SessionState::AgentOwned => write!(f, "agent-owned"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// Why a session was ended by the expiry sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Timed out while queued, before any agent responded.
    AgentUnreachable,
    /// Timed out after an agent was connected.
    AgentSilent,
    /// Closed explicitly by a participant.
    Closed,
}

/// Outcome of the agent-side expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentExpiry {
    /// Last turn was human/ai-agent: nobody picked the session up in time.
    PreConnection,
    /// Last turn was human-agent: the connected agent went silent.
    PostConnection,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub session_id: String,
    pub workspace_id: i64,
    pub roles: Json<Vec<RoleEntry>>,
    pub timeout_minutes: i64,
    pub latest_timestamp: DateTime<Utc>,
    pub end_conversation: bool,
    pub transfer_conversation: bool,
    pub human_intervention: bool,
    pub agent_expiry: bool,
    pub language: Option<String>,
    pub sentiment: Option<String>,
    pub agent_sentiment: Option<String>,
    pub tags: Option<Vec<String>>,
    /// AnythingLLM thread handle for this session, when that provider is in
    /// use.
    pub thread_slug: Option<String>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, workspace_id: i64, timeout_minutes: i64) -> Self {
        Self {
            session_id: session_id.into(),
            workspace_id,
            roles: Json(Vec::new()),
            timeout_minutes,
            latest_timestamp: Utc::now(),
            end_conversation: false,
            transfer_conversation: false,
            human_intervention: false,
            agent_expiry: false,
            language: None,
            sentiment: None,
            agent_sentiment: None,
            tags: None,
            thread_slug: None,
        }
    }

    /// Derive the macro-state from the stored flags. This is the only place
    /// the flag combination is interpreted.
    pub fn state(&self) -> SessionState {
        if self.end_conversation {
            SessionState::Ended
        } else if self.human_intervention || self.agent_responded() {
            SessionState::AgentOwned
        } else if self.transfer_conversation {
            SessionState::Queued
        } else {
            SessionState::Bot
        }
    }

    fn agent_responded(&self) -> bool {
        self.transfer_conversation
            && self
                .roles
                .iter()
                .any(|role| role.kind == TurnKind::HumanAgent)
    }

    /// Request human handoff. Legal from the bot-owned state only.
    pub fn request_transfer(&mut self) -> HelplineResult<()> {
        match self.state() {
            SessionState::Bot => {
                self.transfer_conversation = true;
                Ok(())
            }
            other => Err(HelplineError::InvalidStateTransition {
                from: other.to_string(),
                to: SessionState::Queued.to_string(),
            }),
        }
    }

    /// An agent proactively takes the session over.
    pub fn begin_intervention(&mut self) -> HelplineResult<()> {
        match self.state() {
            SessionState::Bot | SessionState::Queued => {
                self.human_intervention = true;
                Ok(())
            }
            other => Err(HelplineError::InvalidStateTransition {
                from: other.to_string(),
                to: SessionState::AgentOwned.to_string(),
            }),
        }
    }

    /// Transition to the terminal state. Ending an already-ended session is
    /// rejected so sweeps stay observably idempotent by filtering first.
    pub fn end(&mut self, reason: EndReason) -> HelplineResult<()> {
        if self.end_conversation {
            return Err(HelplineError::SessionAlreadyEnded(self.session_id.clone()));
        }
        if reason == EndReason::AgentUnreachable {
            self.agent_expiry = true;
        }
        self.end_conversation = true;
        Ok(())
    }

    /// Append a turn. The coordinator never appends to an ended session.
    pub fn append_role(&mut self, entry: RoleEntry) -> HelplineResult<()> {
        if self.end_conversation {
            return Err(HelplineError::SessionAlreadyEnded(self.session_id.clone()));
        }
        self.latest_timestamp = entry.timestamp;
        self.roles.0.push(entry);
        Ok(())
    }

    pub fn last_turn(&self) -> Option<&RoleEntry> {
        self.roles.last()
    }

    /// Timestamp of the last turn matching any of the given kinds.
    pub fn last_turn_timestamp(&self, kinds: &[TurnKind]) -> Option<DateTime<Utc>> {
        self.roles
            .iter()
            .filter(|role| kinds.contains(&role.kind))
            .map(|role| role.timestamp)
            .last()
    }

    /// Human-turn transcript joined with ". " (classifier and summary input).
    pub fn human_transcript(&self) -> String {
        self.transcript_of(TurnKind::Human)
    }

    /// Human-agent transcript joined with ". " (agent sentiment input).
    pub fn agent_transcript(&self) -> String {
        self.transcript_of(TurnKind::HumanAgent)
    }

    fn transcript_of(&self, kind: TurnKind) -> String {
        self.roles
            .iter()
            .filter(|role| role.kind == kind && !role.text.trim().is_empty())
            .map(|role| role.text.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }

    /// General inactivity expiry: `latest_timestamp + timeout` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.latest_timestamp + Duration::minutes(self.timeout_minutes) < now
    }

    /// Agent-side expiry decision. Applies only to open sessions with a
    /// transfer or intervention; the deadline is computed from the last turn
    /// matching the session's current ownership side.
    pub fn agent_expiry_outcome(&self, now: DateTime<Utc>) -> Option<AgentExpiry> {
        if self.end_conversation || !(self.human_intervention || self.transfer_conversation) {
            return None;
        }

        let last = self.last_turn()?;
        let (kinds, outcome): (&[TurnKind], AgentExpiry) = match last.kind {
            TurnKind::Human | TurnKind::AiAgent => (
                &[TurnKind::Human, TurnKind::AiAgent],
                AgentExpiry::PreConnection,
            ),
            TurnKind::HumanAgent => (&[TurnKind::HumanAgent], AgentExpiry::PostConnection),
        };

        let reference = self.last_turn_timestamp(kinds)?;
        if reference + Duration::minutes(self.timeout_minutes) < now {
            Some(outcome)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_turns(turns: Vec<(TurnKind, &str, DateTime<Utc>)>) -> SessionRecord {
        let mut session = SessionRecord::new("s-1", 1, 10);
        for (kind, text, ts) in turns {
            session
                .append_role(RoleEntry::new(kind, text, ts))
                .unwrap();
        }
        session
    }

    #[test]
    fn test_legacy_timestamp_round_trip() {
        let raw = "25/12/2024 18:30:05";
        let parsed = parse_legacy_timestamp(raw).unwrap();
        assert_eq!(format_legacy_timestamp(parsed), raw);
    }

    #[test]
    fn test_legacy_timestamp_rejects_garbage() {
        assert!(parse_legacy_timestamp("2024-12-25T18:30:05Z").is_err());
        assert!(parse_legacy_timestamp("").is_err());
    }

    #[test]
    fn test_role_entry_serializes_legacy_format() {
        let ts = parse_legacy_timestamp("01/02/2024 09:00:00").unwrap();
        let entry = RoleEntry::new(TurnKind::Human, "hello", ts);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["timestamp"], "01/02/2024 09:00:00");
        assert_eq!(json["type"], "human");
    }

    #[test]
    fn test_state_derivation() {
        let now = Utc::now();
        let mut session = session_with_turns(vec![(TurnKind::Human, "hi", now)]);
        assert_eq!(session.state(), SessionState::Bot);

        session.request_transfer().unwrap();
        assert_eq!(session.state(), SessionState::Queued);

        session
            .append_role(RoleEntry::new(TurnKind::HumanAgent, "hello", now))
            .unwrap();
        assert_eq!(session.state(), SessionState::AgentOwned);

        session.end(EndReason::Closed).unwrap();
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn test_intervention_owns_session_without_transfer() {
        let mut session = SessionRecord::new("s-1", 1, 10);
        session.begin_intervention().unwrap();
        assert_eq!(session.state(), SessionState::AgentOwned);
    }

    #[test]
    fn test_transfer_illegal_after_end() {
        let mut session = SessionRecord::new("s-1", 1, 10);
        session.end(EndReason::Closed).unwrap();
        assert!(session.request_transfer().is_err());
    }

    #[test]
    fn test_end_twice_rejected() {
        let mut session = SessionRecord::new("s-1", 1, 10);
        session.end(EndReason::Closed).unwrap();
        assert!(matches!(
            session.end(EndReason::Closed),
            Err(HelplineError::SessionAlreadyEnded(_))
        ));
    }

    #[test]
    fn test_end_agent_unreachable_sets_expiry_flag() {
        let mut session = SessionRecord::new("s-1", 1, 10);
        session.request_transfer().unwrap();
        session.end(EndReason::AgentUnreachable).unwrap();
        assert!(session.agent_expiry);
        assert!(session.end_conversation);
    }

    #[test]
    fn test_append_rejected_after_end() {
        let mut session = SessionRecord::new("s-1", 1, 10);
        session.end(EndReason::Closed).unwrap();
        let entry = RoleEntry::new(TurnKind::Human, "late", Utc::now());
        assert!(session.append_role(entry).is_err());
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let mut session = SessionRecord::new("s-1", 1, 10);

        session.latest_timestamp = now - Duration::minutes(11);
        assert!(session.is_expired(now));

        session.latest_timestamp = now - Duration::minutes(9);
        assert!(!session.is_expired(now));
    }

    #[test]
    fn test_agent_expiry_pre_connection() {
        let now = Utc::now();
        let mut session = session_with_turns(vec![
            (TurnKind::Human, "help", now - Duration::minutes(15)),
            (TurnKind::AiAgent, "transferring", now - Duration::minutes(14)),
        ]);
        session.request_transfer().unwrap();

        assert_eq!(
            session.agent_expiry_outcome(now),
            Some(AgentExpiry::PreConnection)
        );
    }

    #[test]
    fn test_agent_expiry_post_connection() {
        let now = Utc::now();
        let mut session = session_with_turns(vec![(
            TurnKind::Human,
            "help",
            now - Duration::minutes(20),
        )]);
        session.request_transfer().unwrap();
        session
            .append_role(RoleEntry::new(
                TurnKind::HumanAgent,
                "on it",
                now - Duration::minutes(11),
            ))
            .unwrap();

        assert_eq!(
            session.agent_expiry_outcome(now),
            Some(AgentExpiry::PostConnection)
        );
    }

    #[test]
    fn test_agent_expiry_not_due() {
        let now = Utc::now();
        let mut session =
            session_with_turns(vec![(TurnKind::Human, "help", now - Duration::minutes(5))]);
        session.request_transfer().unwrap();

        assert_eq!(session.agent_expiry_outcome(now), None);
    }

    #[test]
    fn test_agent_expiry_ignores_bot_owned() {
        let now = Utc::now();
        let session =
            session_with_turns(vec![(TurnKind::Human, "hi", now - Duration::minutes(60))]);
        assert_eq!(session.agent_expiry_outcome(now), None);
    }

    #[test]
    fn test_transcripts() {
        let now = Utc::now();
        let session = session_with_turns(vec![
            (TurnKind::Human, "my card is blocked", now),
            (TurnKind::AiAgent, "let me check", now),
            (TurnKind::Human, "thanks", now),
            (TurnKind::HumanAgent, "unblocked now", now),
            (TurnKind::Human, "  ", now),
        ]);

        assert_eq!(session.human_transcript(), "my card is blocked. thanks");
        assert_eq!(session.agent_transcript(), "unblocked now");
    }
}
