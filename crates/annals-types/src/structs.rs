//! Core event record and query descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{AvatarId, EventId};
use crate::time::MonthStamp;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable narrative record produced by the simulation.
///
/// Content is never mutated after insertion. `created_at` is the
/// real-world insertion time; it is `None` for records imported from
/// legacy data that carried no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Globally unique identifier, assigned by the producer.
    pub id: EventId,
    /// Simulation-time ordering key.
    pub month_stamp: MonthStamp,
    /// Narrative payload.
    pub content: String,
    /// Avatars referenced by the event, in the order the producer listed them.
    pub participants: Vec<AvatarId>,
    /// Long-term significance; major events survive default cleanup.
    pub is_major: bool,
    /// Narrative-arc significance.
    pub is_story: bool,
    /// Real-world insertion timestamp.
    pub created_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Create a minor, non-story event with a fresh id and no participants.
    pub fn new(month_stamp: MonthStamp, content: impl Into<String>) -> Self {
        Self {
            id: EventId::generate(),
            month_stamp,
            content: content.into(),
            participants: Vec::new(),
            is_major: false,
            is_story: false,
            created_at: Some(Utc::now()),
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the participating avatars.
    #[must_use]
    pub fn with_participants<I, A>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AvatarId>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the event as major (long-term memory).
    #[must_use]
    pub const fn major(mut self) -> Self {
        self.is_major = true;
        self
    }

    /// Mark the event as part of a story arc.
    #[must_use]
    pub const fn story(mut self) -> Self {
        self.is_story = true;
        self
    }

    /// Whether `avatar` participates in this event.
    pub fn involves(&self, avatar: &AvatarId) -> bool {
        self.participants.contains(avatar)
    }

    /// Display string combining the simulation date and the content.
    pub fn display_text(&self) -> String {
        format!("{}: {}", self.month_stamp, self.content)
    }
}

// ---------------------------------------------------------------------------
// Query descriptors
// ---------------------------------------------------------------------------

/// Participant filter applied to event reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Every event.
    #[default]
    All,
    /// Events in which the avatar participates.
    Avatar(AvatarId),
    /// Events in which both avatars participate (intersection, not union).
    Pair(AvatarId, AvatarId),
}

impl EventFilter {
    /// Resolve the optional single and pair filters of a read request.
    ///
    /// A complete pair wins over a single avatar when both are supplied.
    /// An incomplete pair is ignored here; callers that must reject it
    /// check before resolving.
    pub fn resolve(
        avatar: Option<AvatarId>,
        pair: (Option<AvatarId>, Option<AvatarId>),
    ) -> Self {
        match (pair, avatar) {
            ((Some(a), Some(b)), _) => Self::Pair(a, b),
            (_, Some(a)) => Self::Avatar(a),
            _ => Self::All,
        }
    }
}

/// Memory tier used when feeding history to the decision-making layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Significance {
    /// Long-term memory: major events that are not story beats.
    Major,
    /// Short-term memory: minor events plus every story beat.
    Minor,
}

impl Significance {
    /// Whether `event` belongs to this tier.
    pub const fn admits(self, event: &Event) -> bool {
        match self {
            Self::Major => event.is_major && !event.is_story,
            Self::Minor => !event.is_major || event.is_story,
        }
    }
}
