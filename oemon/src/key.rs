//! Series keys: one per chart line.
//!
//! Per-session series are keyed by a typed `EntityId` rather than a joined
//! string. The string form exists only for display and persistence; it escapes
//! the separators so that ids containing `-` or `:` never collide.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const ESCAPE: char = '\\';
const METRIC_SEP: char = ':';
const ENTITY_SEP: char = '-';

/// An agent/session pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    pub agent: String,
    pub session: String,
}

impl EntityId {
    pub fn new(agent: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            session: session.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.agent)?;
        write!(f, "{ENTITY_SEP}")?;
        write_escaped(f, &self.session)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKey {
    /// Aggregate value such as `requests` or `memoryUsed`.
    Scalar(String),
    /// Per-entity value such as one session's memory.
    Entity { metric: String, id: EntityId },
}

impl SeriesKey {
    pub fn scalar(name: impl Into<String>) -> Self {
        SeriesKey::Scalar(name.into())
    }

    pub fn entity(metric: impl Into<String>, id: EntityId) -> Self {
        SeriesKey::Entity {
            metric: metric.into(),
            id,
        }
    }

    pub fn metric(&self) -> &str {
        match self {
            SeriesKey::Scalar(name) => name,
            SeriesKey::Entity { metric, .. } => metric,
        }
    }

    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            SeriesKey::Scalar(_) => None,
            SeriesKey::Entity { id, .. } => Some(id),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Scalar(name) => write_escaped(f, name),
            SeriesKey::Entity { metric, id } => {
                write_escaped(f, metric)?;
                write!(f, "{METRIC_SEP}{id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("key ends with a dangling escape")]
    DanglingEscape,
    #[error("key has an empty metric name")]
    EmptyMetric,
    #[error("unexpected separator '{0}' at position {1}")]
    UnexpectedSeparator(char, usize),
    #[error("entity key is missing the agent/session separator")]
    MissingEntitySeparator,
}

impl FromStr for SeriesKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // parts[0] = metric, parts[1] = agent, parts[2] = session
        let mut parts: Vec<String> = Vec::with_capacity(3);
        let mut current = String::new();
        let mut chars = s.char_indices();
        while let Some((pos, c)) = chars.next() {
            match c {
                ESCAPE => match chars.next() {
                    Some((_, escaped)) => current.push(escaped),
                    None => return Err(KeyParseError::DanglingEscape),
                },
                METRIC_SEP if parts.is_empty() => parts.push(std::mem::take(&mut current)),
                ENTITY_SEP if parts.len() == 1 => parts.push(std::mem::take(&mut current)),
                METRIC_SEP | ENTITY_SEP => {
                    return Err(KeyParseError::UnexpectedSeparator(c, pos));
                }
                _ => current.push(c),
            }
        }
        parts.push(current);

        let mut parts = parts.into_iter();
        let metric = parts.next().unwrap_or_default();
        if metric.is_empty() {
            return Err(KeyParseError::EmptyMetric);
        }
        match (parts.next(), parts.next()) {
            (None, _) => Ok(SeriesKey::Scalar(metric)),
            (Some(_), None) => Err(KeyParseError::MissingEntitySeparator),
            (Some(agent), Some(session)) => {
                Ok(SeriesKey::entity(metric, EntityId { agent, session }))
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        if matches!(c, ESCAPE | METRIC_SEP | ENTITY_SEP) {
            write!(f, "{ESCAPE}")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}
