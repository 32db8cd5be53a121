//! Scheduled topology events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EventSpec;
use crate::error::{Result, SimError};
use crate::node::NodeId;

/// What an event does to its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Connect the node
    Add,
    /// Disconnect the node
    Remove,
}

impl EventAction {
    /// Get the action name as accepted in configuration
    pub fn name(&self) -> &'static str {
        match self {
            EventAction::Add => "add",
            EventAction::Remove => "remove",
        }
    }

    /// Resolve an action name; `event` names the event in the error
    pub fn resolve(event: &str, action: &str) -> Result<Self> {
        match action {
            "add" => Ok(EventAction::Add),
            "remove" => Ok(EventAction::Remove),
            _ => Err(SimError::UnknownEventAction {
                name: event.to_string(),
                action: action.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A topology change at a given timestep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, for logs
    pub name: String,
    /// Timestep at which the event fires (the first timestep is 1)
    pub time: u64,
    /// What happens
    pub action: EventAction,
    /// Node affected
    pub node: NodeId,
}

impl Event {
    /// Create an event
    pub fn new(name: impl Into<String>, time: u64, action: EventAction, node: NodeId) -> Self {
        Self {
            name: name.into(),
            time,
            action,
            node,
        }
    }

    /// Build from a configuration entry
    pub fn from_spec(spec: &EventSpec) -> Result<Self> {
        Ok(Self::new(
            spec.name.clone(),
            spec.time,
            EventAction::resolve(&spec.name, &spec.action)?,
            NodeId(spec.node),
        ))
    }
}

/// Events grouped by timestep, in insertion order within a timestep
#[derive(Debug, Clone, Default)]
pub struct EventSchedule {
    events: BTreeMap<u64, Vec<Event>>,
}

impl EventSchedule {
    /// Empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries
    pub fn from_specs(specs: &[EventSpec]) -> Result<Self> {
        let mut schedule = Self::new();
        for spec in specs {
            schedule.push(Event::from_spec(spec)?);
        }
        Ok(schedule)
    }

    /// Add an event
    pub fn push(&mut self, event: Event) {
        self.events.entry(event.time).or_default().push(event);
    }

    /// Builder form of [`EventSchedule::push`]
    pub fn with_event(mut self, event: Event) -> Self {
        self.push(event);
        self
    }

    /// Events firing at `time`
    pub fn at(&self, time: u64) -> &[Event] {
        self.events.get(&time).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All events, ordered by time
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values().flatten()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// Whether there are no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Fail with [`SimError::UnknownNode`] if an event names a node outside
    /// `0..node_count`
    pub(crate) fn check_nodes(&self, node_count: u32) -> Result<()> {
        match self.iter().find(|event| event.node.0 >= node_count) {
            Some(event) => Err(SimError::UnknownNode(event.node)),
            None => Ok(()),
        }
    }
}
