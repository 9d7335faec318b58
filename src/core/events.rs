//! Event log --- the append-only record of a simulation run
//!
//! The event log is the only interface between the simulation engine and the genealogy
//! reconstruction. Together with the founders present at time zero it holds everything
//! needed to replay the ancestry of every lineage.
//!

use std::fmt;

use super::lineage::LineageId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// `parent` infects a host of susceptibility `class` in its own population.
    Birth {
        parent: LineageId,
        child: LineageId,
        class: usize,
    },
    Death {
        lineage: LineageId,
    },
    Sampling {
        lineage: LineageId,
    },
    /// `parent` infects a host of susceptibility `class` in population `target`.
    Migration {
        parent: LineageId,
        child: LineageId,
        target: usize,
        class: usize,
    },
    SusceptibilityTransition {
        lineage: LineageId,
        class: usize,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Birth { .. } => "birth",
            EventKind::Death { .. } => "death",
            EventKind::Sampling { .. } => "sampling",
            EventKind::Migration { .. } => "migration",
            EventKind::SusceptibilityTransition { .. } => "transition",
        }
    }

    /// The lineage that triggers the event.
    pub fn source(&self) -> LineageId {
        match *self {
            EventKind::Birth { parent, .. } | EventKind::Migration { parent, .. } => parent,
            EventKind::Death { lineage }
            | EventKind::Sampling { lineage }
            | EventKind::SusceptibilityTransition { lineage, .. } => lineage,
        }
    }

    /// The lineage created by the event, if any.
    pub fn child(&self) -> Option<LineageId> {
        match *self {
            EventKind::Birth { child, .. } | EventKind::Migration { child, .. } => Some(child),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Birth {
                parent,
                child,
                class,
            } => write!(
                f,
                "Birth(time={},parent={parent},child={child},class={class})",
                self.time
            ),
            EventKind::Death { lineage } => {
                write!(f, "Death(time={},lineage={lineage})", self.time)
            }
            EventKind::Sampling { lineage } => {
                write!(f, "Sampling(time={},lineage={lineage})", self.time)
            }
            EventKind::Migration {
                parent,
                child,
                target,
                class,
            } => write!(
                f,
                "Migration(time={},parent={parent},child={child},target={target},class={class})",
                self.time
            ),
            EventKind::SusceptibilityTransition { lineage, class } => write!(
                f,
                "SusceptibilityTransition(time={},lineage={lineage},class={class})",
                self.time
            ),
        }
    }
}

/// A lineage infected at time zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Founder {
    pub lineage: LineageId,
    pub population: usize,
    pub class: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    founders: Vec<Founder>,
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(founders: Vec<Founder>) -> Self {
        Self {
            founders,
            events: Vec::new(),
        }
    }

    pub fn from_events(founders: Vec<Founder>, events: Vec<Event>) -> Self {
        Self { founders, events }
    }

    pub fn push(&mut self, event: Event) {
        debug_assert!(
            event.time >= self.last_time(),
            "event at {} appended after {}",
            event.time,
            self.last_time()
        );
        self.events.push(event);
    }

    pub fn founders(&self) -> &[Founder] {
        &self.founders
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_time(&self) -> f64 {
        self.events.last().map_or(0., |event| event.time)
    }

    /// Lineages terminated by a sampling event, in sampling order.
    pub fn sampled(&self) -> Vec<LineageId> {
        self.events
            .iter()
            .filter_map(|event| match event.kind {
                EventKind::Sampling { lineage } => Some(lineage),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .iter()
            .filter(|event| event.kind.name() == name)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> EventLog {
        let mut log = EventLog::new(vec![Founder {
            lineage: LineageId(0),
            population: 0,
            class: 0,
        }]);
        log.push(Event {
            time: 0.1,
            kind: EventKind::Birth {
                parent: LineageId(0),
                child: LineageId(1),
                class: 0,
            },
        });
        log.push(Event {
            time: 0.4,
            kind: EventKind::Sampling {
                lineage: LineageId(1),
            },
        });
        log.push(Event {
            time: 0.9,
            kind: EventKind::Death {
                lineage: LineageId(0),
            },
        });
        log
    }

    #[test]
    fn sampled_and_counts() {
        let log = log();
        assert_eq!(log.len(), 3);
        assert_eq!(log.sampled(), vec![LineageId(1)]);
        assert_eq!(log.count("birth"), 1);
        assert_eq!(log.count("migration"), 0);
        assert_eq!(log.last_time(), 0.9);
    }

    #[test]
    fn source_and_child() {
        let kind = EventKind::Migration {
            parent: LineageId(2),
            child: LineageId(5),
            target: 1,
            class: 0,
        };
        assert_eq!(kind.source(), LineageId(2));
        assert_eq!(kind.child(), Some(LineageId(5)));
        assert_eq!(kind.name(), "migration");
        assert_eq!(
            EventKind::Death {
                lineage: LineageId(3)
            }
            .child(),
            None
        );
    }

    #[test]
    fn display() {
        let event = log().events()[1];
        assert_eq!(event.to_string(), "Sampling(time=0.4,lineage=1)");
    }
}
