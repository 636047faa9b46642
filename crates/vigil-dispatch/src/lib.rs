//! Outbound side of the event engine.
//!
//! Committed events are handed to an [`ActionDispatcher`], which drives
//! notifications and escalations, and optionally appended to the problem
//! export files by [`export::ProblemExporter`].

pub mod error;
pub mod export;


use error::Result;
use vigil_common::types::{Event, EventFlags};

/// A problem closed in this cycle and the event that closed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecoveryPair {
    pub problem_eventid: u64,
    pub recovery_eventid: u64,
}

/// An acknowledgement waiting for its action operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub acknowledgeid: u64,
    pub eventid: u64,
    pub objectid: u64,
    pub userid: u64,
    pub clock: i64,
    pub message: String,
    pub action: i32,
}

/// Entry point of the action subsystem.
///
/// Implementations receive every committed batch once. Events flagged
/// no-action are part of the batch so that escalations can see them, but
/// must not start new operations.
pub trait ActionDispatcher: Send + Sync {
    /// Processes a committed cycle: the persisted events and the problems
    /// they closed, sorted by problem eventid.
    fn process_events(&self, events: &[Event], closed: &[RecoveryPair]) -> Result<()>;

    /// Runs acknowledgement operations and returns how many were handled.
    fn process_acknowledgements(&self, acknowledgements: &[Acknowledgement]) -> Result<usize>;
}

/// Dispatcher that only records what would be escalated in the log.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

impl ActionDispatcher for LoggingDispatcher {
    fn process_events(&self, events: &[Event], closed: &[RecoveryPair]) -> Result<()> {
        for event in events {
            if !event.flags.contains(EventFlags::CREATE) || event.flags.contains(EventFlags::NO_ACTION) {
                continue;
            }
            tracing::info!(
                eventid = event.eventid,
                source = ?event.source(),
                objectid = event.objectid,
                value = event.value,
                name = %event.name,
                "Event ready for actions"
            );
        }
        for pair in closed {
            tracing::info!(
                problem_eventid = pair.problem_eventid,
                recovery_eventid = pair.recovery_eventid,
                "Problem closed"
            );
        }
        Ok(())
    }

    fn process_acknowledgements(&self, acknowledgements: &[Acknowledgement]) -> Result<usize> {
        for ack in acknowledgements {
            tracing::info!(
                acknowledgeid = ack.acknowledgeid,
                eventid = ack.eventid,
                userid = ack.userid,
                "Acknowledgement ready for actions"
            );
        }
        Ok(acknowledgements.len())
    }
}
