use anyhow::Result;
use std::sync::Mutex;

use super::types::EventDescriptor;

/// Delivers event descriptors produced by accepted transitions.
///
/// Delivery is at-least-once and fire-and-forget from the engine's point of view.
pub trait EventPublisher {
    fn publish(&self, event: &EventDescriptor) -> Result<()>;
}

/// Emits every descriptor as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, event: &EventDescriptor) -> Result<()> {
        tracing::info!(
            topic = %event.topic(),
            assessment_id = %event.assessment_id,
            tenant_id = %event.tenant_id,
            old_status = %event.old_status,
            new_status = %event.new_status,
            actor = %event.actor_id,
            "event published"
        );
        Ok(())
    }
}

/// Keeps descriptors in memory so callers can inspect them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<EventDescriptor>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventDescriptor> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &EventDescriptor) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
