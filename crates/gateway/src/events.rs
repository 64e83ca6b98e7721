//! Domain event log - mirrors the event bus into the tracing output.

use delve_core::event::{DomainEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Subscribe to `bus` and log every event until the bus goes away.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event logger stopped");
    })
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::TaskStatusChanged {
            task_id,
            status,
            progress,
            ..
        } => info!(task_id = %task_id, status = %status, progress, "Task status changed"),
        DomainEvent::ToolExecuted {
            tool_name,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, duration_ms, "Tool executed"),
        DomainEvent::EngineResponded {
            iteration,
            duration_ms,
            response_chars,
            ..
        } => debug!(iteration, duration_ms, response_chars, "Engine responded"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => warn!(context = %context, error = %error_message, "Error occurred"),
    }
}
