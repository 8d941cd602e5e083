//! In-process publish/subscribe for ledger and domain events.
//!
//! Generalizes the single-sink observer registration used elsewhere in
//! this workspace's policy-evaluation path into a multi-subscriber bus:
//! explicit registrations at construction time, no runtime instrumentation
//! of method tables. Delivery is synchronous from the publisher's point of
//! view; a handler that fails is logged and counted, never allowed to
//! abort the publisher or the other handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: u64,
    pub kind: String,
    pub tenant_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub struct NewDomainEvent {
    pub kind: String,
    pub tenant_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
}

/// A subscriber. Implementations must not panic; a panic would be caught
/// at the call site in debug builds only, so handlers are expected to
/// return `Err` for recoverable failures instead.
pub trait DomainEventHandler: Send + Sync {
    fn name(&self) -> &str;
    fn handle(&self, event: &DomainEvent) -> Result<(), String>;
}

#[derive(Debug, Clone, Default)]
pub struct DispatchFailure {
    pub handler: String,
    pub event_id: u64,
    pub error: String,
}

/// The bus. Registration happens once at processor-construction time;
/// `publish` is synchronous and ordered per `(tenant, entity)` because
/// callers are expected to invoke it from the same serialized path that
/// already orders posts for that entity (see `core-ledger`'s per-tenant
/// critical section).
#[derive(Default)]
pub struct InMemoryDomainEventBus {
    subscribers: Mutex<Vec<Arc<dyn DomainEventHandler>>>,
    next_event_id: AtomicU64,
    failures: Mutex<Vec<DispatchFailure>>,
}

impl InMemoryDomainEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Arc<dyn DomainEventHandler>) {
        let mut guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(handler);
    }

    pub fn publish(&self, event: NewDomainEvent) -> DomainEvent {
        let event_id = self.next_event_id.fetch_add(1, Ordering::SeqCst) + 1;
        let event = DomainEvent {
            event_id,
            kind: event.kind,
            tenant_id: event.tenant_id,
            entity_kind: event.entity_kind,
            entity_id: event.entity_id,
            timestamp: Utc::now(),
            payload: event.payload,
        };
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for handler in subscribers.iter() {
            if let Err(error) = handler.handle(&event) {
                tracing::warn!(
                    handler = handler.name(),
                    event_id,
                    kind = %event.kind,
                    error = %error,
                    "domain event handler failed"
                );
                let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
                failures.push(DispatchFailure {
                    handler: handler.name().to_string(),
                    event_id,
                    error,
                });
            }
        }
        event
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Test/reference subscriber that records every event it receives.
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Mutex<Vec<DomainEvent>>,
}

impl DomainEventHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording-handler"
    }

    fn handle(&self, event: &DomainEvent) -> Result<(), String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event.clone());
        Ok(())
    }
}

struct AlwaysFailsHandler;

impl DomainEventHandler for AlwaysFailsHandler {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn handle(&self, _event: &DomainEvent) -> Result<(), String> {
        Err("simulated failure".to_string())
    }
}
