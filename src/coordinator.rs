//! Message coordinator (component I): the single in-page dispatcher that
//! arbitrates registration and routing of request handlers across the
//! several self-contained script layers (orchestrator, smart selector,
//! table detector) loaded into one page.
//!
//! Registrations received before the coordinator is initialized are
//! queued rather than dropped, and drained once `initialize()` runs
//! (§4.I). The registry key is `messageType@frameId@source`; lookup
//! prefers the current-frame handler, falls back to any-frame, then to a
//! direct legacy key.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

pub type Handler = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

struct Registration {
    message_type: String,
    handler: Handler,
    priority: i32,
}

/// A registration submitted before `initialize()` ran.
struct QueuedRegistration {
    message_type: String,
    handler: Handler,
    source: String,
    priority: i32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl DispatchResponse {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            error: None,
            payload: Some(payload),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            payload: None,
        }
    }
}

/// Frame-aware handler registry with single-dispatch message routing.
/// On first construction a unique frame id is generated and exactly one
/// listener is conceptually installed (the in-page host wires `dispatch`
/// to its actual message event once; this type has no opinion on how
/// messages arrive).
pub struct MessageCoordinator {
    frame_id: String,
    initialized: AtomicBool,
    registry: HashMap<String, Registration>,
    queue: Vec<QueuedRegistration>,
}

impl MessageCoordinator {
    pub fn new() -> Self {
        Self {
            frame_id: Uuid::new_v4().to_string(),
            initialized: AtomicBool::new(false),
            registry: HashMap::new(),
            queue: Vec::new(),
        }
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register a handler for `message_type`. Before `initialize()` has
    /// run, the registration is queued rather than applied immediately.
    pub fn register(
        &mut self,
        message_type: impl Into<String>,
        source: impl Into<String>,
        priority: i32,
        handler: Handler,
    ) {
        let message_type = message_type.into();
        let source = source.into();
        if self.is_initialized() {
            self.insert(message_type, source, priority, handler);
        } else {
            self.queue.push(QueuedRegistration {
                message_type,
                handler,
                source,
                priority,
            });
        }
    }

    fn insert(&mut self, message_type: String, source: String, priority: i32, handler: Handler) {
        let key = registry_key(&message_type, &self.frame_id, &source);
        self.registry.insert(
            key,
            Registration {
                message_type,
                handler,
                priority,
            },
        );
    }

    /// Marks the coordinator ready and drains any registrations queued
    /// before this call, highest priority first (lowest numeric value).
    pub fn initialize(&mut self) {
        self.initialized.store(true, Ordering::SeqCst);
        let mut queued = std::mem::take(&mut self.queue);
        queued.sort_by_key(|q| q.priority);
        for q in queued {
            self.insert(q.message_type, q.source, q.priority, q.handler);
        }
    }

    /// Dispatch an incoming message of `message_type`, from `source`, in
    /// the current frame. Lookup prefers the current-frame/source key,
    /// falls back to any registration sharing the message type from
    /// another frame, then to a direct legacy key (`message_type` alone).
    /// Handlers that throw surface `{success: false, error}` rather than
    /// propagating (§4.I, §7 "Coordinator fault").
    pub fn dispatch(&self, message_type: &str, source: &str, message: &Value) -> DispatchResponse {
        let preferred = registry_key(message_type, &self.frame_id, source);
        let handler = self
            .registry
            .get(&preferred)
            .or_else(|| self.any_frame_handler(message_type))
            .or_else(|| self.registry.get(message_type));

        let Some(registration) = handler else {
            return DispatchResponse::failure(Error::no_handler(message_type).to_string());
        };

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (registration.handler)(message)
        })) {
            Ok(Ok(payload)) => DispatchResponse::ok(payload),
            Ok(Err(err)) => DispatchResponse::failure(err.to_string()),
            Err(_) => DispatchResponse::failure(format!("handler for '{message_type}' panicked")),
        }
    }

    fn any_frame_handler(&self, message_type: &str) -> Option<&Registration> {
        self.registry
            .values()
            .filter(|r| r.message_type == message_type)
            .max_by_key(|r| -r.priority)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.registry.values().map(|r| r.message_type.as_str()).collect()
    }

    pub fn pending_queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for MessageCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn registry_key(message_type: &str, frame_id: &str, source: &str) -> String {
    format!("{message_type}@{frame_id}@{source}")
}

/// Idempotent response guard: callers wrap `respond` closures with this so
/// a handler that calls it twice only has its first call take effect.
pub struct RespondOnce {
    responded: AtomicBool,
}

impl RespondOnce {
    pub fn new() -> Self {
        Self {
            responded: AtomicBool::new(false),
        }
    }

    /// Returns `true` the first time it's called, `false` on any
    /// subsequent call — guards a handler's `respond` against double
    /// invocation.
    pub fn try_respond(&self) -> bool {
        self.responded
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for RespondOnce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registrations_before_init_are_queued_not_dropped() {
        let mut coordinator = MessageCoordinator::new();
        coordinator.register("ping", "orchestrator", 0, Box::new(|_| Ok(json!({"ready": true}))));
        assert_eq!(coordinator.pending_queue_len(), 1);
        assert!(coordinator.registered_types().is_empty());

        coordinator.initialize();
        assert_eq!(coordinator.pending_queue_len(), 0);
        assert_eq!(coordinator.registered_types(), vec!["ping"]);
    }

    #[test]
    fn dispatch_routes_to_current_frame_handler() {
        let mut coordinator = MessageCoordinator::new();
        coordinator.initialize();
        coordinator.register(
            "getPageStatus",
            "orchestrator",
            0,
            Box::new(|_| Ok(json!({"imageCount": 3}))),
        );

        let response = coordinator.dispatch("getPageStatus", "orchestrator", &json!({}));
        assert!(response.success);
        assert_eq!(response.payload.unwrap()["imageCount"], 3);
    }

    #[test]
    fn unhandled_message_type_responds_with_no_handler_error() {
        let mut coordinator = MessageCoordinator::new();
        coordinator.initialize();
        let response = coordinator.dispatch("unknown_type", "orchestrator", &json!({}));
        assert!(!response.success);
        assert_eq!(response.error.unwrap(), "no handler for unknown_type");
    }

    #[test]
    fn handler_error_surfaces_without_crashing_dispatcher() {
        let mut coordinator = MessageCoordinator::new();
        coordinator.initialize();
        coordinator.register(
            "quickScan",
            "orchestrator",
            0,
            Box::new(|_| Err(Error::Internal("scan failed".to_string()))),
        );
        let response = coordinator.dispatch("quickScan", "orchestrator", &json!({}));
        assert!(!response.success);
        assert!(response.error.unwrap().contains("scan failed"));
    }

    #[test]
    fn respond_once_guards_against_double_response() {
        let guard = RespondOnce::new();
        assert!(guard.try_respond());
        assert!(!guard.try_respond());
    }

    #[test]
    fn any_frame_fallback_used_when_current_frame_has_no_handler() {
        let mut coordinator = MessageCoordinator::new();
        coordinator.initialize();
        // Simulate a handler registered under a different frame id by
        // inserting directly at the any-frame fallback key shape.
        coordinator.registry.insert(
            "ping@other-frame@orchestrator".to_string(),
            Registration {
                message_type: "ping".to_string(),
                handler: Box::new(|_| Ok(json!({"ready": true}))),
                priority: 0,
            },
        );
        let response = coordinator.dispatch("ping", "orchestrator", &json!({}));
        assert!(response.success);
    }
}
