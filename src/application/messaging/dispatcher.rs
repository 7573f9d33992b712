//! Event dispatcher - Broadcasts gateway events to any number of listeners

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::Context;
use super::events::{Event, EventKind};
use crate::application::errors::BotError;

/// Listener result
pub type ListenerResult = Result<(), BotError>;

/// Listener trait - something that reacts to gateway events
#[async_trait]
pub trait Listener: Send + Sync {
    /// Name used when reporting failures
    fn name(&self) -> &str;

    /// Event kinds this listener wants when added with `EventDispatcher::register`
    fn subscriptions(&self) -> Vec<EventKind>;

    async fn on_event(&self, ctx: &Context, event: &Event) -> ListenerResult;
}

/// Routes each event to every listener registered for its kind.
///
/// Listeners for ordinary events run concurrently, one task each, and
/// `dispatch` returns once all of them finish. A failed listener turns into
/// an `Event::Error`, whose listeners run one after another.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<EventKind, Vec<Arc<dyn Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for one event kind
    pub fn add_listener(&mut self, kind: EventKind, listener: Arc<dyn Listener>) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Add a listener for every kind it subscribes to
    pub fn register(&mut self, listener: Arc<dyn Listener>) {
        for kind in listener.subscriptions() {
            self.add_listener(kind, Arc::clone(&listener));
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event and wait for its listeners
    pub async fn dispatch(&self, ctx: &Context, event: Event) {
        let kind = event.kind();
        if kind == EventKind::Error {
            self.dispatch_error(ctx, &event).await;
            return;
        }

        let Some(listeners) = self.listeners.get(&kind) else {
            return;
        };

        let mut handles = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let name = listener.name().to_string();
            let listener = Arc::clone(listener);
            let ctx = ctx.clone();
            let event = event.clone();
            handles.push((
                name,
                tokio::spawn(async move { listener.on_event(&ctx, &event).await }),
            ));
        }

        for (name, handle) in handles {
            let failure = match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("task failed: {}", e)),
            };

            if let Some(message) = failure {
                let error = BotError::Listener { listener: name, message };
                let event = Event::Error { source: kind, error: error.to_string() };
                self.dispatch_error(ctx, &event).await;
            }
        }
    }

    async fn dispatch_error(&self, ctx: &Context, event: &Event) {
        let listeners = match self.listeners.get(&EventKind::Error) {
            Some(listeners) if !listeners.is_empty() => listeners,
            _ => {
                if let Event::Error { source, error } = event {
                    tracing::error!(target: "bot", "Unhandled error in \"{}\" handler: {}", source, error);
                }
                return;
            }
        };

        for listener in listeners {
            if let Err(e) = listener.on_event(ctx, event).await {
                tracing::error!(target: "bot", "Error listener {} failed: {}", listener.name(), e);
            }
        }
    }
}
