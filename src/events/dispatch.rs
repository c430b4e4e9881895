//! In-process delivery of events to reaction handlers.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{KeyValue, global};

use crate::error::{ApplicationError, Result};
use crate::events::{DomainEvent, Event, EventKind};
use crate::ports::EventPublisher;

/// Reacts to events by creating entities or cleaning up stale ones.
///
/// A handler declares which kinds it consumes and which kinds it may emit;
/// [`DispatcherBuilder::build`] uses these declarations to reject feedback
/// loops before any event is delivered.
#[async_trait]
pub trait ReactionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn subscribes(&self) -> &'static [EventKind];

    fn emits(&self) -> &'static [EventKind];

    /// Handle one event and return follow-up events.
    ///
    /// Must be idempotent: the same event may be delivered more than once.
    async fn handle(&self, event: &Event) -> Result<Vec<DomainEvent>>;
}

/// Invalid handler wiring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("event graph contains a cycle: {}", format_path(.path))]
    Cycle { path: Vec<EventKind> },
    #[error("handler `{0}` is registered twice")]
    DuplicateHandler(&'static str),
}

/// A handler emitted a kind it did not declare.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler `{handler}` emitted undeclared event `{kind}`")]
pub struct UndeclaredEmission {
    pub handler: &'static str,
    pub kind: EventKind,
}

fn format_path(path: &[EventKind]) -> String {
    path.iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// [`Dispatcher`] builder.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: Vec<Arc<dyn ReactionHandler>>,
}

impl DispatcherBuilder {
    /// Register a handler.
    pub fn handler(mut self, handler: impl ReactionHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Validate the event-type graph and build the [`Dispatcher`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if a handler name is registered twice or if following
    /// emitted kinds can lead back to an already visited kind.
    pub fn build(self) -> std::result::Result<Dispatcher, GraphError> {
        let mut names = BTreeSet::new();
        for handler in &self.handlers {
            if !names.insert(handler.name()) {
                return Err(GraphError::DuplicateHandler(handler.name()));
            }
        }

        let mut graph: BTreeMap<EventKind, BTreeSet<EventKind>> =
            BTreeMap::new();
        for handler in &self.handlers {
            for from in handler.subscribes() {
                graph
                    .entry(*from)
                    .or_default()
                    .extend(handler.emits().iter().copied());
            }
        }

        if let Some(path) = find_cycle(&graph) {
            return Err(GraphError::Cycle { path });
        }

        Ok(Dispatcher {
            handlers: self.handlers,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle(
    graph: &BTreeMap<EventKind, BTreeSet<EventKind>>,
) -> Option<Vec<EventKind>> {
    fn visit(
        node: EventKind,
        graph: &BTreeMap<EventKind, BTreeSet<EventKind>>,
        marks: &mut BTreeMap<EventKind, Mark>,
        stack: &mut Vec<EventKind>,
    ) -> Option<Vec<EventKind>> {
        match marks.get(&node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|k| *k == node)?;
                let mut path = stack[start..].to_vec();
                path.push(node);
                return Some(path);
            },
            None => {},
        }

        marks.insert(node, Mark::Visiting);
        stack.push(node);
        for next in graph.get(&node).into_iter().flatten() {
            if let Some(path) = visit(*next, graph, marks, stack) {
                return Some(path);
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    graph
        .keys()
        .find_map(|node| visit(*node, graph, &mut marks, &mut stack))
}

/// Delivers events to every subscribed handler, then delivers their
/// follow-ups, until no event is left.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Vec<Arc<dyn ReactionHandler>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Deliver `event` and every follow-up it causes.
    pub async fn dispatch(&self, event: Event) -> Result<()> {
        let tracer = global::tracer("tessera-dispatch");
        let mut otel_span = tracer.start("dispatch-event");
        otel_span.set_attribute(KeyValue::new("event.id", event.id.clone()));
        otel_span.set_attribute(KeyValue::new("event.kind", event.kind().as_str()));

        let mut queue = VecDeque::from([event]);
        let result = self.drain(&mut queue).await;

        otel_span.set_attribute(KeyValue::new("success", result.is_ok()));
        otel_span.end();
        result
    }

    async fn drain(&self, queue: &mut VecDeque<Event>) -> Result<()> {
        while let Some(event) = queue.pop_front() {
            let kind = event.kind();
            metrics::counter!("events_dispatched_total", "kind" => kind.as_str())
                .increment(1);
            tracing::debug!(id = %event.id, %kind, "dispatching event");

            for handler in self
                .handlers
                .iter()
                .filter(|h| h.subscribes().contains(&kind))
            {
                let follow_ups = handler.handle(&event).await?;

                for (index, payload) in follow_ups.into_iter().enumerate() {
                    if !handler.emits().contains(&payload.kind()) {
                        return Err(ApplicationError::internal(
                            UndeclaredEmission {
                                handler: handler.name(),
                                kind: payload.kind(),
                            },
                        ));
                    }
                    queue.push_back(event.follow_up(index, payload));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for Dispatcher {
    async fn publish(&self, event: Event) -> Result<()> {
        self.dispatch(event).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{NotificationId, UserId};

    struct Probe {
        name: &'static str,
        subscribes: &'static [EventKind],
        emits: &'static [EventKind],
        reply: Vec<DomainEvent>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ReactionHandler for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn subscribes(&self) -> &'static [EventKind] {
            self.subscribes
        }

        fn emits(&self) -> &'static [EventKind] {
            self.emits
        }

        async fn handle(&self, event: &Event) -> Result<Vec<DomainEvent>> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.kind()));
            Ok(self.reply.clone())
        }
    }

    fn probe(
        name: &'static str,
        subscribes: &'static [EventKind],
        emits: &'static [EventKind],
        reply: Vec<DomainEvent>,
        seen: &Arc<Mutex<Vec<String>>>,
    ) -> Probe {
        Probe {
            name,
            subscribes,
            emits,
            reply,
            seen: Arc::clone(seen),
        }
    }

    fn notification_created() -> DomainEvent {
        DomainEvent::NotificationCreated {
            notification: NotificationId(1),
            receiver: UserId(1),
        }
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let seen = Arc::default();
        let err = Dispatcher::builder()
            .handler(probe(
                "echo",
                &[EventKind::UserDeactivated],
                &[EventKind::UserDeactivated],
                vec![],
                &seen,
            ))
            .build()
            .err()
            .unwrap();

        assert_eq!(
            err,
            GraphError::Cycle {
                path: vec![EventKind::UserDeactivated, EventKind::UserDeactivated]
            }
        );
    }

    #[test]
    fn test_indirect_cycle_is_rejected() {
        let seen = Arc::default();
        let result = Dispatcher::builder()
            .handler(probe(
                "a",
                &[EventKind::ChatDeactivated],
                &[EventKind::NotificationCreated],
                vec![],
                &seen,
            ))
            .handler(probe(
                "b",
                &[EventKind::NotificationCreated],
                &[EventKind::ChatDeactivated],
                vec![],
                &seen,
            ))
            .build();

        assert!(matches!(result, Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_duplicate_handler_is_rejected() {
        let seen = Arc::default();
        let result = Dispatcher::builder()
            .handler(probe("a", &[], &[], vec![], &seen))
            .handler(probe("a", &[], &[], vec![], &seen))
            .build();

        assert!(matches!(result, Err(GraphError::DuplicateHandler("a"))));
    }

    #[tokio::test]
    async fn test_follow_ups_are_delivered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::builder()
            .handler(probe(
                "first",
                &[EventKind::UserDeactivated],
                &[EventKind::NotificationCreated],
                vec![notification_created()],
                &seen,
            ))
            .handler(probe(
                "second",
                &[EventKind::NotificationCreated],
                &[],
                vec![],
                &seen,
            ))
            .build()
            .unwrap();

        dispatcher
            .publish(Event::new(DomainEvent::UserDeactivated { user: UserId(1) }))
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "first:user.deactivated".to_string(),
                "second:notification.created".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_undeclared_emission_fails() {
        let seen = Arc::default();
        let dispatcher = Dispatcher::builder()
            .handler(probe(
                "sneaky",
                &[EventKind::ChatDeactivated],
                &[],
                vec![notification_created()],
                &seen,
            ))
            .build()
            .unwrap();

        let err = dispatcher
            .dispatch(Event::new(DomainEvent::ChatDeactivated {
                chat: crate::domain::ChatId(1),
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::Internal(_)));
    }
}
