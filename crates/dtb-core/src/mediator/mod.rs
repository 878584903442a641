//! In-process command/notification bus.
//!
//! - A [`Command`] has exactly one handler and goes through the behavior
//!   pipeline: `Timing(Validation(extra behaviors..(Handler)))`.
//! - A [`Notification`] has zero or more handlers, invoked concurrently; every
//!   handler runs to completion and faults are collected afterwards.
//!
//! Handlers are registered once at startup on a [`MediatorBuilder`]; the built
//! [`Mediator`] is read-only and cheap to clone.

pub mod behaviors;

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{Error, HandlerFault, ValidationError},
    utils::{run_cancellable, short_type_name},
    Result,
};

pub use behaviors::{
    Erased, LogTimingObserver, Next, Outcome, PipelineBehavior, PipelineRequest, TimingBehavior,
    TimingObserver, TimingRecord, ValidationBehavior, Validators,
};

/// A request with exactly one handler.
pub trait Command: Send + Sync + 'static {
    type Output: Send + 'static;
}

/// An event with zero or more handlers.
pub trait Notification: Send + Sync + 'static {}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: &C, ctx: &Context<'_>) -> Result<C::Output>;
}

#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    async fn handle(&self, notification: &N, ctx: &Context<'_>) -> Result<()>;
}

/// Per-dispatch handle given to handlers: the mediator (for follow-up
/// commands) and the cancellation token of the originating event.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    mediator: &'a Mediator,
    cancel: &'a CancellationToken,
}

impl<'a> Context<'a> {
    pub fn new(mediator: &'a Mediator, cancel: &'a CancellationToken) -> Self {
        Self { mediator, cancel }
    }

    pub fn mediator(&self) -> &'a Mediator {
        self.mediator
    }

    pub fn cancel(&self) -> &'a CancellationToken {
        self.cancel
    }

    /// Send a follow-up command with the same cancellation token.
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output> {
        self.mediator.send(command, self.cancel).await
    }
}

struct CommandEntry {
    handler_name: &'static str,
    // Arc<dyn CommandHandler<C>>
    handler: Box<dyn Any + Send + Sync>,
}

struct NotificationEntry {
    handler_name: &'static str,
    // Arc<dyn NotificationHandler<N>>
    handler: Box<dyn Any + Send + Sync>,
}

struct Registry {
    commands: HashMap<TypeId, CommandEntry>,
    notifications: HashMap<TypeId, Vec<NotificationEntry>>,
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl Registry {
    fn command_handler<C: Command>(&self) -> Option<Arc<dyn CommandHandler<C>>> {
        self.commands
            .get(&TypeId::of::<C>())
            .and_then(|e| e.handler.downcast_ref::<Arc<dyn CommandHandler<C>>>())
            .cloned()
    }

    fn notification_handlers<N: Notification>(
        &self,
    ) -> Vec<(&'static str, Arc<dyn NotificationHandler<N>>)> {
        let Some(entries) = self.notifications.get(&TypeId::of::<N>()) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|e| {
                e.handler
                    .downcast_ref::<Arc<dyn NotificationHandler<N>>>()
                    .map(|h| (e.handler_name, h.clone()))
            })
            .collect()
    }
}

/// The command/notification bus.
#[derive(Clone)]
pub struct Mediator {
    inner: Arc<Registry>,
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::default()
    }

    /// Dispatch a command to its single handler through the behavior pipeline.
    pub async fn send<C: Command>(
        &self,
        command: C,
        cancel: &CancellationToken,
    ) -> Result<C::Output> {
        let handler = self.inner.command_handler::<C>();
        let ctx = Context::new(self, cancel);
        let command_ref = &command;

        let terminal = Next::new(move || {
            async move {
                let handler = handler.ok_or(Error::HandlerNotFound(type_name::<C>()))?;
                let out = run_cancellable(ctx.cancel(), handler.handle(command_ref, &ctx)).await?;
                Ok(Box::new(out) as Erased)
            }
            .boxed()
        });

        let request = PipelineRequest::new::<C>(command_ref, cancel);
        let out = self.dispatch(0, &request, terminal).await?;

        out.downcast::<C::Output>().map(|b| *b).map_err(|_| {
            Error::External(format!(
                "pipeline returned an unexpected output type for {}",
                type_name::<C>()
            ))
        })
    }

    /// Deliver a notification to every registered handler concurrently.
    ///
    /// Waits for all handlers. Errors and panics are collected into
    /// [`Error::Publish`]; one failing handler never prevents the others from
    /// running to completion.
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handlers = self.inner.notification_handlers::<N>();
        if handlers.is_empty() {
            tracing::debug!(
                notification = %short_type_name(type_name::<N>()),
                "no notification handlers registered"
            );
            return Ok(());
        }

        let notification = Arc::new(notification);
        let mut running = Vec::with_capacity(handlers.len());
        for (name, handler) in handlers {
            let mediator = self.clone();
            let cancel = cancel.clone();
            let notification = notification.clone();
            let task = tokio::spawn(async move {
                let ctx = Context::new(&mediator, &cancel);
                run_cancellable(&cancel, handler.handle(&notification, &ctx)).await
            });
            running.push((name, task));
        }

        let mut faults = Vec::new();
        for (name, task) in running {
            let error = match task.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_err) if join_err.is_panic() => {
                    Error::External(format!("notification handler panicked: {join_err}"))
                }
                Err(join_err) => {
                    Error::External(format!("notification handler aborted: {join_err}"))
                }
            };
            tracing::error!(
                notification = %short_type_name(type_name::<N>()),
                handler = %short_type_name(name),
                error = %error,
                "notification handler failed"
            );
            faults.push(HandlerFault {
                handler: name,
                error,
            });
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(Error::Publish(faults))
        }
    }

    fn dispatch<'a>(
        &'a self,
        index: usize,
        request: &'a PipelineRequest<'a>,
        terminal: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased>> {
        match self.inner.behaviors.get(index) {
            None => terminal.run().boxed(),
            Some(behavior) => {
                let next = Next::new(move || self.dispatch(index + 1, request, terminal));
                behavior.handle(request, next)
            }
        }
    }
}

/// Startup-time registry builder.
///
/// Cardinality rules are checked by [`MediatorBuilder::build`]: a command with
/// two handlers, or a required command with none, is a configuration error.
#[derive(Default)]
pub struct MediatorBuilder {
    commands: HashMap<TypeId, CommandEntry>,
    duplicates: Vec<&'static str>,
    required: Vec<(TypeId, &'static str)>,
    notifications: HashMap<TypeId, Vec<NotificationEntry>>,
    validators: Validators,
    observer: Option<Arc<dyn TimingObserver>>,
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl MediatorBuilder {
    /// Register the handler for command `C`.
    pub fn command<C, H>(mut self, handler: Arc<H>) -> Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C>> = handler;
        let entry = CommandEntry {
            handler_name: type_name::<H>(),
            handler: Box::new(handler),
        };
        if let Some(existing) = self.commands.get(&TypeId::of::<C>()) {
            tracing::error!(
                command = %short_type_name(type_name::<C>()),
                existing = %short_type_name(existing.handler_name),
                duplicate = %short_type_name(entry.handler_name),
                "duplicate command handler"
            );
            self.duplicates.push(type_name::<C>());
            return self;
        }
        self.commands.insert(TypeId::of::<C>(), entry);
        self
    }

    /// Add a handler for notification `N`. Any number may be registered.
    pub fn notification<N, H>(mut self, handler: Arc<H>) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let handler: Arc<dyn NotificationHandler<N>> = handler;
        self.notifications
            .entry(TypeId::of::<N>())
            .or_default()
            .push(NotificationEntry {
                handler_name: type_name::<H>(),
                handler: Box::new(handler),
            });
        self
    }

    /// Fail `build()` unless command `C` has a handler.
    pub fn require_command<C: Command>(mut self) -> Self {
        self.required.push((TypeId::of::<C>(), type_name::<C>()));
        self
    }

    /// Validate `C` with its `validator::Validate` impl before handling.
    pub fn validator<C>(mut self) -> Self
    where
        C: Command + validator::Validate,
    {
        self.validators.register::<C>();
        self
    }

    /// Validate `C` with a custom rule set before handling.
    pub fn validator_fn<C, F>(mut self, f: F) -> Self
    where
        C: Command,
        F: Fn(&C) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validators.register_fn::<C, F>(f);
        self
    }

    /// Replace the default (logging) timing observer.
    pub fn observer(mut self, observer: Arc<dyn TimingObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Add a behavior inside validation, closest to the handler.
    pub fn behavior(mut self, behavior: Arc<dyn PipelineBehavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn build(self) -> Result<Mediator> {
        if let Some(name) = self.duplicates.first() {
            return Err(Error::DuplicateHandler(name));
        }
        for (type_id, name) in &self.required {
            if !self.commands.contains_key(type_id) {
                return Err(Error::HandlerNotFound(name));
            }
        }

        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(LogTimingObserver) as Arc<dyn TimingObserver>);
        let mut behaviors: Vec<Arc<dyn PipelineBehavior>> = vec![
            Arc::new(TimingBehavior::new(observer)),
            Arc::new(ValidationBehavior::new(self.validators)),
        ];
        behaviors.extend(self.behaviors);

        Ok(Mediator {
            inner: Arc::new(Registry {
                commands: self.commands,
                notifications: self.notifications,
                behaviors,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationFailure;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Echo {
        text: String,
    }

    impl Command for Echo {
        type Output = String;
    }

    struct Ping;

    impl Command for Ping {
        type Output = ();
    }

    struct Happened {
        id: u32,
    }

    impl Notification for Happened {}

    #[derive(Default)]
    struct EchoHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler<Echo> for EchoHandler {
        async fn handle(&self, command: &Echo, _ctx: &Context<'_>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.text == "boom" {
                return Err(Error::External("boom".to_string()));
            }
            Ok(command.text.to_uppercase())
        }
    }

    struct OtherEchoHandler;

    #[async_trait]
    impl CommandHandler<Echo> for OtherEchoHandler {
        async fn handle(&self, _command: &Echo, _ctx: &Context<'_>) -> Result<String> {
            Ok(String::new())
        }
    }

    /// Forwards to `Echo` through the context.
    struct PingHandler;

    #[async_trait]
    impl CommandHandler<Ping> for PingHandler {
        async fn handle(&self, _command: &Ping, ctx: &Context<'_>) -> Result<()> {
            ctx.send(Echo {
                text: "nested".to_string(),
            })
            .await?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl NotificationHandler<Happened> for Recorder {
        async fn handle(&self, notification: &Happened, _ctx: &Context<'_>) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().unwrap().push(notification.id);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl NotificationHandler<Happened> for Failing {
        async fn handle(&self, _notification: &Happened, _ctx: &Context<'_>) -> Result<()> {
            Err(Error::External("handler k failed".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl NotificationHandler<Happened> for Panicking {
        async fn handle(&self, _notification: &Happened, _ctx: &Context<'_>) -> Result<()> {
            panic!("handler panicked");
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        records: Mutex<Vec<TimingRecord>>,
    }

    impl TimingObserver for CountingObserver {
        fn record(&self, record: &TimingRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn non_empty_echo(c: &Echo) -> std::result::Result<(), ValidationError> {
        if c.text.is_empty() {
            return Err(ValidationError {
                failures: vec![ValidationFailure {
                    field: "text".to_string(),
                    message: "must not be empty".to_string(),
                }],
            });
        }
        Ok(())
    }

    #[tokio::test]
    async fn send_routes_to_single_handler() {
        let handler = Arc::new(EchoHandler::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(handler.clone())
            .build()
            .unwrap();

        let out = mediator
            .send(
                Echo {
                    text: "hi".to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(out, "HI");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_without_handler_fails_with_handler_not_found() {
        let mediator = Mediator::builder().build().unwrap();
        let err = mediator
            .send(Ping, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HandlerNotFound(_)));
    }

    #[test]
    fn duplicate_command_handler_fails_build() {
        let res = Mediator::builder()
            .command::<Echo, _>(Arc::new(EchoHandler::default()))
            .command::<Echo, _>(Arc::new(OtherEchoHandler))
            .build();
        assert!(matches!(res, Err(Error::DuplicateHandler(_))));
    }

    #[test]
    fn missing_required_command_fails_build() {
        let res = Mediator::builder()
            .command::<Echo, _>(Arc::new(EchoHandler::default()))
            .require_command::<Echo>()
            .require_command::<Ping>()
            .build();
        assert!(matches!(res, Err(Error::HandlerNotFound(name)) if name.ends_with("Ping")));
    }

    #[tokio::test]
    async fn handlers_can_send_follow_up_commands() {
        let echo = Arc::new(EchoHandler::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(echo.clone())
            .command::<Ping, _>(Arc::new(PingHandler))
            .build()
            .unwrap();

        mediator.send(Ping, &CancellationToken::new()).await.unwrap();
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_command_never_reaches_handler() {
        let handler = Arc::new(EchoHandler::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(handler.clone())
            .validator_fn::<Echo, _>(non_empty_echo)
            .build()
            .unwrap();

        let err = mediator
            .send(
                Echo {
                    text: String::new(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        let Error::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.failures.len(), 1);
        assert_eq!(v.failures[0].field, "text");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_command_reaches_handler_exactly_once() {
        let handler = Arc::new(EchoHandler::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(handler.clone())
            .validator_fn::<Echo, _>(non_empty_echo)
            .build()
            .unwrap();

        mediator
            .send(
                Echo {
                    text: "ok".to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timing_fires_once_per_send_on_every_exit_path() {
        let observer = Arc::new(CountingObserver::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(Arc::new(EchoHandler::default()))
            .validator_fn::<Echo, _>(non_empty_echo)
            .observer(observer.clone())
            .build()
            .unwrap();
        let cancel = CancellationToken::new();

        let ok = mediator
            .send(
                Echo {
                    text: "a".to_string(),
                },
                &cancel,
            )
            .await;
        let invalid = mediator
            .send(
                Echo {
                    text: String::new(),
                },
                &cancel,
            )
            .await;
        let failed = mediator
            .send(
                Echo {
                    text: "boom".to_string(),
                },
                &cancel,
            )
            .await;
        assert!(ok.is_ok());
        assert!(matches!(invalid, Err(Error::Validation(_))));
        assert!(matches!(failed, Err(Error::External(_))));

        let records = observer.records.lock().unwrap();
        let outcomes = records.iter().map(|r| r.outcome).collect::<Vec<_>>();
        assert_eq!(
            outcomes,
            vec![Outcome::Success, Outcome::Failure, Outcome::Failure]
        );
        assert!(records.iter().all(|r| r.request.ends_with("Echo")));
    }

    #[tokio::test]
    async fn cancelled_send_is_reported_as_cancelled() {
        let observer = Arc::new(CountingObserver::default());
        let handler = Arc::new(EchoHandler::default());
        let mediator = Mediator::builder()
            .command::<Echo, _>(handler.clone())
            .observer(observer.clone())
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = mediator
            .send(
                Echo {
                    text: "a".to_string(),
                },
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        let records = observer.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn publish_runs_every_handler_and_keeps_the_fault() {
        let first = Arc::new(Recorder::default());
        let last = Arc::new(Recorder::default());
        let mediator = Mediator::builder()
            .notification::<Happened, _>(first.clone())
            .notification::<Happened, _>(Arc::new(Failing))
            .notification::<Happened, _>(last.clone())
            .build()
            .unwrap();

        let err = mediator
            .publish(Happened { id: 7 }, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(*first.seen.lock().unwrap(), vec![7]);
        assert_eq!(*last.seen.lock().unwrap(), vec![7]);
        let Error::Publish(faults) = err else {
            panic!("expected publish error, got {err:?}");
        };
        assert_eq!(faults.len(), 1);
        assert!(faults[0].handler.ends_with("Failing"));
        assert!(faults[0].error.to_string().contains("handler k failed"));
    }

    #[tokio::test]
    async fn publish_isolates_panicking_handler() {
        let recorder = Arc::new(Recorder::default());
        let mediator = Mediator::builder()
            .notification::<Happened, _>(Arc::new(Panicking))
            .notification::<Happened, _>(recorder.clone())
            .build()
            .unwrap();

        let err = mediator
            .publish(Happened { id: 1 }, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![1]);
        assert!(matches!(err, Error::Publish(ref f) if f.len() == 1));
    }

    #[tokio::test]
    async fn publish_without_handlers_is_a_no_op() {
        let mediator = Mediator::builder().build().unwrap();
        mediator
            .publish(Happened { id: 1 }, &CancellationToken::new())
            .await
            .unwrap();
    }
}
