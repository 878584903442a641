//! Pipeline behaviors wrapped around every command dispatch.
//!
//! Each behavior receives the request and a [`Next`] continuation for the rest
//! of the chain. The mediator installs them in a fixed order: timing outermost,
//! then validation, then any extra behaviors, then the handler.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{Error, ValidationError},
    mediator::Command,
    utils::short_type_name,
    Result,
};

/// Type-erased handler output travelling through the pipeline.
pub type Erased = Box<dyn Any + Send>;

type AnyRequest = dyn Any + Send + Sync;

/// The request as seen by behaviors.
pub struct PipelineRequest<'a> {
    pub name: &'static str,
    pub type_id: TypeId,
    pub request: &'a AnyRequest,
    pub cancel: &'a CancellationToken,
}

impl<'a> PipelineRequest<'a> {
    pub fn new<C: Command>(command: &'a C, cancel: &'a CancellationToken) -> Self {
        Self {
            name: type_name::<C>(),
            type_id: TypeId::of::<C>(),
            request: command,
            cancel,
        }
    }
}

/// The remaining pipeline after the current behavior.
pub struct Next<'a> {
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<Erased>> + Send + 'a>,
}

impl<'a> Next<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<Erased>> + Send + 'a,
    {
        Self { run: Box::new(f) }
    }

    pub async fn run(self) -> Result<Erased> {
        (self.run)().await
    }
}

#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    async fn handle(&self, request: &PipelineRequest<'_>, next: Next<'_>) -> Result<Erased>;
}

// ============== Timing ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Cancelled,
    /// The dispatch future was dropped before the inner stage finished.
    Abandoned,
}

#[derive(Clone, Debug)]
pub struct TimingRecord {
    pub request: &'static str,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

/// Receives exactly one record per `send`.
pub trait TimingObserver: Send + Sync {
    fn record(&self, record: &TimingRecord);
}

/// Default observer: one structured log event per command.
pub struct LogTimingObserver;

impl TimingObserver for LogTimingObserver {
    fn record(&self, record: &TimingRecord) {
        let request = short_type_name(record.request);
        let elapsed_ms = record.elapsed.as_secs_f64() * 1000.0;
        match record.outcome {
            Outcome::Success => tracing::info!(
                request = %request,
                elapsed_ms,
                outcome = ?record.outcome,
                "request handled"
            ),
            _ => tracing::warn!(
                request = %request,
                elapsed_ms,
                outcome = ?record.outcome,
                "request handled"
            ),
        }
    }
}

/// Reports on drop, so every exit path (including a dropped future) is covered.
struct ElapsedGuard<'a> {
    observer: &'a dyn TimingObserver,
    request: &'static str,
    started: Instant,
    outcome: Outcome,
}

impl Drop for ElapsedGuard<'_> {
    fn drop(&mut self) {
        self.observer.record(&TimingRecord {
            request: self.request,
            elapsed: self.started.elapsed(),
            outcome: self.outcome,
        });
    }
}

pub struct TimingBehavior {
    observer: Arc<dyn TimingObserver>,
}

impl TimingBehavior {
    pub fn new(observer: Arc<dyn TimingObserver>) -> Self {
        Self { observer }
    }
}

#[async_trait]
impl PipelineBehavior for TimingBehavior {
    async fn handle(&self, request: &PipelineRequest<'_>, next: Next<'_>) -> Result<Erased> {
        let mut guard = ElapsedGuard {
            observer: self.observer.as_ref(),
            request: request.name,
            started: Instant::now(),
            outcome: Outcome::Abandoned,
        };

        let out = next.run().await;
        guard.outcome = match &out {
            Ok(_) => Outcome::Success,
            Err(Error::Cancelled) => Outcome::Cancelled,
            Err(_) => Outcome::Failure,
        };
        out
    }
}

// ============== Validation ==============

type ValidatorFn =
    Arc<dyn Fn(&AnyRequest) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Validators keyed by request type. A type without validators is valid.
#[derive(Clone, Default)]
pub struct Validators {
    by_type: HashMap<TypeId, Vec<ValidatorFn>>,
}

impl Validators {
    pub fn register<C>(&mut self)
    where
        C: Command + validator::Validate,
    {
        self.register_fn::<C, _>(|c: &C| c.validate().map_err(ValidationError::from));
    }

    pub fn register_fn<C, F>(&mut self, f: F)
    where
        C: Command,
        F: Fn(&C) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        let erased: ValidatorFn = Arc::new(move |request: &AnyRequest| {
            match request.downcast_ref::<C>() {
                Some(c) => f(c),
                None => Ok(()),
            }
        });
        self.by_type
            .entry(TypeId::of::<C>())
            .or_default()
            .push(erased);
    }

    /// Run every validator for the request type, collecting all failures.
    pub fn validate(
        &self,
        request: &PipelineRequest<'_>,
    ) -> std::result::Result<(), ValidationError> {
        let Some(validators) = self.by_type.get(&request.type_id) else {
            return Ok(());
        };

        let mut all = ValidationError::default();
        for validate in validators {
            if let Err(e) = validate(request.request) {
                all.failures.extend(e.failures);
            }
        }

        if all.is_empty() {
            Ok(())
        } else {
            Err(all)
        }
    }
}

pub struct ValidationBehavior {
    validators: Validators,
}

impl ValidationBehavior {
    pub fn new(validators: Validators) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl PipelineBehavior for ValidationBehavior {
    async fn handle(&self, request: &PipelineRequest<'_>, next: Next<'_>) -> Result<Erased> {
        if let Err(e) = self.validators.validate(request) {
            tracing::warn!(
                request = %short_type_name(request.name),
                failures = %e,
                "request failed validation"
            );
            return Err(Error::Validation(e));
        }
        next.run().await
    }
}
