//! The action applied to each resource instance.
//!
//! The engine never inspects what an action does. It only hands each
//! invocation an [`ActionContext`] carrying the cancellation signal for the
//! current wave, and treats any returned error as that instance's failure.

use std::{future::Future, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use convoy_types::{ActionKind, ResourceInstance};

/// Per-invocation context handed to a [`ResourceAction`].
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Action being applied.
    pub action: ActionKind,
    /// Service owning the instance.
    pub service: String,
    /// Per-action timeout enforced by the engine, when configured.
    pub timeout: Option<Duration>,
    cancellation: CancellationToken,
}

impl ActionContext {
    pub fn new(action: ActionKind, service: impl Into<String>, timeout: Option<Duration>, cancellation: CancellationToken) -> Self {
        Self {
            action,
            service: service.into(),
            timeout,
            cancellation,
        }
    }

    /// Whether a sibling failure (or the caller) has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    ///
    /// Actions that can abort early should `select!` on this; actions past
    /// their point of no return may ignore it and report their own outcome.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// The underlying token, for handing to nested tasks.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Applies the action to one resource instance.
#[async_trait]
pub trait ResourceAction: Send + Sync {
    async fn apply(&self, context: &ActionContext, resource: &ResourceInstance) -> Result<()>;
}

/// Adapts an async closure into a [`ResourceAction`].
///
/// The closure receives owned copies of the context and the instance so the
/// returned future can be `'static`.
pub struct FnAction<F> {
    handler: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(ActionContext, ResourceInstance) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut> ResourceAction for FnAction<F>
where
    F: Fn(ActionContext, ResourceInstance) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn apply(&self, context: &ActionContext, resource: &ResourceInstance) -> Result<()> {
        (self.handler)(context.clone(), resource.clone()).await
    }
}

/// An action that succeeds immediately. Useful for previews.
pub struct NoopAction;

#[async_trait]
impl ResourceAction for NoopAction {
    async fn apply(&self, _context: &ActionContext, _resource: &ResourceInstance) -> Result<()> {
        Ok(())
    }
}
