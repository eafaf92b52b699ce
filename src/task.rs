use std::future::Future;

use async_trait::async_trait;

use crate::BoxError;

/// A unit of work contributed to an async phase.
///
/// `id` must be unique within the phase. `run_after` names other tasks of the
/// same phase whose bodies must have completed before this one is entered.
#[async_trait]
pub trait Runnable<P: Send + 'static>: Send + Sync {
    fn id(&self) -> &str;

    fn run_after(&self) -> Vec<String> {
        Vec::new()
    }

    async fn run(&self, param: P) -> Result<(), BoxError>;
}

/// A unit of work contributed to a sync phase. The body must not block or
/// suspend; it runs inline on the caller's stack.
pub trait RunnableSync<P>: Send + Sync {
    fn id(&self) -> &str;

    fn run_after(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(&self, param: &P) -> Result<(), BoxError>;
}

/// Adapts an async closure into a [`Runnable`].
pub struct FnRunnable<F> {
    id: String,
    run_after: Vec<String>,
    body: F,
}

impl<F> FnRunnable<F> {
    pub fn new(id: impl Into<String>, run_after: Vec<String>, body: F) -> Self {
        Self {
            id: id.into(),
            run_after,
            body,
        }
    }
}

#[async_trait]
impl<P, F, Fut> Runnable<P> for FnRunnable<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn run_after(&self) -> Vec<String> {
        self.run_after.clone()
    }

    async fn run(&self, param: P) -> Result<(), BoxError> {
        (self.body)(param).await
    }
}

/// Adapts a plain closure into a [`RunnableSync`].
pub struct FnRunnableSync<F> {
    id: String,
    run_after: Vec<String>,
    body: F,
}

impl<F> FnRunnableSync<F> {
    pub fn new(id: impl Into<String>, run_after: Vec<String>, body: F) -> Self {
        Self {
            id: id.into(),
            run_after,
            body,
        }
    }
}

impl<P, F> RunnableSync<P> for FnRunnableSync<F>
where
    F: Fn(&P) -> Result<(), BoxError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn run_after(&self) -> Vec<String> {
        self.run_after.clone()
    }

    fn run(&self, param: &P) -> Result<(), BoxError> {
        (self.body)(param)
    }
}
