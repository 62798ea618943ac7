// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use errmap_stack::StackOptions;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Either, LocalBoxFuture};
use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Message every [`ThrownError`] carries.
pub const THROWN_ERROR_MESSAGE: &str = "thrown error";

/// Frames of the adapter and the executors driving it.
const ADAPTER_FRAMES: &[&str] = &[
    "errmap_trycatch::",
    "futures_util::",
    "futures_executor::",
    "tokio::runtime::",
];

// ---------------------------------------------------------------------------
// ThrownError
// ---------------------------------------------------------------------------

/// What a task failed with.
#[derive(Debug)]
pub enum Thrown<E> {
    /// The task returned `Err`.
    Error(E),
    /// The task panicked.
    Panic(PanicPayload),
}

impl<E: fmt::Display> fmt::Display for Thrown<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panic(p) => write!(f, "panicked: {p}"),
        }
    }
}

/// The value a task panicked with, kept unchanged.
///
/// Values passed to `panic!` with a format string are `String`s; anything
/// handed to [`std::panic::panic_any`] is reachable through
/// [`with_payload`](Self::with_payload) or [`into_payload`](Self::into_payload).
pub struct PanicPayload {
    message: String,
    payload: Mutex<Box<dyn Any + Send>>,
}

impl PanicPayload {
    /// Wrap a payload as returned by `catch_unwind`.
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else {
            "unknown panic".to_string()
        };
        Self {
            message,
            payload: Mutex::new(payload),
        }
    }

    /// The panic message, or `"unknown panic"` when the payload is not a
    /// string.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the payload is a `P`.
    pub fn is<P: Any>(&self) -> bool {
        self.with_payload(|p| p.is::<P>())
    }

    /// Run `f` on the payload.
    pub fn with_payload<R>(&self, f: impl FnOnce(&(dyn Any + Send)) -> R) -> R {
        let guard = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
        f(&**guard)
    }

    /// Take the payload, to downcast it or to resume unwinding with
    /// [`std::panic::resume_unwind`].
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message).finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Failure captured by the adapter.
///
/// The message is always [`THROWN_ERROR_MESSAGE`]; the original failure is
/// only reachable through [`cause`](Self::cause) and is never reclassified.
pub struct ThrownError<E> {
    cause: Thrown<E>,
    stack: String,
}

impl<E> ThrownError<E> {
    /// Wrap `cause`, capturing a trace of where it was caught.
    pub fn new(cause: Thrown<E>) -> Self {
        Self::with_options(cause, &StackOptions::default())
    }

    /// Like [`new`](Self::new), capturing the trace per `options`.
    pub fn with_options(cause: Thrown<E>, options: &StackOptions) -> Self {
        let stack = errmap_stack::render_skipping(THROWN_ERROR_MESSAGE, options, ADAPTER_FRAMES);
        Self { cause, stack }
    }

    /// Always [`THROWN_ERROR_MESSAGE`].
    pub fn message(&self) -> &'static str {
        THROWN_ERROR_MESSAGE
    }

    /// The original failure.
    pub fn cause(&self) -> &Thrown<E> {
        &self.cause
    }

    /// Take the original failure.
    pub fn into_cause(self) -> Thrown<E> {
        self.cause
    }

    /// The `Err` value, unless the task panicked.
    pub fn error(&self) -> Option<&E> {
        match &self.cause {
            Thrown::Error(e) => Some(e),
            Thrown::Panic(_) => None,
        }
    }

    /// The panic payload, if the task panicked.
    pub fn panic(&self) -> Option<&PanicPayload> {
        match &self.cause {
            Thrown::Error(_) => None,
            Thrown::Panic(p) => Some(p),
        }
    }

    /// The panic message, if the task panicked.
    pub fn panic_message(&self) -> Option<&str> {
        self.panic().map(PanicPayload::message)
    }

    /// Whether the task panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, Thrown::Panic(_))
    }

    /// Cleaned trace captured when the failure was caught.
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

impl<E: fmt::Debug> fmt::Debug for ThrownError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrownError")
            .field("message", &THROWN_ERROR_MESSAGE)
            .field("cause", &self.cause)
            .finish()
    }
}

impl<E> fmt::Display for ThrownError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(THROWN_ERROR_MESSAGE)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrownError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Thrown::Error(e) => Some(e),
            Thrown::Panic(_) => None,
        }
    }
}

fn caught<E>(cause: Thrown<E>, options: &StackOptions) -> ThrownError<E> {
    match &cause {
        Thrown::Error(_) => debug!(target: "errmap.trycatch", "task failed"),
        Thrown::Panic(p) => warn!(target: "errmap.trycatch", panic = %p, "task panicked"),
    }
    ThrownError::with_options(cause, options)
}

fn classify<T, E>(
    res: std::thread::Result<Result<T, E>>,
    options: &StackOptions,
) -> Outcome<T, E> {
    match res {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(caught(Thrown::Error(e), options)),
        Err(payload) => Err(caught(Thrown::Panic(PanicPayload::new(payload)), options)),
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Settled result of a task.
pub type Outcome<T, E> = Result<T, ThrownError<E>>;

/// Conversion to the `(failure, value)` result tuple; exactly one slot is
/// `Some`.
pub trait IntoPair<T, E> {
    /// Split into `(failure, value)`.
    fn into_pair(self) -> (Option<ThrownError<E>>, Option<T>);
}

impl<T, E> IntoPair<T, E> for Outcome<T, E> {
    fn into_pair(self) -> (Option<ThrownError<E>>, Option<T>) {
        match self {
            Ok(v) => (None, Some(v)),
            Err(e) => (Some(e), None),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work in one of three shapes.
///
/// The async shapes are boxed as `Send` futures so the resulting
/// [`Deferred`] can be spawned on a multi-threaded runtime. A future that is
/// not `Send` goes through [`trycatch_local`] instead.
pub enum Task<'a, T, E> {
    /// A call returning a plain result.
    Call(Box<dyn FnOnce() -> Result<T, E> + 'a>),
    /// A call returning a future.
    CallAsync(Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + 'a>),
    /// A future.
    Future(BoxFuture<'a, Result<T, E>>),
}

impl<'a, T: 'a, E: 'a> Task<'a, T, E> {
    /// Wrap a call returning a plain result.
    pub fn call<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
    {
        Self::Call(Box::new(f))
    }

    /// Wrap a call returning a future.
    pub fn call_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self::CallAsync(Box::new(move || f().boxed()))
    }

    /// Wrap a future.
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self::Future(fut.boxed())
    }
}

impl<T, E> fmt::Debug for Task<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::Call(_) => "Call",
            Self::CallAsync(_) => "CallAsync",
            Self::Future(_) => "Future",
        };
        f.debug_tuple("Task").field(&shape).finish()
    }
}

// ---------------------------------------------------------------------------
// TryCatch
// ---------------------------------------------------------------------------

/// Result of [`trycatch`]: settled now, or settling later.
///
/// Awaiting a `TryCatch` works for both branches.
#[must_use]
pub enum TryCatch<'a, T, E> {
    /// The task settled synchronously.
    Ready(Outcome<T, E>),
    /// The task produced a future; awaiting it yields the outcome.
    Pending(Deferred<'a, T, E>),
}

impl<'a, T, E> TryCatch<'a, T, E> {
    /// The outcome if the task settled synchronously.
    pub fn ready(self) -> Option<Outcome<T, E>> {
        match self {
            Self::Ready(o) => Some(o),
            Self::Pending(_) => None,
        }
    }

    /// Whether the task settled synchronously.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Whether awaiting is required to settle.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<'a, T, E> IntoFuture for TryCatch<'a, T, E> {
    type Output = Outcome<T, E>;
    type IntoFuture = Either<future::Ready<Outcome<T, E>>, Deferred<'a, T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(o) => Either::Left(future::ready(o)),
            Self::Pending(d) => Either::Right(d),
        }
    }
}

impl<T, E> fmt::Debug for TryCatch<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(Ok(_)) => f.write_str("TryCatch::Ready(Ok(..))"),
            Self::Ready(Err(_)) => f.write_str("TryCatch::Ready(Err(..))"),
            Self::Pending(_) => f.write_str("TryCatch::Pending"),
        }
    }
}

/// A future settling to an [`Outcome`]; never fails itself.
#[must_use = "futures do nothing unless polled"]
pub struct Deferred<'a, T, E> {
    inner: BoxFuture<'a, Outcome<T, E>>,
}

impl<T, E> Future for Deferred<'_, T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

/// [`Deferred`] for a future that is not `Send`; see [`trycatch_local`].
#[must_use = "futures do nothing unless polled"]
pub struct LocalDeferred<'a, T, E> {
    inner: LocalBoxFuture<'a, Outcome<T, E>>,
}

impl<T, E> Future for LocalDeferred<'_, T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

fn settle<'a, T: 'a, E: 'a>(
    fut: BoxFuture<'a, Result<T, E>>,
    options: StackOptions,
) -> Deferred<'a, T, E> {
    let inner = AssertUnwindSafe(fut)
        .catch_unwind()
        .map(move |res| classify(res, &options))
        .boxed();
    Deferred { inner }
}

fn run_sync<T, E>(f: impl FnOnce() -> Result<T, E>, options: &StackOptions) -> Outcome<T, E> {
    classify(catch_unwind(AssertUnwindSafe(f)), options)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run `task`, capturing an `Err` return or a panic instead of propagating it.
///
/// - [`Task::Call`] settles synchronously: [`TryCatch::Ready`].
/// - [`Task::CallAsync`] invokes the call synchronously; if the call itself
///   panics the result is `Ready`, otherwise its future is wrapped:
///   [`TryCatch::Pending`].
/// - [`Task::Future`] is wrapped: `Pending`.
///
/// Nothing imposes a timeout: a future that never settles leaves the
/// `Pending` branch pending. Traces are captured with the default
/// [`StackOptions`]; see [`trycatch_with`].
pub fn trycatch<'a, T: 'a, E: 'a>(task: Task<'a, T, E>) -> TryCatch<'a, T, E> {
    trycatch_with(&StackOptions::default(), task)
}

/// [`trycatch`] with the trace options used for every [`ThrownError`] it
/// builds. `CaptureMode::Off` skips backtrace capture entirely.
pub fn trycatch_with<'a, T: 'a, E: 'a>(
    options: &StackOptions,
    task: Task<'a, T, E>,
) -> TryCatch<'a, T, E> {
    match task {
        Task::Call(f) => TryCatch::Ready(run_sync(f, options)),
        Task::CallAsync(f) => match catch_unwind(AssertUnwindSafe(f)) {
            Ok(fut) => TryCatch::Pending(settle(fut, options.clone())),
            Err(payload) => TryCatch::Ready(classify(Err(payload), options)),
        },
        Task::Future(fut) => TryCatch::Pending(settle(fut, options.clone())),
    }
}

/// [`trycatch`] for a plain call, without boxing.
pub fn trycatch_sync<T, E>(f: impl FnOnce() -> Result<T, E>) -> Outcome<T, E> {
    run_sync(f, &StackOptions::default())
}

/// [`trycatch_sync`] with explicit trace options.
pub fn trycatch_sync_with<T, E>(
    options: &StackOptions,
    f: impl FnOnce() -> Result<T, E>,
) -> Outcome<T, E> {
    run_sync(f, options)
}

/// [`trycatch`] for a call returning a future.
pub fn trycatch_async<'a, T, E, F, Fut>(f: F) -> TryCatch<'a, T, E>
where
    T: 'a,
    E: 'a,
    F: FnOnce() -> Fut + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    trycatch(Task::call_async(f))
}

/// [`trycatch`] for a future.
pub fn trycatch_future<'a, T, E, Fut>(fut: Fut) -> Deferred<'a, T, E>
where
    T: 'a,
    E: 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    settle(fut.boxed(), StackOptions::default())
}

/// [`trycatch_future`] for a future that is not `Send`, such as one holding
/// an `Rc` across an `.await`. The result must be driven on the current
/// thread, e.g. by a `LocalSet` or `futures::executor::block_on`.
pub fn trycatch_local<'a, T, E, Fut>(fut: Fut) -> LocalDeferred<'a, T, E>
where
    T: 'a,
    E: 'a,
    Fut: Future<Output = Result<T, E>> + 'a,
{
    let options = StackOptions::default();
    let inner = AssertUnwindSafe(fut)
        .catch_unwind()
        .map(move |res| classify(res, &options))
        .boxed_local();
    LocalDeferred { inner }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use errmap_stack::CaptureMode;
    use std::io;
    use std::rc::Rc;

    #[derive(Debug, PartialEq)]
    struct Payload(u32);

    #[test]
    fn plain_value_is_ok() {
        let (err, value) = trycatch_sync(|| Ok::<_, io::Error>(42)).into_pair();
        assert!(err.is_none());
        assert_eq!(value, Some(42));
    }

    #[test]
    fn err_return_is_wrapped() {
        let outcome = trycatch(Task::call(|| Err::<i32, _>(io::Error::other("x"))))
            .ready()
            .unwrap();
        let (err, value) = outcome.into_pair();
        assert!(value.is_none());
        let err = err.unwrap();
        assert_eq!(err.message(), "thrown error");
        assert_eq!(err.to_string(), "thrown error");
        assert_eq!(err.error().unwrap().to_string(), "x");
        assert!(!err.is_panic());
        assert!(err.panic().is_none());
        assert!(err.stack().starts_with("thrown error"));
    }

    #[test]
    fn source_is_the_original_error() {
        use std::error::Error as _;
        let err = trycatch_sync(|| Err::<(), _>(io::Error::other("inner"))).unwrap_err();
        assert_eq!(err.source().unwrap().to_string(), "inner");
    }

    #[test]
    fn panic_is_captured() {
        let err = trycatch_sync(|| -> Result<i32, String> { panic!("kaboom") }).unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.panic_message(), Some("kaboom"));
        assert!(err.panic().unwrap().is::<&'static str>());
        assert!(err.error().is_none());
    }

    #[test]
    fn formatted_panic_message_is_kept() {
        let n = 3;
        let err = trycatch_sync(|| -> Result<(), ()> { panic!("bad {n}") }).unwrap_err();
        let Thrown::Panic(p) = err.into_cause() else {
            panic!("expected a panic cause");
        };
        assert_eq!(p.message(), "bad 3");
        assert_eq!(*p.into_payload().downcast::<String>().unwrap(), "bad 3");
    }

    #[test]
    fn structured_panic_payload_survives() {
        let err = trycatch_sync(|| -> Result<(), ()> { std::panic::panic_any(Payload(7)) })
            .unwrap_err();
        assert_eq!(err.panic_message(), Some("unknown panic"));
        match err.cause() {
            Thrown::Panic(p) => {
                assert!(p.is::<Payload>());
                let code = p.with_payload(|any| any.downcast_ref::<Payload>().map(|p| p.0));
                assert_eq!(code, Some(7));
            }
            Thrown::Error(()) => panic!("expected a panic cause"),
        }
        let Thrown::Panic(p) = err.into_cause() else {
            panic!("expected a panic cause");
        };
        assert_eq!(*p.into_payload().downcast::<Payload>().unwrap(), Payload(7));
    }

    #[test]
    fn call_async_panicking_before_future_is_ready() {
        let tc = trycatch(Task::<i32, ()>::call_async(|| -> future::Ready<Result<i32, ()>> {
            panic!("early")
        }));
        assert!(tc.is_ready());
        let err = tc.ready().unwrap().unwrap_err();
        assert_eq!(err.panic_message(), Some("early"));
    }

    #[test]
    fn futures_are_pending() {
        let tc = trycatch(Task::future(async { Ok::<_, ()>(1) }));
        assert!(tc.is_pending());
        assert!(tc.ready().is_none());
    }

    #[test]
    fn deferred_settles_on_any_executor() {
        let outcome = futures::executor::block_on(trycatch_future(async { Err::<(), _>("boom") }));
        assert!(matches!(outcome.unwrap_err().into_cause(), Thrown::Error("boom")));
    }

    #[test]
    fn capture_off_keeps_header_only() {
        let off = StackOptions::default().with_capture(CaptureMode::Off);
        let err = trycatch_sync_with(&off, || Err::<(), _>("nope")).unwrap_err();
        assert_eq!(err.stack(), "thrown error");

        let tc = trycatch_with(&off, Task::call(|| Err::<(), _>("nope")));
        assert_eq!(tc.ready().unwrap().unwrap_err().stack(), "thrown error");

        let tc = trycatch_with(&off, Task::future(async { Err::<(), _>("later") }));
        let err = futures::executor::block_on(tc.into_future()).unwrap_err();
        assert_eq!(err.stack(), "thrown error");
        assert_eq!(err.error(), Some(&"later"));
    }

    #[test]
    fn local_futures_are_wrapped() {
        let shared = Rc::new(5);
        let held = Rc::clone(&shared);
        let outcome = futures::executor::block_on(trycatch_local(async move {
            future::ready(()).await;
            Ok::<_, ()>(*held + 1)
        }));
        assert_eq!(outcome.unwrap(), 6);

        let held = Rc::clone(&shared);
        let outcome = futures::executor::block_on(trycatch_local(async move {
            future::ready(()).await;
            if *held == 5 {
                panic!("local");
            }
            Ok::<(), ()>(())
        }));
        assert_eq!(outcome.unwrap_err().panic_message(), Some("local"));
    }

    #[test]
    fn thrown_display() {
        assert_eq!(Thrown::<&str>::Error("x").to_string(), "x");
        let p = PanicPayload::new(Box::new("p"));
        assert_eq!(Thrown::<&str>::Panic(p).to_string(), "panicked: p");
    }

    #[test]
    fn debug_impls() {
        let err = trycatch_sync(|| Err::<(), _>("nope")).unwrap_err();
        assert!(format!("{err:?}").contains("nope"));
        let p = PanicPayload::new(Box::new(Payload(1)));
        assert_eq!(format!("{p:?}"), r#"PanicPayload("unknown panic")"#);
        let task = Task::<(), ()>::call(|| Ok(()));
        assert_eq!(format!("{task:?}"), r#"Task("Call")"#);
    }
}
