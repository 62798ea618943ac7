// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tests for the three task shapes of `errmap_trycatch`.

use errmap_stack::{CaptureMode, StackOptions};
use errmap_trycatch::{
    IntoPair, Outcome, Task, Thrown, ThrownError, TryCatch, trycatch, trycatch_async,
    trycatch_future, trycatch_local, trycatch_sync, trycatch_with,
};
use std::io;
use std::rc::Rc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn fetch(ok: bool) -> Result<u32, String> {
    tokio::time::sleep(Duration::from_millis(1)).await;
    if ok { Ok(42) } else { Err("y".to_string()) }
}

fn assert_send_sync<T: Send + Sync>() {}

// ---------------------------------------------------------------------------
// Plain calls
// ---------------------------------------------------------------------------

#[test]
fn plain_call_value() {
    let tc = trycatch(Task::call(|| Ok::<_, io::Error>(42)));
    assert!(tc.is_ready());
    let (err, value) = tc.ready().unwrap().into_pair();
    assert!(err.is_none());
    assert_eq!(value, Some(42));
}

#[test]
fn plain_call_error() {
    let outcome: Outcome<i32, io::Error> = trycatch_sync(|| Err(io::Error::other("x")));
    let (err, value) = outcome.into_pair();
    assert_eq!(value, None);
    let err = err.unwrap();
    assert_eq!(err.message(), "thrown error");
    match err.cause() {
        Thrown::Error(e) => assert_eq!(e.to_string(), "x"),
        Thrown::Panic(p) => panic!("unexpected panic cause: {p}"),
    }
}

#[test]
fn plain_call_panic() {
    let outcome = trycatch_sync(|| -> Result<(), String> { panic!("boom") });
    let err = outcome.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(err.panic_message(), Some("boom"));
}

#[test]
fn cause_is_not_reclassified() {
    #[derive(Debug, PartialEq)]
    struct Custom(u8);
    let err = trycatch_sync(|| Err::<(), _>(Custom(7))).unwrap_err();
    assert_eq!(err.error(), Some(&Custom(7)));
}

// ---------------------------------------------------------------------------
// Async calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_call_value() {
    let tc = trycatch(Task::call_async(|| fetch(true)));
    assert!(tc.is_pending());
    let (err, value) = tc.await.into_pair();
    assert!(err.is_none());
    assert_eq!(value, Some(42));
}

#[tokio::test]
async fn async_call_error() {
    let (err, value) = trycatch_async(|| fetch(false)).await.into_pair();
    assert!(value.is_none());
    let err = err.unwrap();
    assert_eq!(err.to_string(), "thrown error");
    assert_eq!(err.error().map(String::as_str), Some("y"));
}

#[tokio::test]
async fn async_call_panicking_inside_future() {
    let outcome = trycatch_async(|| async {
        tokio::task::yield_now().await;
        if true {
            panic!("late");
        }
        Ok::<u32, String>(0)
    })
    .await;
    assert_eq!(outcome.unwrap_err().panic_message(), Some("late"));
}

#[tokio::test]
async fn async_call_panicking_with_a_structured_value() {
    #[derive(Debug, PartialEq)]
    struct Rejected {
        code: u16,
    }
    let err = trycatch_async(|| async {
        tokio::task::yield_now().await;
        if true {
            std::panic::panic_any(Rejected { code: 409 });
        }
        Ok::<(), String>(())
    })
    .await
    .unwrap_err();
    let Thrown::Panic(payload) = err.into_cause() else {
        panic!("expected a panic cause");
    };
    let rejected = payload.into_payload().downcast::<Rejected>().unwrap();
    assert_eq!(*rejected, Rejected { code: 409 });
}

#[tokio::test]
async fn ready_branch_is_awaitable_too() {
    let tc: TryCatch<'_, i32, ()> = trycatch(Task::call(|| Ok(5)));
    assert_eq!(tc.await.unwrap(), 5);
}

// ---------------------------------------------------------------------------
// Futures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn future_error() {
    let (err, value) = trycatch(Task::future(async { Err::<i32, _>("boom") }))
        .await
        .into_pair();
    assert!(value.is_none());
    assert!(matches!(err.unwrap().cause(), Thrown::Error("boom")));
}

#[tokio::test]
async fn future_value() {
    let outcome = trycatch_future(fetch(true)).await;
    assert_eq!(outcome.unwrap(), 42);
}

#[tokio::test]
async fn future_borrowing_local_state() {
    let source = vec![1, 2, 3];
    let outcome = trycatch_future(async { Ok::<_, ()>(source.iter().sum::<i32>()) }).await;
    assert_eq!(outcome.unwrap(), 6);
}

#[tokio::test]
async fn never_settling_future_stays_pending() {
    let deferred = trycatch_future(futures::future::pending::<Result<(), ()>>());
    let waited = tokio::time::timeout(Duration::from_millis(20), deferred).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn deferred_runs_on_spawned_tasks() {
    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            tokio::spawn(trycatch_future(async move {
                if i % 2 == 0 { Ok(i) } else { Err(format!("odd {i}")) }
            }))
        })
        .collect();
    let mut ok = 0;
    let mut failed = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => {
                assert_eq!(e.message(), "thrown error");
                failed += 1;
            }
        }
    }
    assert_eq!((ok, failed), (4, 4));
}

#[tokio::test]
async fn local_future_on_a_local_set() {
    let local = tokio::task::LocalSet::new();
    let counter = Rc::new(std::cell::Cell::new(0));
    let seen = Rc::clone(&counter);
    let outcome = local
        .run_until(trycatch_local(async move {
            tokio::task::yield_now().await;
            seen.set(seen.get() + 1);
            Err::<(), _>(format!("count {}", seen.get()))
        }))
        .await;
    assert_eq!(counter.get(), 1);
    assert_eq!(outcome.unwrap_err().error().map(String::as_str), Some("count 1"));
}

#[tokio::test]
async fn stack_options_apply_to_pending_outcomes() {
    let off = StackOptions::default().with_capture(CaptureMode::Off);
    let err = trycatch_with(&off, Task::call_async(|| fetch(false)))
        .await
        .unwrap_err();
    assert_eq!(err.stack(), "thrown error");
}

// ---------------------------------------------------------------------------
// Wrapper properties
// ---------------------------------------------------------------------------

#[test]
fn thrown_error_is_send_sync() {
    assert_send_sync::<ThrownError<io::Error>>();
    assert_send_sync::<Outcome<String, io::Error>>();
}

#[test]
fn thrown_error_boxes_as_std_error() {
    let err = trycatch_sync(|| Err::<(), _>(io::Error::other("disk"))).unwrap_err();
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    assert_eq!(boxed.to_string(), "thrown error");
    assert_eq!(boxed.source().unwrap().to_string(), "disk");
}

#[test]
fn stack_starts_with_the_fixed_message() {
    let err = trycatch_sync(|| Err::<(), _>(())).unwrap_err();
    assert!(err.stack().starts_with("thrown error"));
    assert!(err.stack().lines().skip(1).all(|l| l.starts_with("    at ")));
}
