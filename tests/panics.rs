use ferrous_registry::{Built, Container, Context, DiError};
use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct Precondition {
    code: u32,
}

#[tokio::test]
async fn test_builder_panic_becomes_error() {
    let container = Container::new();
    container
        .set::<u8, _, _>("", |_ctx, _ctn| async {
            let available = 0;
            assert!(available > 0, "precondition failed: {available} workers");
            Ok(Built::new(1))
        })
        .unwrap();

    let err = container
        .get::<u8>(&Context::background(), "")
        .await
        .unwrap_err();
    let panic = err.as_panic().expect("panic error");
    assert_eq!(panic.message(), "precondition failed: 0 workers");
    assert_eq!(err.to_string(), "u8: panic: precondition failed: 0 workers");
}

#[tokio::test]
async fn test_panic_payload_is_preserved() {
    let container = Container::new();
    container
        .set::<u8, _, _>("", |_ctx, _ctn| async {
            let code = 7;
            if code != 0 {
                std::panic::panic_any(Precondition { code });
            }
            Ok(Built::new(1))
        })
        .unwrap();

    let err = container
        .get::<u8>(&Context::background(), "")
        .await
        .unwrap_err();
    let panic = err.as_panic().unwrap();
    assert!(panic.payload_is::<Precondition>());
    assert_eq!(
        panic.downcast_payload::<Precondition>(),
        Some(Precondition { code: 7 })
    );

    let payload = panic.take_payload().unwrap();
    assert_eq!(
        *payload.downcast::<Precondition>().unwrap(),
        Precondition { code: 7 }
    );
}

#[tokio::test]
async fn test_panic_with_error_payload_exposes_source() {
    let container = Container::new();
    container
        .set::<u8, _, _>("", |_ctx, _ctn| async {
            let size = 0;
            if size == 0 {
                std::panic::panic_any(DiError::InvalidConfig("pool size".to_string()));
            }
            Ok(Built::new(1))
        })
        .unwrap();

    let err = container
        .get::<u8>(&Context::background(), "")
        .await
        .unwrap_err();
    let panic = err.as_panic().unwrap();
    let source = panic.source().expect("wrapped cause");
    assert_eq!(source.to_string(), "invalid configuration: pool size");
    assert!(source.downcast_ref::<DiError>().is_some());
}

#[tokio::test]
async fn test_entry_recovers_after_panic() {
    let panicked = Arc::new(AtomicBool::new(false));
    let container = Container::new();
    container
        .set::<String, _, _>("", {
            let panicked = panicked.clone();
            move |_ctx, _ctn| {
                let first = !panicked.swap(true, Ordering::SeqCst);
                async move {
                    if first {
                        panic!("boom");
                    }
                    Ok(Built::new("recovered".to_string()))
                }
            }
        })
        .unwrap();

    let ctx = Context::background();
    assert!(container.get::<String>(&ctx, "").await.unwrap_err().as_panic().is_some());
    // The entry lock was released by the failed build.
    assert_eq!(*container.get::<String>(&ctx, "").await.unwrap(), "recovered");
}

#[tokio::test]
async fn test_nested_panic_keeps_path() {
    struct Outer;

    let container = Container::new();
    container
        .set::<u8, _, _>("inner", |_ctx, _ctn| async {
            let healthy = false;
            if !healthy {
                panic!("boom");
            }
            Ok(Built::new(1))
        })
        .unwrap();
    container
        .set::<Outer, _, _>("", |ctx, ctn| async move {
            ctn.get::<u8>(&ctx, "inner").await?;
            Ok(Built::new(Outer))
        })
        .unwrap();

    let err = container
        .get::<Outer>(&Context::background(), "")
        .await
        .err()
        .unwrap();
    assert_eq!(err.key_path().len(), 2);
    assert_eq!(err.as_panic().unwrap().message(), "boom");
    assert!(err.to_string().ends_with("u8(inner): panic: boom"));
}

#[tokio::test]
async fn test_closer_panic_does_not_stop_close() {
    let closed = Arc::new(AtomicBool::new(false));
    let container = Container::new();
    container
        .set::<u8, _, _>("a", |_ctx, _ctn| async {
            Ok(Built::new(1).with_closer(|_ctx| async {
                let drained = false;
                if !drained {
                    panic!("closer exploded");
                }
                Ok(())
            }))
        })
        .unwrap();
    container
        .set::<u8, _, _>("b", {
            let closed = closed.clone();
            move |_ctx, _ctn| {
                let closed = closed.clone();
                async move {
                    Ok(Built::new(2).with_closer(move |_ctx| async move {
                        closed.store(true, Ordering::SeqCst);
                        Ok(())
                    }))
                }
            }
        })
        .unwrap();

    let ctx = Context::background();
    container.get_all::<u8>(&ctx).await.unwrap();
    let err = container.close(&ctx).await.unwrap_err();

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(err.errors().len(), 1);
    assert_eq!(err.to_string(), "u8(a): panic: closer exploded");
}
