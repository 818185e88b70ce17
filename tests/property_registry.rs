/// Property-based tests for registry behavior
///
/// These tests verify that lazy building, cycle reporting and teardown
/// order hold regardless of the names and shapes of the registered services.

use ferrous_registry::{Built, Container, Context, Key};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// Property: the builder runs exactly once per close cycle, however many lookups happen
proptest! {
    #[test]
    fn builds_equal_close_cycles(cycles in 1usize..6, gets_per_cycle in 1usize..8) {
        let builds = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        let counter = builds.clone();
        container
            .set::<u64, _, _>("", move |_ctx, _ctn| {
                let n = counter.fetch_add(1, Ordering::SeqCst) as u64;
                async move { Ok(Built::new(n)) }
            })
            .unwrap();

        block_on(async {
            let ctx = Context::background();
            for cycle in 0..cycles {
                for _ in 0..gets_per_cycle {
                    let value = container.get::<u64>(&ctx, "").await.unwrap();
                    assert_eq!(*value, cycle as u64);
                }
                container.close(&ctx).await.unwrap();
            }
        });

        prop_assert_eq!(builds.load(Ordering::SeqCst), cycles);
    }
}

// Property: close visits entries in ascending key order, independent of registration order
proptest! {
    #[test]
    fn close_order_is_sorted(names in prop::collection::btree_set("[a-z0-9]{1,8}", 1..12), seed in any::<u64>()) {
        let mut shuffled: Vec<String> = names.iter().cloned().collect();
        let len = shuffled.len();
        for i in 0..len {
            let j = ((seed.rotate_left(i as u32) as usize) ^ i) % len;
            shuffled.swap(i, j);
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        for name in &shuffled {
            let events = events.clone();
            let name = name.clone();
            container
                .set::<u8, _, _>(name.clone(), move |_ctx, _ctn| {
                    let events = events.clone();
                    let name = name.clone();
                    async move {
                        Ok(Built::new(0).with_closer(move |_ctx| async move {
                            events.lock().unwrap().push(name);
                            Ok(())
                        }))
                    }
                })
                .unwrap();
        }

        block_on(async {
            let ctx = Context::background();
            container.get_all::<u8>(&ctx).await.unwrap();
            container.close(&ctx).await.unwrap();
        });

        let expected: Vec<String> = names.into_iter().collect();
        prop_assert_eq!(&*events.lock().unwrap(), &expected);
    }
}

// Property: a ring of any length is reported as a cycle whose path starts and ends at the entry point
proptest! {
    #[test]
    fn ring_reports_full_path(len in 1usize..8) {
        let container = Container::new();
        for i in 0..len {
            let next = format!("n{}", (i + 1) % len);
            container
                .set::<String, _, _>(format!("n{i}"), move |ctx, ctn| {
                    let next = next.clone();
                    async move {
                        let inner = ctn.get::<String>(&ctx, &next).await?;
                        Ok(Built::new(format!("{inner}+")))
                    }
                })
                .unwrap();
        }

        let err = block_on(container.get::<String>(&Context::background(), "n0")).unwrap_err();
        prop_assert!(err.is_cycle());

        let path: Vec<String> = err.key_path().iter().map(|k| k.name().to_string()).collect();
        let mut expected: Vec<String> = (0..len).map(|i| format!("n{i}")).collect();
        expected.push("n0".to_string());
        prop_assert_eq!(path, expected);
    }
}

// Property: key order agrees with key equality
proptest! {
    #[test]
    fn key_order_consistent_with_eq(a in "\\PC{0,12}", b in "\\PC{0,12}") {
        let ka = Key::named::<u8>(a.clone());
        let kb = Key::named::<u8>(b.clone());
        prop_assert_eq!(ka == kb, a == b);
        prop_assert_eq!(ka.cmp(&kb) == std::cmp::Ordering::Equal, ka == kb);

        let set: BTreeSet<Key> = [ka.clone(), kb.clone(), ka.clone()].into_iter().collect();
        prop_assert_eq!(set.len(), if a == b { 1 } else { 2 });
    }
}
