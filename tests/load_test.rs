//! Readers and writers hammering one live config.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use envsync::reload::REPLY_OK;

mod common;

use common::{Harness, KEY};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_a_torn_record() {
    let h = Harness::start(&[("a", "v0"), ("b", "v0")]).await;
    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let live = h.live.clone();
            let stop = stop.clone();
            let reads = reads.clone();
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    let record = live.load();
                    assert_eq!(record.a, record.b, "record mixes two snapshots");
                    reads.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let rounds = 50;
    let start = Instant::now();
    for round in 1..=rounds {
        let version = format!("v{}", round);
        h.remote(&[("a", version.as_str()), ("b", version.as_str())]);
        assert_eq!(h.reload(None).await, REPLY_OK);
    }
    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.await.unwrap();
    }

    println!(
        "{} reloads in {:?}, {} concurrent reads",
        rounds,
        elapsed,
        reads.load(Ordering::Relaxed)
    );
    assert_eq!(h.live.generation(), rounds);
    assert_eq!(h.live.load().a, format!("v{}", rounds));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_field_reloads_are_serialized() {
    let fields: Vec<String> = (0..20).map(|i| format!("f{}", i)).collect();
    let h = Arc::new(Harness::start(&[("a", "x")]).await);
    for field in &fields {
        h.store.set_field(KEY, field, "set");
    }
    h.store.set_latency(Duration::from_millis(5));

    let requests: Vec<_> = fields
        .iter()
        .cloned()
        .map(|field| {
            let h = h.clone();
            tokio::spawn(async move { h.reload(Some(field.as_str())).await })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), REPLY_OK);
    }

    let env = h.live.env_snapshot().await;
    assert!(fields.iter().all(|f| env.get(f).map(String::as_str) == Some("set")));
    assert_eq!(h.live.generation(), fields.len() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_and_scoped_reloads_interleave_safely() {
    let fields: Vec<String> = (0..5).map(|i| format!("f{}", i)).collect();
    let mut initial = vec![("a", "x"), ("stale", "old")];
    initial.extend(fields.iter().map(|f| (f.as_str(), "old")));
    let h = Arc::new(Harness::start(&initial).await);

    let mut remote = vec![("a", "new")];
    remote.extend(fields.iter().map(|f| (f.as_str(), "new")));
    h.remote(&remote);
    h.store.set_latency(Duration::from_millis(5));

    let mut targets: Vec<Option<String>> = Vec::new();
    for round in 0..10 {
        if round % 2 == 0 {
            targets.push(None);
        }
        targets.extend(fields.iter().cloned().map(Some));
    }

    let requests: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let h = h.clone();
            tokio::spawn(async move { h.reload(target.as_deref()).await })
        })
        .collect();
    let total = requests.len();
    let mut ok = 0;
    for request in requests {
        if request.await.unwrap() == REPLY_OK {
            ok += 1;
        }
    }

    assert_eq!(ok, total);
    assert_eq!(h.live.generation(), ok as u64);
    assert_eq!(h.live.env_snapshot().await, common::env(&remote));
    let record = h.live.load();
    assert_eq!(record.a, "new");
}
