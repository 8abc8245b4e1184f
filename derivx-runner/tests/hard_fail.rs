use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;

use derivx_core::config::{ProductConfig, ProductFamily};
use derivx_core::{EnvelopeKind, Greek, TaskDescriptor, TaskMethod, TaskerId};
use derivx_runner::{
    BackendJob, CacheKey, CachedBackend, CompletionEvent, ComputeBackend, Dispatcher, FnPlugin,
    KernelSettings, LocalKernel, PluginRegistry, Rejected, ResultCache,
};

fn jittery_kernel(max_sleep_ms: u64) -> LocalKernel {
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Snowball.plugin_id(),
        move |method, _| {
            let ms = rand::thread_rng().gen_range(0..=max_sleep_ms);
            thread::sleep(Duration::from_millis(ms));
            Ok(format!("[[{method}]]"))
        },
    ));
    LocalKernel::start(KernelSettings::default().with_worker_threads(8), plugins).unwrap()
}

fn snowball_tasks() -> Vec<TaskDescriptor> {
    let config = ProductConfig::reference(ProductFamily::Snowball);
    let mut tasks = vec![
        TaskDescriptor::new(&config, TaskMethod::Coupon).unwrap(),
        TaskDescriptor::new(&config, TaskMethod::Payoff).unwrap(),
    ];
    tasks.extend(Greek::ALL.iter().map(|g| TaskDescriptor::greeks(&config, *g).unwrap()));
    tasks
}

#[test]
fn hard_fail_async_exactly_once_under_concurrency() {
    const SUBMITTERS: usize = 4;
    const PER_SUBMITTER: usize = 14;
    const TOTAL: usize = SUBMITTERS * PER_SUBMITTER;

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(jittery_kernel(20))));
    let deliveries: Arc<Mutex<HashMap<TaskerId, usize>>> = Arc::default();
    let done = Arc::new(AtomicUsize::new(0));
    let all_done = Arc::new(CompletionEvent::new());

    let submitters: Vec<_> = (0..SUBMITTERS)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let deliveries = Arc::clone(&deliveries);
            let done = Arc::clone(&done);
            let all_done = Arc::clone(&all_done);
            thread::spawn(move || {
                let tasks = snowball_tasks();
                let mut acks = Vec::new();
                for i in 0..PER_SUBMITTER {
                    let (deliveries, done, all_done) =
                        (Arc::clone(&deliveries), Arc::clone(&done), Arc::clone(&all_done));
                    let ack = dispatcher
                        .execute_async(&tasks[i % tasks.len()], move |env| {
                            assert!(env.is_success());
                            let id = env.tasker_id().cloned().unwrap();
                            *deliveries.lock().unwrap().entry(id).or_insert(0) += 1;
                            if done.fetch_add(1, Ordering::SeqCst) + 1 == TOTAL {
                                all_done.set();
                            }
                        })
                        .unwrap();
                    acks.push(ack.tasker_id);
                }
                acks
            })
        })
        .collect();

    let acks: Vec<TaskerId> = submitters
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert!(all_done.wait_timeout(Duration::from_secs(30)));
    // Give stray duplicate deliveries a chance to show up.
    thread::sleep(Duration::from_millis(100));

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), TOTAL);
    assert_eq!(deliveries.len(), TOTAL);
    for id in &acks {
        assert_eq!(deliveries.get(id), Some(&1), "{id}");
    }
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn hard_fail_callback_panic_is_contained() {
    let dispatcher = Dispatcher::new(Arc::new(jittery_kernel(0)));
    let task = &snowball_tasks()[0];

    let first = Arc::new(CompletionEvent::new());
    let flag = Arc::clone(&first);
    dispatcher
        .execute_async(task, move |_| {
            flag.set();
            panic!("caller bug inside callback");
        })
        .unwrap();
    assert!(first.wait_timeout(Duration::from_secs(10)));

    // The kernel and the registry keep working after the panic.
    let second = Arc::new(CompletionEvent::new());
    let flag = Arc::clone(&second);
    dispatcher
        .execute_async(task, move |env| {
            assert!(env.is_success());
            flag.set();
        })
        .unwrap();
    assert!(second.wait_timeout(Duration::from_secs(10)));
    assert!(dispatcher.execute_sync(task).is_success());
    assert_eq!(dispatcher.outstanding(), 0);
}

/// Accepts jobs and drops them on the floor.
struct Dropping;

impl ComputeBackend for Dropping {
    fn submit(&self, job: BackendJob) -> Result<(), Rejected> {
        drop(job);
        Ok(())
    }
}

#[test]
fn hard_fail_dropped_job_reports_abandoned_once() {
    let dispatcher = Dispatcher::new(Arc::new(Dropping));
    let task = &snowball_tasks()[1];

    let env = dispatcher.execute_sync(task);
    assert_eq!(env.kind(), EnvelopeKind::Abandoned);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    dispatcher
        .execute_async(task, move |env| {
            assert_eq!(env.kind(), EnvelopeKind::Abandoned);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn hard_fail_sync_timeout_races_reply() {
    // Replies land right around the one-second deadline.
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Snowball.plugin_id(),
        |_, _| {
            let ms = rand::thread_rng().gen_range(900..=1100);
            thread::sleep(Duration::from_millis(ms));
            Ok("[[0]]".to_string())
        },
    ));
    let kernel =
        LocalKernel::start(KernelSettings::default().with_worker_threads(8), plugins).unwrap();
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(kernel)));
    let task = snowball_tasks()[0].clone().with_timeout(Duration::from_secs(1));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let task = task.clone();
            thread::spawn(move || dispatcher.execute_sync(&task).kind())
        })
        .collect();

    for handle in handles {
        let kind = handle.join().unwrap();
        assert!(
            matches!(kind, EnvelopeKind::Success | EnvelopeKind::LocalTimeout),
            "{kind}"
        );
    }
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn hard_fail_cache_mutation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Snowball.plugin_id(),
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("[[4.5]]".to_string())
        },
    ));
    let kernel =
        LocalKernel::start(KernelSettings::default().with_worker_threads(8), plugins).unwrap();
    let cache = ResultCache::new(temp_dir.path()).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(CachedBackend::new(kernel, cache.clone())));
    let task = &snowball_tasks()[0];

    assert!(dispatcher.execute_sync(task).is_success());
    let key = CacheKey::for_task(task);
    assert!(cache.contains(&key));

    // Corrupt the stored entry; the next run recomputes and repairs it.
    std::fs::write(temp_dir.path().join(format!("{key}.json")), "{ not json").unwrap();
    let env = dispatcher.execute_sync(task);
    assert_eq!(env.result_data(), Some("[[4.5]]"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.get(&key).unwrap().is_some());
}
