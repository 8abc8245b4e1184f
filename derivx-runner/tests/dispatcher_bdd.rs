//! BDD tests for task dispatch
//!
//! These tests drive the `Dispatcher` against a real `LocalKernel`:
//! - Synchronous pricing with surface shape checks
//! - Local timeouts versus backend failures
//! - Greeks on a shared configuration
//! - Submission rejections
//! - Handle-based and callback-based completion
//! - Memoization through `CachedBackend`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use derivx_core::config::{ProductConfig, ProductFamily};
use derivx_core::{
    Distribution, EnvelopeKind, Greek, ResultEnvelope, ResultSurface, TaskDescriptor, TaskMethod,
};
use derivx_runner::{
    BackendJob, CachedBackend, CompletionEvent, ComputeBackend, Dispatcher, FnPlugin,
    KernelSettings, LocalKernel, PluginFailure, PluginRegistry, Rejected, ResultCache,
    WaitOutcome, CODE_TOO_MANY_SEEDS,
};

// ── Helpers ──

fn settings(threads: usize) -> KernelSettings {
    KernelSettings::default().with_worker_threads(threads)
}

/// Plugin that answers with a surface of the requested shape. Values encode
/// the method and the greek so different requests give different grids.
fn surface_plugin(family: ProductFamily) -> FnPlugin {
    FnPlugin::new(family.plugin_id(), move |method, args| {
        let config = ProductConfig::parse(family, args)
            .map_err(|e| PluginFailure::new(400, e.to_string()))?;
        let greek = config
            .calc_greek()
            .and_then(|g| Greek::ALL.iter().position(|x| *x == g))
            .map_or(0.0, |i| (i + 1) as f64);
        let surface = ResultSurface::from_fn(config.surface_shape(), |r, c| {
            f64::from(method) * 100_000.0 + greek * 10_000.0 + (r * 1000 + c) as f64
        });
        surface
            .to_json()
            .map_err(|e| PluginFailure::new(500, e.to_string()))
    })
}

fn pricing_kernel() -> LocalKernel {
    let plugins = PluginRegistry::new()
        .with(surface_plugin(ProductFamily::Snowball))
        .with(surface_plugin(ProductFamily::Sharkfin));
    LocalKernel::start(settings(8), plugins).unwrap()
}

/// Accepts every job and never answers while it is alive.
#[derive(Default)]
struct Silent {
    jobs: Mutex<Vec<BackendJob>>,
}

impl ComputeBackend for Silent {
    fn submit(&self, job: BackendJob) -> Result<(), Rejected> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

// ── Synchronous execution ──

#[test]
fn bdd_scenario_sync_sharkfin_price_has_full_surface() {
    // GIVEN the reference double sharkfin and a running kernel
    let config = ProductConfig::reference(ProductFamily::Sharkfin);
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));

    // WHEN we price it synchronously
    let task = TaskDescriptor::new(&config, TaskMethod::Price).unwrap();
    let envelope = dispatcher.execute_sync(&task);

    // THEN the envelope is a success carrying a (len(calc_price), runs_step) grid
    assert!(envelope.is_success(), "{envelope}");
    let surface = envelope.surface(config.surface_shape()).unwrap();
    assert_eq!(surface.shape().rows, config.common().evaluation.calc_price.len());
    assert_eq!(surface.shape().cols, config.common().simulation.runs_step as usize);

    // AND the reporting window is the first day
    let window = surface.reporting_window(&config.common().evaluation).unwrap();
    assert_eq!(window.days(), 1);
    assert_eq!(window.row(0), Some(&[100_000.0][..]));

    // AND nothing stays pending
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn bdd_scenario_sync_snowball_coupon() {
    // GIVEN the reference two-year snowball
    let config = ProductConfig::reference(ProductFamily::Snowball);
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));

    // WHEN we ask for the coupon surface
    let task = TaskDescriptor::new(&config, TaskMethod::Coupon).unwrap();
    let envelope = dispatcher.execute_sync(&task);

    // THEN the grid is 41 price points by 488 steps
    let surface = envelope.surface(config.surface_shape()).unwrap();
    assert_eq!((surface.shape().rows, surface.shape().cols), (41, 488));
    assert_eq!(surface.get(40, 487), Some(140_487.0));
}

#[test]
fn bdd_scenario_sync_timeout_is_local() {
    // GIVEN a backend that never answers
    let backend = Arc::new(Silent::default());
    let dispatcher = Dispatcher::new(backend.clone());

    // WHEN a one-second sync task is executed
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Payoff,
    )
    .unwrap()
    .with_timeout(Duration::from_secs(1));
    let envelope = dispatcher.execute_sync(&task);

    // THEN the caller gets a local timeout, not a backend failure
    assert_eq!(envelope.kind(), EnvelopeKind::LocalTimeout);
    assert_ne!(envelope.return_code(), 0);
    assert!(envelope.result_data().is_none());

    // AND the backend still holds the abandoned task
    assert_eq!(backend.jobs.lock().unwrap().len(), 1);
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn bdd_scenario_backend_failure_is_not_a_timeout() {
    // GIVEN a plugin that fails with the same code a local timeout uses
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Sharkfin.plugin_id(),
        |_, _| Err(PluginFailure::new(-1001, "engine timeout")),
    ));
    let kernel = LocalKernel::start(settings(8), plugins).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(kernel));

    // WHEN the task runs
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Price,
    )
    .unwrap();
    let envelope = dispatcher.execute_sync(&task);

    // THEN it is classified as a backend failure
    assert_eq!(envelope.kind(), EnvelopeKind::BackendFailure);
    assert_eq!(envelope.return_code(), -1001);
    assert_eq!(envelope.return_info(), "engine timeout");
}

#[test]
fn bdd_scenario_too_many_seeds_fails_on_backend() {
    // GIVEN a kernel with fewer compute units than the reference seeds
    let plugins = PluginRegistry::new().with(surface_plugin(ProductFamily::Sharkfin));
    let dispatcher = Dispatcher::new(Arc::new(LocalKernel::start(settings(2), plugins).unwrap()));

    // WHEN the reference product is priced
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Price,
    )
    .unwrap();
    let envelope = dispatcher.execute_sync(&task);

    // THEN the backend refuses it with a coded failure
    assert_eq!(envelope.kind(), EnvelopeKind::BackendFailure);
    assert_eq!(envelope.return_code(), CODE_TOO_MANY_SEEDS);
}

// ── Greeks ──

#[test]
fn bdd_scenario_delta_then_gamma_are_independent() {
    // GIVEN one snowball configuration
    let config = ProductConfig::reference(ProductFamily::Snowball);
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));

    // WHEN delta and then gamma are requested from it
    let delta = TaskDescriptor::greeks(&config, Greek::Delta).unwrap();
    let gamma = TaskDescriptor::greeks(&config, Greek::Gamma).unwrap();
    let delta_env = dispatcher.execute_sync(&delta);
    let gamma_env = dispatcher.execute_sync(&gamma);

    // THEN both succeed with the same shape but different grids
    let shape = config.surface_shape();
    let d = delta_env.surface(shape).unwrap();
    let g = gamma_env.surface(shape).unwrap();
    assert_ne!(d, g);
    assert_eq!(d.get(0, 0), Some(310_000.0));
    assert_eq!(g.get(0, 0), Some(320_000.0));

    // AND the source configuration was never touched
    assert_eq!(config.calc_greek(), None);
    assert_ne!(delta_env.tasker_id(), gamma_env.tasker_id());
}

// ── Rejections ──

#[test]
fn bdd_scenario_unknown_plugin_is_rejected() {
    // GIVEN a kernel hosting only the default plugins
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));

    // WHEN a task addresses a variant nobody hosts
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Snowball),
        TaskMethod::Payoff,
    )
    .unwrap()
    .with_plugin("derivx_autocall_snowball_gpu");

    // THEN async submission fails immediately and no callback ever runs
    let (tx, rx) = mpsc::channel::<ResultEnvelope>();
    let rejected = dispatcher
        .execute_async(&task, move |env| {
            let _ = tx.send(env);
        })
        .unwrap_err();
    assert_eq!(rejected.kind(), EnvelopeKind::SubmissionRejected);
    assert!(rejected.return_info().contains("derivx_autocall_snowball_gpu"));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(dispatcher.outstanding(), 0);
}

#[test]
fn bdd_scenario_remote_distribution_is_rejected() {
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Greeks,
    );
    // Greeks without a selected greek never becomes a descriptor.
    assert!(task.is_err());

    let task = TaskDescriptor::greeks(&ProductConfig::reference(ProductFamily::Sharkfin), Greek::Vega)
        .unwrap()
        .with_distribution(Distribution::Remote);
    let envelope = dispatcher.execute_sync(&task);
    assert_eq!(envelope.kind(), EnvelopeKind::SubmissionRejected);
}

// ── Handles and callbacks ──

#[test]
fn bdd_scenario_pending_task_waits_again_after_timeout() {
    // GIVEN a plugin held back by a gate
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Mutex::new(gate_rx);
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Sharkfin.plugin_id(),
        move |_, _| {
            let _ = gate_rx.lock().unwrap().recv_timeout(Duration::from_secs(10));
            Ok("[[7]]".to_string())
        },
    ));
    let dispatcher = Dispatcher::new(Arc::new(LocalKernel::start(settings(8), plugins).unwrap()));
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Price,
    )
    .unwrap();

    // WHEN we wait briefly on the handle
    let pending = dispatcher.submit(&task).unwrap();
    let id = pending.tasker_id().clone();
    let pending = match pending.wait(Duration::from_millis(50)) {
        WaitOutcome::TimedOut(pending) => pending,
        WaitOutcome::Completed(env) => panic!("gate was closed, got {env}"),
    };

    // THEN the task is still outstanding
    assert!(dispatcher.is_outstanding(&id));

    // WHEN the gate opens and we wait again
    gate_tx.send(()).unwrap();
    let envelope = pending.wait(Duration::from_secs(10)).completed().unwrap();

    // THEN the reply carries the same tasker id
    assert_eq!(envelope.result_data(), Some("[[7]]"));
    assert_eq!(envelope.tasker_id(), Some(&id));
    assert!(!dispatcher.is_outstanding(&id));
}

#[test]
fn bdd_scenario_async_callback_with_completion_event() {
    // GIVEN a completion event shared with the callback
    let dispatcher = Dispatcher::new(Arc::new(pricing_kernel()));
    let event = Arc::new(CompletionEvent::new());
    let slot = Arc::new(Mutex::new(None));

    // WHEN a sharkfin payoff is submitted asynchronously
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Payoff,
    )
    .unwrap();
    let (cb_event, cb_slot) = (Arc::clone(&event), Arc::clone(&slot));
    let ack = dispatcher
        .execute_async(&task, move |env| {
            *cb_slot.lock().unwrap() = Some(env);
            cb_event.set();
        })
        .unwrap();

    // THEN the event fires and the stored envelope matches the ack
    assert!(event.wait_timeout(Duration::from_secs(10)));
    let envelope = slot.lock().unwrap().take().unwrap();
    assert_eq!(envelope.tasker_id(), Some(&ack.tasker_id));
    assert_eq!(
        envelope
            .surface(ProductConfig::reference(ProductFamily::Sharkfin).surface_shape())
            .unwrap()
            .get(0, 0),
        Some(200_000.0)
    );

    // AND a reset event blocks again
    event.reset();
    assert!(!event.wait_timeout(Duration::from_millis(10)));
}

// ── Memoization ──

#[test]
fn bdd_scenario_cached_backend_prices_once() {
    // GIVEN a counting plugin behind a cached kernel
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ProductFamily::Sharkfin.plugin_id(),
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("[[1.25]]".to_string())
        },
    ));
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = CachedBackend::new(
        LocalKernel::start(settings(8), plugins).unwrap(),
        ResultCache::new(temp_dir.path()).unwrap(),
    );
    let dispatcher = Dispatcher::new(Arc::new(backend));
    let task = TaskDescriptor::new(
        &ProductConfig::reference(ProductFamily::Sharkfin),
        TaskMethod::Price,
    )
    .unwrap();

    // WHEN the same task runs twice
    let first = dispatcher.execute_sync(&task);
    let second = dispatcher.execute_sync(&task);

    // THEN the plugin ran once and both replies agree
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.result_data(), Some("[[1.25]]"));
    assert_eq!(first.result_data(), second.result_data());
    assert_ne!(first.tasker_id(), second.tasker_id());
    assert_eq!(dispatcher.backend_name(), "cached");
}
