use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use wallet_session::{
    LifecycleSignal, LogoutHandler, MemoryStore, SessionTimeoutMonitor, SystemClock, TimeoutConfigUpdate,
};

struct NoopHandler;

#[async_trait]
impl LogoutHandler for NoopHandler {
    async fn on_logout(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap_or_else(|e| panic!("failed to build runtime: {e}"))
}

fn bench_record_activity(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("record_activity");
    group.measurement_time(Duration::from_secs(5));

    let (signal, _controller) = LifecycleSignal::channel();
    let uninitialized = rt.block_on(async {
        SessionTimeoutMonitor::new(Arc::new(MemoryStore::new()), signal.clone(), Arc::new(SystemClock))
    });
    group.bench_function("uninitialized", |b| {
        let _guard = rt.enter();
        b.iter(|| uninitialized.record_activity());
    });

    let armed = rt.block_on(async {
        let monitor = SessionTimeoutMonitor::new(Arc::new(MemoryStore::new()), signal.clone(), Arc::new(SystemClock));
        monitor.initialize(Arc::new(NoopHandler)).await;
        monitor
    });
    group.bench_function("armed", |b| {
        let _guard = rt.enter();
        b.iter(|| armed.record_activity());
    });

    group.finish();
    armed.cleanup();
}

fn bench_remaining_time(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("remaining_time");

    for minutes in [1_u32, 15, 60] {
        let (signal, _controller) = LifecycleSignal::channel();
        let monitor = rt.block_on(async {
            let monitor = SessionTimeoutMonitor::new(Arc::new(MemoryStore::new()), signal, Arc::new(SystemClock));
            monitor.update_config(TimeoutConfigUpdate::timeout_minutes(minutes)).await;
            monitor.record_activity();
            monitor
        });
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &monitor, |b, monitor| {
            b.iter(|| rt.block_on(monitor.get_remaining_time()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_record_activity, bench_remaining_time);
criterion_main!(benches);
