//! Tests for tokio spawner utilities

use prometheus_resource_guard::runtime::tokio_spawner::TokioSpawner;
use prometheus_resource_guard::Spawn;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_tokio_spawner_owns_a_runtime() {
    let spawner = TokioSpawner::with_worker_threads(2).expect("runtime");

    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(7).unwrap();
    });

    assert_eq!(
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(),
        7
    );
}
