//! Finalization runs once per process, so this file holds a single test.

use proxy_python::{lease_count, shutdown, BridgeConfig, PythonEnvironment, ShutdownOutcome};

#[test]
fn test_shutdown_waits_for_leases() {
    assert_eq!(shutdown(), ShutdownOutcome::NeverInitialized);

    let env = PythonEnvironment::new(BridgeConfig::default()).unwrap();
    assert!(lease_count() >= 1);
    assert!(matches!(shutdown(), ShutdownOutcome::LeasesOutstanding(_)));

    let answer = env.find_symbol("math").unwrap().get("pi").unwrap();
    assert!((answer.convert::<f64>().unwrap() - std::f64::consts::PI).abs() < 1e-12);
    drop(answer);
    drop(env);

    assert_eq!(lease_count(), 0);
    assert_eq!(shutdown(), ShutdownOutcome::Finalized);
    assert_eq!(shutdown(), ShutdownOutcome::AlreadyFinalized);
    assert!(PythonEnvironment::new(BridgeConfig::default()).is_err());
}
