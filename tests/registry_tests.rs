mod common;

use std::sync::Arc;

use common::ScriptedExecutor;
use naab::{exec::ExecutorRegistry, runtime::error::RuntimeError};

#[test]
fn test_register_and_resolve() {
    let registry = ExecutorRegistry::new();
    let (executor, _log) = ScriptedExecutor::new("python");
    registry.register(&["python", "py"], executor);

    assert!(registry.is_supported("python"));
    assert!(registry.is_supported("py"));
    let handle = registry.resolve("py").unwrap();
    assert_eq!(handle.lock().language(), "python");
}

#[test]
fn test_resolve_unknown_language() {
    let registry = ExecutorRegistry::new();
    // The Ok arm is a handle to a non-Debug trait object, so match instead
    // of unwrapping.
    match registry.resolve("fortran") {
        Err(err) => assert_eq!(
            err,
            RuntimeError::ExecutorNotFound {
                language: "fortran".to_string()
            }
        ),
        Ok(_) => panic!("expected resolution to fail"),
    }
}

#[test]
fn test_replacement_rebinds_the_name() {
    let registry = ExecutorRegistry::new();
    let (first, first_log) = ScriptedExecutor::new("python");
    let (second, second_log) = ScriptedExecutor::new("python");
    registry.register(&["python"], first);
    registry.register(&["python"], second);

    let handle = registry.resolve("python").unwrap();
    handle.lock().evaluate_with_return("1").unwrap();
    assert!(first_log.lock().unwrap().is_empty());
    assert_eq!(second_log.lock().unwrap().len(), 1);
}

#[test]
fn test_unregister_removes_only_that_name() {
    let registry = ExecutorRegistry::new();
    let (executor, _log) = ScriptedExecutor::new("javascript");
    registry.register(&["javascript", "js"], executor);

    assert!(registry.unregister("js"));
    assert!(!registry.is_supported("js"));
    assert!(registry.is_supported("javascript"));
    assert!(!registry.unregister("js"));
}

#[test]
fn test_handles_are_shared_across_threads() {
    let registry = Arc::new(ExecutorRegistry::new());
    let (executor, log) = ScriptedExecutor::new("fake");
    registry.register(&["fake"], executor);

    let mut handles = Vec::new();
    for i in 0..4 {
        let registry = registry.clone();
        handles.push(std::thread::spawn(move || {
            let executor = registry.resolve("fake").unwrap();
            executor
                .lock()
                .evaluate_with_return(&i.to_string())
                .unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(log.lock().unwrap().len(), 4);
}
