//! End-to-end tests for the execution harness.
//!
//! Each test compiles a small guest from WebAssembly text, drives it through
//! [`SandboxInstance::invoke`] and asserts on the typed result bundle. The guests patch
//! their reply in place, so the `Output` digit is a direct readout of guest state.

use rstest::rstest;
use serde_json::json;
use weft_loader::{
    test_utils::{
        bad_alloc_guest, clock_digit_guest, counter_guest, counter_guest64, drive_probe_guest,
        environment, fixed_reply_guest, message, no_handle_guest, random_digit_guest, trap_guest,
    },
    FixedRandom, FrozenClock, InstantiationError, InvokeError, Loader, LoaderConfig,
    MemorySnapshot, ModuleFormat, ResultBundle, SandboxInstance,
};

const PAGE: usize = 64 * 1024;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Compiles `wat` and instantiates it under `config`.
async fn spawn(wat: &str, config: LoaderConfig) -> SandboxInstance {
    Loader::new(wat, config).unwrap().instantiate().await.unwrap()
}

/// Drives one canned message through the guest.
async fn call(
    instance: &mut SandboxInstance,
    prior: Option<&MemorySnapshot>,
) -> Result<ResultBundle, InvokeError> {
    instance.invoke(prior, &message("msg-1"), &environment()).await
}

// ============================================================================
// STATE CONTINUITY
// ============================================================================

#[tokio::test]
async fn test_counter_advances_across_snapshots() {
    let mut instance = spawn(&counter_guest(1, 100), LoaderConfig::default()).await;

    let first = call(&mut instance, None).await.unwrap();
    assert_eq!(first.output, json!("1"));

    let second = call(&mut instance, Some(&first.memory)).await.unwrap();
    assert_eq!(second.output, json!("2"));

    let third = call(&mut instance, Some(&second.memory)).await.unwrap();
    assert_eq!(third.output, json!("3"));
}

#[tokio::test]
async fn test_instance_memory_persists_without_a_snapshot() {
    let mut instance = spawn(&counter_guest(1, 100), LoaderConfig::default()).await;

    let first = call(&mut instance, None).await.unwrap();
    assert_eq!(first.output, json!("1"));

    // No prior snapshot given: the instance's own heap carries the counter.
    let second = call(&mut instance, None).await.unwrap();
    assert_eq!(second.output, json!("2"));
}

#[tokio::test]
async fn test_snapshot_transfers_state_between_instances() {
    let loader = Loader::new(&counter_guest(1, 100), LoaderConfig::default()).unwrap();

    let mut first = loader.instantiate().await.unwrap();
    let bundle = call(&mut first, None).await.unwrap();
    assert_eq!(bundle.output, json!("1"));

    let mut second = loader.instantiate().await.unwrap();
    let resumed = call(&mut second, Some(&bundle.memory)).await.unwrap();
    assert_eq!(resumed.output, json!("2"));
}

#[tokio::test]
async fn test_larger_snapshot_grows_a_fresh_instance() {
    let mut big = spawn(&counter_guest(8, 100), LoaderConfig::default()).await;
    let bundle = call(&mut big, None).await.unwrap();
    assert_eq!(bundle.memory.len(), 8 * PAGE);

    let mut small = spawn(&counter_guest(1, 100), LoaderConfig::default()).await;
    assert_eq!(small.heap_size(), PAGE);

    let resumed = call(&mut small, Some(&bundle.memory)).await.unwrap();
    assert_eq!(resumed.output, json!("2"));
    assert_eq!(small.heap_size(), 8 * PAGE);
}

#[tokio::test]
async fn test_snapshot_past_the_ceiling_is_rejected() {
    let mut big = spawn(&counter_guest(8, 100), LoaderConfig::default()).await;
    let bundle = call(&mut big, None).await.unwrap();

    let config = LoaderConfig::default().with_memory_limit(2 * PAGE);
    let mut small = spawn(&counter_guest(1, 100), config).await;

    match call(&mut small, Some(&bundle.memory)).await.unwrap_err() {
        InvokeError::HeapResize { requested, ceiling } => {
            assert_eq!(requested, 8 * PAGE);
            assert_eq!(ceiling, 2 * PAGE);
        }
        other => panic!("expected a heap resize error, got {other}"),
    }
    // The rejected load left the heap alone.
    assert_eq!(small.heap_size(), PAGE);
}

// ============================================================================
// GAS ACCOUNTING
// ============================================================================

#[rstest]
#[case::exactly_at_limit(500, 500, true)]
#[case::one_past_limit(500, 501, false)]
#[case::well_under_limit(500, 10, true)]
#[tokio::test]
async fn test_budget_boundary(#[case] limit: u64, #[case] charge: u64, #[case] succeeds: bool) {
    let config = LoaderConfig::default().with_compute_limit(limit);
    let mut instance = spawn(&counter_guest(1, charge), config).await;

    let outcome = call(&mut instance, None).await;
    if succeeds {
        assert_eq!(outcome.unwrap().gas_used, charge);
    } else {
        let err = outcome.unwrap_err();
        assert!(matches!(err, InvokeError::OutOfGas));
        assert_eq!(err.to_string(), "out of gas");
    }
}

#[tokio::test]
async fn test_budget_resets_each_invocation() {
    let config = LoaderConfig::default().with_compute_limit(500);
    let mut instance = spawn(&counter_guest(1, 300), config).await;

    let first = call(&mut instance, None).await.unwrap();
    assert_eq!(first.gas_used, 300);

    // 600 across both calls, but each starts from a fresh budget.
    let second = call(&mut instance, None).await.unwrap();
    assert_eq!(second.gas_used, 300);
}

#[tokio::test]
async fn test_budget_accumulates_when_configured() {
    let config = LoaderConfig::default().with_compute_limit(500).with_accumulate_gas(true);
    let mut instance = spawn(&counter_guest(1, 300), config).await;

    let first = call(&mut instance, None).await.unwrap();
    assert_eq!(first.gas_used, 300);

    let err = call(&mut instance, Some(&first.memory)).await.unwrap_err();
    assert!(matches!(err, InvokeError::OutOfGas));
    assert_eq!(instance.gas().used(), 600);
}

#[tokio::test]
async fn test_manual_refund_restores_budget() {
    let config = LoaderConfig::default().with_compute_limit(500).with_accumulate_gas(true);
    let mut instance = spawn(&counter_guest(1, 300), config).await;

    call(&mut instance, None).await.unwrap();
    instance.refill_gas(Some(200));
    assert_eq!(instance.gas().used(), 100);

    instance.refill_gas(None);
    assert_eq!(instance.gas().used(), 0);
}

// ============================================================================
// DETERMINISM CAPABILITIES
// ============================================================================

#[tokio::test]
async fn test_random_digit_follows_the_injected_source() {
    // The default source always yields 0.5, on every call.
    let mut instance = spawn(&random_digit_guest(), LoaderConfig::default()).await;
    assert_eq!(call(&mut instance, None).await.unwrap().output, json!("5"));
    assert_eq!(call(&mut instance, None).await.unwrap().output, json!("5"));

    let config = LoaderConfig::default().with_random(FixedRandom(0.25).shared());
    let mut instance = spawn(&random_digit_guest(), config).await;
    assert_eq!(call(&mut instance, None).await.unwrap().output, json!("2"));
}

#[tokio::test]
async fn test_clock_is_frozen_at_the_injected_instant() {
    let config = LoaderConfig::default().with_clock(FrozenClock(1_234_567).shared());
    let mut instance = spawn(&clock_digit_guest(), config).await;
    assert_eq!(call(&mut instance, None).await.unwrap().output, json!("7"));

    // Repeat invocations observe the same instant.
    assert_eq!(call(&mut instance, None).await.unwrap().output, json!("7"));
}

// ============================================================================
// REPLY CONTRACT
// ============================================================================

#[tokio::test]
async fn test_handler_failure_carries_the_response() {
    let wat = fixed_reply_guest(r#"{"ok":false,"response":{"Error":"boom","Output":"partial"}}"#);
    let mut instance = spawn(&wat, LoaderConfig::default()).await;

    match call(&mut instance, None).await.unwrap_err() {
        InvokeError::Handler(response) => {
            assert_eq!(response.error, Some(json!("boom")));
            assert_eq!(response.output, json!("partial"));
        }
        other => panic!("expected a handler error, got {other}"),
    }
}

#[tokio::test]
async fn test_malformed_reply_is_a_decode_error() {
    let mut instance = spawn(&fixed_reply_guest("not json"), LoaderConfig::default()).await;
    let err = call(&mut instance, None).await.unwrap_err();
    assert!(matches!(err, InvokeError::Decode(_)));
}

#[tokio::test]
async fn test_reply_missing_the_ok_flag_is_rejected() {
    let wat = fixed_reply_guest(r#"{"response":{"Output":"1"}}"#);
    let mut instance = spawn(&wat, LoaderConfig::default()).await;
    let err = call(&mut instance, None).await.unwrap_err();
    assert!(matches!(err, InvokeError::Decode(_)));
}

#[tokio::test]
async fn test_reply_with_non_array_lists_is_rejected() {
    let wat = fixed_reply_guest(r#"{"ok":true,"response":{"Messages":{"not":"a list"}}}"#);
    let mut instance = spawn(&wat, LoaderConfig::default()).await;
    let err = call(&mut instance, None).await.unwrap_err();
    assert!(matches!(err, InvokeError::Decode(_)));
}

#[tokio::test]
async fn test_reply_lists_flow_into_the_bundle() {
    let wat = fixed_reply_guest(
        r#"{"ok":true,"response":{"Output":"done","Messages":[{"Target":"a"}],"Spawns":[],"Assignments":[{"Processes":["p"]}]}}"#,
    );
    let mut instance = spawn(&wat, LoaderConfig::default()).await;

    let bundle = call(&mut instance, None).await.unwrap();
    assert_eq!(bundle.output, json!("done"));
    assert_eq!(bundle.messages, vec![json!({"Target": "a"})]);
    assert!(bundle.spawns.is_empty());
    assert_eq!(bundle.assignments, vec![json!({"Processes": ["p"]})]);
    assert_eq!(bundle.error, None);
}

// ============================================================================
// FAULT ISOLATION
// ============================================================================

#[tokio::test]
async fn test_guest_trap_is_an_instance_fault() {
    let mut instance = spawn(&trap_guest(), LoaderConfig::default()).await;
    let err = call(&mut instance, None).await.unwrap_err();
    assert!(matches!(err, InvokeError::Fault(_)));
}

#[tokio::test]
async fn test_fault_does_not_poison_a_sibling_instance() {
    let loader = Loader::new(&trap_guest(), LoaderConfig::default()).unwrap();
    let mut faulty = loader.instantiate().await.unwrap();
    let _ = call(&mut faulty, None).await.unwrap_err();

    // A healthy guest instantiated afterwards is unaffected.
    let mut healthy = spawn(&counter_guest(1, 100), LoaderConfig::default()).await;
    assert_eq!(call(&mut healthy, None).await.unwrap().output, json!("1"));
}

// ============================================================================
// INSTANTIATION ERRORS
// ============================================================================

#[tokio::test]
async fn test_missing_handle_export_is_reported() {
    let loader = Loader::new(&no_handle_guest(), LoaderConfig::default()).unwrap();
    let err = loader.instantiate().await.unwrap_err();
    assert!(matches!(err, InstantiationError::MissingExport("handle")));
}

#[tokio::test]
async fn test_wrong_alloc_signature_is_reported() {
    let loader = Loader::new(&bad_alloc_guest(), LoaderConfig::default()).unwrap();
    let err = loader.instantiate().await.unwrap_err();
    assert!(matches!(err, InstantiationError::BadSignature { name: "alloc", .. }));
}

#[tokio::test]
async fn test_drive_imports_require_the_extension() {
    let wat = drive_probe_guest("/data/item", 16);
    let loader = Loader::new(&wat, LoaderConfig::default()).unwrap();
    let err = loader.instantiate().await.unwrap_err();
    assert!(matches!(err, InstantiationError::Linkage(_)));
}

#[test]
fn test_garbage_binary_is_rejected() {
    let err = Loader::new(b"\xde\xad\xbe\xef", LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, InstantiationError::InvalidBinary(_)));
}

// ============================================================================
// WASM64
// ============================================================================

#[tokio::test]
async fn test_wasm64_guest_roundtrip() {
    let config = LoaderConfig::default().with_format(ModuleFormat::Wasm64);
    let mut instance = spawn(&counter_guest64(100), config).await;

    let first = call(&mut instance, None).await.unwrap();
    assert_eq!(first.output, json!("1"));
    assert_eq!(first.gas_used, 100);

    let second = call(&mut instance, Some(&first.memory)).await.unwrap();
    assert_eq!(second.output, json!("2"));
}
