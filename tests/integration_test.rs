use std::sync::{Arc, Barrier};
use std::thread;

use cas_core::audit::{AuditEventKind, AuditTrail, Auditor};
use cas_core::{
    Attributes, CasConfig, CasEngine, ErrorCode, ManualClock, MemoryTicketStore, RecordingCallback,
    Secret, TicketError, TicketStore, ValidationRequest,
};
use chrono::Duration;

const SVC1: &str = "https://svc1/";
const SVC2: &str = "https://svc2/";

struct Harness {
    engine: Arc<CasEngine>,
    store: Arc<MemoryTicketStore>,
    clock: Arc<ManualClock>,
    callback: Arc<RecordingCallback>,
    trail: Arc<AuditTrail>,
}

fn harness_with(config: CasConfig) -> Harness {
    let store = Arc::new(MemoryTicketStore::open());
    let clock = Arc::new(ManualClock::starting_now());
    let callback = Arc::new(RecordingCallback::new());
    let trail = Arc::new(AuditTrail::new());
    let engine = CasEngine::builder(store.clone())
        .clock(clock.clone())
        .config(config)
        .proxy_callback(callback.clone())
        .auditor(Auditor::with_trail(trail.clone()))
        .build()
        .expect("valid configuration");
    Harness {
        engine: Arc::new(engine),
        store,
        clock,
        callback,
        trail,
    }
}

fn harness() -> Harness {
    harness_with(CasConfig::default())
}

/// Session for alice, ST for svc1 validated with a callback, and the
/// delivered PGT value.
fn alice_with_pgt(h: &Harness) -> (String, String) {
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), SVC1, false)
        .unwrap();
    let success = h
        .engine
        .validate_service_ticket(
            &ValidationRequest::new(SVC1, st.id().as_str()).with_pgt_url("https://svc1/cb"),
        )
        .unwrap();
    let iou = success.pgt_iou.expect("pgt issued");
    let pgt = h.callback.pgt_for_iou(&iou).expect("pgt delivered");
    (tgt.id().as_str().to_string(), pgt)
}

#[test]
fn login_ticket_is_single_use() {
    let h = harness();
    let lt = h.engine.issue_login_ticket().unwrap();

    assert!(h.engine.validate_login_ticket(lt.id().as_str()).is_ok());
    let err = h.engine.validate_login_ticket(lt.id().as_str()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTicket);
    assert!(err.is_replay());
}

#[test]
fn service_ticket_scenario() {
    let h = harness();
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), SVC1, false)
        .unwrap();
    let request = ValidationRequest::new(SVC1, st.id().as_str());

    let success = h.engine.validate_service_ticket(&request).unwrap();
    assert_eq!(success.user, "alice");

    let err = h.engine.validate_service_ticket(&request).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTicket);
    assert_eq!(h.trail.count(AuditEventKind::ReplayAttempt), 1);
}

#[test]
fn proxy_ticket_scenario() {
    let h = harness();
    let (tgt, pgt) = alice_with_pgt(&h);

    let pt = h.engine.issue_proxy_ticket(&pgt, SVC2).unwrap();
    let success = h
        .engine
        .validate_proxy_ticket(&ValidationRequest::new(SVC2, pt.id().as_str()))
        .unwrap();
    assert_eq!(success.user, "alice");
    assert_eq!(success.proxies, vec![SVC1.to_string()]);

    let owner = h.engine.resolve_pgt_owner_chain(&pgt).unwrap();
    assert_eq!(owner.id().as_str(), tgt);
}

#[test]
fn destroyed_session_breaks_proxy_chain() {
    let h = harness();
    let (tgt, pgt) = alice_with_pgt(&h);
    let pt = h.engine.issue_proxy_ticket(&pgt, SVC2).unwrap();

    let report = h.engine.destroy_tgt(&tgt).unwrap();
    assert!(report.tgt_destroyed);
    assert_eq!(report.pgts_destroyed, 1);

    let err = h
        .engine
        .validate_proxy_ticket(&ValidationRequest::new(SVC2, pt.id().as_str()))
        .unwrap_err();
    // The cascade removed the proxy ticket itself.
    assert_eq!(err.code(), ErrorCode::InvalidTicket);
    assert!(!err.is_replay());
    assert_eq!(
        h.engine.resolve_pgt_owner_chain(&pgt).unwrap_err().code(),
        ErrorCode::BadPgt
    );
    assert_eq!(
        h.engine.issue_proxy_ticket(&pgt, SVC2).unwrap_err().code(),
        ErrorCode::BadPgt
    );
}

#[test]
fn cascade_removes_every_pgt_in_a_deep_chain() {
    let h = harness();
    let (tgt, pgt1) = alice_with_pgt(&h);

    // svc2 validates a PT from svc1 and earns its own PGT
    let pt = h.engine.issue_proxy_ticket(&pgt1, SVC2).unwrap();
    let success = h
        .engine
        .validate_proxy_ticket(
            &ValidationRequest::new(SVC2, pt.id().as_str()).with_pgt_url("https://svc2/cb"),
        )
        .unwrap();
    let pgt2 = h
        .callback
        .pgt_for_iou(&success.pgt_iou.unwrap())
        .unwrap();

    let report = h.engine.destroy_tgt(&tgt).unwrap();
    assert_eq!(report.pgts_destroyed, 2);
    for pgt in [&pgt1, &pgt2] {
        assert!(h.store.find(pgt).unwrap().is_none());
        assert!(h.engine.resolve_pgt_owner_chain(pgt).is_err());
    }
    assert!(h.store.is_empty());
}

#[test]
fn cascade_leaves_other_sessions_alone() {
    let h = harness();
    let (alice_tgt, _) = alice_with_pgt(&h);
    let bob_tgt = h.engine.create_tgt("bob", Attributes::new()).unwrap();
    let bob_st = h
        .engine
        .issue_service_ticket(bob_tgt.id().as_str(), SVC1, false)
        .unwrap();

    h.engine.destroy_tgt(&alice_tgt).unwrap();

    assert!(h
        .engine
        .validate_service_ticket(&ValidationRequest::new(SVC1, bob_st.id().as_str()))
        .is_ok());
}

#[test]
fn service_match_is_strict_without_stripping() {
    let h = harness();
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), "https://a.example/cb?x=1", false)
        .unwrap();

    let err = h
        .engine
        .validate_service_ticket(&ValidationRequest::new(
            "https://a.example/cb?x=2",
            st.id().as_str(),
        ))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidService);
}

#[test]
fn service_match_honors_configured_stripping() {
    let config = CasConfig::parse(
        r#"
        [services]
        strip_params = ["x"]
        "#,
    )
    .unwrap();
    let h = harness_with(config);
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), "https://a.example/cb?x=1", false)
        .unwrap();

    assert!(h
        .engine
        .validate_service_ticket(&ValidationRequest::new(
            "https://a.example/cb?x=2",
            st.id().as_str(),
        ))
        .is_ok());
}

#[test]
fn expiry_applies_whether_or_not_consumed() {
    let h = harness();
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), SVC1, false)
        .unwrap();

    h.clock.set(st.expires_at() + Duration::milliseconds(1));
    let err = h
        .engine
        .validate_service_ticket(&ValidationRequest::new(SVC1, st.id().as_str()))
        .unwrap_err();
    assert!(matches!(err, TicketError::Expired { .. }));
    assert!(!err.is_replay());
}

#[test]
fn concurrent_validation_consumes_exactly_once() {
    const RACERS: usize = 32;
    let h = harness();
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    let st = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), SVC1, false)
        .unwrap();
    let value = st.id().as_str().to_string();
    let barrier = Arc::new(Barrier::new(RACERS));

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let engine = Arc::clone(&h.engine);
            let barrier = Arc::clone(&barrier);
            let value = value.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.validate_service_ticket(&ValidationRequest::new(SVC1, value))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("validator thread panicked"))
        .collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let replays = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_replay()))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(replays, RACERS - 1);
}

#[test]
fn cascade_racing_validation_never_both_succeed() {
    for _ in 0..50 {
        let h = harness();
        let (tgt, pgt) = alice_with_pgt(&h);
        let pt = h.engine.issue_proxy_ticket(&pgt, SVC2).unwrap();
        let pt = pt.id().as_str().to_string();
        let barrier = Arc::new(Barrier::new(2));

        let validator = {
            let engine = Arc::clone(&h.engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.validate_proxy_ticket(&ValidationRequest::new(SVC2, pt))
            })
        };
        barrier.wait();
        h.engine.destroy_tgt(&tgt).unwrap();
        let validated = validator.join().expect("validator thread panicked");

        // Whatever the interleaving, nothing under the session survives.
        assert!(h.store.is_empty());
        if let Err(err) = validated {
            assert!(matches!(
                err.code(),
                ErrorCode::InvalidTicket | ErrorCode::BadPgt
            ));
        }
    }
}

#[test]
fn purge_removes_expired_sessions_with_their_chains() {
    let h = harness();
    let (_, pgt) = alice_with_pgt(&h);
    h.engine.issue_login_ticket().unwrap();

    h.clock.advance(Duration::days(3));
    let removed = h.engine.purge_expired().unwrap();
    assert!(removed >= 3);
    assert!(h.store.is_empty());
    assert!(h.engine.resolve_pgt_owner_chain(&pgt).is_err());
}

#[test]
fn closed_store_reports_internal_error() {
    let h = harness();
    let tgt = h.engine.create_tgt("alice", Attributes::new()).unwrap();
    h.engine.shutdown();

    let err = h
        .engine
        .issue_service_ticket(tgt.id().as_str(), SVC1, false)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);
    assert!(!err.description().contains("closed"));
}

#[test]
fn secret_is_fully_redacted() {
    let pgt = Secret::new("PGT-abcdef".to_string());

    let debug_out = format!("{:?}", pgt);
    assert_eq!(debug_out, "[REDACTED]");
    assert!(!debug_out.contains("PGT"));
    assert!(!debug_out.contains("String"));

    assert_eq!(format!("{}", pgt), "[REDACTED]");
}
