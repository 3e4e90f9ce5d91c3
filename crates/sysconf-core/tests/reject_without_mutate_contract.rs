//! Contract Test: Reject Without Mutate
//!
//! Constraints verified:
//! - Every value of a batch is validated before any service is called
//! - A rejected batch leaves the live system and the datastore untouched
//! - The rejection names the offending leaf and the reason
//!
//! If this test fails, a bad edit can leave the device half-configured.

mod common;

use common::*;
use sysconf_core::model::Clock;
use sysconf_core::traits::Datastore;
use sysconf_core::{
    ChangeBatch, ClockApplier, DnsServer, Edit, Error, LeafPath, LeafValue, PipelineEvent,
    PipelineState, SystemConfig, ValidationReason,
};

fn text(s: &str) -> LeafValue {
    LeafValue::Text(s.to_string())
}

#[tokio::test]
async fn unknown_zone_leaves_previous_zone_in_place() {
    let fakes = Fakes::new();
    let (pipeline, _events) = fakes.pipeline();

    pipeline
        .commit(&ChangeBatch::new().with(Edit::created(
            LeafPath::TimezoneName,
            text("Europe/Berlin"),
        )))
        .await
        .expect("Europe/Berlin is a known zone");
    assert_eq!(fakes.localtime.target().as_deref(), Some("Europe/Berlin"));

    let err = pipeline
        .commit(&ChangeBatch::new().with(Edit::modified(
            LeafPath::TimezoneName,
            Some(text("Europe/Berlin")),
            text("Europe/Silverstone"),
        )))
        .await
        .unwrap_err();

    match err {
        Error::Validation(v) => {
            assert_eq!(v.reason, ValidationReason::UnknownTimezone);
            assert_eq!(v.leaf, "system/clock/timezone-name");
            assert_eq!(v.value, "Europe/Silverstone");
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    // exactly one swap happened: the Berlin one
    assert_eq!(fakes.localtime.swaps(), vec!["Europe/Berlin".to_string()]);

    let state = fakes.reader().clock().await.unwrap();
    assert_eq!(state.timezone_name.as_deref(), Some("Europe/Berlin"));
    assert_eq!(
        fakes.datastore.running().await.unwrap().clock,
        Some(Clock::TimezoneName("Europe/Berlin".to_string()))
    );
}

#[tokio::test]
async fn clock_applier_rejects_unknown_zone_without_swapping() {
    let fakes = Fakes::new();
    let applier = ClockApplier::new(fakes.localtime.clone(), fakes.zones.clone());

    applier.apply("Asia/Tokyo").await.unwrap();
    let err = applier.apply("Mars/Olympus_Mons").await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(fakes.localtime.swaps(), vec!["Asia/Tokyo".to_string()]);
    assert_eq!(applier.read().await.unwrap().as_deref(), Some("Asia/Tokyo"));
}

#[tokio::test]
async fn one_bad_leaf_rejects_the_whole_batch() {
    let fakes = Fakes::new();
    let (pipeline, mut events) = fakes.pipeline();

    // hostname and search are valid; the server address is not
    let batch = ChangeBatch::new()
        .with(Edit::created(LeafPath::Hostname, text("edge-01")))
        .with(Edit::created(LeafPath::DnsSearch, text("corp.example")))
        .with(Edit::created(
            LeafPath::DnsServer,
            LeafValue::Server(DnsServer::new("ns1", "300.1.2.3")),
        ));

    let err = pipeline.commit(&batch).await.unwrap_err();
    let report = err.report();
    assert_eq!(report.kind, "validation");
    let validation = report.validation.expect("validation detail");
    assert_eq!(validation.reason, ValidationReason::InvalidAddress);
    assert_eq!(
        validation.leaf,
        "system/dns-resolver/server[name='ns1']/udp-and-tcp/address"
    );

    assert_eq!(fakes.mutations(), 0, "no service may be called");
    assert_eq!(fakes.hostname.live(), "localhost");
    assert_eq!(fakes.datastore.running().await.unwrap(), SystemConfig::default());
    assert_eq!(fakes.datastore.commit_count(), 0);

    assert_eq!(pipeline.state().await, PipelineState::Idle);
    let events = drain(&mut events);
    assert!(events.contains(&PipelineEvent::StateChanged {
        from: PipelineState::Validating,
        to: PipelineState::Rejected,
    }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Rejected { error } if error.reason == ValidationReason::InvalidAddress))
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SubtreeApplied { .. }))
    );
}

#[tokio::test]
async fn invalid_hostname_is_rejected_before_the_service() {
    let fakes = Fakes::new();
    let (pipeline, _events) = fakes.pipeline();

    for bad in ["-edge", "edge..01", "edge_01", ""] {
        let err = pipeline
            .commit(&ChangeBatch::new().with(Edit::created(LeafPath::Hostname, text(bad))))
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{bad:?} should be rejected");
    }

    assert_eq!(fakes.hostname.set_calls(), 0);
}

#[tokio::test]
async fn unrepresentable_utc_offset_is_rejected() {
    let fakes = Fakes::new();
    let (pipeline, _events) = fakes.pipeline();

    let err = pipeline
        .commit(&ChangeBatch::new().with(Edit::created(
            LeafPath::TimezoneUtcOffset,
            LeafValue::Integer(330),
        )))
        .await
        .unwrap_err();

    match err {
        Error::Validation(v) => assert_eq!(v.reason, ValidationReason::InvalidUtcOffset),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(fakes.localtime.swaps().is_empty());
    assert_eq!(fakes.localtime.target().as_deref(), Some("Etc/UTC"));
}

#[tokio::test]
async fn out_of_range_resolver_option_is_rejected() {
    let fakes = Fakes::new();
    let (pipeline, _events) = fakes.pipeline();

    let err = pipeline
        .commit(&ChangeBatch::new().with(Edit::modified(
            LeafPath::DnsOptionsTimeout,
            None,
            LeafValue::Integer(0),
        )))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(fakes.resolver.calls().is_empty());
}

#[tokio::test]
async fn clock_removal_needs_the_fallback_zone_before_anything_applies() {
    let fakes = Fakes {
        zones: StaticZones::new(&["Europe/Berlin"]),
        ..Fakes::new()
    };
    let (pipeline, _events) = fakes.pipeline();

    let err = pipeline
        .commit(
            &ChangeBatch::new()
                .with(Edit::created(LeafPath::Hostname, text("edge-01")))
                .with(Edit::deleted(LeafPath::TimezoneName, None)),
        )
        .await
        .unwrap_err();

    match err {
        Error::Validation(v) => assert_eq!(v.reason, ValidationReason::UnknownTimezone),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(fakes.hostname.set_calls(), 0);
    assert!(fakes.localtime.swaps().is_empty());
    assert_eq!(fakes.datastore.commit_count(), 0);
}
