//! Charging service facade: store round-trips and the no-rollback contract.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::assert_ok;

use common::*;
use ocs_accounts::models::account::ActivationInterval;
use ocs_accounts::store::{InMemoryProfileStore, ProfileAdmin};
use ocs_accounts::{ChargingError, ChargingService, EngineConfig, ProfileStore};

fn charging_service(
    store: Arc<InMemoryProfileStore>,
    services: ocs_accounts::EngineServices,
) -> ChargingService {
    ChargingService::new(store, services, EngineConfig::default())
}

#[tokio::test]
async fn debit_flushes_updated_units_to_the_store() {
    let store = Arc::new(InMemoryProfileStore::new());
    store
        .set(profile(
            "cgrates.org",
            "1001",
            vec![
                concrete_balance("First", 20.0, dec!(5), dec!(1)),
                concrete_balance("Second", 10.0, dec!(10), dec!(1)),
            ],
        ))
        .await
        .unwrap();
    let svc = charging_service(store.clone(), permissive_services());

    let ec = assert_ok!(
        svc.debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(12),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
    );
    assert_eq!(ec.consumed, dec!(12));

    // the store observed the decrements
    let stored = store.load("cgrates.org", "1001").await.unwrap();
    assert_eq!(stored.balance("First").unwrap().units, Decimal::ZERO);
    assert_eq!(stored.balance("Second").unwrap().units, dec!(3));

    // a second debit starts from the flushed state
    let ec = assert_ok!(
        svc.debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(5),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
    );
    assert_eq!(ec.consumed, dec!(3));
    assert_eq!(ec.unfulfilled, dec!(2));
}

#[tokio::test]
async fn failed_cascade_keeps_earlier_decrements() {
    let store = Arc::new(InMemoryProfileStore::new());
    let mut flaky = concrete_balance("Flaky", 10.0, dec!(10), dec!(1));
    flaky.filter_ids = vec!["flaky_filter".to_string()];
    store
        .set(profile(
            "cgrates.org",
            "1001",
            vec![concrete_balance("First", 20.0, dec!(5), dec!(1)), flaky],
        ))
        .await
        .unwrap();
    let services = services(
        StubFilterService::with_failing(&["flaky_filter"]),
        StubAttributeService::default(),
        StubRateService::flat(Decimal::ZERO),
    );
    let svc = charging_service(store.clone(), services);

    let err = svc
        .debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(12),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChargingError::FilterService(_)));

    // the first balance was debited before the failure and stays debited;
    // a failed call means "partially applied", not "rolled back"
    let stored = store.load("cgrates.org", "1001").await.unwrap();
    assert_eq!(stored.balance("First").unwrap().units, Decimal::ZERO);
    assert_eq!(stored.balance("Flaky").unwrap().units, dec!(10));
}

#[tokio::test]
async fn missing_account_is_an_error() {
    let store = Arc::new(InMemoryProfileStore::new());
    let svc = charging_service(store, permissive_services());
    let err = svc
        .debit_account_usage(
            "cgrates.org",
            "nobody",
            dec!(1),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChargingError::ProfileNotFound(_)));
}

#[tokio::test]
async fn expired_profile_refuses_to_charge() {
    let store = Arc::new(InMemoryProfileStore::new());
    let mut prf = profile(
        "cgrates.org",
        "1001",
        vec![concrete_balance("First", 20.0, dec!(5), dec!(1))],
    );
    prf.activation_interval = Some(ActivationInterval {
        activation_time: Utc::now() - Duration::days(30),
        expiry_time: Some(Utc::now() - Duration::days(1)),
    });
    store.set(prf).await.unwrap();
    let svc = charging_service(store.clone(), permissive_services());

    let err = svc
        .debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(1),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChargingError::ProfileNotActive(_)));

    // nothing was charged
    let stored = store.load("cgrates.org", "1001").await.unwrap();
    assert_eq!(stored.balance("First").unwrap().units, dec!(5));
}

#[tokio::test]
async fn profile_whose_filters_reject_the_event_does_not_charge() {
    let store = Arc::new(InMemoryProfileStore::new());
    let mut prf = profile(
        "cgrates.org",
        "1001",
        vec![concrete_balance("First", 20.0, dec!(5), dec!(1))],
    );
    prf.filter_ids = vec!["premium_only".to_string()];
    store.set(prf).await.unwrap();
    // "premium_only" is not in the matching set
    let services = services(
        StubFilterService::with_matching(&[]),
        StubAttributeService::default(),
        StubRateService::flat(Decimal::ZERO),
    );
    let svc = charging_service(store.clone(), services);

    let err = svc
        .debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(1),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChargingError::ProfileNotFound(_)));

    let stored = store.load("cgrates.org", "1001").await.unwrap();
    assert_eq!(stored.balance("First").unwrap().units, dec!(5));
}

#[tokio::test]
async fn empty_event_tenant_falls_back_to_the_default() {
    let store = Arc::new(InMemoryProfileStore::new());
    store
        .set(profile(
            "ocs.local",
            "1001",
            vec![concrete_balance("First", 20.0, dec!(5), dec!(1))],
        ))
        .await
        .unwrap();
    // the filter service rejects any call not carrying the default tenant
    let services = services(
        StubFilterService::requiring_tenant("ocs.local"),
        StubAttributeService::default(),
        StubRateService::flat(Decimal::ZERO),
    );
    let svc = charging_service(store.clone(), services);

    let mut ev = event("ocs.local");
    ev.tenant = String::new();
    let ec = assert_ok!(
        svc.debit_account_usage("ocs.local", "1001", dec!(2), Utc::now(), &ev)
            .await
    );
    assert_eq!(ec.consumed, dec!(2));

    let stored = store.load("ocs.local", "1001").await.unwrap();
    assert_eq!(stored.balance("First").unwrap().units, dec!(3));
}

#[tokio::test]
async fn insufficient_funds_is_success_with_residual() {
    let store = Arc::new(InMemoryProfileStore::new());
    store
        .set(profile(
            "cgrates.org",
            "1001",
            vec![concrete_balance("Only", 10.0, dec!(3), dec!(1))],
        ))
        .await
        .unwrap();
    let svc = charging_service(store.clone(), permissive_services());

    let ec = assert_ok!(
        svc.debit_account_usage(
            "cgrates.org",
            "1001",
            dec!(10),
            Utc::now(),
            &event("cgrates.org"),
        )
        .await
    );
    assert_eq!(ec.consumed, dec!(3));
    assert_eq!(ec.unfulfilled, dec!(7));
    assert!(!ec.is_fully_charged());
}
