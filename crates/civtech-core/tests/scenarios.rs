//! End-to-end lifecycle scenarios against the in-memory store.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::panic
)]

use std::time::Duration;

use civtech_core::config::AuthConfig;
use civtech_core::{Attribute, CoreError, LoadFailureKind, LocalLifecycle, Session, SessionParams};
use civtech_crypto::{AttributeCipher, CancelToken, DenialReason, LocalSigner, PlaceholderCipher};
use civtech_store::{INDEX_KEY, MemoryStore, StoreClient, codec, record_key};
use civtech_types::{
    Civilization, CivilizationId, EncryptedValue, ExtraFields, OwnerAddress, TechId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// =============================================================================
// Helpers
// =============================================================================

fn lifecycle() -> LocalLifecycle {
    LocalLifecycle::local(&AuthConfig {
        reveal_latency_ms: 0,
        ..AuthConfig::default()
    })
}

fn params() -> SessionParams {
    SessionParams {
        contract_address: String::from("0xStore"),
        chain_id: 31_337,
        duration_days: 30,
    }
}

fn client(store: &MemoryStore) -> StoreClient {
    StoreClient::memory(store.clone(), Duration::from_secs(1))
}

fn player_seed() -> [u8; 32] {
    [0x50; 32]
}

fn player_address() -> OwnerAddress {
    LocalSigner::from_seed(&player_seed()).address_unchecked()
}

fn connect(store: &MemoryStore) -> Session<LocalSigner> {
    Session::connect(LocalSigner::from_seed(&player_seed()), params(), client(store)).unwrap()
}

fn roma_id() -> CivilizationId {
    CivilizationId::from("a")
}

fn roma() -> Civilization {
    let cipher = PlaceholderCipher::new();
    Civilization {
        id: roma_id(),
        name: String::from("Roma"),
        research_points: cipher.encrypt(dec!(250)),
        military_power: cipher.encrypt(dec!(10)),
        discovered_technologies: vec![TechId::from("mining")],
        last_updated: 1_700_000_000,
        owner: player_address(),
        version: 0,
        extra_fields: ExtraFields::new(),
    }
}

async fn seed(store: &MemoryStore, civs: &[Civilization]) {
    let ids: Vec<CivilizationId> = civs.iter().map(|c| c.id.clone()).collect();
    store.put_raw(INDEX_KEY, &codec::encode_index(&ids).unwrap()).await;
    for civ in civs {
        store
            .put_raw(&record_key(&civ.id), &codec::encode_record(civ).unwrap())
            .await;
    }
}

async fn stored(store: &MemoryStore, id: &str) -> Civilization {
    let id = CivilizationId::from(id);
    let bytes = store.raw(&record_key(&id)).await.expect("record present");
    codec::decode_record(&id, &bytes).unwrap()
}

fn decrypt(token: &EncryptedValue) -> Decimal {
    PlaceholderCipher::new().decrypt(token).unwrap()
}

// =============================================================================
// Research
// =============================================================================

#[tokio::test]
async fn researching_metallurgy_spends_one_hundred_points() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let outcome = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.remaining_points, dec!(150));
    let civ = stored(&store, "a").await;
    assert_eq!(
        civ.discovered_technologies,
        vec![TechId::from("mining"), TechId::from("metallurgy")]
    );
    assert_eq!(decrypt(&civ.research_points), dec!(150));
    assert_eq!(decrypt(&civ.military_power), dec!(10));
    assert_eq!(civ.version, 1);

    let dir = session.directory().await;
    assert_eq!(dir.player().unwrap().discovered_technologies.len(), 2);
}

#[tokio::test]
async fn unmet_prerequisite_leaves_record_untouched() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    let writes = store.write_count().await;

    let err = lifecycle()
        .research(&session, &roma_id(), "architecture", &CancelToken::new())
        .await
        .unwrap_err();

    match err {
        CoreError::PrerequisiteUnmet { tech, missing } => {
            assert_eq!(tech.as_str(), "architecture");
            assert_eq!(missing, vec![TechId::from("mathematics")]);
        }
        other => panic!("expected PrerequisiteUnmet, got {other:?}"),
    }
    assert_eq!(stored(&store, "a").await, roma());
    assert_eq!(store.write_count().await, writes);
}

#[tokio::test]
async fn insufficient_points_leaves_record_untouched() {
    let store = MemoryStore::new();
    let poor = Civilization {
        research_points: PlaceholderCipher::new().encrypt(dec!(99)),
        ..roma()
    };
    seed(&store, &[poor.clone()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "agriculture", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::InsufficientPoints { available, required }
            if available == dec!(99) && required == dec!(100)
    ));
    assert_eq!(err.reason(), "Not enough research points");
    assert_eq!(stored(&store, "a").await, poor);
}

#[tokio::test]
async fn re_researching_is_rejected_without_charge() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "mining", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::AlreadyDiscovered(ref t) if t.as_str() == "mining"));
    assert_eq!(stored(&store, "a").await, roma());
}

#[tokio::test]
async fn unknown_technology_is_rejected() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "time_travel", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownTechnology(_)));
    assert_eq!(err.reason(), "Technology not found");
}

#[tokio::test]
async fn rejected_signature_writes_nothing() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    session.signer().set_rejecting(true);
    let writes = store.write_count().await;

    let err = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::NotAuthorized(DenialReason::Rejected)));
    assert_eq!(store.write_count().await, writes);
    assert_eq!(stored(&store, "a").await, roma());
}

#[tokio::test]
async fn concurrent_change_is_detected_as_stale() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    // Another session researches first.
    let other = connect(&store);
    other.sync().await.unwrap();
    lifecycle()
        .research(&other, &roma_id(), "agriculture", &CancelToken::new())
        .await
        .unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StaleRecord { expected: 0, found: 1 }));

    let civ = stored(&store, "a").await;
    assert_eq!(
        civ.discovered_technologies,
        vec![TechId::from("mining"), TechId::from("agriculture")]
    );

    // After re-syncing the request goes through.
    session.sync().await.unwrap();
    let outcome = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.remaining_points, dec!(50));
}

#[tokio::test]
async fn deleted_record_is_not_found() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    store.delete("civilization_a").await.unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CivilizationNotFound));
}

#[tokio::test]
async fn research_without_a_civilization_is_not_found() {
    let store = MemoryStore::new();
    let mut foreign = roma();
    foreign.owner = OwnerAddress::from("0xSomeoneElse");
    seed(&store, &[foreign]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let err = lifecycle()
        .research(&session, &roma_id(), "agriculture", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CivilizationNotFound));
}

#[tokio::test]
async fn cancelled_research_writes_nothing() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
    assert_eq!(stored(&store, "a").await, roma());
}

#[tokio::test]
async fn failed_write_surfaces_and_keeps_prior_state() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    store.fail_writes("civilization_a").await;

    let err = lifecycle()
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::WriteFailed { .. }));
    assert_eq!(stored(&store, "a").await, roma());
}

#[tokio::test]
async fn disconnected_session_is_refused() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    session.disconnect().await;

    let lifecycle = lifecycle();
    assert!(matches!(
        lifecycle.research(&session, &roma_id(), "metallurgy", &CancelToken::new()).await,
        Err(CoreError::NotConnected)
    ));
    assert!(matches!(
        lifecycle.create(&session, "Athens", dec!(1), dec!(1)).await,
        Err(CoreError::NotConnected)
    ));
    assert!(session.directory().await.is_empty());
}

#[tokio::test]
async fn research_targets_the_chosen_civilization() {
    let store = MemoryStore::new();
    let older = Civilization {
        last_updated: 100,
        ..roma()
    };
    let newer = Civilization {
        id: CivilizationId::from("b"),
        name: String::from("Carthage"),
        discovered_technologies: Vec::new(),
        last_updated: 200,
        ..roma()
    };
    seed(&store, &[older, newer.clone()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    assert_eq!(session.directory().await.players().count(), 2);

    let lifecycle = lifecycle();
    let outcome = lifecycle
        .research(&session, &roma_id(), "metallurgy", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.civilization.id, roma_id());
    assert_eq!(
        stored(&store, "a").await.discovered_technologies,
        vec![TechId::from("mining"), TechId::from("metallurgy")]
    );
    assert_eq!(stored(&store, "b").await, newer);

    let err = lifecycle
        .research(&session, &newer.id, "metallurgy", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PrerequisiteUnmet { .. }));

    let power = lifecycle
        .reveal(&session, &newer.id, Attribute::MilitaryPower, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(power, dec!(10));
}

#[tokio::test]
async fn foreign_or_unknown_civilization_is_not_found() {
    let store = MemoryStore::new();
    let foreign = Civilization {
        id: CivilizationId::from("f"),
        owner: OwnerAddress::from("0xSomeoneElse"),
        ..roma()
    };
    seed(&store, &[roma(), foreign.clone()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    let lifecycle = lifecycle();

    for id in [foreign.id.clone(), CivilizationId::from("nope")] {
        let err = lifecycle
            .research(&session, &id, "agriculture", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CivilizationNotFound));

        let err = lifecycle
            .reveal(&session, &id, Attribute::ResearchPoints, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CivilizationNotFound));
    }
    assert_eq!(stored(&store, "f").await, foreign);
}

#[tokio::test]
async fn research_keeps_fields_written_by_other_clients() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let mut raw: serde_json::Value =
        serde_json::from_slice(&store.raw("civilization_a").await.unwrap()).unwrap();
    raw["era"] = serde_json::Value::from("ancient");
    store
        .put_raw("civilization_a", &serde_json::to_vec(&raw).unwrap())
        .await;
    let session = connect(&store);
    session.sync().await.unwrap();

    lifecycle()
        .research(&session, &roma_id(), "agriculture", &CancelToken::new())
        .await
        .unwrap();

    let after: serde_json::Value =
        serde_json::from_slice(&store.raw("civilization_a").await.unwrap()).unwrap();
    assert_eq!(after["era"], "ancient");
    assert_eq!(after["version"], 1);
    assert_eq!(after["discoveredTechnologies"][1], "agriculture");
}

#[tokio::test]
async fn out_of_order_history_is_reported() {
    let store = MemoryStore::new();
    let skipped = Civilization {
        discovered_technologies: vec![TechId::from("metallurgy"), TechId::from("mining")],
        ..roma()
    };
    seed(&store, &[skipped]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let lifecycle = lifecycle();
    let violations = lifecycle.order_violations(&*session.directory().await);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].0, roma_id());
    assert_eq!(violations[0].1.tech.as_str(), "metallurgy");
    assert_eq!(violations[0].1.prerequisite.as_str(), "mining");

    store
        .put_raw("civilization_a", &codec::encode_record(&roma()).unwrap())
        .await;
    session.sync().await.unwrap();
    assert!(lifecycle.order_violations(&*session.directory().await).is_empty());
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn create_writes_record_then_index() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);

    let id = lifecycle()
        .create(&session, "  Athens  ", dec!(300), dec!(25))
        .await
        .unwrap();

    let index = codec::decode_index(&store.raw(INDEX_KEY).await.unwrap()).unwrap();
    assert_eq!(index, vec![CivilizationId::from("a"), id.clone()]);

    let civ = stored(&store, id.as_str()).await;
    assert_eq!(civ.name, "Athens");
    assert!(civ.discovered_technologies.is_empty());
    assert_eq!(civ.owner, player_address());
    assert_eq!(civ.version, 0);
    assert_eq!(decrypt(&civ.research_points), dec!(300));
    assert_eq!(decrypt(&civ.military_power), dec!(25));

    let dir = session.directory().await;
    assert_eq!(dir.len(), 2);
    assert_eq!(dir.player().unwrap().id, id);
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let store = MemoryStore::new();
    let session = connect(&store);
    let err = lifecycle()
        .create(&session, "   ", dec!(1), dec!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidName));
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn failed_index_write_removes_the_orphaned_record() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    store.fail_writes(INDEX_KEY).await;
    let session = connect(&store);

    let err = lifecycle()
        .create(&session, "Athens", dec!(1), dec!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::WriteFailed { .. }));

    let index = codec::decode_index(&store.raw(INDEX_KEY).await.unwrap()).unwrap();
    assert_eq!(index, vec![CivilizationId::from("a")]);

    session.sync().await.unwrap();
    assert_eq!(session.directory().await.len(), 1);
    // Only Roma's record remains.
    let dir = session.directory().await;
    assert_eq!(dir.entries[0].civilization.id.as_str(), "a");
}

#[tokio::test(start_paused = true)]
async fn create_reports_the_id_when_the_follow_up_sync_is_refused() {
    let store = MemoryStore::new();
    store.set_latency(Duration::from_millis(50)).await;
    let session = connect(&store);
    let lifecycle = lifecycle();

    // Record write, index read, and index write take 150ms; the identity
    // drops before the re-sync.
    let (created, ()) = tokio::join!(
        lifecycle.create(&session, "Athens", dec!(5), dec!(5)),
        async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            session.signer().set_connected(false);
        }
    );

    let id = created.unwrap();
    let index = codec::decode_index(&store.raw(INDEX_KEY).await.unwrap()).unwrap();
    assert_eq!(index, vec![id.clone()]);
    assert_eq!(stored(&store, id.as_str()).await.name, "Athens");
    assert!(matches!(session.sync().await, Err(CoreError::NotConnected)));
}

#[tokio::test]
async fn create_on_empty_store_starts_the_index() {
    let store = MemoryStore::new();
    let session = connect(&store);
    let id = lifecycle()
        .create(&session, "Babylon", dec!(0), dec!(0))
        .await
        .unwrap();
    let index = codec::decode_index(&store.raw(INDEX_KEY).await.unwrap()).unwrap();
    assert_eq!(index, vec![id]);
}

// =============================================================================
// Reveal
// =============================================================================

#[tokio::test]
async fn reveal_returns_each_attribute() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();
    let lifecycle = lifecycle();
    let cancel = CancelToken::new();

    assert_eq!(
        lifecycle
            .reveal(&session, &roma_id(), Attribute::ResearchPoints, &cancel)
            .await
            .unwrap(),
        dec!(250)
    );
    assert_eq!(
        lifecycle
            .reveal(&session, &roma_id(), Attribute::MilitaryPower, &cancel)
            .await
            .unwrap(),
        dec!(10)
    );
}

#[tokio::test(start_paused = true)]
async fn slow_decryption_times_out() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    let session = connect(&store);
    session.sync().await.unwrap();

    let slow = LocalLifecycle::local(&AuthConfig {
        reveal_latency_ms: 5_000,
        reveal_timeout_ms: 100,
        ..AuthConfig::default()
    });
    let err = slow
        .reveal(&session, &roma_id(), Attribute::ResearchPoints, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout(_)));
}

// =============================================================================
// Directory
// =============================================================================

#[tokio::test]
async fn one_malformed_record_of_three_is_skipped() {
    let store = MemoryStore::new();
    let mut b = roma();
    b.id = CivilizationId::from("b");
    let mut c = roma();
    c.id = CivilizationId::from("c");
    seed(&store, &[roma(), b, c]).await;
    store.put_raw("civilization_b", b"\x00garbage").await;
    let session = connect(&store);

    let report = session.sync().await.unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, LoadFailureKind::Parse);
    assert_eq!(session.directory().await.len(), 2);
}

#[tokio::test]
async fn missing_index_is_an_empty_directory() {
    let session = connect(&MemoryStore::new());
    let report = session.sync().await.unwrap();
    assert!(report.failures.is_empty());
    assert!(session.directory().await.is_empty());
}

#[tokio::test]
async fn unavailable_store_loads_empty_without_error() {
    let store = MemoryStore::new();
    seed(&store, &[roma()]).await;
    store.set_unavailable(true).await;
    let session = connect(&store);

    let report = session.sync().await.unwrap();
    assert!(!report.store_available);
    assert!(session.directory().await.is_empty());
}
