//! End-to-end import tests against the in-memory store.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{json, Value};

use regsync_core::types::{Finance, InnRecord, Organization};
use regsync_core::{Entity, EntityKind, NaturalKey, Payload};
use regsync_graph::{EntityStore, GraphError, MemoryStore};
use regsync_import::builder::GraphBuilder;
use regsync_import::config::LockConfig;
use regsync_import::resolver::IdentityResolver;
use regsync_import::unit_of_work::UnitOfWork;
use regsync_import::{ImportOutcome, Importer, LockRegistry, SyncError};

const FIXTURE_INN: &str = "7736207543";

fn fixture() -> Payload {
    Payload::from_slice(include_bytes!("fixtures/organization.json")).unwrap()
}

fn payload(data: Value) -> Payload {
    serde_json::from_value(json!({ "data": data })).unwrap()
}

fn importer(store: MemoryStore) -> Importer<MemoryStore> {
    Importer::new(store, LockRegistry::new(), LockConfig::default())
}

fn organization(store: &MemoryStore, inn: &str) -> Option<Organization> {
    match store.get(&NaturalKey::Organization {
        inn: inn.to_string(),
    }) {
        Some(Entity::Organization(org)) => Some(org),
        _ => None,
    }
}

fn with_authority(inn: &str) -> Value {
    json!({
        "inn": inn,
        "authorities": {
            "fts_registration": {
                "type": "FEDERAL_TAX_SERVICE",
                "code": "7746",
                "name": "Межрайонная инспекция ФНС № 46 по г. Москве",
                "address": null
            },
            "pf": null
        }
    })
}

fn with_finance(inn: &str, income: u64) -> Value {
    json!({
        "inn": inn,
        "finance": {"income": income, "expense": 50, "debt": 0, "penalty": 0}
    })
}

fn finance_row(inn: &str, income: &str) -> Entity {
    Entity::Finance(Finance {
        org_inn: inn.to_string(),
        tax_system: None,
        income: Some(Decimal::from_str(income).unwrap()),
        expense: Some(Decimal::from_str("50.00").unwrap()),
        debt: Some(Decimal::ZERO),
        penalty: Some(Decimal::ZERO),
    })
}

// ── Full graph ────────────────────────────────────────────────────

#[tokio::test]
async fn fixture_import_creates_full_graph() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    let outcome = importer.import(&fixture()).await.unwrap();
    let ImportOutcome::Created { inn, summary, .. } = outcome else {
        panic!("expected a created outcome, got {outcome:?}");
    };
    assert_eq!(inn, FIXTURE_INN);
    assert_eq!(summary.created(EntityKind::Organization), 1);

    let expected = [
        (EntityKind::Organization, 1),
        (EntityKind::Person, 1),
        (EntityKind::ForeignOrganization, 1),
        (EntityKind::Founder, 2),
        (EntityKind::Manager, 1),
        (EntityKind::OrganizationFounder, 2),
        (EntityKind::OrganizationManager, 1),
        (EntityKind::Okved, 2),
        (EntityKind::OrganizationOkved, 2),
        (EntityKind::Authority, 4),
        (EntityKind::OrganizationAuthority, 4),
        (EntityKind::Document, 4),
        (EntityKind::RegistrySmb, 1),
        (EntityKind::Finance, 1),
        (EntityKind::Address, 1),
        (EntityKind::Region, 1),
        (EntityKind::Area, 0),
        (EntityKind::City, 1),
        (EntityKind::Settlement, 0),
        (EntityKind::Street, 1),
        (EntityKind::License, 1),
    ];
    for (kind, count) in expected {
        assert_eq!(store.count(kind), count, "{kind} rows");
    }

    let org = organization(&store, FIXTURE_INN).unwrap();
    assert_eq!(org.management_inn.as_deref(), Some("772167914523"));
    assert_eq!(org.ogrn.as_deref(), Some("1027700229193"));

    match store.get(&NaturalKey::Person {
        inn: "772167914523".to_string(),
    }) {
        Some(Entity::Person(person)) => assert_eq!(person.gender.as_deref(), Some("male")),
        other => panic!("expected the manager's person row, got {other:?}"),
    }
    assert_eq!(org.status.as_deref(), Some("ACTIVE"));
    assert!(org.registration_date.is_some());
    assert!(org.liquidation_date.is_none());

    assert_eq!(importer.cached_entries(), 0);
    assert_eq!(importer.tracked_entities(), 0);
}

#[tokio::test]
async fn repeat_import_of_known_organization_is_skipped() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    importer.import(&fixture()).await.unwrap();
    let rows = store.total();

    let outcome = importer.import(&fixture()).await.unwrap();
    assert_eq!(
        outcome,
        ImportOutcome::Skipped {
            inn: FIXTURE_INN.to_string()
        }
    );
    assert_eq!(outcome.inn(), FIXTURE_INN);
    assert_eq!(store.total(), rows);
}

#[tokio::test]
async fn builder_rejects_existing_organization() {
    let mut store = MemoryStore::new();
    store.seed(Entity::Organization(Organization {
        inn: FIXTURE_INN.to_string(),
        ..Default::default()
    }));

    let mut uow = UnitOfWork::new();
    let mut resolver = IdentityResolver::new();
    let mut builder = GraphBuilder::new(&mut store, &mut uow, &mut resolver);
    let err = builder.build(&fixture().data).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyExists { inn } if inn == FIXTURE_INN));
}

// ── Identity resolution ───────────────────────────────────────────

#[tokio::test]
async fn shared_authority_is_reused_across_imports() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    importer.import(&payload(with_authority("7707083893"))).await.unwrap();
    let second = importer.import(&payload(with_authority("7728168971"))).await.unwrap();

    assert_eq!(store.count(EntityKind::Authority), 1);
    assert_eq!(store.count(EntityKind::OrganizationAuthority), 2);
    let ImportOutcome::Created { summary, .. } = second else {
        panic!("expected a created outcome");
    };
    assert_eq!(summary.attached(EntityKind::Authority), 1);
    assert_eq!(summary.created(EntityKind::Authority), 0);
}

#[tokio::test]
async fn authority_repeated_under_two_roles_is_created_once() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());
    let authority = json!({"type": "FEDERAL_TAX_SERVICE", "code": "7746", "name": "ИФНС 46"});

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "authorities": {"fts_registration": authority, "fts_report": authority}
        })))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Authority), 1);
    assert_eq!(store.count(EntityKind::OrganizationAuthority), 2);
}

#[tokio::test]
async fn geography_is_shared_between_organizations() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());
    let address = |inn: &str, fias_id: &str| {
        payload(json!({
            "inn": inn,
            "address": {
                "value": "г Москва",
                "data": {
                    "fias_id": fias_id,
                    "region": "Москва",
                    "region_fias_id": "0c5b2444-70a0-4932-980c-b4dc0d3f02b5",
                    "region_type_full": "город"
                }
            }
        }))
    };

    importer.import(&address("7707083893", "addr-1")).await.unwrap();
    importer.import(&address("7728168971", "addr-2")).await.unwrap();

    assert_eq!(store.count(EntityKind::Region), 1);
    assert_eq!(store.count(EntityKind::Address), 2);
}

#[tokio::test]
async fn person_holding_two_roles_is_created_once() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());
    let fio = json!({"surname": "Петров", "name": "Иван", "patronymic": "Сергеевич"});

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "founders": [{"type": "PHYSICAL", "inn": "500100732259", "fio": fio}],
            "managers": [{"type": "EMPLOYEE", "inn": "500100732259", "fio": fio, "post": "ДИРЕКТОР"}]
        })))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Person), 1);
    assert_eq!(store.count(EntityKind::Founder), 1);
    assert_eq!(store.count(EntityKind::Manager), 1);
}

#[tokio::test]
async fn repeated_pairs_keep_a_single_link_with_first_attributes() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());
    let fio = json!({"surname": "Петров", "name": "Иван", "patronymic": "Сергеевич"});

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "founders": [
                {"type": "PHYSICAL", "inn": "500100732259", "fio": fio, "share": {"type": "PERCENT", "value": 50}},
                {"type": "PHYSICAL", "inn": "500100732259", "fio": fio, "share": {"type": "PERCENT", "value": 25}}
            ],
            "okveds": [
                {"code": "62.01", "main": true, "name": "Разработка компьютерного программного обеспечения"},
                {"code": "62.01", "main": false, "name": "Другое название"}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Okved), 1);
    match store.rows(EntityKind::Okved).as_slice() {
        [Entity::Okved(okved)] => assert_eq!(
            okved.name.as_deref(),
            Some("Разработка компьютерного программного обеспечения")
        ),
        rows => panic!("unexpected okved rows: {rows:?}"),
    }
    match store.rows(EntityKind::OrganizationOkved).as_slice() {
        [Entity::OrganizationOkved(link)] => assert!(link.is_main),
        rows => panic!("unexpected okved links: {rows:?}"),
    }

    assert_eq!(store.count(EntityKind::Person), 1);
    assert_eq!(store.count(EntityKind::Founder), 1);
    match store.rows(EntityKind::OrganizationFounder).as_slice() {
        [Entity::OrganizationFounder(link)] => {
            assert_eq!(link.share_value, Some(Decimal::from(50)));
        }
        rows => panic!("unexpected founder links: {rows:?}"),
    }
}

#[tokio::test]
async fn okved_shared_between_organizations_gets_one_link_each() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    for inn in ["7707083893", "7736207543"] {
        importer
            .import(&payload(json!({
                "inn": inn,
                "okveds": [{"code": "62.01", "main": true, "type": "2014"}]
            })))
            .await
            .unwrap();
    }

    assert_eq!(store.count(EntityKind::Okved), 1);
    assert_eq!(store.count(EntityKind::OrganizationOkved), 2);
}

#[tokio::test]
async fn holder_without_inn_or_hid_is_rejected() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    let err = importer
        .import(&payload(json!({
            "inn": "7707083893",
            "founders": [{"type": "PHYSICAL", "fio": {"surname": "Петров"}}]
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(store.total(), 0);
}

#[tokio::test]
async fn unrecognized_documents_are_skipped() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "documents": [
                {"type": "FTS_REGISTRATION", "series": "77", "number": "016549284"},
                {"type": "RPN_NOTICE", "number": "1"}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Document), 1);
}

// ── Finance ───────────────────────────────────────────────────────

#[tokio::test]
async fn unchanged_finance_figures_reuse_the_existing_row() {
    let store = MemoryStore::new();
    store.seed(finance_row("7707083893", "100.00"));
    let mut importer = importer(store.session());

    let outcome = importer
        .import(&payload(with_finance("7707083893", 100)))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Finance), 1);
    let ImportOutcome::Created { summary, .. } = outcome else {
        panic!("expected a created outcome");
    };
    assert_eq!(summary.attached(EntityKind::Finance), 1);
}

#[tokio::test]
async fn changed_finance_figures_append_a_row() {
    let store = MemoryStore::new();
    store.seed(finance_row("7707083893", "100"));
    let mut importer = importer(store.session());

    importer
        .import(&payload(with_finance("7707083893", 200)))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Finance), 2);
}

#[tokio::test]
async fn empty_finance_and_smb_are_skipped() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "finance": {"tax_system": null, "income": null},
            "documents": {"smb": {"type": null, "category": null}}
        })))
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Finance), 0);
    assert_eq!(store.count(EntityKind::RegistrySmb), 0);
}

// ── Management identifier ─────────────────────────────────────────

#[tokio::test]
async fn management_inn_is_taken_from_matching_manager() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    importer
        .import(&payload(json!({
            "inn": "7707083893",
            "management": {"name": "Ivan Petrov", "post": "CEO"},
            "managers": [{
                "type": "EMPLOYEE",
                "inn": "111",
                "fio": {"surname": "Petrov", "name": "Ivan", "patronymic": ""}
            }]
        })))
        .await
        .unwrap();

    let org = organization(&store, "7707083893").unwrap();
    assert_eq!(org.management_inn.as_deref(), Some("111"));
}

// ── Transactions & failure handling ───────────────────────────────

#[tokio::test]
async fn storage_failure_leaves_nothing_persisted() {
    let store = MemoryStore::new();
    store.fail_inserts_of(EntityKind::License);
    let mut importer = importer(store.session());

    let err = importer.import(&fixture()).await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(GraphError::Backend(_))));

    assert_eq!(store.total(), 0);
    assert_eq!(importer.cached_entries(), 0);
    assert_eq!(importer.tracked_entities(), 0);
}

#[tokio::test]
async fn closed_session_is_revived_on_next_import() {
    let store = MemoryStore::new();
    store.fail_inserts_of(EntityKind::License);
    let mut importer = importer(store.session());

    assert!(importer.import(&fixture()).await.is_err());
    assert!(!importer.store().is_open());

    store.clear_failures();
    let outcome = importer.import(&fixture()).await.unwrap();
    assert!(matches!(outcome, ImportOutcome::Created { .. }));
    assert!(importer.store().is_open());
    assert_eq!(store.count(EntityKind::Organization), 1);
    assert_eq!(store.count(EntityKind::License), 1);
}

#[tokio::test]
async fn statement_logging_is_restored_after_run() {
    let store = MemoryStore::new();
    store.fail_inserts_of(EntityKind::Organization);
    let mut importer = importer(store.session());

    assert!(importer.store().statement_logging());
    assert!(importer.import(&payload(json!({"inn": "7707083893"}))).await.is_err());
    assert!(importer.store().statement_logging());
}

#[tokio::test]
async fn empty_inn_is_rejected() {
    let mut importer = importer(MemoryStore::new());
    let err = importer
        .import(&payload(json!({"inn": "  "})))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}

// ── Parse registry ────────────────────────────────────────────────

#[tokio::test]
async fn inn_record_is_stamped_when_present() {
    let store = MemoryStore::new();
    store.seed(Entity::InnRecord(InnRecord {
        inn: FIXTURE_INN.to_string(),
        name: Some("ЯНДЕКС".to_string()),
        last_parsed_at: None,
    }));
    let mut importer = importer(store.session());

    let outcome = importer.import(&fixture()).await.unwrap();
    let ImportOutcome::Created { summary, .. } = outcome else {
        panic!("expected a created outcome");
    };
    assert_eq!(summary.updated(EntityKind::InnRecord), 1);

    let key = NaturalKey::InnRecord {
        inn: FIXTURE_INN.to_string(),
    };
    let Some(Entity::InnRecord(record)) = store.get(&key) else {
        panic!("inn record missing");
    };
    assert!(record.last_parsed_at.is_some());
    assert_eq!(record.name.as_deref(), Some("ЯНДЕКС"));
}

#[tokio::test]
async fn missing_inn_record_does_not_fail_the_run() {
    let store = MemoryStore::new();
    let mut importer = importer(store.session());

    assert!(importer.import(&fixture()).await.is_ok());
    assert_eq!(store.count(EntityKind::InnRecord), 0);
}

// ── Locking ───────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_imports_share_one_authority() {
    let store = MemoryStore::new();
    let locks = LockRegistry::new();

    let mut first = Importer::new(store.session(), locks.clone(), LockConfig::default());
    let mut second = Importer::new(store.session(), locks.clone(), LockConfig::default());
    let a = payload(with_authority("7707083893"));
    let b = payload(with_authority("7728168971"));

    let first = tokio::spawn(async move { first.import(&a).await });
    let second = tokio::spawn(async move { second.import(&b).await });

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(store.count(EntityKind::Authority), 1);
    assert_eq!(store.count(EntityKind::OrganizationAuthority), 2);
}

#[tokio::test]
async fn held_lock_times_out_without_writing() {
    let store = MemoryStore::new();
    let locks = LockRegistry::new();
    let config = LockConfig {
        timeout_secs: 0,
        ..LockConfig::default()
    };
    let _held = locks
        .acquire(&config.name, Duration::from_secs(1))
        .await
        .unwrap();

    let mut importer = Importer::new(store.session(), locks.clone(), config);
    let err = importer.import(&fixture()).await.unwrap_err();

    assert!(matches!(err, SyncError::LockTimeout { .. }));
    assert_eq!(store.total(), 0);
}

#[tokio::test]
async fn disabled_lock_is_not_taken() {
    let store = MemoryStore::new();
    let locks = LockRegistry::new();
    let config = LockConfig {
        enabled: false,
        ..LockConfig::default()
    };
    let _held = locks
        .acquire(&config.name, Duration::from_secs(1))
        .await
        .unwrap();

    let mut importer = Importer::new(store.session(), locks.clone(), config);
    assert!(importer.import(&fixture()).await.is_ok());
}
