#![allow(dead_code)]
use std::{collections::HashMap, sync::Arc};

use billing_common::{Amount, Secret};
use billing_engine::{
    db_types::{
        Commission,
        Currency,
        ExchangeRate,
        FixedPackage,
        Merchant,
        PaymentMethod,
        PaymentSystem,
        Project,
        ProjectPaymentMethod,
        VatRate,
    },
    events::EventProducers,
    geoip::{GeoIpTable, GeoRecord},
    payment_system::{HandlerSettings, PaymentSystemRegistry, SIGNED_CALLBACK},
    CommissionCalculator,
    ExchangeRates,
    OrderManagerApi,
    SqliteDatabase,
    VatCalculator,
};
use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const PROJECT_SECRET: &str = "s3cret";
pub const PS_SECRET: &str = "ps-secret";
pub const PAYMENT_URL: &str = "https://pay.example.com/checkout";
/// Resolves to GB / SCT in the test GeoIP table
pub const SCOTTISH_IP: &str = "81.2.69.160";
/// Resolves to GB with no subdivision
pub const BRITISH_IP: &str = "81.2.1.1";

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Created test database {url}");
    db
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/billing_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn tear_down(db: &SqliteDatabase) {
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        warn!("🚀️ Failed to drop test database: {e}");
    }
}

pub fn merchant(id: &str, vat: bool, to_user: bool) -> Merchant {
    Merchant {
        id: id.into(),
        name: format!("Merchant {id}"),
        currency: "USD".into(),
        is_vat_enabled: vat,
        is_commission_to_user_enabled: to_user,
    }
}

pub fn project(id: &str, merchant: Merchant) -> Project {
    let now = Utc::now();
    Project {
        id: id.into(),
        merchant,
        name: format!("Project {id}"),
        description: None,
        is_active: true,
        secret_key: Secret::new(PROJECT_SECRET.to_string()),
        callback_currency: "USD".into(),
        limits_currency: "USD".into(),
        min_payment_amount: Amount::from_f64(10.0),
        max_payment_amount: Amount::from_f64(1000.0),
        only_fixed_amounts: false,
        allow_dynamic_notify_urls: false,
        allow_dynamic_redirect_urls: false,
        payment_methods: vec![ProjectPaymentMethod {
            group_alias: "card".into(),
            payment_method_id: "pm_card".into(),
            added_at: now - Duration::hours(1),
        }],
        fixed_packages: HashMap::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn payment_system() -> PaymentSystem {
    PaymentSystem {
        id: "ps1".into(),
        name: "Acquirer".into(),
        is_active: true,
        accounting_currency: "EUR".into(),
        handler: SIGNED_CALLBACK.into(),
    }
}

pub fn card() -> PaymentMethod {
    PaymentMethod {
        id: "pm_card".into(),
        name: "Bank card".into(),
        group_alias: "card".into(),
        currency: "USD".into(),
        min_payment_amount: Amount::from_f64(1.0),
        max_payment_amount: Amount::from_f64(800.0),
        is_active: true,
        params: HashMap::new(),
        payment_system: Some(payment_system()),
    }
}

/// Currencies, rates, VAT, a card payment method and three projects:
/// * `p1`: a plain project,
/// * `p2`: VAT and payer commission enabled,
/// * `p3`: fixed packages only.
pub async fn seed_catalog(db: &SqliteDatabase) {
    for (code_int, code_a3, name) in [(840, "USD", "US Dollar"), (978, "EUR", "Euro"), (643, "RUB", "Russian Ruble")] {
        let currency = Currency { code_int, code_a3: code_a3.into(), name: name.into() };
        db.insert_currency(&currency).await.expect("Error inserting currency");
    }
    db.set_exchange_rate(&ExchangeRate::new("USD", "EUR", 0.9)).await.expect("Error setting rate");
    db.set_exchange_rate(&ExchangeRate::new("USD", "RUB", 100.0)).await.expect("Error setting rate");
    db.set_vat_rate(&VatRate { country: "GB".into(), subdivision: None, rate: 20.0 }).await.expect("Error setting VAT");
    db.set_vat_rate(&VatRate { country: "GB".into(), subdivision: Some("SCT".into()), rate: 10.0 })
        .await
        .expect("Error setting VAT");
    db.insert_payment_method(&card(), "ps1").await.expect("Error inserting payment method");

    let m1 = merchant("m1", false, false);
    let m2 = merchant("m2", true, true);
    db.insert_merchant(&m1).await.expect("Error inserting merchant");
    db.insert_merchant(&m2).await.expect("Error inserting merchant");
    db.insert_project(&project("p1", m1.clone())).await.expect("Error inserting project");
    db.insert_project(&project("p2", m2)).await.expect("Error inserting project");
    let mut p3 = project("p3", m1);
    p3.only_fixed_amounts = true;
    p3.limits_currency = "RUB".into();
    p3.min_payment_amount = Amount::from_f64(100.0);
    p3.max_payment_amount = Amount::from_f64(100_000.0);
    p3.fixed_packages.insert(
        "GB".into(),
        vec![
            FixedPackage { name: "Starter".into(), price: Amount::from_f64(500.0), currency: "RUB".into() },
            FixedPackage { name: "Pro".into(), price: Amount::from_f64(1500.0), currency: "RUB".into() },
        ],
    );
    db.insert_project(&p3).await.expect("Error inserting project");

    for project_id in ["p1", "p2", "p3"] {
        let commission = Commission {
            project_id: project_id.into(),
            payment_method_id: "pm_card".into(),
            psp_percent: 2.0,
            pm_percent: 3.0,
            pm_fixed_fee: Amount::from_f64(0.5),
            to_user_percent: 50.0,
        };
        db.set_commission(&commission).await.expect("Error setting commission");
    }
    info!("🚀️ Test catalog seeded");
}

pub fn geoip() -> GeoIpTable {
    let mut table = GeoIpTable::default();
    table.insert(
        "81.2.69.0/24".parse().unwrap(),
        GeoRecord {
            country_code: "GB".into(),
            subdivision: Some("SCT".into()),
            city: Some("Edinburgh".into()),
            timezone: Some("Europe/London".into()),
        },
    );
    table.insert("81.2.0.0/16".parse().unwrap(), GeoRecord { country_code: "GB".into(), ..Default::default() });
    table
}

pub fn registry() -> PaymentSystemRegistry {
    let mut registry = PaymentSystemRegistry::default();
    registry.configure(SIGNED_CALLBACK, HandlerSettings {
        secret: Secret::new(PS_SECRET.to_string()),
        payment_url: PAYMENT_URL.to_string(),
        params: HashMap::new(),
    });
    registry
}

pub fn order_manager(db: SqliteDatabase, producers: EventProducers) -> OrderManagerApi<SqliteDatabase> {
    OrderManagerApi::new(db, producers)
        .with_geoip(Arc::new(geoip()))
        .with_payment_systems(registry())
        .with_psp_accounting_currency(Some("EUR".to_string()))
}

/// A fully seeded order manager on a fresh database.
pub async fn setup() -> OrderManagerApi<SqliteDatabase> {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    seed_catalog(&db).await;
    order_manager(db, EventProducers::default())
}
