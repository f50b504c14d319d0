//! End-to-end: form → HTTP derive-and-check → classification → CSV exports.

use std::time::Duration;

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use seedsweep::export::{FILTERED_EXPORT_FILE, FULL_EXPORT_FILE};
use seedsweep::protocol::{BtcAddressType, ChangeType, NetworkId};
use seedsweep::service::HttpDeriveService;
use seedsweep::{build, FormState, SearchSession, StatusCategory};

const BOM: &str = "\u{feff}";

fn service_response() -> Value {
    let btc = json!({
        "address": "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
        "network": "BTC",
        "derivation_path": "m/84'/0'/0'/0/0",
        "private_key": "L1aW4aubDFB7yfras2S1mN3bqg9nwySY8nkoLmJebSLD5BWv3ENZ",
        "address_type": "BECH32",
        "balance_crypto": "0.0005",
        "balance_satoshi": 50000,
        "balance_usd": "32.10",
        "has_real_balance": true,
        "has_transactions": true,
        "explorer_link": "https://explorer.invalid/btc/bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
    });
    let trx = json!({
        "address": "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8",
        "network": "TRX",
        "derivation_path": "m/44'/195'/0'/0/0",
        "private_key": "b5a4cea271ff424d7c31dc12a3e43e401df7a40d7412a15750f3f0b6b5449a28",
        "balance_crypto": 0,
        "balance_usd": 0,
        "has_real_balance": false,
        "has_transactions": true,
        "explorer_link": "https://tronscan.org/#/address/TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"
    });
    let unchecked = json!({
        "address": "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA",
        "network": "BTC",
        "derivation_path": "m/44'/0'/0'/0/0",
        "private_key": "Kx\"quoted\",key",
        "address_type": "P2PKH"
    });

    json!({
        "success": true,
        "results": [btc.clone(), trx.clone()],
        "all_derived_wallets": [btc, trx, unchecked]
    })
}

async fn spawn_service() -> String {
    let app = Router::new().route(
        "/derive_and_check",
        post(|Json(_body): Json<Value>| async { Json(service_response()) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn form() -> FormState {
    FormState {
        seed_phrase: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about".into(),
        selected_networks: vec![NetworkId::Btc, NetworkId::Trx],
        bitcoin_address_types: vec![BtcAddressType::Bech32, BtcAddressType::P2pkh],
        account_range: "0".into(),
        address_range: "0-4".into(),
        change_types: vec![ChangeType::External],
        ..Default::default()
    }
}

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(path).unwrap();
    let body = content.strip_prefix(BOM).expect("export must start with a BOM");
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes())
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn search_classify_and_export() {
    let url = spawn_service().await;
    let service = HttpDeriveService::new(&url, Duration::from_secs(5)).unwrap();
    let session = SearchSession::new();

    let request = build(&form()).unwrap();
    let snapshot = session.run(&service, request).await.unwrap();

    let report = &snapshot.report;
    assert_eq!(report.found, 2);
    assert_eq!(report.rows[0].status, StatusCategory::HasBalance);
    assert_eq!(report.rows[0].balance_display, "50000 Satoshis");
    assert_eq!(report.rows[0].usd_display, "$32.10");
    assert_eq!(report.rows[1].status, StatusCategory::HasHistory);
    assert_eq!(report.rows[1].balance_display, "0 TRX (history)");
    assert_eq!(report.rows[1].usd_display, "N/A");
    assert_eq!(report.total_usd_display, "$32.10");
    assert!(report.format_errors.is_empty());

    let dir = tempfile::tempdir().unwrap();

    let filtered = session.export_filtered(dir.path()).unwrap();
    let rows = read_csv(&dir.path().join(FILTERED_EXPORT_FILE));
    assert_eq!(filtered.rows, 2);
    assert_eq!(rows.len(), 1 + 2 + 1);
    assert_eq!(rows[1][2], "50000 Satoshis");
    assert_eq!(rows[1][6], "https://explorer.invalid/btc/bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq");
    assert_eq!(rows[3], vec!["", "", "Total USD", "$32.10"]);

    let full = session.export_all(dir.path()).unwrap();
    let rows = read_csv(&dir.path().join(FULL_EXPORT_FILE));
    assert_eq!(full.rows, 3);
    assert_eq!(rows.len(), 1 + 3);
    assert_eq!(rows[0], vec!["Address", "Network", "Derivation Path", "Private Key", "Address Type"]);
    assert_eq!(rows[2][4], "N/A");
    assert_eq!(rows[3][3], "Kx\"quoted\",key");
}

#[tokio::test]
async fn rerunning_a_search_replaces_state_wholesale() {
    let url = spawn_service().await;
    let service = HttpDeriveService::new(&url, Duration::from_secs(5)).unwrap();
    let session = SearchSession::new();

    let first = session.run(&service, build(&form()).unwrap()).await.unwrap();
    let second = session.run(&service, build(&form()).unwrap()).await.unwrap();

    assert!(second.token > first.token);
    assert_eq!(first.report.rows, second.report.rows);
    assert_eq!(first.report.total_usd, second.report.total_usd);
    assert_eq!(second.all_derived_wallets.len(), 3);
}
