//! Shared fixtures for the integration tests: a destination schema matching
//! the collection registry and helpers that write JSON source exports.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        phone TEXT,
        migrated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        migrated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE accounts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        name TEXT NOT NULL,
        bsb TEXT,
        account_number TEXT,
        migrated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE transactions (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL REFERENCES accounts(id),
        category_id TEXT REFERENCES categories(id),
        amount REAL NOT NULL,
        gst_amount REAL,
        description TEXT,
        occurred_at TEXT NOT NULL,
        migrated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE budgets (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        category_id TEXT NOT NULL REFERENCES categories(id),
        amount REAL NOT NULL,
        period TEXT NOT NULL,
        migrated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
];

pub struct Fixture {
    pub tmp: TempDir,
    pub db_path: PathBuf,
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let db_path = tmp.path().join("ledger.sqlite3");
        let source_dir = tmp.path().join("data");
        let out_dir = tmp.path().join("reports");
        fs::create_dir_all(&source_dir).expect("create source dir");
        Self {
            tmp,
            db_path,
            source_dir,
            out_dir,
        }
    }
}

pub async fn prepare_database(db_path: &Path) -> SqlitePool {
    let pool = ledgerlift::db::open_pool(db_path, 5, true)
        .await
        .expect("open database");
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&pool).await.expect("apply schema");
    }
    pool
}

pub fn write_collection(source_dir: &Path, file: &str, rows: &[Value]) {
    fs::write(
        source_dir.join(file),
        serde_json::to_vec_pretty(&Value::Array(rows.to_vec())).expect("serialize rows"),
    )
    .expect("write source file");
}

/// A coherent little ledger: 3 users, 2 categories, 5 accounts and 20
/// GST-correct transactions plus 2 budgets.
pub fn write_clean_sources(source_dir: &Path) {
    write_collection(
        source_dir,
        "users.json",
        &[
            json!({"id": "u1", "email": "ada@example.com", "full_name": "Ada Moore", "phone": "0412345678"}),
            json!({"id": "u2", "email": "ben@example.com", "full_name": "Ben Ng"}),
            json!({"id": "u3", "email": "cam@example.com", "full_name": "Cam Reid", "phone": "+61298765432"}),
        ],
    );
    write_collection(
        source_dir,
        "categories.json",
        &[
            json!({"id": "c1", "name": "Groceries", "kind": "expense"}),
            json!({"id": "c2", "name": "Salary", "kind": "income"}),
        ],
    );
    write_collection(
        source_dir,
        "accounts.json",
        &[
            json!({"id": "a1", "user_id": "u1", "name": "Everyday", "bsb": "062-000", "account_number": "12345678"}),
            json!({"id": "a2", "user_id": "u1", "name": "Savings", "bsb": "062-000", "account_number": "87654321"}),
            json!({"id": "a3", "user_id": "u2", "name": "Everyday", "bsb": "013-006", "account_number": "11112222"}),
            json!({"id": "a4", "user_id": "u3", "name": "Everyday", "bsb": "733-100", "account_number": "33334444"}),
            json!({"id": "a5", "user_id": "u3", "name": "Offset", "bsb": "733-100", "account_number": "55556666"}),
        ],
    );

    let accounts = ["a1", "a2", "a3", "a4", "a5"];
    let mut transactions = Vec::new();
    for i in 0..20u32 {
        let amount = 11.0 * f64::from(i + 1);
        transactions.push(json!({
            "id": format!("t{i}"),
            "account_id": accounts[(i as usize) % accounts.len()],
            "category_id": if i % 2 == 0 { "c1" } else { "c2" },
            "amount": amount,
            "gst_amount": amount / 11.0,
            "description": format!("line item {i}"),
            "occurred_at": format!("2026-01-{:02}T10:00:00Z", (i % 28) + 1),
        }));
    }
    write_collection(source_dir, "transactions.json", &transactions);

    write_collection(
        source_dir,
        "budgets.json",
        &[
            json!({"id": "b1", "user_id": "u1", "category_id": "c1", "amount": 600.0, "period": "2026-01"}),
            json!({"id": "b2", "user_id": "u2", "category_id": "c1", "amount": 450.0, "period": "2026-01"}),
        ],
    );
}
