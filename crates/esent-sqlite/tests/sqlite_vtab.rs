//! End-to-end tests: `esentvtab` on a bundled SQLite over the in-memory engine.

use std::sync::Arc;

use esent_engine::{CatalogColumn, EngineStep, JetError, MemoryEngine};
use esent_types::JetColumnType;
use esent_vtab::VtabConfig;
use rusqlite::Connection;

const DB: &str = "/data/mail.edb";
const EPOCH_TICKS: i64 = 116_444_736_000_000_000;

fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn mail_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.create_table(
        DB,
        "Messages",
        &[
            CatalogColumn::new(1, "Id", JetColumnType::Long),
            CatalogColumn::new(2, "Subject", JetColumnType::LongText),
            CatalogColumn::new(3, "Received", JetColumnType::LongLong),
            CatalogColumn::new(4, "Attachment", JetColumnType::SLV),
        ],
    );
    let rows = [(1, Some("hello"), 0), (2, None, 86_400), (3, Some("héllo wörld"), 60)];
    for (id, subject, secs) in rows {
        let ticks: i64 = EPOCH_TICKS + secs * 10_000_000;
        engine.insert_row(
            DB,
            "Messages",
            vec![
                Some(i32::to_le_bytes(id).to_vec()),
                subject.map(utf16),
                Some(ticks.to_le_bytes().to_vec()),
                Some(vec![0xAB; 8]),
            ],
        );
    }
    engine
}

fn connect(engine: &MemoryEngine, config: VtabConfig) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    esent_sqlite::register(&conn, Arc::new(engine.clone()), config).unwrap();
    conn
}

fn create_mail(conn: &Connection) {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE mail USING esentvtab('{DB}', Messages)"
    ))
    .unwrap();
}

#[test]
fn test_scan_returns_rows_in_storage_order() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    let mut stmt = conn.prepare("SELECT rowid, Id, Subject FROM mail").unwrap();
    let rows: Vec<(i64, i64, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(
        rows,
        [
            (1, 1, Some("hello".to_owned())),
            (2, 2, None),
            (3, 3, Some("héllo wörld".to_owned())),
        ]
    );
}

#[test]
fn test_declared_types_follow_the_catalog() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    let mut stmt = conn.prepare("PRAGMA table_info(mail)").unwrap();
    let columns: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(
        columns,
        [
            ("Id".to_owned(), "INT".to_owned()),
            ("Subject".to_owned(), "TEXT".to_owned()),
            ("Received".to_owned(), "BIGINT".to_owned()),
            ("Attachment".to_owned(), "UNKNOWN".to_owned()),
        ]
    );
}

#[test]
fn test_predicates_are_evaluated_by_the_host() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    let total: i64 = conn
        .query_row("SELECT count(*) FROM mail", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 3);
    let ids: Vec<i64> = conn
        .prepare("SELECT Id FROM mail WHERE Subject LIKE 'h%' ORDER BY Id DESC")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(ids, [3, 1]);
    let none: i64 = conn
        .query_row("SELECT count(*) FROM mail WHERE Id > 100", [], |row| row.get(0))
        .unwrap();
    assert_eq!(none, 0);
}

#[test]
fn test_wintime_converts_filetime_columns() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    let secs: Vec<i64> = conn
        .prepare("SELECT wintime(Received) FROM mail")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(secs, [0, 86_400, 60]);

    let null: Option<i64> = conn
        .query_row("SELECT wintime(NULL)", [], |row| row.get(0))
        .unwrap();
    assert_eq!(null, None);
    let day: String = conn
        .query_row(
            "SELECT date(wintime(Received), 'unixepoch') FROM mail WHERE Id = 2",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(day, "1970-01-02");
}

#[test]
fn test_undecodable_column_fails_only_when_read() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    let err = conn
        .query_row("SELECT Attachment FROM mail", [], |row| row.get::<_, Vec<u8>>(0))
        .unwrap_err();
    assert!(err.to_string().contains("invalid JET column type: 13"), "{err}");

    let id: i64 = conn
        .query_row("SELECT Id FROM mail LIMIT 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(id, 1);
}

#[test]
fn test_wrong_argument_count_is_rejected() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());

    for sql in [
        "CREATE VIRTUAL TABLE bad USING esentvtab('/data/mail.edb')",
        "CREATE VIRTUAL TABLE bad USING esentvtab('/data/mail.edb', Messages, extra)",
        "CREATE VIRTUAL TABLE bad USING esentvtab",
    ] {
        let err = conn.execute_batch(sql).unwrap_err();
        assert!(err.to_string().contains("expected 2 arguments"), "{sql}: {err}");
    }
    assert_eq!(engine.live_instances(), 0);
}

#[test]
fn test_unknown_table_and_missing_file() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());

    let err = conn
        .execute_batch("CREATE VIRTUAL TABLE t USING esentvtab('/data/mail.edb', Nope)")
        .unwrap_err();
    assert!(err.to_string().contains("failed to read column catalog"), "{err}");

    let err = conn
        .execute_batch("CREATE VIRTUAL TABLE t USING esentvtab('/data/other.edb', Messages)")
        .unwrap_err();
    assert!(err.to_string().contains("failed to attach JET database"), "{err}");
    assert_eq!(engine.live_instances(), 0);
    assert_eq!(engine.live_sessions(), 0);
}

#[test]
fn test_engine_failure_mid_scan_surfaces_as_error() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    engine.inject_failure(EngineStep::Move, JetError::INVALID_SESID);
    let err = conn
        .query_row("SELECT Id FROM mail", [], |row| row.get::<_, i64>(0))
        .unwrap_err();
    assert!(err.to_string().contains("failed to move JET cursor"), "{err}");
    engine.clear_failures();
    assert_eq!(engine.open_cursors(), 0);
}

#[test]
fn test_drop_table_and_close_release_the_instance() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE mail2 USING esentvtab('{DB}', Messages)"
    ))
    .unwrap();
    assert_eq!(engine.live_instances(), 2);

    let n: i64 = conn
        .query_row("SELECT count(*) FROM mail2", [], |row| row.get(0))
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(engine.open_cursors(), 0);

    conn.execute_batch("DROP TABLE mail2").unwrap();
    assert_eq!(engine.live_instances(), 1);

    drop(conn);
    assert_eq!(engine.live_instances(), 0);
    assert_eq!(engine.live_sessions(), 0);
}

#[test]
fn test_virtual_table_is_read_only() {
    let engine = mail_engine();
    let conn = connect(&engine, VtabConfig::default());
    create_mail(&conn);

    assert!(conn.execute("INSERT INTO mail(Id) VALUES (9)", []).is_err());
    assert!(conn.execute("DELETE FROM mail", []).is_err());
    let total: i64 = conn
        .query_row("SELECT count(*) FROM mail", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 3);
}

#[test]
fn test_reconnect_is_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("host.db");
    let engine = mail_engine();

    let first = Connection::open(&path).unwrap();
    esent_sqlite::register(&first, Arc::new(engine.clone()), VtabConfig::default()).unwrap();
    create_mail(&first);

    let second = Connection::open(&path).unwrap();
    esent_sqlite::register(&second, Arc::new(engine.clone()), VtabConfig::default()).unwrap();
    let err = second
        .query_row("SELECT count(*) FROM mail", [], |row| row.get::<_, i64>(0))
        .unwrap_err();
    assert!(err.to_string().contains("connect is not supported"), "{err}");
    assert_eq!(engine.live_instances(), 1);
}

#[test]
fn test_oversize_values_grow_or_fail() {
    let long = "x".repeat(10_000);
    let engine = MemoryEngine::new();
    engine.create_table(DB, "Notes", &[CatalogColumn::new(1, "Body", JetColumnType::LongText)]);
    engine.insert_row(DB, "Notes", vec![Some(utf16(&long))]);

    let conn = connect(&engine, VtabConfig::default());
    conn.execute_batch(&format!("CREATE VIRTUAL TABLE notes USING esentvtab('{DB}', Notes)"))
        .unwrap();
    let body: String = conn
        .query_row("SELECT Body FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(body, long);

    let strict = connect(&engine, VtabConfig::default().strict());
    strict
        .execute_batch(&format!("CREATE VIRTUAL TABLE notes USING esentvtab('{DB}', Notes)"))
        .unwrap();
    let err = strict
        .query_row("SELECT Body FROM notes", [], |row| row.get::<_, String>(0))
        .unwrap_err();
    assert!(err.to_string().contains("truncated"), "{err}");
}

#[test]
fn test_western_codepage_text() {
    let engine = MemoryEngine::new();
    engine.create_table(
        DB,
        "Legacy",
        &[CatalogColumn::new(1, "Name", JetColumnType::Text)
            .with_codepage(CatalogColumn::CODEPAGE_WESTERN)],
    );
    engine.insert_row(DB, "Legacy", vec![Some(b"caf\xe9 \x80".to_vec())]);

    let conn = connect(&engine, VtabConfig::default());
    conn.execute_batch(&format!("CREATE VIRTUAL TABLE legacy USING esentvtab('{DB}', Legacy)"))
        .unwrap();
    let name: String = conn
        .query_row("SELECT Name FROM legacy", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "café €");
}
