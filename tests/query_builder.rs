//! QueryBuilder behaviour against the recording driver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dynsql::driver::{Recorder, ResultSet};
use dynsql::prelude::*;
use dynsql::timing::{QueryTimer, TimingCategory};
use pretty_assertions::assert_eq;
use serde_json::json;

fn builder() -> (QueryBuilder, Recorder) {
    let driver = RecordingDriver::new();
    let recorder = driver.recorder();
    let mut db = QueryBuilder::new(Box::new(driver));
    db.connect().unwrap();
    (db, recorder)
}

#[derive(Default)]
struct CountingTimer {
    samples: Mutex<Vec<(TimingCategory, String)>>,
}

impl CountingTimer {
    fn count(&self, category: TimingCategory) -> usize {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .count()
    }
}

impl QueryTimer for CountingTimer {
    fn record(&self, label: &str, _elapsed: Duration, category: TimingCategory) {
        self.samples
            .lock()
            .unwrap()
            .push((category, label.to_string()));
    }
}

#[test]
fn test_select_rows() {
    let (mut db, recorder) = builder();
    recorder.push_rows(
        ["id", "name"],
        vec![vec![json!(1), json!("Ann")], vec![json!(2), json!("Bob")]],
    );

    let rows = db
        .all(
            Select::new("users")
                .columns(vec!["id", "name"])
                .filter(Condition::new().ge("age", 18))
                .order_by("name"),
        )
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("name"), Some(&json!("Bob")));
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("SELECT `id`, `name` FROM `users` WHERE `age` >= 18 ORDER BY `name` ASC")
    );
}

#[test]
fn test_one_adds_limit() {
    let (mut db, recorder) = builder();
    recorder.push_rows(["id"], vec![vec![json!(7)]]);

    let row = db.one(Select::new("users").filter(Condition::new().eq("id", 7))).unwrap();
    assert_eq!(row.and_then(|r| r.get("id").cloned()), Some(json!(7)));
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("SELECT * FROM `users` WHERE `id` = 7 LIMIT 1")
    );

    assert_eq!(db.one(Select::new("users").range(5, 10)).unwrap(), None);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("SELECT * FROM `users` LIMIT 5, 10")
    );
}

#[test]
fn test_aggregates() {
    let (mut db, recorder) = builder();
    recorder.push_rows(["COUNT(*)"], vec![vec![json!(3)]]);
    recorder.push_rows(["SUM(`total`)"], vec![vec![json!("10.50")]]);
    recorder.push_rows(["SUM(`total`)"], vec![vec![json!(null)]]);

    let q = Select::new("orders").filter(Condition::new().eq("state", "paid"));
    assert_eq!(db.count(q.clone()).unwrap(), 3);
    assert_eq!(
        recorder.statements()[0],
        "SELECT COUNT(*) FROM `orders` WHERE `state` = 'paid' LIMIT 1"
    );
    assert_eq!(db.sum(q.clone(), "total").unwrap(), 10.5);
    assert_eq!(db.sum(q, "total").unwrap(), 0.0);
}

#[test]
fn test_cell_and_column_helpers() {
    let (mut db, recorder) = builder();
    recorder.push_rows(["name"], vec![vec![json!("Ann")]]);
    recorder.push_rows(["id"], vec![vec![json!(1)], vec![json!(2)], vec![json!(3)]]);
    recorder.push_rows(
        ["id", "name"],
        vec![vec![json!(1), json!("Ann")], vec![json!(2), json!("Bob")]],
    );
    recorder.push_rows(["code"], vec![vec![json!("x")]]);

    assert_eq!(db.cell(Select::new("users").column("name")).unwrap(), Some(json!("Ann")));
    assert_eq!(
        db.column(Select::new("users").column("id")).unwrap(),
        vec![json!(1), json!(2), json!(3)]
    );

    let keyed = db.column_keyed(Select::new("users").columns(vec!["id", "name"])).unwrap();
    assert_eq!(keyed.get("1"), Some(&json!("Ann")));
    assert_eq!(keyed.get("2"), Some(&json!("Bob")));

    let single = db.column_keyed(Select::new("codes").column("code")).unwrap();
    assert_eq!(single.get("x"), Some(&json!("x")));
}

#[test]
fn test_insert_returns_id() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(1, 42));

    let id = db.insert(Insert::new("users").set("name", "Ann")).unwrap();
    assert_eq!(id, 42);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("INSERT INTO `users` SET `name` = 'Ann'")
    );

    recorder.push_result(ResultSet::empty(2, 42));
    let id = db
        .insert_update(Insert::new("users").set("id", 42).set("name", "Bea"))
        .unwrap();
    assert_eq!(id, 42);
    assert_eq!(db.driver().affected_rows(), 2);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some(
            "INSERT INTO `users` SET `id` = 42, `name` = 'Bea' \
             ON DUPLICATE KEY UPDATE `id` = VALUES(`id`), `name` = VALUES(`name`)"
        )
    );
}

#[test]
fn test_ignored_insert_has_no_id() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(1, 42));
    assert_eq!(db.insert(Insert::new("users").set("name", "Ann")).unwrap(), 42);

    recorder.push_result(ResultSet::empty(0, 0));
    let id = db
        .insert(Insert::new("users").set("name", "Ann").ignore())
        .unwrap();
    assert_eq!(id, 0);
    assert_eq!(db.driver().insert_id(), 0);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("INSERT IGNORE INTO `users` SET `name` = 'Ann'")
    );
}

#[test]
fn test_select_keeps_insert_id() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(1, 7));
    db.insert(Insert::new("users").set("name", "Ann")).unwrap();

    recorder.push_rows(["id"], vec![vec![json!(7)]]);
    db.all(Select::new("users")).unwrap();
    assert_eq!(db.driver().insert_id(), 7);
}

#[test]
fn test_bulk_insert() {
    let (mut db, recorder) = builder();

    let sent = db
        .inserts(
            BulkInsert::new("t")
                .fields(["a", "b"])
                .row([1, 2])
                .row([3])
                .row([4, 5]),
        )
        .unwrap();
    assert!(sent);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("INSERT INTO `t` (`a`, `b`) VALUES (1, 2), (4, 5)")
    );

    recorder.clear();
    let sent = db.inserts(BulkInsert::new("t").fields(["a", "b"]).row([1])).unwrap();
    assert!(!sent);
    assert!(recorder.statements().is_empty());

    let strict = db.compiler().strict(true);
    let q = BulkInsert::new("t").fields(["a", "b"]).row([1]);
    assert!(strict.bulk_insert(&q).is_err());
}

#[test]
fn test_update_and_delete_counts() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(3, 0));
    recorder.push_result(ResultSet::empty(2, 0));

    let changed = db
        .update(
            Update::new("users")
                .set("hits", "{DB_INC}1")
                .filter(Condition::new().eq("active", 1)),
        )
        .unwrap();
    assert_eq!(changed, 3);

    let removed = db
        .delete(Delete::new("sessions").filter(Condition::new().lt("expires", 100)))
        .unwrap();
    assert_eq!(removed, 2);

    assert_eq!(
        recorder.statements(),
        vec![
            "UPDATE `users` SET `hits` = `hits` + 1 WHERE `active` = 1".to_string(),
            "DELETE FROM `sessions` WHERE `expires` < 100".to_string(),
        ]
    );
}

#[test]
fn test_action_without_check() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(1, 0));
    recorder.push_result(ResultSet::empty(1, 9));

    let data = Data::new().set("name", "Ann");
    let outcome = db
        .action("users", data.clone(), Condition::new().eq("id", 9), false, false)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Updated(1));

    let outcome = db.action("users", data, Condition::new(), false, true).unwrap();
    assert_eq!(outcome, ActionOutcome::Inserted(9));

    assert_eq!(
        recorder.statements(),
        vec![
            "UPDATE `users` SET `name` = 'Ann' WHERE `id` = 9".to_string(),
            "INSERT IGNORE INTO `users` SET `name` = 'Ann'".to_string(),
        ]
    );
}

#[test]
fn test_action_with_check() {
    let (mut db, recorder) = builder();
    recorder.push_rows(["COUNT(*)"], vec![vec![json!(0)]]);
    recorder.push_result(ResultSet::empty(1, 5));

    let data = Data::new().set("name", "Ann");
    let outcome = db
        .action("users", data.clone(), Condition::new().eq("id", 5), true, false)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Inserted(5));
    assert_eq!(
        recorder.statements()[1],
        "INSERT INTO `users` SET `name` = 'Ann'"
    );

    recorder.clear();
    recorder.push_rows(["COUNT(*)"], vec![vec![json!(1)]]);
    recorder.push_result(ResultSet::empty(1, 0));
    let outcome = db
        .action("users", data, Condition::new().eq("id", 5), true, false)
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Updated(1));
    assert_eq!(
        recorder.statements(),
        vec![
            "SELECT COUNT(*) FROM `users` WHERE `id` = 5 LIMIT 1".to_string(),
            "UPDATE `users` SET `name` = 'Ann' WHERE `id` = 5".to_string(),
        ]
    );
}

#[test]
fn test_procedures() {
    let (mut db, recorder) = builder();
    let first = ResultSet::from_rows(["n"], vec![vec![json!(1)], vec![json!(2)]]);
    let second = ResultSet::from_rows(["total"], vec![vec![json!(3)]]);
    recorder.push_multi(vec![first, second]);

    let rows = db.procedure(Call::new("report").param(2024)).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("CALL `report`(2024)")
    );

    let first = ResultSet::from_rows(["n"], vec![vec![json!(1)]]);
    let second = ResultSet::from_rows(["total"], vec![vec![json!(3)], vec![json!(4)]]);
    recorder.push_multi(vec![first, second]);
    let sets = db.procedure_all(Call::new("report")).unwrap();
    assert_eq!(sets.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(sets[1][0].get("total"), Some(&json!(3)));
}

#[test]
fn test_copy_rows() {
    let (mut db, recorder) = builder();
    recorder.push_result(ResultSet::empty(4, 0));

    let copied = db
        .copy(
            CopyRows::new("users", "archive")
                .map("id", "id")
                .map("name", "name")
                .filter(Condition::new().eq("active", 0)),
        )
        .unwrap();
    assert_eq!(copied, 4);
    assert_eq!(
        recorder.last_statement().as_deref(),
        Some("INSERT INTO `archive` (`id`, `name`) SELECT `id`, `name` FROM `users` WHERE `active` = 0")
    );

    assert!(db.copy(CopyRows::new("users", "archive")).is_err());
}

#[test]
fn test_table_locks() {
    let (mut db, recorder) = builder();
    db.lock_table(&[("a", TableLock::Write), ("b", TableLock::Read)])
        .unwrap();
    db.unlock_table().unwrap();
    assert_eq!(
        recorder.statements(),
        vec![
            "LOCK TABLES `a` WRITE, `b` READ".to_string(),
            "UNLOCK TABLES".to_string(),
        ]
    );
    assert!(db.lock_table(&[]).is_err());
}

#[test]
fn test_row_lock_applies_once() {
    let (mut db, recorder) = builder();
    db.lock(LockMode::ForUpdate);
    db.all(Select::new("t").filter(Condition::new().eq("id", 1))).unwrap();
    db.all(Select::new("t")).unwrap();

    assert_eq!(
        recorder.statements(),
        vec![
            "SELECT * FROM `t` WHERE `id` = 1 FOR UPDATE".to_string(),
            "SELECT * FROM `t`".to_string(),
        ]
    );

    db.lock(LockMode::ForUpdate);
    db.delete(Delete::new("t")).unwrap();
    db.all(Select::new("t")).unwrap();
    assert_eq!(recorder.last_statement().as_deref(), Some("SELECT * FROM `t`"));
}

#[test]
fn test_transaction_begins_once() {
    let (mut db, recorder) = builder();
    db.tran_start();
    db.all(Select::new("t")).unwrap();
    assert!(!db.in_transaction());

    db.update(Update::new("t").set("a", 1)).unwrap();
    db.update(Update::new("t").set("a", 2)).unwrap();
    db.all(Select::new("t")).unwrap();
    assert!(db.in_transaction());
    db.commit().unwrap();
    db.tran_end();

    assert_eq!(recorder.count("BEGIN"), 1);
    assert_eq!(
        recorder.statements(),
        vec![
            "SELECT * FROM `t`".to_string(),
            "BEGIN".to_string(),
            "UPDATE `t` SET `a` = 1".to_string(),
            "UPDATE `t` SET `a` = 2".to_string(),
            "SELECT * FROM `t`".to_string(),
            "COMMIT".to_string(),
        ]
    );
    assert!(!db.in_transaction());
}

#[test]
fn test_locking_read_opens_transaction() {
    let (mut db, recorder) = builder();
    db.tran_start();
    db.lock(LockMode::ForUpdate);
    db.all(Select::new("t")).unwrap();
    assert!(db.in_transaction());
    assert_eq!(recorder.statements()[0], "BEGIN");
    db.rollback().unwrap();
}

#[test]
fn test_commit_without_transaction() {
    let (mut db, recorder) = builder();
    db.commit().unwrap();
    db.tran_start();
    db.commit().unwrap();
    assert!(recorder.statements().is_empty());
}

#[test]
fn test_rollback_clears_state() {
    let (mut db, recorder) = builder();
    db.tran_start();
    db.delete(Delete::new("t")).unwrap();
    assert!(db.in_transaction());
    db.rollback().unwrap();
    assert!(!db.in_transaction());
    assert_eq!(recorder.last_statement().as_deref(), Some("ROLLBACK"));

    db.delete(Delete::new("t")).unwrap();
    assert_eq!(recorder.count("BEGIN"), 2);
    db.tran_end();
    db.rollback().unwrap();
}

#[test]
fn test_failed_rollback_clears_state() {
    let (mut db, recorder) = builder();
    db.tran_start();
    db.delete(Delete::new("t")).unwrap();
    recorder.push_error(DbError::query(1205, "Lock wait timeout exceeded", "ROLLBACK"));

    assert!(db.rollback().is_err());
    assert!(!db.in_transaction());

    db.delete(Delete::new("t")).unwrap();
    assert_eq!(recorder.count("BEGIN"), 2);
}

#[test]
fn test_query_error_propagates() {
    let (mut db, recorder) = builder();
    recorder.push_error(DbError::query(1146, "Table 'x.t' doesn't exist", "SELECT * FROM `t`"));

    let err = db.all(Select::new("t")).unwrap_err();
    match &err {
        DbError::Query { code, message, sql } => {
            assert_eq!(*code, 1146);
            assert_eq!(message, "Table 'x.t' doesn't exist");
            assert_eq!(sql, "SELECT * FROM `t`");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(db.driver().last_error().map(|e| e.code), Some(1146));

    db.all(Select::new("t")).unwrap();
    assert!(db.driver().last_error().is_none());
}

#[test]
fn test_connection_loss_clears_transaction() {
    let (mut db, recorder) = builder();
    db.tran_start();
    db.delete(Delete::new("t")).unwrap();
    recorder.push_error(DbError::Connection("server has gone away".into()));

    assert!(db.delete(Delete::new("t")).is_err());
    assert!(!db.in_transaction());
    assert!(!db.driver().is_connected());

    db.all(Select::new("t")).unwrap();
    assert!(db.driver().is_connected());
}

#[test]
fn test_lazy_connect() {
    let driver = RecordingDriver::new();
    let recorder = driver.recorder();
    let mut db = QueryBuilder::new(Box::new(driver));
    assert!(!db.driver().is_connected());
    db.all(Select::new("t")).unwrap();
    assert!(db.driver().is_connected());
    assert_eq!(recorder.count("SELECT * FROM `t`"), 1);
}

#[test]
fn test_timer_sees_every_round_trip() {
    let timer = Arc::new(CountingTimer::default());
    let driver = RecordingDriver::new().with_timer(timer.clone());
    let mut db = QueryBuilder::new(Box::new(driver));
    db.connect().unwrap();

    db.tran_start();
    db.update(Update::new("t").set("a", 1)).unwrap();
    db.all(Select::new("t")).unwrap();
    db.commit().unwrap();
    db.disconnect().unwrap();

    assert_eq!(timer.count(TimingCategory::Connect), 1);
    assert_eq!(timer.count(TimingCategory::Disconnect), 1);
    // BEGIN, UPDATE, SELECT, COMMIT
    assert_eq!(timer.count(TimingCategory::Query), 4);
}

#[test]
fn test_open_from_config() {
    let config = DbConfig::from_toml(
        r#"
[database]
driver = "recording"
strict = true
"#,
    )
    .unwrap();
    let mut db = QueryBuilder::open(&config).unwrap();
    assert!(db.driver().is_connected());
    assert!(db.compiler().is_strict());

    let err = db
        .all(Select::new("t").columns(vec!["{DB_BOGUS}x"]))
        .unwrap_err();
    assert!(matches!(err, DbError::UnknownToken(_)));
}

#[test]
fn test_use_mode_handles() {
    let driver = RecordingDriver::new().with_query_mode(QueryMode::Use);
    let recorder = driver.recorder();
    let mut db = QueryBuilder::new(Box::new(driver));
    recorder.push_rows(["n"], vec![vec![json!(1)], vec![json!(2)]]);

    let mut rs = db.select(Select::new("t")).unwrap();
    assert!(rs.is_streaming());
    assert_eq!(rs.num_rows(), None);
    assert!(rs.fetch().unwrap().is_some());

    db.all(Select::new("u")).unwrap();
    assert!(!rs.is_current());
    assert!(rs.fetch().unwrap().is_none());
}
