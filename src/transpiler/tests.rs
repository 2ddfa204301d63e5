use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::ast::*;
use crate::parser;

fn ansi() -> Compiler {
    Compiler::new(Dialect::ANSI)
}

fn mysql() -> Compiler {
    Compiler::new(Dialect::MYSQL)
}

#[test]
fn test_bare_select() {
    let q = Select::new("t").columns("*");
    assert_eq!(q.to_sql(&ansi()).unwrap(), r#"SELECT * FROM "t""#);
    assert_eq!(Select::new("t").to_sql(&mysql()).unwrap(), "SELECT * FROM `t`");
}

#[test]
fn test_dotted_table_and_columns() {
    let q = Select::new("shop.orders").columns(vec!["o.id", "o.total"]);
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "SELECT `o`.`id`, `o`.`total` FROM `shop`.`orders`"
    );
    assert_eq!(mysql().identifier("a, b"), "`a`, `b`");
    assert_eq!(mysql().identifier("t.*"), "`t`.*");
    assert_eq!(mysql().identifier("`already`"), "`already`");
}

#[test]
fn test_comparator_token() {
    let cond = parser::condition_from_json(&json!({"age": {"GE": 18}})).unwrap();
    assert_eq!(ansi().condition(&cond).unwrap(), r#" WHERE "age" >= 18"#);

    let cond = Condition::new().entry("age", "{DB_GE}18");
    assert_eq!(ansi().condition(&cond).unwrap(), r#" WHERE "age" >= 18"#);
}

#[test]
fn test_in_directive() {
    let cond = parser::condition_from_json(&json!({"status": {"LIST": [1, 2, 3]}})).unwrap();
    assert_eq!(
        ansi().condition(&cond).unwrap(),
        r#" WHERE "status" IN ('1','2','3')"#
    );
}

#[test]
fn test_order_specs() {
    let order = parser::order_from_json(&json!({"name": "desc", "id": "asc"})).unwrap();
    assert_eq!(
        ansi().order(&order).unwrap(),
        r#" ORDER BY "name" DESC, "id" ASC"#
    );
    assert_eq!(ansi().order(&Order::from("RAND")).unwrap(), " ORDER BY RAND()");
    assert_eq!(ansi().order(&Order::default()).unwrap(), "");
}

#[test]
fn test_increment_value() {
    let target = Column::ident("counter");
    assert_eq!(
        ansi().value(&Value::from("{INC}5"), Some(&target)).unwrap(),
        r#"'{INC}5'"#
    );
    assert_eq!(
        ansi().value(&Value::from("{DB_INC}5"), Some(&target)).unwrap(),
        r#""counter" + 5"#
    );
    let q = Update::new("t").set("counter", "{DB_INC}5").filter(Condition::new().eq("id", 1));
    assert_eq!(
        q.to_sql(&ansi()).unwrap(),
        r#"UPDATE "t" SET "counter" = "counter" + 5 WHERE "id" = 1"#
    );
}

#[test]
fn test_aliased_sum() {
    let cols = Columns::new().aliased("total", "{DB_SUM}amount");
    assert_eq!(
        ansi().columns(&cols, true).unwrap(),
        r#"SUM("amount") AS "total""#
    );
    assert_eq!(ansi().columns(&cols, false).unwrap(), r#"SUM("amount")"#);
}

#[test]
fn test_column_transforms() {
    let c = mysql();
    let cases = [
        ("{DB_COUNT}*", "COUNT(*)"),
        ("{DB_COUNT}", "COUNT(*)"),
        ("{DB_DISTINCT}{DB_LENGTH}name", "DISTINCT LENGTH(`name`)"),
        ("{DB_NO_CACHE}id", "SQL_NO_CACHE `id`"),
        ("{DB_TIMESTAMP}created", "UNIX_TIMESTAMP(`created`)"),
        ("{DB_FROM_UNIXTIME_DATE}ts", "FROM_UNIXTIME(`ts`, '%Y-%m-%d')"),
        ("{DB_NOW}", "NOW()"),
        ("{DB_FNC}COALESCE(a, b)", "COALESCE(a, b)"),
        ("{DB_VAL}x'y", r"'x\'y'"),
        ("'literal'", "'literal'"),
    ];
    for (spec, expected) in cases {
        assert_eq!(c.column(&Column::from(spec)).unwrap(), expected, "{}", spec);
    }
}

#[test]
fn test_every_comparator_token() {
    let c = mysql();
    let cases = [
        ("{DB_NE}3", "`n` != 3"),
        ("{DB_GT}3", "`n` > 3"),
        ("{DB_GE}3", "`n` >= 3"),
        ("{DB_LE}3", "`n` <= 3"),
        ("{DB_LT}3", "`n` < 3"),
        ("{DB_NNE}x", "`n` <=> 'x'"),
        ("{DB_LIKE}a%", "`n` LIKE 'a%'"),
        ("{DB_XLIKE}a%", "`n` NOT LIKE 'a%'"),
        ("{DB_INULL}", "`n` IS NULL"),
        ("{DB_XINULL}", "`n` IS NOT NULL"),
    ];
    for (spec, expected) in cases {
        let cond = Condition::new().entry("n", spec);
        assert_eq!(c.condition_body(&cond).unwrap(), expected, "{}", spec);
    }
}

#[test]
fn test_negated_directives() {
    let c = mysql();
    let cases = [
        (json!({"n": {"XIN": [1, 2]}}), "`n` NOT IN ('1','2')"),
        (json!({"n": {"XLIST": ["a"]}}), "`n` NOT IN ('a')"),
        (json!({"n": {"XBETWEEN": [1, 5]}}), "`n` NOT BETWEEN 1 AND 5"),
        (json!({"n": {"XBETWEEN": [1]}}), ""),
    ];
    for (spec, expected) in cases {
        let cond = parser::condition_from_json(&spec).unwrap();
        assert_eq!(c.condition_body(&cond).unwrap(), expected, "{}", spec);
    }
}

#[test]
fn test_remaining_column_transforms() {
    let c = mysql();
    let cases = [
        ("{DB_MAX}n", "MAX(`n`)"),
        ("{DB_MIN}n", "MIN(`n`)"),
        ("{DB_HIGH_PRIORITY}n", "HIGH_PRIORITY `n`"),
        ("{DB_LOW_PRIORITY}n", "LOW_PRIORITY `n`"),
        ("{DB_DATE}n", "DATE(`n`)"),
        ("{DB_DAY}n", "DAY(`n`)"),
        ("{DB_MONTH}n", "MONTH(`n`)"),
        ("{DB_YEAR}n", "YEAR(`n`)"),
        ("{DB_FROM_UNIXTIME}n", "FROM_UNIXTIME(`n`)"),
    ];
    for (spec, expected) in cases {
        assert_eq!(c.column(&Column::from(spec)).unwrap(), expected, "{}", spec);
    }
}

#[test]
fn test_alias_quote_is_doubled() {
    let cols = Columns::new().aliased("a`b", "id");
    assert_eq!(mysql().columns(&cols, true).unwrap(), "`id` AS `a``b`");

    let cols = Columns::new().aliased(r#"x" FROM secrets --"#, "id");
    assert_eq!(
        ansi().columns(&cols, true).unwrap(),
        r#""id" AS "x"" FROM secrets --""#
    );
}

#[test]
fn test_unknown_token_policy() {
    let cols = Columns::from(vec!["id", "{DB_BOGUS}name"]);
    assert_eq!(mysql().columns(&cols, true).unwrap(), "`id`");
    let err = mysql().strict(true).columns(&cols, true).unwrap_err();
    assert!(matches!(err, crate::error::DbError::UnknownToken(_)));
    assert_eq!(err.to_string(), "Unknown token: '{DB_BOGUS}'");
}

#[test]
fn test_full_select() {
    let q = Select::new("orders")
        .column("customer")
        .column_as("total", "{DB_SUM}amount")
        .filter(Condition::new().eq("state", "paid").ge("amount", 10))
        .group_by("customer")
        .having(Condition::new().gt("{DB_SUM}amount", 100))
        .order_by(Order::desc("customer"))
        .range(20, 10)
        .lock(LockMode::ForUpdate);
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "SELECT `customer`, SUM(`amount`) AS `total` FROM `orders` \
         WHERE `state` = 'paid' AND `amount` >= 10 GROUP BY `customer` \
         HAVING SUM(`amount`) > 100 ORDER BY `customer` DESC LIMIT 20, 10 FOR UPDATE"
    );
}

#[test]
fn test_insert_forms() {
    let q = Insert::new("users").set("name", "Ann").set("created", "{DB_NOW}");
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "INSERT INTO `users` SET `name` = 'Ann', `created` = NOW()"
    );

    let q = Insert::new("users").set("id", 1).set("hits", 1).ignore().upsert();
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "INSERT IGNORE INTO `users` SET `id` = 1, `hits` = 1 \
         ON DUPLICATE KEY UPDATE `id` = VALUES(`id`), `hits` = VALUES(`hits`)"
    );

    assert!(Insert::new("users").to_sql(&mysql()).is_err());
}

#[test]
fn test_bulk_insert_drops_bad_rows() {
    let q = BulkInsert::new("t")
        .fields(["a", "b", "c"])
        .row([Value::Int(1), Value::Int(2), Value::Int(3)])
        .row([Value::Int(4), Value::Int(5)])
        .row([Value::Int(6), Value::Null, Value::text("x")]);
    assert_eq!(
        mysql().bulk_insert(&q).unwrap().unwrap(),
        "INSERT INTO `t` (`a`, `b`, `c`) VALUES (1, 2, 3), (6, NULL, 'x')"
    );
    assert!(mysql().strict(true).bulk_insert(&q).is_err());

    let empty = BulkInsert::new("t").fields(["a"]);
    assert_eq!(mysql().bulk_insert(&empty).unwrap(), None);
    assert!(empty.to_sql(&mysql()).is_err());
}

#[test]
fn test_bulk_upsert() {
    let q = BulkInsert::new("t")
        .fields(["id", "n"])
        .row([1, 2])
        .upsert();
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "INSERT INTO `t` (`id`, `n`) VALUES (1, 2) \
         ON DUPLICATE KEY UPDATE `id` = VALUES(`id`), `n` = VALUES(`n`)"
    );
}

#[test]
fn test_update_delete_limits() {
    let q = Delete::new("logs")
        .filter(Condition::new().lt("id", 100))
        .order_by("id")
        .limit(5);
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "DELETE FROM `logs` WHERE `id` < 100 ORDER BY `id` ASC LIMIT 5"
    );

    let bad = Delete::new("logs").limit_spec(Limit::Range(1, 5));
    assert!(matches!(
        mysql().delete(&bad),
        Err(crate::error::DbError::InvalidLimit(_))
    ));
    let bad = Update::new("logs").set("a", 1).limit_spec(Limit::Range(0, 1));
    assert!(matches!(
        bad.to_sql(&mysql()),
        Err(crate::error::DbError::InvalidLimit(_))
    ));
}

#[test]
fn test_call_and_copy() {
    let q = Call::new("report").param(2024).param("q1");
    assert_eq!(q.to_sql(&mysql()).unwrap(), "CALL `report`(2024, 'q1')");
    assert!(Call::new("p").param(Value::inc(1)).to_sql(&mysql()).is_err());

    let q = CopyRows::new("users", "archive")
        .map("id", "id")
        .map("label", "{DB_FNC}CONCAT(first, ' ', last)")
        .filter(Condition::new().eq("active", 0))
        .ignore();
    assert_eq!(
        q.to_sql(&mysql()).unwrap(),
        "INSERT IGNORE INTO `archive` (`id`, `label`) \
         SELECT `id`, CONCAT(first, ' ', last) FROM `users` WHERE `active` = 0"
    );
}

#[test]
fn test_lock_tables() {
    let c = mysql();
    let sql = c
        .lock_tables(&[("a".into(), TableLock::Write), ("b".into(), TableLock::Read)])
        .unwrap();
    assert_eq!(sql, "LOCK TABLES `a` WRITE, `b` READ");
    assert_eq!(c.unlock_tables(), "UNLOCK TABLES");
    assert!(c.lock_tables(&[]).is_err());
}

#[test]
fn test_escaping() {
    assert_eq!(
        Dialect::MYSQL.escape("a'b\"c\\d\n\r\0\x1a"),
        r#"a\'b\"c\\d\n\r\0\Z"#
    );
    assert_eq!(Dialect::ANSI.escape("it's"), "it''s");
}

#[test]
fn test_balanced_parentheses() {
    let conditions = [
        Condition::new().open().open().eq("a", 1),
        Condition::new().eq("a", 1).open().or().close().close().close(),
        Condition::new().open().eq("a", 1).or().open().eq("b", 2).and(),
        Condition::new().or().open().open().close().xor(),
    ];
    for cond in &conditions {
        let sql = ansi().condition_body(cond).unwrap();
        let opens = sql.matches('(').count();
        let closes = sql.matches(')').count();
        assert_eq!(opens, closes, "{}", sql);
        for op in ["AND", "OR", "XOR", "("] {
            assert!(!sql.trim_end().ends_with(op), "{}", sql);
        }
    }
}

#[test]
fn test_deterministic_output() {
    let build = || {
        Select::new("t")
            .columns(vec!["a", "b"])
            .filter(Condition::new().eq("a", 1).or().is_in("b", ["x", "y"]))
            .order_by(Order::desc("a").then_asc("b"))
    };
    let first = build().to_sql(&mysql()).unwrap();
    for _ in 0..10 {
        assert_eq!(build().to_sql(&mysql()).unwrap(), first);
    }
}
