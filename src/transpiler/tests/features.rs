//! Predicate kinds, payload operators, languages, paging and cache behavior.

use pretty_assertions::assert_eq;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::conditions::*;
use crate::ast::*;
use crate::error::FilterError;
use crate::transpiler::{Compiler, ToSql};

fn where_of(predicates: Vec<Predicate>) -> String {
    Compiler::new()
        .compile_where(&predicates, "")
        .unwrap_or_default()
}

#[test]
fn test_null_comparisons() {
    assert_eq!(where_of(vec![eq("deleted", Value::Null)]), "\"deleted\" IS NULL");
    assert_eq!(where_of(vec![ne("deleted", Value::Null)]), "\"deleted\" IS NOT NULL");
    assert_eq!(where_of(vec![gt("deleted", Value::Null)]), "\"deleted\" > NULL");
}

#[test]
fn test_in_lists() {
    assert_eq!(
        where_of(vec![is_in("id", [1, 2, 3])]),
        "\"id\" IN (1, 2, 3)"
    );
    assert_eq!(
        where_of(vec![not_in("code", ["a", "b"])]),
        "\"code\" NOT IN ('a', 'b')"
    );
    let single = Predicate::In {
        column: "id".into(),
        value: Value::Int(5),
    };
    assert_eq!(where_of(vec![single]), "\"id\" IN (5)");
}

#[test]
fn test_empty_in_lists_are_safe() {
    let none: Vec<i64> = vec![];
    assert_eq!(where_of(vec![is_in("id", none.clone())]), "\"id\" IN (NULL)");
    assert_eq!(where_of(vec![not_in("id", none)]), "1=1");

    let only_nulls = is_in("id", [Value::Null]);
    assert_eq!(where_of(vec![only_nulls]), "\"id\" IN (NULL)");
}

#[test]
fn test_or_group() {
    let p = vec![
        eq("active", true),
        or(vec![eq("role", "admin"), eq("role", "mod")]),
    ];
    assert_eq!(
        where_of(p),
        "\"active\" = 1 AND (\"role\" = 'admin' OR \"role\" = 'mod')"
    );
}

#[test]
fn test_empty_or_group_is_skipped() {
    assert_eq!(where_of(vec![or(vec![]), eq("a", 1)]), "\"a\" = 1");
}

#[test]
fn test_raw_query_predicate() {
    assert_eq!(
        where_of(vec![raw("a.x > b.y"), eq("c", 1)]),
        "(a.x > b.y) AND \"c\" = 1"
    );
}

#[test]
fn test_contains_and_empty() {
    assert_eq!(
        where_of(vec![contains("note")]),
        "LEN(CAST(\"note\" AS NVARCHAR(MAX))) > 0"
    );
    assert_eq!(
        where_of(vec![empty("note")]),
        "(\"note\" IS NULL OR LEN(CAST(\"note\" AS NVARCHAR(MAX))) = 0)"
    );
}

#[test]
fn test_between() {
    assert_eq!(
        where_of(vec![between("price", 10, 20.5)]),
        "(\"price\" BETWEEN 10 AND 20.5)"
    );
}

#[test]
fn test_search_anchors() {
    assert_eq!(
        where_of(vec![search("name", "jo%hn", SearchAnchor::Beg)]),
        "\"name\" LIKE 'john%'"
    );
    assert_eq!(
        where_of(vec![search("name", "son", SearchAnchor::End)]),
        "\"name\" LIKE '%son'"
    );
    assert_eq!(
        where_of(vec![search("name", "O'Neil", SearchAnchor::Contains)]),
        "CAST(\"name\" AS NVARCHAR(MAX)) LIKE '%O''Neil%'"
    );
}

#[test]
fn test_date_parts() {
    assert_eq!(
        where_of(vec![date_part(DatePart::Month, "created", Comparator::Eq, 12)]),
        "MONTH(\"created\") = 12"
    );
    assert_eq!(
        where_of(vec![date_part(DatePart::Year, "created", Comparator::Gte, 2020)]),
        "YEAR(\"created\") >= 2020"
    );
    assert_eq!(
        where_of(vec![date_part(DatePart::Hour, "created", Comparator::Lt, 8)]),
        "DATEPART(HOUR, \"created\") < 8"
    );
    assert_eq!(
        where_of(vec![date_part(DatePart::Minute, "created", Comparator::NotEq, 0)]),
        "DATEPART(MINUTE, \"created\") <> 0"
    );
}

#[test]
fn test_quote_injection_stays_inside_literal() {
    assert_eq!(
        where_of(vec![eq("name", "x' OR '1'='1")]),
        "\"name\" = 'x'' OR ''1''=''1'"
    );
}

#[test]
fn test_language_columns() {
    let f = FilterDescriptor::new("products", Operation::Find)
        .fields(&["id", "name§"])
        .filter(eq("name§", "Chair"))
        .sort(&["name§_asc"])
        .language("en");
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT \"id\", \"name_en\" AS \"name\" FROM products WHERE \"name_en\" = 'Chair' ORDER BY \"name_en\" ASC"
    );

    let f = FilterDescriptor::new("products", Operation::Find)
        .fields(&["name§"])
        .filter(eq("name§", "Chair"));
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT \"name\" FROM products WHERE \"name\" = 'Chair'"
    );
}

#[test]
fn test_sort_before_paging() {
    let f = FilterDescriptor::new("users", Operation::Find)
        .sort(&["name_asc"])
        .skip(10)
        .take(5);
    let sql = f.to_sql().unwrap().sql;
    assert_eq!(
        sql,
        "SELECT * FROM users ORDER BY \"name\" ASC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    let order = sql.find("ORDER BY").unwrap();
    let offset = sql.find("OFFSET").unwrap();
    assert!(order < offset);
}

#[test]
fn test_take_only_injects_top() {
    let f = FilterDescriptor::new("users", Operation::Find)
        .filter(eq("a", 1))
        .take(3);
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT TOP 3 * FROM users WHERE \"a\" = 1"
    );

    let f = FilterDescriptor::new("", Operation::Query)
        .raw_query("select name from users", vec![])
        .take(1);
    assert_eq!(f.to_sql().unwrap().sql, "select TOP 1 name from users");
}

#[test]
fn test_top_follows_distinct_and_all() {
    let f = FilterDescriptor::new("", Operation::Query)
        .raw_query("SELECT DISTINCT a FROM t {where}", vec![])
        .filter(eq("x", 1))
        .take(5);
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT DISTINCT TOP 5 a FROM t WHERE \"x\" = 1"
    );

    let f = FilterDescriptor::new("", Operation::Query)
        .raw_query("select  all name from users", vec![])
        .take(2);
    assert_eq!(f.to_sql().unwrap().sql, "select  all TOP 2 name from users");

    let f = FilterDescriptor::new("", Operation::Query)
        .raw_query("SELECT distinctive FROM t", vec![])
        .take(1);
    assert_eq!(f.to_sql().unwrap().sql, "SELECT TOP 1 distinctive FROM t");
}

#[test]
fn test_skip_only() {
    let f = FilterDescriptor::new("users", Operation::Find)
        .sort(&["id_desc"])
        .skip(40);
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT * FROM users ORDER BY \"id\" DESC OFFSET 40 ROWS"
    );
}

#[test]
fn test_skip_without_sort_fails_fast() {
    let f = FilterDescriptor::new("users", Operation::Find).skip(10).take(5);
    assert!(matches!(f.to_sql(), Err(FilterError::OffsetWithoutOrder)));

    let f = FilterDescriptor::new("", Operation::Query)
        .raw_query("SELECT * FROM users ORDER BY id", vec![])
        .skip(10);
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT * FROM users ORDER BY id OFFSET 10 ROWS"
    );
}

#[test]
fn test_zero_paging_is_absent() {
    let f = FilterDescriptor::new("users", Operation::Find).skip(0).take(0);
    assert_eq!(f.to_sql().unwrap().sql, "SELECT * FROM users");
}

#[test]
fn test_paging_ignored_for_writes() {
    let f = FilterDescriptor::new("users", Operation::Remove)
        .filter(eq("id", 1))
        .take(1);
    assert_eq!(f.to_sql().unwrap().sql, "DELETE FROM users WHERE \"id\" = 1");
}

#[test]
fn test_increment_payload_property() {
    let payload = Payload::new().set("+score", 3);

    let update = FilterDescriptor::new("players", Operation::Update)
        .payload(payload.clone())
        .to_sql()
        .unwrap();
    assert!(update.sql.contains("COALESCE(\"score\", 0) + @score"));
    assert_eq!(update.params, vec![Parameter::new("score", 3)]);

    let insert = FilterDescriptor::new("players", Operation::Insert)
        .payload(payload)
        .to_sql()
        .unwrap();
    assert_eq!(insert.sql, "INSERT INTO players (\"score\") VALUES(@score)");
    assert_eq!(insert.params, vec![Parameter::new("score", 3)]);
}

#[test]
fn test_toggle_payload_property() {
    let q = FilterDescriptor::new("users", Operation::Update)
        .payload(Payload::new().set("!active", true))
        .to_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        "UPDATE users SET \"active\" = CASE WHEN \"active\" = 1 THEN 0 ELSE 1 END"
    );
    assert!(!q.sql.contains('@'));
    assert!(q.params.is_empty());
}

#[test]
fn test_list_queries_share_where() {
    let compiler = Compiler::new();
    let f = FilterDescriptor::new("users", Operation::List)
        .filter(eq("active", true))
        .filter(search("name§", "an", SearchAnchor::Contains))
        .language("de")
        .sort(&["id_asc"])
        .take(10);
    let (page, count) = compiler.compile_list(&f).unwrap();

    let where_of = |sql: &str| -> String {
        let start = sql.find(" WHERE ").unwrap();
        let rest = &sql[start..];
        rest.split(" ORDER BY ").next().unwrap().to_string()
    };
    assert_eq!(where_of(&page.sql), where_of(&count.sql));
}

#[test]
fn test_cold_and_warm_cache_match() {
    let compiler = Compiler::new();
    let f = FilterDescriptor::new("products", Operation::List)
        .fields(&["id", "title§"])
        .filter(eq("title§", "x"))
        .filter(is_in("tag", ["a", "b"]))
        .sort(&["title§_desc"])
        .language("fr")
        .skip(5)
        .take(5);

    let cold = compiler.compile(&f).unwrap();
    assert!(!compiler.cache().is_empty());
    let warm = compiler.compile(&f).unwrap();
    assert_eq!(cold, warm);

    compiler.invalidate();
    let again = compiler.compile(&f).unwrap();
    assert_eq!(cold, again);
}

#[test]
fn test_language_does_not_leak_between_compiles() {
    let compiler = Compiler::new();
    let en = FilterDescriptor::new("p", Operation::Find)
        .fields(&["name§"])
        .language("en");
    let de = en.clone().language("de");
    assert_eq!(
        compiler.compile(&en).unwrap().sql,
        "SELECT \"name_en\" AS \"name\" FROM p"
    );
    assert_eq!(
        compiler.compile(&de).unwrap().sql,
        "SELECT \"name_de\" AS \"name\" FROM p"
    );
}

#[test]
fn test_tick_clears_compiler_cache() {
    let compiler = Compiler::new();
    let f = FilterDescriptor::new("p", Operation::Find).filter(eq("a", 1));
    compiler.compile(&f).unwrap();
    compiler.on_tick(3);
    assert!(!compiler.cache().is_empty());
    compiler.on_tick(20);
    assert!(compiler.cache().is_empty());
}

#[test]
fn test_descriptor_from_json() {
    let json = r#"{
        "table": "users",
        "exec": "list",
        "fields": ["id", "name"],
        "filter": [
            {"type": "where", "name": "age", "comparer": ">=", "value": 21},
            {"type": "in", "name": "role", "value": ["a", "b"]},
            {"type": "between", "name": "score", "a": 1, "b": 9}
        ],
        "sort": ["id_desc"],
        "take": 25
    }"#;
    let f: FilterDescriptor = serde_json::from_str(json).unwrap();
    assert_eq!(
        f.to_sql().unwrap().sql,
        "SELECT TOP 25 \"id\", \"name\" FROM users WHERE \"age\" >= 21 AND \"role\" IN ('a', 'b') AND (\"score\" BETWEEN 1 AND 9) ORDER BY \"id\" DESC"
    );
}

fn counted(calls: &Arc<AtomicU64>, value: Value) -> Value {
    let calls = calls.clone();
    Value::deferred(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        value.clone()
    })
}

#[test]
fn test_deferred_values_evaluate_once() {
    let calls = Arc::new(AtomicU64::new(0));
    assert_eq!(where_of(vec![eq("a", counted(&calls, Value::Int(1)))]), "\"a\" = 1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = Arc::new(AtomicU64::new(0));
    assert_eq!(
        where_of(vec![eq("a", counted(&calls, Value::Null))]),
        "\"a\" IS NULL"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = Arc::new(AtomicU64::new(0));
    let items = vec![counted(&calls, Value::Int(4)), Value::Int(5)];
    assert_eq!(where_of(vec![is_in("id", items)]), "\"id\" IN (4, 5)");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
