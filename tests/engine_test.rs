//! Engine tests against an in-memory executor.

use std::sync::Mutex;

use async_trait::async_trait;
use mssql_filter::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

type Responder = Box<dyn Fn(&CompiledQuery) -> Result<QueryResult, String> + Send + Sync>;

/// Records every statement and answers with a canned response.
struct MockExecutor {
    log: Mutex<Vec<CompiledQuery>>,
    respond: Responder,
}

impl MockExecutor {
    fn new(respond: impl Fn(&CompiledQuery) -> Result<QueryResult, String> + Send + Sync + 'static) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    fn empty() -> Self {
        Self::new(|_| Ok(QueryResult::default()))
    }

    fn executed(&self) -> Vec<CompiledQuery> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, query: &CompiledQuery) -> Result<QueryResult, ExecutorError> {
        self.log.lock().unwrap().push(query.clone());
        (self.respond)(query).map_err(|e| e.into())
    }
}

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Row::new(),
    }
}

#[tokio::test]
async fn test_list_runs_page_then_count() {
    let executor = MockExecutor::new(|q| {
        if q.operation == Operation::Count {
            Ok(QueryResult::rows(vec![row(json!({"count": 42}))]))
        } else {
            Ok(QueryResult::rows(vec![row(json!({"id": 1})), row(json!({"id": 2}))]))
        }
    });
    let db = Database::new(executor);

    let filter = FilterDescriptor::new("users", Operation::List)
        .filter(eq("active", true))
        .sort(&["id_asc"])
        .skip(2)
        .take(2);
    let output = db.exec(&filter).await.unwrap();

    assert_eq!(
        output,
        Output::List {
            items: vec![row(json!({"id": 1})), row(json!({"id": 2}))],
            count: 42,
        }
    );

    let executed = db.executor().executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].sql,
        "SELECT * FROM users WHERE \"active\" = 1 ORDER BY \"id\" ASC OFFSET 2 ROWS FETCH NEXT 2 ROWS ONLY"
    );
    assert_eq!(
        executed[1].sql,
        "SELECT COUNT(1) AS count FROM users WHERE \"active\" = 1"
    );
    assert_eq!(db.stats().reads(), 2);
}

#[tokio::test]
async fn test_compile_error_never_reaches_executor() {
    let db = Database::new(MockExecutor::empty());

    let filter = FilterDescriptor::new("users", Operation::List).skip(10).take(5);
    let err = db.exec(&filter).await.unwrap_err();
    assert!(matches!(err, FilterError::OffsetWithoutOrder));

    let filter = FilterDescriptor::new("users", Operation::Insert);
    assert!(db.exec(&filter).await.is_err());

    assert!(db.executor().executed().is_empty());
}

#[tokio::test]
async fn test_default_schema() {
    let db = Database::new(MockExecutor::empty()).with_schema("dbo");

    db.exec(&FilterDescriptor::new("users", Operation::Find))
        .await
        .unwrap();
    db.exec(&FilterDescriptor::new("users", Operation::Find).schema("sales"))
        .await
        .unwrap();

    let executed = db.executor().executed();
    assert_eq!(executed[0].sql, "SELECT * FROM dbo.users");
    assert_eq!(executed[1].sql, "SELECT * FROM sales.users");
}

#[tokio::test]
async fn test_insert_binds_params_and_returns_key() {
    let executor = MockExecutor::new(|_| Ok(QueryResult::rows(vec![row(json!({"id": 9}))])));
    let db = Database::new(executor);

    let filter = FilterDescriptor::new("users", Operation::Insert)
        .payload(Payload::new().set("name", "Ann").set("+visits", 1))
        .primary_key("id");
    let output = db.exec(&filter).await.unwrap();
    assert_eq!(output, Output::Value(json!(9)));

    let executed = db.executor().executed();
    assert_eq!(
        executed[0].sql,
        "INSERT INTO users (\"name\", \"visits\") OUTPUT inserted.\"id\" VALUES(@name, @visits)"
    );
    assert_eq!(
        executed[0].params,
        vec![Parameter::new("name", "Ann"), Parameter::new("visits", 1)]
    );
    assert_eq!(db.stats().writes(), 1);
    assert_eq!(db.stats().reads(), 0);
}

#[tokio::test]
async fn test_update_affected_rows() {
    let db = Database::new(MockExecutor::new(|_| Ok(QueryResult::affected(3))));
    let filter = FilterDescriptor::new("users", Operation::Update)
        .payload(Payload::new().set("!banned", true))
        .filter(eq("id", 4));
    assert_eq!(db.exec(&filter).await.unwrap(), Output::Affected(3));
}

#[tokio::test]
async fn test_check_and_count() {
    let db = Database::new(MockExecutor::new(|_| {
        Ok(QueryResult::rows(vec![row(json!({"count": 1}))]))
    }));

    let check = FilterDescriptor::new("users", Operation::Check).filter(eq("email", "a@b.c"));
    assert_eq!(db.exec(&check).await.unwrap(), Output::Exists(true));

    let count = FilterDescriptor::new("users", Operation::Count);
    assert_eq!(db.exec(&count).await.unwrap(), Output::Count(1));
}

#[tokio::test]
async fn test_scalar_group_rows() {
    let rows = vec![
        row(json!({"status": "open", "value": 3})),
        row(json!({"status": "done", "value": 8})),
    ];
    let response = rows.clone();
    let db = Database::new(MockExecutor::new(move |_| Ok(QueryResult::rows(response.clone()))));

    let filter = FilterDescriptor::new("orders", Operation::Scalar).scalar(ScalarSpec::Group {
        key: "status".into(),
        key2: None,
    });
    assert_eq!(db.exec(&filter).await.unwrap(), Output::Rows(rows));
}

#[tokio::test]
async fn test_raw_query_classification() {
    let db = Database::new(MockExecutor::empty());

    let filter = FilterDescriptor::new("", Operation::Query)
        .raw_query("DELETE FROM sessions {where}", vec![])
        .filter(lt("expires", 100));
    db.exec(&filter).await.unwrap();

    let executed = db.executor().executed();
    assert_eq!(executed[0].sql, "DELETE FROM sessions WHERE \"expires\" < 100");
    assert!(!executed[0].is_read);
    assert_eq!(db.stats().writes(), 1);
}

#[tokio::test]
async fn test_executor_error_carries_query() {
    let db = Database::new(MockExecutor::new(|_| Err("deadlock victim".to_string())));

    let err = db
        .exec(&FilterDescriptor::new("users", Operation::Find))
        .await
        .unwrap_err();
    match &err {
        FilterError::Execution { query, source } => {
            assert_eq!(query, "SELECT * FROM users");
            assert_eq!(source.to_string(), "deadlock victim");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("deadlock victim"));
}

#[tokio::test]
async fn test_config_drives_schema_and_cache() {
    let config = Config::parse(
        r#"
        [mssql]
        url = "mssql://sa:x@localhost/shop?schema=app"
        cache_clear_every = 2
        "#,
    )
    .unwrap();
    let db = Database::from_config(MockExecutor::empty(), &config);

    let filter = FilterDescriptor::new("users", Operation::Find).fields(&["id", "name§"]);
    db.exec(&filter).await.unwrap();
    assert_eq!(
        db.executor().executed()[0].sql,
        "SELECT \"id\", \"name\" FROM app.users"
    );

    assert!(!db.compiler().cache().is_empty());
    db.on_tick(3);
    assert!(!db.compiler().cache().is_empty());
    db.on_tick(4);
    assert!(db.compiler().cache().is_empty());
}
