//! End-to-end engine tests: batching, nullability propagation, cost limits,
//! mutation ordering, persisted queries, and response shape.

use async_trait::async_trait;
use graphlet_runtime::{
    ArgumentDef, BatchError, BatchKey, BatchLoader, Engine, EngineConfig, ErrorCode, FieldDef,
    InMemoryPersistedQueries, ObjectDef, Operation, OperationKind, Request, ResolverError,
    ResolverMap, SchemaBuilder, SelectionNode, TypeRef,
};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Author loader that counts its batched calls.
struct AuthorLoader {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchLoader for AuthorLoader {
    async fn load(&self, keys: Vec<BatchKey>) -> Result<FxHashMap<BatchKey, Value>, BatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys
            .into_iter()
            .map(|key| {
                let author = json!({"id": key, "name": format!("Author {key}")});
                (key, author)
            })
            .collect())
    }
}

/// Schema from the blog scenario: `Query.user(id) -> User { name, posts }`,
/// `Post.author -> User`, authors fetched through a batch loader.
fn blog_engine(calls: Arc<AtomicUsize>) -> Engine {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .mutation_type("Mutation")
        .object(
            ObjectDef::new("Query")
                .field(
                    FieldDef::new("user", TypeRef::option(TypeRef::named("User")))
                        .argument(ArgumentDef::new("id", TypeRef::named("ID"))),
                )
                .field(FieldDef::new("motto", TypeRef::named("String"))),
        )
        .object(
            ObjectDef::new("Mutation")
                .field(FieldDef::new(
                    "createUser",
                    TypeRef::option(TypeRef::named("User")),
                ))
                .field(FieldDef::new(
                    "createPost",
                    TypeRef::option(TypeRef::named("Post")),
                )),
        )
        .object(
            ObjectDef::new("User")
                .field(FieldDef::new("id", TypeRef::named("ID")))
                .field(FieldDef::new("name", TypeRef::named("String")))
                .field(FieldDef::new(
                    "posts",
                    TypeRef::list(TypeRef::named("Post")),
                )),
        )
        .object(
            ObjectDef::new("Post")
                .field(FieldDef::new("id", TypeRef::named("ID")))
                .field(FieldDef::new("title", TypeRef::named("String")))
                .field(FieldDef::new(
                    "author",
                    TypeRef::option(TypeRef::named("User")),
                )),
        )
        .build()
        .unwrap();

    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "user", |_parent, args, _ctx, _info| {
        let id: String = args.require("id")?;
        Ok(json!({"id": id, "name": "Ada"}))
    });
    resolvers.register_fn("Query", "motto", |_parent, _args, _ctx, _info| {
        Ok(json!("batch all the things"))
    });
    resolvers.register_fn("User", "posts", |_parent, _args, _ctx, _info| {
        // Three posts, all written by author 1.
        Ok(json!([
            {"id": "p1", "title": "Hello", "author_id": "1"},
            {"id": "p2", "title": "Again", "author_id": "1"},
            {"id": "p3", "title": "More", "author_id": "1"},
        ]))
    });
    resolvers.register_async("Post", "author", |parent, _args, ctx, _info| async move {
        let author_id = parent["author_id"]
            .as_str()
            .ok_or_else(|| ResolverError::Internal("post without author_id".into()))?
            .to_string();
        Ok(ctx.load("author", author_id).await?)
    });

    Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .loader("author", AuthorLoader { calls })
        .build()
        .unwrap()
}

fn user_posts_authors() -> Operation {
    Operation::query().selection(
        SelectionNode::field("user")
            .argument("id", json!("1"))
            .selection(SelectionNode::field("name"))
            .selection(
                SelectionNode::field("posts")
                    .selection(SelectionNode::field("title"))
                    .selection(
                        SelectionNode::field("author").selection(SelectionNode::field("name")),
                    ),
            ),
    )
}

#[tokio::test]
async fn scenario_a_same_author_loaded_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(Arc::clone(&calls));

    let response = engine.execute(Request::operation(user_posts_authors())).await;

    assert!(!response.has_errors(), "errors: {:?}", response.errors);
    let data = response.data.unwrap();
    for index in 0..3 {
        assert_eq!(data["user"]["posts"][index]["author"]["name"], "Author 1");
    }
    // Three sibling author fields, one batched call.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_b_non_null_root_null_yields_null_data() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .object(ObjectDef::new("Query").field(FieldDef::new("a", TypeRef::named("String"))))
        .build()
        .unwrap();

    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "a", |_parent, _args, _ctx, _info| Ok(Value::Null));

    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .build()
        .unwrap();

    let response = engine
        .execute(Request::operation(
            Operation::query().selection(SelectionNode::field("a")),
        ))
        .await;

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["data"].is_null());
    assert!(json.as_object().unwrap().contains_key("data"));
    assert_eq!(json["errors"][0]["path"], json!(["a"]));
}

#[tokio::test]
async fn scenario_c_depth_limit_rejects_without_data_key() {
    // A self-referencing type makes arbitrarily deep queries expressible.
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .object(ObjectDef::new("Query").field(FieldDef::new(
            "node",
            TypeRef::option(TypeRef::named("Node")),
        )))
        .object(
            ObjectDef::new("Node")
                .field(FieldDef::new("id", TypeRef::named("ID")))
                .field(FieldDef::new(
                    "child",
                    TypeRef::option(TypeRef::named("Node")),
                )),
        )
        .build()
        .unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let mut resolvers = ResolverMap::new();
    let counter = Arc::clone(&ran);
    resolvers.register_fn("Query", "node", move |_parent, _args, _ctx, _info| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"id": "n0"}))
    });

    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .config(EngineConfig::default().with_max_depth(10))
        .build()
        .unwrap();

    // Nest 12 selection sets: node -> child x10 -> id.
    let mut selection = SelectionNode::field("id");
    for _ in 0..10 {
        selection = SelectionNode::field("child").selection(selection);
    }
    let op = Operation::query().selection(SelectionNode::field("node").selection(selection));

    let response = engine.execute(Request::operation(op)).await;

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION");
    // All-or-nothing: no resolver ran.
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_d_mutation_roots_execute_in_declaration_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let engine = {
        let engine = blog_engine(Arc::clone(&calls));
        // Rebuild with mutation resolvers recording their order.
        let schema = engine.schema().clone();
        let mut resolvers = ResolverMap::new();
        let first = Arc::clone(&order);
        resolvers.register_async("Mutation", "createUser", move |_p, _a, _c, _i| {
            let order = Arc::clone(&first);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                order.lock().unwrap().push("createUser");
                Ok(json!({"id": "u9", "name": "New User"}))
            }
        });
        let second = Arc::clone(&order);
        resolvers.register_async("Mutation", "createPost", move |_p, _a, _c, _i| {
            let order = Arc::clone(&second);
            async move {
                order.lock().unwrap().push("createPost");
                Ok(json!({"id": "p9", "title": "New Post"}))
            }
        });
        Engine::builder()
            .schema(schema)
            .resolvers(resolvers)
            .build()
            .unwrap()
    };

    let op = Operation::mutation()
        .selection(SelectionNode::field("createUser").selection(SelectionNode::field("id")))
        .selection(SelectionNode::field("createPost").selection(SelectionNode::field("id")));

    let response = engine.execute(Request::operation(op)).await;

    assert!(!response.has_errors());
    assert_eq!(*order.lock().unwrap(), vec!["createUser", "createPost"]);
}

#[tokio::test]
async fn partial_success_is_steady_state() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(calls);

    // `user` requires an id; supplying an unknown variable-free request with
    // one healthy and one failing sibling still produces data.
    let schema = engine.schema().clone();
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "motto", |_p, _a, _c, _i| {
        Ok(json!("batch all the things"))
    });
    resolvers.register_fn("Query", "user", |_p, _a, _c, _i| {
        Err(ResolverError::custom("user store offline"))
    });
    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .build()
        .unwrap();

    let op = Operation::query()
        .selection(SelectionNode::field("motto"))
        .selection(
            SelectionNode::field("user")
                .argument("id", json!("1"))
                .selection(SelectionNode::field("name")),
        );
    let response = engine.execute(Request::operation(op)).await;

    let data = response.data.as_ref().unwrap();
    assert_eq!(data["motto"], "batch all the things");
    assert!(data["user"].is_null());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].code(),
        Some(ErrorCode::ResolverError)
    );
}

#[tokio::test]
async fn response_keys_follow_selection_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(calls);

    // motto is selected after user but completes first.
    let op = Operation::query()
        .selection(
            SelectionNode::field("user")
                .argument("id", json!("1"))
                .selection(SelectionNode::field("name")),
        )
        .selection(SelectionNode::field("motto"));

    let response = engine.execute(Request::operation(op)).await;
    let serialized = serde_json::to_string(&response.data.unwrap()).unwrap();
    let user_at = serialized.find("\"user\"").unwrap();
    let motto_at = serialized.find("\"motto\"").unwrap();
    assert!(user_at < motto_at);
}

#[tokio::test]
async fn idempotent_over_unchanged_data() {
    let calls = Arc::new(AtomicUsize::new(0));

    let first = blog_engine(Arc::clone(&calls))
        .execute(Request::operation(user_posts_authors()))
        .await;
    let second = blog_engine(Arc::clone(&calls))
        .execute(Request::operation(user_posts_authors()))
        .await;

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn batch_failure_fails_all_sibling_fields_identically() {
    struct DownLoader;

    #[async_trait]
    impl BatchLoader for DownLoader {
        async fn load(
            &self,
            _keys: Vec<BatchKey>,
        ) -> Result<FxHashMap<BatchKey, Value>, BatchError> {
            Err(BatchError::new("author backend unavailable"))
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(calls);
    let schema = engine.schema().clone();

    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "user", |_p, args, _c, _i| {
        let id: String = args.require("id")?;
        Ok(json!({"id": id, "name": "Ada"}))
    });
    resolvers.register_fn("User", "posts", |_p, _a, _c, _i| {
        Ok(json!([
            {"id": "p1", "author_id": "1"},
            {"id": "p2", "author_id": "2"},
        ]))
    });
    resolvers.register_async("Post", "author", |parent, _a, ctx, _i| async move {
        let author_id = parent["author_id"].as_str().unwrap_or_default().to_string();
        Ok(ctx.load("author", author_id).await?)
    });

    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .loader("author", DownLoader)
        .build()
        .unwrap();

    let op = Operation::query().selection(
        SelectionNode::field("user")
            .argument("id", json!("1"))
            .selection(
                SelectionNode::field("posts").selection(
                    SelectionNode::field("author").selection(SelectionNode::field("name")),
                ),
            ),
    );
    let response = engine.execute(Request::operation(op)).await;

    // Both author fields fail with the same batch error; nothing is lost.
    assert_eq!(response.errors.len(), 2);
    for error in &response.errors {
        assert_eq!(error.code(), Some(ErrorCode::BatchFailure));
        assert!(error.message.contains("author backend unavailable"));
    }
    let data = response.data.unwrap();
    assert!(data["user"]["posts"][0]["author"].is_null());
    assert!(data["user"]["posts"][1]["author"].is_null());
}

#[tokio::test]
async fn loader_omitting_a_key_is_an_internal_error_at_the_field() {
    struct ForgetfulLoader;

    #[async_trait]
    impl BatchLoader for ForgetfulLoader {
        async fn load(
            &self,
            _keys: Vec<BatchKey>,
        ) -> Result<FxHashMap<BatchKey, Value>, BatchError> {
            // Answers nothing, fails nothing.
            Ok(FxHashMap::default())
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(calls);
    let schema = engine.schema().clone();

    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "user", |_p, args, _c, _i| {
        let id: String = args.require("id")?;
        Ok(json!({"id": id, "name": "Ada"}))
    });
    resolvers.register_fn("User", "posts", |_p, _a, _c, _i| {
        Ok(json!([{"id": "p1", "author_id": "1"}]))
    });
    resolvers.register_async("Post", "author", |parent, _a, ctx, _i| async move {
        let author_id = parent["author_id"].as_str().unwrap_or_default().to_string();
        Ok(ctx.load("author", author_id).await?)
    });

    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .loader("author", ForgetfulLoader)
        .build()
        .unwrap();

    let op = Operation::query().selection(
        SelectionNode::field("user")
            .argument("id", json!("1"))
            .selection(
                SelectionNode::field("posts").selection(
                    SelectionNode::field("author").selection(SelectionNode::field("name")),
                ),
            ),
    );
    let response = engine.execute(Request::operation(op)).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code(), Some(ErrorCode::Internal));
    let data = response.data.unwrap();
    assert!(data["user"]["posts"][0]["author"].is_null());
}

#[tokio::test]
async fn persisted_queries_lookup_and_enforcement() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(Arc::clone(&calls));
    let schema = engine.schema().clone();

    let store = InMemoryPersistedQueries::new();
    store.register(
        "sha256:motto",
        Operation::query().selection(SelectionNode::field("motto")),
    );

    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "motto", |_p, _a, _c, _i| {
        Ok(json!("batch all the things"))
    });

    let engine = Engine::builder()
        .schema(schema)
        .resolvers(resolvers)
        .persisted_store(store)
        .config(EngineConfig::default().with_persisted_queries_only())
        .build()
        .unwrap();

    // A registered hash executes.
    let response = engine.execute(Request::persisted("sha256:motto")).await;
    assert_eq!(response.data.unwrap()["motto"], "batch all the things");

    // An unknown hash is a validation rejection without a data key.
    let response = engine.execute(Request::persisted("sha256:unknown")).await;
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION");

    // Inline operations are refused under enforcement.
    let response = engine
        .execute(Request::operation(
            Operation::query().selection(SelectionNode::field("motto")),
        ))
        .await;
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION");
}

#[tokio::test]
async fn subscriptions_are_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = blog_engine(calls);

    let op = Operation::new(OperationKind::Subscription);
    let response = engine.execute(Request::operation(op)).await;

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION");
}
