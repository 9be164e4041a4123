//! Built-in demo engine: a small library API.
//!
//! Serves a books-and-authors schema over in-process data, wired through
//! the full engine: registered resolvers, a batched author loader, and the
//! default property resolver for plain fields (camelCase selections read
//! snake_case properties).

use graphlet_runtime::{
    ArgumentDef, BatchKey, Engine, EngineConfig, FieldDef, FnBatchLoader, ObjectDef, ResolverError,
    ResolverMap, Schema, SchemaBuilder, SchemaError, TypeRef,
};
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// In-process backing data, seeded with the classic three-book catalogue.
#[derive(Debug)]
pub struct LibraryData {
    pub books: Vec<Value>,
    pub authors: Vec<Value>,
}

impl Default for LibraryData {
    fn default() -> Self {
        Self {
            books: vec![
                json!({"id": 1, "title": "The Great Gatsby", "author_id": 1, "genre": "Fiction", "published_year": 1925}),
                json!({"id": 2, "title": "To Kill a Mockingbird", "author_id": 2, "genre": "Fiction", "published_year": 1960}),
                json!({"id": 3, "title": "1984", "author_id": 3, "genre": "Dystopian", "published_year": 1949}),
            ],
            authors: vec![
                json!({"id": 1, "name": "F. Scott Fitzgerald", "birth_year": 1896}),
                json!({"id": 2, "name": "Harper Lee", "birth_year": 1926}),
                json!({"id": 3, "name": "George Orwell", "birth_year": 1903}),
            ],
        }
    }
}

fn library_schema() -> Result<Schema, SchemaError> {
    SchemaBuilder::new()
        .query_type("Query")
        .mutation_type("Mutation")
        .object(
            ObjectDef::new("Query")
                .description("Library catalogue queries")
                .field(FieldDef::new(
                    "books",
                    TypeRef::list(TypeRef::named("Book")),
                ))
                .field(
                    FieldDef::new("book", TypeRef::option(TypeRef::named("Book")))
                        .argument(ArgumentDef::new("id", TypeRef::named("Int"))),
                )
                .field(FieldDef::new(
                    "authors",
                    TypeRef::list(TypeRef::named("Author")),
                ))
                .field(
                    FieldDef::new("author", TypeRef::option(TypeRef::named("Author")))
                        .argument(ArgumentDef::new("id", TypeRef::named("Int"))),
                )
                .field(
                    FieldDef::new(
                        "booksByGenre",
                        TypeRef::list(TypeRef::named("Book")),
                    )
                    .argument(ArgumentDef::new("genre", TypeRef::named("String"))),
                ),
        )
        .object(
            ObjectDef::new("Mutation")
                .field(
                    FieldDef::new("createBook", TypeRef::named("Book"))
                        .argument(ArgumentDef::new("title", TypeRef::named("String")))
                        .argument(ArgumentDef::new("authorId", TypeRef::named("Int")))
                        .argument(ArgumentDef::new("genre", TypeRef::named("String")))
                        .argument(ArgumentDef::new("publishedYear", TypeRef::named("Int"))),
                )
                .field(
                    FieldDef::new("updateBook", TypeRef::option(TypeRef::named("Book")))
                        .argument(ArgumentDef::new("id", TypeRef::named("Int")))
                        .argument(ArgumentDef::new(
                            "title",
                            TypeRef::option(TypeRef::named("String")),
                        ))
                        .argument(ArgumentDef::new(
                            "genre",
                            TypeRef::option(TypeRef::named("String")),
                        ))
                        .argument(ArgumentDef::new(
                            "publishedYear",
                            TypeRef::option(TypeRef::named("Int")),
                        )),
                ),
        )
        .object(
            ObjectDef::new("Book")
                .field(FieldDef::new("id", TypeRef::named("Int")))
                .field(FieldDef::new("title", TypeRef::named("String")))
                .field(FieldDef::new("genre", TypeRef::named("String")))
                .field(FieldDef::new("publishedYear", TypeRef::named("Int")))
                .field(FieldDef::new(
                    "author",
                    TypeRef::option(TypeRef::named("Author")),
                )),
        )
        .object(
            ObjectDef::new("Author")
                .field(FieldDef::new("id", TypeRef::named("Int")))
                .field(FieldDef::new("name", TypeRef::named("String")))
                .field(FieldDef::new("birthYear", TypeRef::named("Int")))
                .field(FieldDef::new(
                    "books",
                    TypeRef::list(TypeRef::named("Book")),
                )),
        )
        .build()
}

/// Builds the demo engine over fresh library data.
pub fn build_demo_engine(config: EngineConfig) -> Result<Engine, SchemaError> {
    build_demo_engine_with(config, Arc::new(Mutex::new(LibraryData::default())))
}

/// Builds the demo engine over shared library data.
pub fn build_demo_engine_with(
    config: EngineConfig,
    data: Arc<Mutex<LibraryData>>,
) -> Result<Engine, SchemaError> {
    let mut resolvers = ResolverMap::new();

    let books_data = Arc::clone(&data);
    resolvers.register_fn("Query", "books", move |_parent, _args, _ctx, _info| {
        let data = books_data.lock().unwrap();
        Ok(Value::Array(data.books.clone()))
    });

    let book_data = Arc::clone(&data);
    resolvers.register_fn("Query", "book", move |_parent, args, _ctx, _info| {
        let id: i64 = args.require("id")?;
        let data = book_data.lock().unwrap();
        Ok(data
            .books
            .iter()
            .find(|book| book["id"] == json!(id))
            .cloned()
            .unwrap_or(Value::Null))
    });

    let authors_data = Arc::clone(&data);
    resolvers.register_fn("Query", "authors", move |_parent, _args, _ctx, _info| {
        let data = authors_data.lock().unwrap();
        Ok(Value::Array(data.authors.clone()))
    });

    let author_data = Arc::clone(&data);
    resolvers.register_fn("Query", "author", move |_parent, args, _ctx, _info| {
        let id: i64 = args.require("id")?;
        let data = author_data.lock().unwrap();
        Ok(data
            .authors
            .iter()
            .find(|author| author["id"] == json!(id))
            .cloned()
            .unwrap_or(Value::Null))
    });

    let genre_data = Arc::clone(&data);
    resolvers.register_fn("Query", "booksByGenre", move |_parent, args, _ctx, _info| {
        let genre: String = args.require("genre")?;
        let data = genre_data.lock().unwrap();
        let matches: Vec<Value> = data
            .books
            .iter()
            .filter(|book| {
                book["genre"]
                    .as_str()
                    .is_some_and(|g| g.eq_ignore_ascii_case(&genre))
            })
            .cloned()
            .collect();
        Ok(Value::Array(matches))
    });

    // Book.author goes through the batch loader: one author fetch per wave
    // no matter how many books are in flight.
    resolvers.register_async("Book", "author", |parent, _args, ctx, _info| async move {
        let author_id = parent["author_id"]
            .as_i64()
            .ok_or_else(|| ResolverError::Internal("book without author_id".into()))?;
        Ok(ctx.load("author", author_id.to_string()).await?)
    });

    let author_books = Arc::clone(&data);
    resolvers.register_fn("Author", "books", move |parent, _args, _ctx, _info| {
        let data = author_books.lock().unwrap();
        let author_id = &parent["id"];
        let books: Vec<Value> = data
            .books
            .iter()
            .filter(|book| &book["author_id"] == author_id)
            .cloned()
            .collect();
        Ok(Value::Array(books))
    });

    let create_data = Arc::clone(&data);
    resolvers.register_fn("Mutation", "createBook", move |_parent, args, _ctx, _info| {
        let title: String = args.require("title")?;
        let author_id: i64 = args.require("authorId")?;
        let genre: String = args.require("genre")?;
        let published_year: i64 = args.require("publishedYear")?;

        let mut data = create_data.lock().unwrap();
        let next_id = data
            .books
            .iter()
            .filter_map(|book| book["id"].as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let book = json!({
            "id": next_id,
            "title": title,
            "author_id": author_id,
            "genre": genre,
            "published_year": published_year,
        });
        data.books.push(book.clone());
        tracing::info!(id = next_id, "created book");
        Ok(book)
    });

    let update_data = Arc::clone(&data);
    resolvers.register_fn("Mutation", "updateBook", move |_parent, args, _ctx, _info| {
        let id: i64 = args.require("id")?;
        let mut data = update_data.lock().unwrap();
        let Some(book) = data.books.iter_mut().find(|book| book["id"] == json!(id)) else {
            return Ok(Value::Null);
        };
        if let Some(title) = args.get_as::<String>("title") {
            book["title"] = json!(title);
        }
        if let Some(genre) = args.get_as::<String>("genre") {
            book["genre"] = json!(genre);
        }
        if let Some(year) = args.get_as::<i64>("publishedYear") {
            book["published_year"] = json!(year);
        }
        Ok(book.clone())
    });

    let loader_data = Arc::clone(&data);
    let author_loader = FnBatchLoader::new(move |keys: Vec<BatchKey>| {
        let data = Arc::clone(&loader_data);
        async move {
            let data = data.lock().unwrap();
            let mut found = FxHashMap::default();
            for key in keys {
                if let Some(author) = data
                    .authors
                    .iter()
                    .find(|author| author["id"].to_string() == key)
                {
                    found.insert(key, author.clone());
                }
            }
            Ok(found)
        }
    });

    Engine::builder()
        .schema(library_schema()?)
        .resolvers(resolvers)
        .loader("author", author_loader)
        .config(config)
        .build()
}
