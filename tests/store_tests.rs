//! Integration tests for the collection store.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flatbase::store::{Error, Store, Value};

use common::{fixture_dir, resource};

fn new_book(title: &str) -> flatbase::store::Resource {
    resource(&[
        ("title", title.into()),
        ("author", "Author".into()),
        ("year", 2020.0.into()),
        ("genres", vec!["test".to_string()].into()),
    ])
}

#[test]
fn test_create_assigns_id_and_version() {
    let dir = fixture_dir();
    let store = Store::open(dir.path()).unwrap();

    let created = store.create("books", new_book("The Go Programming Language")).unwrap();
    let id = created.get("_id").and_then(Value::as_text).unwrap().to_string();
    assert_eq!(id.len(), 26);
    assert_eq!(created["_v"], Value::Number(1.0));

    let fetched = store.get("books", &id).unwrap().unwrap();
    assert_eq!(fetched["title"], Value::Text("The Go Programming Language".into()));
    assert_eq!(fetched["_v"], Value::Number(1.0));
}

#[test]
fn test_create_rejects_invalid_resource() {
    let dir = fixture_dir();
    let store = Store::open(dir.path()).unwrap();

    // Missing title fails its pattern after zero substitution
    let result = store.create("books", resource(&[("author", "Anonymous".into())]));
    assert!(matches!(result, Err(Error::InvalidField(f)) if f == "title"));

    // Out-of-range year
    let result = store.create(
        "books",
        resource(&[("title", "t".into()), ("year", 3000.0.into())]),
    );
    assert!(matches!(result, Err(Error::InvalidField(f)) if f == "year"));
}

#[test]
fn test_partial_update_keeps_missing_fields() {
    let dir = fixture_dir();
    let mut store = Store::open(dir.path()).unwrap();
    store.set_id_gen(|| "fixed-id".to_string());

    store.create("books", new_book("Original Title")).unwrap();
    let updated = store
        .update(
            "books",
            resource(&[("_id", "fixed-id".into()), ("title", "Updated Title".into())]),
        )
        .unwrap();

    assert_eq!(updated["_v"], Value::Number(2.0));
    let fetched = store.get("books", "fixed-id").unwrap().unwrap();
    assert_eq!(fetched["title"], Value::Text("Updated Title".into()));
    assert_eq!(fetched["author"], Value::Text("Author".into()));
    assert_eq!(fetched["year"], Value::Number(2020.0));
    assert_eq!(fetched["_v"], Value::Number(2.0));
}

#[test]
fn test_update_unknown_id_fails() {
    let dir = fixture_dir();
    let store = Store::open(dir.path()).unwrap();
    let result = store.update("books", resource(&[("_id", "ghost".into())]));
    assert!(matches!(result, Err(Error::NotFound)));
}

#[test]
fn test_delete_then_recreate() {
    let dir = fixture_dir();
    let mut store = Store::open(dir.path()).unwrap();
    store.set_id_gen(|| "gone".to_string());

    store.create("books", new_book("To Delete")).unwrap();
    store.delete("books", "gone").unwrap();
    assert!(matches!(store.get("books", "gone"), Err(Error::NotFound)));
    assert!(store
        .list("books", None)
        .unwrap()
        .iter()
        .all(|r| r.get("_id") != Some(&Value::Text("gone".into()))));

    // The id can be reused at version 1
    let created = store.create("books", new_book("Second Life")).unwrap();
    assert_eq!(created["_v"], Value::Number(1.0));
    let fetched = store.get("books", "gone").unwrap().unwrap();
    assert_eq!(fetched["title"], Value::Text("Second Life".into()));
}

#[test]
fn test_list_sorted() {
    let dir = fixture_dir();
    let store = Store::open(dir.path()).unwrap();

    let by_year = store.list("books", Some("year")).unwrap();
    assert_eq!(by_year.len(), 2);
    assert_eq!(by_year[0]["year"], Value::Number(1949.0));
    assert_eq!(by_year[1]["year"], Value::Number(2020.0));

    let by_title = store.list("books", Some("title")).unwrap();
    assert_eq!(by_title[0]["title"], Value::Text("1984".into()));

    // Unknown sort keys leave the file order untouched
    let unsorted = store.list("books", Some("nope")).unwrap();
    assert_eq!(unsorted.len(), 2);
}

#[test]
fn test_list_stops_at_parse_error() {
    let dir = fixture_dir();
    common::write_collection(
        dir.path(),
        "books",
        "good,1,Title,Author,2000,,,\nbad,1,Title,Author,notayear,,,\n",
    );
    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        store.list("books", None),
        Err(Error::InvalidNumber(_))
    ));
}

#[test]
fn test_unknown_collection() {
    let dir = fixture_dir();
    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        store.list("movies", None),
        Err(Error::UnknownCollection(_))
    ));
    assert!(matches!(
        store.create("movies", new_book("x")),
        Err(Error::UnknownCollection(_))
    ));
}

#[test]
fn test_bad_schema_rows_abort_bootstrap() {
    let dir = fixture_dir();
    common::write_collection(dir.path(), "_schemas", "s1,1,books,title,text,0,0\n");
    assert!(matches!(
        Store::open(dir.path()),
        Err(Error::InvalidSchemaRecord(_))
    ));

    common::write_collection(
        dir.path(),
        "_schemas",
        "s1,1,books,_id,text,0,0,\ns2,1,books,_v,number,1,0,\ns3,1,books,x,blob,0,0,\n",
    );
    assert!(matches!(
        Store::open(dir.path()),
        Err(Error::InvalidSchemaRecord(_))
    ));

    // A collection must lead with _id and _v
    common::write_collection(dir.path(), "_schemas", "s1,1,books,title,text,0,0,\n");
    assert!(matches!(
        Store::open(dir.path()),
        Err(Error::InvalidSchemaRecord(_))
    ));
}

#[test]
fn test_hook_can_abort_mutations() {
    let dir = fixture_dir();
    let mut store = Store::open(dir.path()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    store.set_hook(move |trigger, collection, _id, _resource| {
        seen.fetch_add(1, Ordering::SeqCst);
        if trigger == "delete" && collection == "books" {
            return Err(Error::Unauthorized);
        }
        Ok(())
    });

    let created = store.create("books", new_book("Hooked")).unwrap();
    let id = created.get("_id").and_then(Value::as_text).unwrap();
    assert!(matches!(
        store.delete("books", id),
        Err(Error::Unauthorized)
    ));
    // The rejected delete never reached the log
    assert!(store.get("books", id).unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_reopen_preserves_data() {
    let dir = fixture_dir();
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.set_id_gen(|| "persisted".to_string());
        store.create("books", new_book("Durable")).unwrap();
        store.close().unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    let fetched = store.get("books", "persisted").unwrap().unwrap();
    assert_eq!(fetched["title"], Value::Text("Durable".into()));
    assert_eq!(store.list("books", None).unwrap().len(), 3);
}

#[test]
fn test_concurrent_creates_through_store() {
    let dir = fixture_dir();
    let store = Arc::new(Store::open(dir.path()).unwrap());
    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            let created = store.create("books", new_book(&format!("Book {i}"))).unwrap();
            created.get("_id").and_then(Value::as_text).unwrap().to_string()
        }));
    }
    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for id in &ids {
        assert!(store.get("books", id).unwrap().is_some());
    }
    // 2 fixture books + 32 created
    assert_eq!(store.list("books", None).unwrap().len(), 34);
}
