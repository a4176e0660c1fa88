use super::models::{Item, ItemFields, NewItem, NewRegion};
use super::*;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::{json, Map};
use std::time::Duration;

const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn catalog(server: &MockServer) -> Catalog {
    let client = ClientBuilder::new(Client::new()).build();
    let firestore = Firestore::new_with_client(client, &server.url("/v1"), "test-project");
    Catalog::new(firestore, Duration::from_secs(60))
}

fn hammer() -> NewItem {
    NewItem {
        name: "Hammer".into(),
        category: "Werkzeug".into(),
        region: "north".into(),
        extra: Map::new(),
    }
}

fn listen_body(collection: &str, documents: serde_json::Value) -> serde_json::Value {
    let mut messages =
        vec![json!({ "targetChange": { "targetChangeType": "ADD", "targetIds": [1] } })];
    for document in documents.as_array().cloned().unwrap_or_default() {
        let mut document = document;
        let id = document["id"].as_str().unwrap().to_string();
        document["name"] = json!(format!(
            "projects/test-project/databases/(default)/documents/{}/{}",
            collection, id
        ));
        document.as_object_mut().unwrap().remove("id");
        messages.push(json!({ "documentChange": { "document": document, "targetIds": [1] } }));
    }
    messages.push(json!({ "targetChange": { "targetChangeType": "CURRENT", "targetIds": [1] } }));
    messages.push(json!({ "targetChange": {} }));
    json!(messages)
}

fn mock_listen(server: &MockServer, collection: &str, documents: serde_json::Value) {
    let body = listen_body(collection, documents);
    let collection = collection.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path(format!("{}:listen", DOCS))
            .json_body(json!({
                "addTarget": {
                    "query": {
                        "parent": "projects/test-project/databases/(default)/documents",
                        "structuredQuery": { "from": [{ "collectionId": collection }] }
                    },
                    "targetId": 1
                }
            }));
        then.status(200).json_body(body);
    });
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_add_item_is_stored_as_approved() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/items", DOCS))
            .json_body(json!({
                "fields": {
                    "name": { "stringValue": "Hammer" },
                    "category": { "stringValue": "Werkzeug" },
                    "region": { "stringValue": "north" },
                    "approved": { "booleanValue": true }
                }
            }));
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/items/new1",
            "fields": {}
        }));
    });

    let item = catalog.add_item(hammer()).await.unwrap();
    assert_eq!(item.id, "new1");
    assert!(item.fields.approved);
    assert_eq!(catalog.db_error(), None);
    mock.assert();
}

#[tokio::test]
async fn test_failed_write_sets_message_and_success_clears_it() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    server.mock(|when, then| {
        when.method(PATCH).path(format!("{}/items/i1", DOCS));
        then.status(500).json_body(json!({
            "error": { "code": 500, "message": "internal", "status": "INTERNAL" }
        }));
    });
    server.mock(|when, then| {
        when.method(DELETE).path(format!("{}/items/i2", DOCS));
        then.status(200).json_body(json!({}));
    });

    let item = Item {
        id: "i1".into(),
        fields: ItemFields::from(hammer()),
    };
    let err = catalog.update_item(item).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Fehler beim Aktualisieren des Artikels in der Datenbank."
    );
    assert!(matches!(
        err,
        CatalogError::Database {
            operation: DbOperation::UpdateItem,
            ..
        }
    ));
    assert_eq!(
        catalog.db_error().as_deref(),
        Some("Fehler beim Aktualisieren des Artikels in der Datenbank.")
    );

    catalog.delete_item("i2").await.unwrap();
    assert_eq!(catalog.db_error(), None);
}

#[tokio::test]
async fn test_region_writes() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    let add = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/regions", DOCS))
            .json_body(json!({ "fields": { "name": { "stringValue": "Nord" } } }));
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/regions/r1",
            "fields": { "name": { "stringValue": "Nord" } }
        }));
    });
    let update = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{}/regions/r1", DOCS))
            .json_body(json!({ "fields": { "name": { "stringValue": "Nordost" } } }));
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/regions/r1"
        }));
    });
    server.mock(|when, then| {
        when.method(DELETE).path(format!("{}/regions/r1", DOCS));
        then.status(403).json_body(json!({
            "error": { "code": 403, "message": "denied", "status": "PERMISSION_DENIED" }
        }));
    });

    let mut region = catalog
        .add_region(NewRegion {
            name: "Nord".into(),
            extra: Map::new(),
        })
        .await
        .unwrap();
    assert_eq!(region.id, "r1");

    region.fields.name = "Nordost".into();
    catalog.update_region(region).await.unwrap();

    let err = catalog.delete_region("r1").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Fehler beim Löschen des Gebiets aus der Datenbank."
    );

    add.assert();
    update.assert();
}

#[tokio::test]
async fn test_invalid_input_never_reaches_firestore() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    let mut blank = hammer();
    blank.name = "  ".into();
    assert!(matches!(
        catalog.add_item(blank).await,
        Err(CatalogError::Invalid(_))
    ));
    assert!(matches!(
        catalog.delete_region("a/b").await,
        Err(CatalogError::Invalid(_))
    ));
    assert_eq!(catalog.db_error(), None);
}

#[tokio::test]
async fn test_subscribe_fills_live_lists() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    mock_listen(
        &server,
        "items",
        json!([
            {
                "id": "i1",
                "fields": {
                    "id": { "stringValue": "i1" },
                    "name": { "stringValue": "Hammer" },
                    "category": { "stringValue": "Werkzeug" },
                    "region": { "stringValue": "north" },
                    "approved": { "booleanValue": true },
                    "stock": { "integerValue": "7" }
                }
            },
            {
                "id": "i2",
                "fields": {
                    "name": { "stringValue": "Apfel" },
                    "category": { "stringValue": "Obst" },
                    "region": { "stringValue": "south" }
                }
            }
        ]),
    );
    mock_listen(
        &server,
        "regions",
        json!([
            { "id": "north", "fields": { "name": { "stringValue": "Nord" } } },
            { "id": "south", "fields": { "name": { "stringValue": "Süd" } } }
        ]),
    );

    assert!(!catalog.is_synced());
    catalog.subscribe();
    catalog.subscribe();
    assert!(catalog.is_subscribed());

    wait_until(|| catalog.is_synced()).await;

    let items = catalog.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "i1");
    assert!(!items[0].fields.extra.contains_key("id"));
    assert_eq!(items[0].fields.extra.get("stock"), Some(&json!(7)));
    assert!(items[1].fields.approved);

    assert_eq!(catalog.regions().len(), 2);
    let north: Vec<String> = catalog
        .items_in_region("north")
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(north, vec!["i1".to_string()]);

    catalog.unsubscribe();
    assert!(!catalog.is_subscribed());
    assert_eq!(catalog.items().len(), 2);
}

#[tokio::test]
async fn test_subscription_failure_sets_message() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{}:listen", DOCS));
        then.status(403).json_body(json!({
            "error": { "code": 403, "message": "denied", "status": "PERMISSION_DENIED" }
        }));
    });

    catalog.subscribe();
    wait_until(|| catalog.db_error().is_some()).await;

    let message = catalog.db_error().unwrap();
    assert!(
        message == DbOperation::LoadItems.message() || message == DbOperation::LoadRegions.message()
    );
    assert!(!catalog.is_synced());
}

#[tokio::test]
async fn test_live_lists_keep_documents_with_odd_fields() {
    let server = MockServer::start();
    let catalog = catalog(&server);

    mock_listen(
        &server,
        "items",
        json!([
            {
                "id": "i1",
                "fields": {
                    "name": { "stringValue": "Hammer" },
                    "category": { "stringValue": "Werkzeug" },
                    "region": { "stringValue": "north" }
                }
            },
            {
                "id": "i2",
                "fields": {
                    "name": { "stringValue": "Zange" },
                    "region": { "nullValue": null }
                }
            },
            {
                "id": "i3",
                "fields": { "category": { "stringValue": "Obst" } }
            },
            {
                "id": "i4",
                "fields": {
                    "name": { "stringValue": "Schraube" },
                    "category": { "integerValue": "5" },
                    "approved": { "stringValue": "ja" }
                }
            }
        ]),
    );
    mock_listen(
        &server,
        "regions",
        json!([
            { "id": "north", "fields": { "name": { "stringValue": "Nord" } } },
            { "id": "empty", "fields": {} }
        ]),
    );

    catalog.subscribe();
    wait_until(|| catalog.is_synced()).await;

    let items = catalog.items();
    let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["i1", "i2", "i3", "i4"]);
    assert_eq!(items[1].region(), "");
    assert_eq!(items[2].name(), "");
    assert_eq!(items[2].category(), "Obst");
    assert_eq!(items[3].category(), "5");
    assert!(items[3].fields.approved);

    let regions = catalog.regions();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].id, "empty");
    assert_eq!(regions[0].name(), "");

    // A nameless item can still be removed.
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(format!("{}/items/i3", DOCS));
        then.status(200).json_body(json!({}));
    });
    catalog.delete_item("i3").await.unwrap();
    delete.assert();

    catalog.unsubscribe();
}
