mod common;

use common::InMemoryService;
use dataverse_client::api::{Query, Record, RecordClient};
use dataverse_client::Error;
use uuid::Uuid;

fn client(service: &InMemoryService) -> RecordClient {
    RecordClient::new(Box::new(service.clone()))
}

#[tokio::test]
async fn test_create_assigns_id() {
    let service = InMemoryService::new();
    let client = client(&service);

    let mut account = Record::new("account").field("name", "Nightmare Coffee");
    let id = client.create(&mut account).await.unwrap();

    assert_eq!(account.id(), Some(id));
    assert_eq!(service.store.lock().unwrap().rows("account"), 1);
}

#[tokio::test]
async fn test_create_rejects_existing_record() {
    let service = InMemoryService::new();
    let client = client(&service);

    let mut account = Record::with_id("account", Uuid::new_v4()).field("name", "Contoso");
    let err = client.create(&mut account).await.unwrap_err();

    assert!(matches!(err, Error::InvalidRecord(_)));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_create_then_retrieve_returns_written_values() {
    let service = InMemoryService::new();
    let client = client(&service);

    let mut account = Record::new("account")
        .field("name", "Fourth Coffee")
        .field("address2_postalcode", "98052")
        .field("telephone1", "555-0100");
    let id = client.create(&mut account).await.unwrap();

    let retrieved = client
        .retrieve("account", id, &["name", "address2_postalcode"])
        .await
        .unwrap();

    assert_eq!(retrieved.id(), Some(id));
    assert_eq!(retrieved.get_str("name"), Some("Fourth Coffee"));
    assert_eq!(retrieved.get_str("address2_postalcode"), Some("98052"));
    // Only the requested columns, even if the service sends more
    assert_eq!(retrieved.len(), 2);
}

#[tokio::test]
async fn test_update_requires_id() {
    let service = InMemoryService::new();
    let client = client(&service);

    let err = client
        .update(&Record::new("account").field("name", "Fourth Coffee"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRecord(_)));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_update_of_missing_record_is_not_found() {
    let service = InMemoryService::new();
    let client = client(&service);

    let err = client
        .update(&Record::with_id("account", Uuid::new_v4()).field("name", "Fourth Coffee"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_update_is_partial() {
    let service = InMemoryService::new();
    let client = client(&service);

    let mut account = Record::new("account")
        .field("name", "Nightmare Coffee")
        .field("telephone1", "555-0100");
    let id = client.create(&mut account).await.unwrap();

    client
        .update(&Record::with_id("account", id).field("name", "Fourth Coffee"))
        .await
        .unwrap();

    let retrieved = client.retrieve("account", id, &["name", "telephone1"]).await.unwrap();
    assert_eq!(retrieved.get_str("name"), Some("Fourth Coffee"));
    assert_eq!(retrieved.get_str("telephone1"), Some("555-0100"));
}

#[tokio::test]
async fn test_delete_then_retrieve_is_not_found() {
    let service = InMemoryService::new();
    let client = client(&service);
    let id = service.seed("account", "Contoso");

    client.delete("account", id).await.unwrap();

    let err = client.retrieve("account", id, &["name"]).await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.delete("account", id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_query_never_exceeds_limit() {
    let service = InMemoryService::new().ignoring_top();
    for i in 0..15 {
        service.seed("account", &format!("Account {}", i));
    }
    let client = client(&service);

    let records = client
        .query(&Query::new("account").select(&["name"]).top(10))
        .await
        .unwrap();
    assert_eq!(records.len(), 10);

    let names: Vec<String> = records
        .map(|r| r.get_str("name").unwrap_or_default().to_string())
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("Account 0"));
    assert_eq!(names.last().map(String::as_str), Some("Account 9"));
}

#[tokio::test]
async fn test_query_with_fewer_rows_than_limit() {
    let service = InMemoryService::new();
    service.seed("account", "Contoso");
    let client = client(&service);

    let records = client.query(&Query::new("account").top(10)).await.unwrap();
    assert_eq!(records.len(), 1);

    let empty = client.query(&Query::new("contact").top(10)).await.unwrap();
    assert_eq!(empty.count(), 0);
}

#[tokio::test]
async fn test_service_errors_pass_through() {
    let service = InMemoryService::new().failing_on("who_am_i");
    let client = client(&service);

    let err = client.who_am_i().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("Internal Server Error"));
}

#[tokio::test]
async fn test_close_releases_service() {
    let service = InMemoryService::new();
    let client = client(&service);
    assert_eq!(client.service_name(), "memory");

    client.close();
    assert!(service.store.lock().unwrap().closed);
}
