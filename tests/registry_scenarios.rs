//! End-to-end registry behavior against the in-memory store

use naming_registry_integration_tests::{memory_client, memory_client_pair, unique_namespace};
use naming_registry_service::{RegistryError, ServiceType, StoreErrorCode};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_create_then_read_each_type() {
    for service_type in ServiceType::known() {
        let client = memory_client();
        client.create("foo", service_type.clone()).await.unwrap();
        assert_eq!(client.read("foo").await.unwrap(), service_type);
    }
}

#[tokio::test]
async fn test_create_twice_keeps_first_value() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();

    let err = client.create("foo", ServiceType::CHARM).await.unwrap_err();
    assert_eq!(err.to_string(), "key 'foo' exists");
    assert_eq!(client.read("foo").await.unwrap(), ServiceType::MODEL);
}

#[tokio::test]
async fn test_create_on_directory_fails() {
    let client = memory_client();
    client.create("mydir/foo", ServiceType::MODEL).await.unwrap();

    let err = client.create("mydir", ServiceType::MODEL).await.unwrap_err();
    assert!(matches!(err, RegistryError::KeyExists(_)));
}

#[tokio::test]
async fn test_create_below_leaf_passes_store_error_through() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();

    let err = client.create("foo/bar", ServiceType::MODEL).await.unwrap_err();
    assert_eq!(err.store_code(), Some(StoreErrorCode::NotDir));
}

#[tokio::test]
async fn test_update_swaps_value() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();
    client
        .update("foo", ServiceType::MODEL, ServiceType::CHARM)
        .await
        .unwrap();

    assert_eq!(client.read("foo").await.unwrap(), ServiceType::CHARM);
}

#[tokio::test]
async fn test_update_missing_key() {
    let client = memory_client();
    let err = client
        .update("foo", ServiceType::MODEL, ServiceType::CHARM)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "key 'foo' does not exist");
}

#[tokio::test]
async fn test_update_with_stale_value_changes_nothing() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();

    let err = client
        .update("foo", ServiceType::PAGE, ServiceType::CHARM)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::PreconditionFailed { .. }));
    assert_eq!(client.read("foo").await.unwrap(), ServiceType::MODEL);
}

#[tokio::test]
async fn test_delete_then_read() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();
    client.delete("foo").await.unwrap();

    let err = client.read("foo").await.unwrap_err();
    assert_eq!(err.to_string(), "key 'foo' does not exist");

    // The name is free again
    client.create("foo", ServiceType::PAGE).await.unwrap();
}

#[tokio::test]
async fn test_delete_unknown_key() {
    let client = memory_client();
    let err = client.delete("foo").await.unwrap_err();
    assert_eq!(err.to_string(), "key 'foo' does not exist");
}

#[tokio::test]
async fn test_delete_removes_subtree() {
    let client = memory_client();
    client.create("ns/a", ServiceType::MODEL).await.unwrap();
    client.create("ns/sub/b", ServiceType::PAGE).await.unwrap();

    client.delete("ns").await.unwrap();
    assert!(matches!(
        client.read("ns/sub/b").await.unwrap_err(),
        RegistryError::KeyNotFound(_)
    ));
    assert!(matches!(
        client.list("ns").await.unwrap_err(),
        RegistryError::KeyNotFound(_)
    ));
}

#[tokio::test]
async fn test_read_unknown_key() {
    let client = memory_client();
    let err = client.read("nope").await.unwrap_err();
    assert_eq!(err.to_string(), "key 'nope' does not exist");
}

#[tokio::test]
async fn test_read_directory_fails() {
    let client = memory_client();
    client.create("mydir/foo", ServiceType::MODEL).await.unwrap();

    let err = client.read("mydir").await.unwrap_err();
    assert_eq!(err.to_string(), "cannot read directory 'mydir'");
}

#[tokio::test]
async fn test_list_directory() {
    let client = memory_client();
    client.create("foo/bar", ServiceType::MODEL).await.unwrap();
    client.create("foo/baz", ServiceType::MODEL).await.unwrap();

    let names = client.list("foo").await.unwrap();
    let expected: BTreeMap<String, ServiceType> = [
        ("/foo/bar".to_string(), ServiceType::new("model")),
        ("/foo/baz".to_string(), ServiceType::new("model")),
    ]
    .into_iter()
    .collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_list_skips_nested_directories() {
    let client = memory_client();
    client.create("ns/a", ServiceType::MODEL).await.unwrap();
    client.create("ns/b", ServiceType::CHARM).await.unwrap();
    client.create("ns/inner/c", ServiceType::PAGE).await.unwrap();

    let names = client.list("ns").await.unwrap();
    assert_eq!(names.len(), 2);
    assert!(!names.contains_key("/ns"));
    assert!(!names.contains_key("/ns/inner"));

    let all = client.list_recursive("ns").await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all["/ns/inner/c"], ServiceType::PAGE);
}

#[tokio::test]
async fn test_list_non_directory_fails() {
    let client = memory_client();
    client.create("foo", ServiceType::MODEL).await.unwrap();

    let err = client.list("foo").await.unwrap_err();
    assert_eq!(err.to_string(), "'foo' is not a directory");
}

#[tokio::test]
async fn test_list_unknown_directory() {
    let client = memory_client();
    let err = client.list("foo").await.unwrap_err();
    assert_eq!(err.to_string(), "key 'foo' does not exist");
}

#[tokio::test]
async fn test_independent_clients_share_the_store() {
    let (writer, reader) = memory_client_pair();
    let namespace = unique_namespace("shared");
    let name = format!("{}/svc", namespace);

    writer.create(&name, ServiceType::PAGE).await.unwrap();
    assert_eq!(reader.read(&name).await.unwrap(), ServiceType::PAGE);
}

#[tokio::test]
async fn test_concurrent_creates_have_one_winner() {
    let (first, second) = memory_client_pair();
    let name = format!("{}/contested", unique_namespace("race"));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = if i % 2 == 0 { first.clone() } else { second.clone() };
        let name = name.clone();
        let service_type = ServiceType::known()[i % 3].clone();
        tasks.push(tokio::spawn(async move {
            client
                .create(&name, service_type.clone())
                .await
                .map(|()| service_type)
        }));
    }

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, RegistryError::KeyExists(_))));

    assert_eq!(&first.read(&name).await.unwrap(), winners[0]);
}

#[tokio::test]
async fn test_concurrent_updates_do_not_lose_writes() {
    let (first, second) = memory_client_pair();
    let name = format!("{}/counter", unique_namespace("cas"));
    first.create(&name, ServiceType::MODEL).await.unwrap();

    // Both writers observed "model"; only one swap can apply
    let a = first.update(&name, ServiceType::MODEL, ServiceType::CHARM);
    let b = second.update(&name, ServiceType::MODEL, ServiceType::PAGE);
    let (a, b) = tokio::join!(a, b);

    assert!(a.is_ok() ^ b.is_ok());
    let stored = first.read(&name).await.unwrap();
    if a.is_ok() {
        assert_eq!(stored, ServiceType::CHARM);
    } else {
        assert_eq!(stored, ServiceType::PAGE);
    }
}

#[tokio::test]
async fn test_strict_client_rejects_unknown_types() {
    let client = memory_client().with_known_types_enforced(true);
    let err = client
        .create("foo", ServiceType::new("bundle"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::UnknownServiceType(_)));
    assert!(matches!(
        client.read("foo").await.unwrap_err(),
        RegistryError::KeyNotFound(_)
    ));
}
