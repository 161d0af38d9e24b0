//! Integration tests for the Linear GraphQL client.
//!
//! These tests run the client against a mock GraphQL endpoint and verify
//! pagination, error surfacing and request shapes.

use linear::{LinearClient, ProjectCreateInput, RelationSide};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Helpers
// =============================================================================

async fn client_for(server: &MockServer) -> LinearClient {
    LinearClient::with_url("lin_api_test", &format!("{}/graphql", server.uri())).unwrap()
}

fn page(field: &str, nodes: serde_json::Value, next: Option<&str>) -> serde_json::Value {
    json!({
        "data": {
            field: {
                "nodes": nodes,
                "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_api_key_sent_without_bearer_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "lin_api_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("issueLabels", json!([]), None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let labels = client.list_labels().await.unwrap();
    assert!(labels.is_empty());
}

#[tokio::test]
async fn test_list_labels_follows_every_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""after":null"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "issueLabels",
            json!([{ "id": "l1", "name": "Bug" }]),
            Some("cursor-1"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""after":"cursor-1""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "issueLabels",
            json!([{ "id": "l2", "name": "Customer" }]),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let labels = client.list_labels().await.unwrap();

    let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Bug", "Customer"]);
}

#[tokio::test]
async fn test_find_project_by_name_is_exact_and_pages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""after":null"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "projects",
            json!([{ "id": "p0", "name": "SO1 Sales (old)" }]),
            Some("c1"),
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""after":"c1""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "projects",
            json!([{ "id": "p1", "name": "SO1 Sales" }]),
            None,
        )))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let found = client.find_project_by_name("SO1 Sales").await.unwrap();
    assert_eq!(found.map(|p| p.id).as_deref(), Some("p1"));

    let missing = client.find_project_by_name("SO1").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Argument Validation Error" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .create_project(ProjectCreateInput {
            name: "SO1 Sales".to_string(),
            description: None,
            state: None,
            priority: 0,
            start_date: None,
            target_date: None,
            lead_id: None,
            team_ids: vec!["team".to_string()],
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Argument Validation Error"));
}

#[tokio::test]
async fn test_http_error_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.list_labels().await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_inverse_relations_are_read_from_inverse_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("inverseRelations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "project": {
                    "inverseRelations": {
                        "nodes": [{
                            "type": "blockedBy",
                            "project": { "id": "a", "name": "T Sales" },
                            "relatedProject": { "id": "b", "name": "T Planning" }
                        }],
                        "pageInfo": { "hasNextPage": false, "endCursor": null }
                    }
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let relations = client
        .list_project_relations("a", RelationSide::Incoming)
        .await
        .unwrap();

    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].relation_type, "blockedBy");
    assert_eq!(relations[0].related_project.name, "T Planning");
}

#[tokio::test]
async fn test_input_type_fields_handles_unknown_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "__type": null }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let fields = client
        .input_type_fields("EntityExternalLinkCreateInput")
        .await
        .unwrap();
    assert!(fields.is_none());
}
