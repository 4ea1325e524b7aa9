mod common;
use common::{build_app, settings_for, widget_app, write_documents, API_KEY};

use cdisc_library_mcp::errors::DispatchError;
use cdisc_library_mcp::services::auth::AuthLocation;
use cdisc_library_mcp::services::dispatcher::{CacheStatus, CallRequest};
use cdisc_library_mcp::services::payload::PayloadKind;
use httpmock::prelude::*;
use serde_json::json;

fn widget_key(server: &MockServer, id: &str) -> String {
    url::Url::parse(&server.url(format!("/widgets/{}", id)))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn second_identical_get_is_served_from_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/widgets/A1").header("api-key", API_KEY);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{ "id": "A1", "name": "first" }"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let request = CallRequest::new("get_widget").path_param("id", "A1");
    let first = app.dispatcher.call(&request).await.unwrap();
    let second = app.dispatcher.call(&request).await.unwrap();

    assert_eq!(first.cache, CacheStatus::Miss);
    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(first.payload.kind, PayloadKind::Json);
    assert_eq!(first.payload.text, r#"{"id":"A1","name":"first"}"#);
    assert_eq!(second.payload, first.payload);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn different_path_values_use_different_entries() {
    let server = MockServer::start();
    let a1 = server.mock(|when, then| {
        when.method(GET).path("/widgets/A1");
        then.status(200).body(r#"{"id":"A1"}"#);
    });
    let b2 = server.mock(|when, then| {
        when.method(GET).path("/widgets/B2");
        then.status(200).body(r#"{"id":"B2"}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let first = app
        .dispatcher
        .call(&CallRequest::new("get_widget").path_param("id", "A1"))
        .await
        .unwrap();
    let other = app
        .dispatcher
        .call(&CallRequest::new("get_widget").path_param("id", "B2"))
        .await
        .unwrap();

    assert_eq!(other.cache, CacheStatus::Miss);
    assert_ne!(first.payload, other.payload);
    assert_eq!(a1.calls(), 1);
    assert_eq!(b2.calls(), 1);
    let cache = app.dispatcher.cache().unwrap();
    assert!(cache.contains(&widget_key(&server, "A1")));
    assert!(cache.contains(&widget_key(&server, "B2")));
}

#[tokio::test]
async fn cache_key_ignores_credential_placement() {
    let server = MockServer::start();
    let by_header = server.mock(|when, then| {
        when.method(GET)
            .path("/widgets/A1")
            .header("api-key", API_KEY);
        then.status(200).body(r#"{"id":"A1"}"#);
    });
    let by_query = server.mock(|when, then| {
        when.method(GET)
            .path("/widgets/A1")
            .query_param("api-key", API_KEY);
        then.status(200).body(r#"{"id":"A1"}"#);
    });

    let (_h, header_app) = widget_app(&server.base_url(), |s| {
        s.auth_location = Some(AuthLocation::Header);
    });
    let (_q, query_app) = widget_app(&server.base_url(), |s| {
        s.auth_location = Some(AuthLocation::Query);
    });

    let request = CallRequest::new("get_widget").path_param("id", "A1");
    header_app.dispatcher.call(&request).await.unwrap();
    query_app.dispatcher.call(&request).await.unwrap();

    assert_eq!(by_header.calls(), 1);
    assert_eq!(by_query.calls(), 1);
    let key = widget_key(&server, "A1");
    assert!(header_app.dispatcher.cache().unwrap().contains(&key));
    assert!(query_app.dispatcher.cache().unwrap().contains(&key));
}

#[tokio::test]
async fn expired_entry_is_revalidated_with_etag() {
    let server = MockServer::start();
    let mut initial = server.mock(|when, then| {
        when.method(GET).path("/widgets/A1");
        then.status(200)
            .header("etag", "\"v1\"")
            .body(r#"{"id":"A1","rev":1}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |s| s.cache_ttl_ms = 0);

    let request = CallRequest::new("get_widget").path_param("id", "A1");
    let first = app.dispatcher.call(&request).await.unwrap();
    assert_eq!(initial.calls(), 1);
    initial.delete();

    let not_modified = server.mock(|when, then| {
        when.method(GET)
            .path("/widgets/A1")
            .header("if-none-match", "\"v1\"");
        then.status(304);
    });

    let second = app.dispatcher.call(&request).await.unwrap();
    assert_eq!(not_modified.calls(), 1);
    assert_eq!(second.cache, CacheStatus::Revalidated);
    assert!(second.success);
    assert_eq!(second.payload.text, first.payload.text);
    assert_eq!(app.dispatcher.cache().unwrap().stats().revalidations, 1);
}

#[tokio::test]
async fn modified_response_replaces_cached_body() {
    let server = MockServer::start();
    let mut initial = server.mock(|when, then| {
        when.method(GET).path("/widgets/A1");
        then.status(200).header("etag", "\"v1\"").body(r#"{"rev":1}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |s| s.cache_ttl_ms = 0);
    let request = CallRequest::new("get_widget").path_param("id", "A1");
    app.dispatcher.call(&request).await.unwrap();
    initial.delete();

    server.mock(|when, then| {
        when.method(GET).path("/widgets/A1");
        then.status(200).header("etag", "\"v2\"").body(r#"{"rev":2}"#);
    });
    let second = app.dispatcher.call(&request).await.unwrap();
    assert_eq!(second.cache, CacheStatus::Miss);
    assert_eq!(second.payload.text, r#"{"rev":2}"#);
    let entry = app
        .dispatcher
        .cache()
        .unwrap()
        .get(&widget_key(&server, "A1"))
        .unwrap();
    assert_eq!(entry.etag.as_deref(), Some("\"v2\""));
}

#[tokio::test]
async fn non_get_is_never_cached() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/widgets")
            .header("content-type", "application/json")
            .body(r#"{"name":"new"}"#);
        then.status(201).body(r#"{"id":"N1"}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let mut request = CallRequest::new("create_widget");
    request.body = Some(json!({"name": "new"}));
    for _ in 0..2 {
        let outcome = app.dispatcher.call(&request).await.unwrap();
        assert_eq!(outcome.cache, CacheStatus::Bypass);
        assert_eq!(outcome.status, 201);
    }
    assert_eq!(mock.calls(), 2);
    assert!(app.dispatcher.cache().unwrap().is_empty());
}

#[tokio::test]
async fn upstream_error_is_an_outcome_with_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/widgets/none");
        then.status(404).body("no such widget");
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let outcome = app
        .dispatcher
        .call(&CallRequest::new("get_widget").path_param("id", "none"))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, 404);
    assert_eq!(outcome.payload.kind, PayloadKind::Text);
    assert_eq!(outcome.payload.text, "no such widget");
    assert_eq!(mock.calls(), 1);
    assert!(app.dispatcher.cache().unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_limit() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/flaky");
        then.status(503).body(r#"{"error":"unavailable"}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |s| s.retry_count = 2);

    let outcome = app
        .dispatcher
        .call(&CallRequest::new("get_flaky"))
        .await
        .unwrap();
    assert_eq!(outcome.status, 503);
    assert!(!outcome.success);
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn query_arrays_repeat_keys() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/widgets")
            .query_param("tags", "x")
            .query_param("tags", "y")
            .query_param("limit", "5");
        then.status(200).body("[]");
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let request = CallRequest::new("list_widgets")
        .query_param("tags", json!(["x", "y"]))
        .query_param("limit", 5)
        .query_param("skip", json!(null));
    let outcome = app.dispatcher.call(&request).await.unwrap();
    assert!(outcome.success);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn unknown_operation_fails_without_network() {
    let server = MockServer::start();
    let any = server.mock(|_when, then| {
        then.status(200);
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let err = app
        .dispatcher
        .call(&CallRequest::new("get_widgets_typo"))
        .await
        .unwrap_err();
    match err {
        DispatchError::OperationNotFound { suggestions, .. } => {
            assert!(!suggestions.is_empty());
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(any.calls(), 0);
}

#[tokio::test]
async fn closed_port_exhausts_into_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (_dir, app) = widget_app(&format!("http://127.0.0.1:{}", port), |s| {
        s.retry_count = 1;
    });
    let err = app
        .dispatcher
        .call(&CallRequest::new("get_widget").path_param("id", "A1"))
        .await
        .unwrap_err();
    match err {
        DispatchError::Transport { attempts, url, .. } => {
            assert_eq!(attempts, 2);
            assert!(!url.contains(API_KEY));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_misses_are_not_coalesced() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/widgets/A1");
        then.status(200).body(r#"{"id":"A1"}"#);
    });
    let (_dir, app) = widget_app(&server.base_url(), |_| {});

    let request = CallRequest::new("get_widget").path_param("id", "A1");
    let outcomes =
        futures::future::join_all((0..3).map(|_| app.dispatcher.call(&request))).await;
    for outcome in outcomes {
        let outcome = outcome.unwrap();
        assert_eq!(outcome.cache, CacheStatus::Miss);
        assert_eq!(outcome.payload.text, r#"{"id":"A1"}"#);
    }
    assert_eq!(mock.calls(), 3);
    assert_eq!(app.dispatcher.cache().unwrap().len(), 1);
}

fn query_key_document(base_url: &str) -> String {
    format!(
        r#"servers:
  - url: {base_url}
components:
  securitySchemes:
    apiKeyQuery:
      type: apiKey
      in: query
      name: key
paths:
  /widgets:
    get:
      operationId: list_widgets
"#
    )
}

#[tokio::test]
async fn declared_query_credential_never_reaches_the_cache_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/widgets")
            .query_param("key", API_KEY)
            .query_param("page", "2");
        then.status(200).body("[]");
    });
    let dir = write_documents(&[("widgets.yaml", query_key_document(&server.base_url()))]);
    let mut settings = settings_for(dir.path(), &["widgets.yaml"]);
    settings.auth_query = Some("token".to_string());
    let app = build_app(settings);

    let request = CallRequest::new("list_widgets").query_param("page", 2);
    app.dispatcher.call(&request).await.unwrap();
    let cached = app.dispatcher.call(&request).await.unwrap();

    assert_eq!(cached.cache, CacheStatus::Hit);
    assert_eq!(mock.calls(), 1);
    let key = url::Url::parse(&server.url("/widgets?page=2"))
        .unwrap()
        .to_string();
    assert!(app.dispatcher.cache().unwrap().contains(&key));
}

#[tokio::test]
async fn transport_error_url_omits_declared_query_credential() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base_url = format!("http://127.0.0.1:{}", port);
    let dir = write_documents(&[("widgets.yaml", query_key_document(&base_url))]);
    let mut settings = settings_for(dir.path(), &["widgets.yaml"]);
    settings.auth_query = Some("token".to_string());
    settings.retry_count = 0;
    let app = build_app(settings);

    let err = app
        .dispatcher
        .call(&CallRequest::new("list_widgets"))
        .await
        .unwrap_err();
    assert!(!err.to_string().contains(API_KEY));
    match err {
        DispatchError::Transport { url, .. } => assert!(!url.contains(API_KEY)),
        other => panic!("unexpected: {:?}", other),
    }
}
