use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header as header_is, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wp_search_proxy::api::create_router;

mod test_helpers {
    use super::*;
    use std::sync::Arc;
    use wp_search_proxy::api::AppState;
    use wp_search_proxy::{Config, HttpTransport, SearchAggregator};

    pub struct TestResponse {
        pub status: StatusCode,
        pub headers: axum::http::HeaderMap,
        pub body: String,
    }

    impl TestResponse {
        pub fn json(&self) -> Value {
            serde_json::from_str(&self.body).expect("response body should be JSON")
        }
    }

    pub fn config_for(server: &MockServer) -> Config {
        Config {
            upstream_base: Some(server.uri()),
            timeout_seconds: 5,
            ..Config::default()
        }
    }

    pub fn app_with(config: Config) -> axum::Router {
        let transport = HttpTransport::new(&config).expect("client should build");
        create_router(AppState {
            aggregator: Arc::new(SearchAggregator::new(Arc::new(transport))),
            config: Arc::new(config),
        })
    }

    pub async fn send(app: axum::Router, request: Request<Body>) -> Result<TestResponse> {
        let response = app.oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok(TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec())?,
        })
    }

    pub async fn get(app: axum::Router, uri: &str) -> Result<TestResponse> {
        let request = Request::builder()
            .uri(uri)
            .header(header::HOST, "proxy.local")
            .body(Body::empty())?;
        send(app, request).await
    }

    pub fn assert_fixed_headers(response: &TestResponse) {
        assert_eq!(
            response.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            response.headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(),
            "86400"
        );
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_posts_search_forwards_params_and_headers() -> Result<()> {
    let server = MockServer::start().await;
    let upstream_body = r#"[{"id":10,"title":{"rendered":"Ejemplo"}}]"#;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("search", "ejemplo"))
        .and(query_param("per_page", "5"))
        .and(query_param("page", "1"))
        .and(query_param("status", "publish"))
        .and(query_param("orderby", "date"))
        .and(header_is("accept", "application/json"))
        .and(header_is("user-agent", "WordPress Search Proxy/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(upstream_body))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with(config_for(&server));
    let response = get(app, "/?endpoint=posts&search=ejemplo&per_page=5&orderby=date").await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, upstream_body);
    assert_fixed_headers(&response);
    Ok(())
}

#[tokio::test]
async fn test_per_page_over_cap_not_forwarded() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param_is_missing("per_page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/?endpoint=posts&per_page=150").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "[]");
    Ok(())
}

#[tokio::test]
async fn test_id_becomes_path_segment() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/pages/456"))
        .and(query_param_is_missing("id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 456})))
        .expect(1)
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/search?endpoint=pages&id=456").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["id"], 456);
    Ok(())
}

#[tokio::test]
async fn test_all_merges_and_sorts_by_modified() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("search", "wordpress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "modified": "2024-01-01T00:00:00"},
            {"id": 3, "date": "2024-03-01T00:00:00"},
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/pages"))
        .and(query_param("search", "wordpress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "modified": "2024-06-01T00:00:00"},
            {"id": 4, "title": "Página sin fecha"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/?endpoint=all&search=wordpress").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Página sin fecha"));

    let items = response.json();
    let order: Vec<(i64, &str)> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|v| (v["id"].as_i64().unwrap(), v["content_type"].as_str().unwrap()))
        .collect();
    assert_eq!(order, vec![(2, "page"), (3, "post"), (1, "post"), (4, "page")]);
    Ok(())
}

#[tokio::test]
async fn test_all_aborts_when_pages_fails() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/pages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/?endpoint=all").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["error"], "Error en la petición");
    assert_eq!(body["message"], "Error en búsqueda global: Error HTTP: 503");
    Ok(())
}

#[tokio::test]
async fn test_invalid_endpoint_is_bad_request() -> Result<()> {
    let server = MockServer::start().await;

    let response = get(app_with(config_for(&server)), "/?endpoint=comments").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["error"].is_string());
    assert_eq!(response.json()["message"], "Endpoint no válido: comments");
    assert_fixed_headers(&response);
    Ok(())
}

#[tokio::test]
async fn test_upstream_not_found_is_bad_request() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "rest_post_invalid_id"})))
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/?endpoint=posts&id=999").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["message"].as_str().unwrap().contains("404"));
    Ok(())
}

#[tokio::test]
async fn test_upstream_timeout_is_bad_request() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = wp_search_proxy::Config {
        timeout_seconds: 1,
        ..config_for(&server)
    };
    let response = get(app_with(config), "/?endpoint=posts&search=lento").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(
        response.json()["message"]
            .as_str()
            .unwrap()
            .starts_with("Error de transporte")
    );
    Ok(())
}

#[tokio::test]
async fn test_redirects_are_followed() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/moved/wp-json/wp/v2/posts", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":8}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let response = get(app_with(config_for(&server)), "/?endpoint=posts").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, r#"[{"id":8}]"#);
    Ok(())
}

#[tokio::test]
async fn test_empty_query_returns_help() -> Result<()> {
    let server = MockServer::start().await;

    let response = get(app_with(config_for(&server)), "/").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_fixed_headers(&response);
    let doc = response.json();
    assert_eq!(doc["allowed_endpoints"], json!(["posts", "pages", "all"]));
    assert_eq!(doc["base_url"], server.uri());
    assert!(response.body.contains("\n    \"title\""));
    Ok(())
}

#[tokio::test]
async fn test_help_uses_request_host_without_configured_upstream() -> Result<()> {
    let config = wp_search_proxy::Config {
        site_base_path: "/wordpress".into(),
        ..wp_search_proxy::Config::default()
    };

    let response = get(app_with(config), "/?help").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["base_url"], "http://proxy.local/wordpress");
    Ok(())
}

#[tokio::test]
async fn test_post_is_method_not_allowed() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/?endpoint=posts&search=x")
        .header(header::HOST, "proxy.local")
        .body(Body::empty())?;
    let response = send(app_with(config_for(&server)), request).await?;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_fixed_headers(&response);
    assert_eq!(
        response.json(),
        json!({"error": "Método no permitido", "message": "Solo se permiten peticiones GET"})
    );
    Ok(())
}

#[tokio::test]
async fn test_head_is_method_not_allowed() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(0)
        .mount(&server)
        .await;

    for uri in ["/?help", "/?endpoint=posts&search=x", "/search?endpoint=all"] {
        let request = Request::builder()
            .method("HEAD")
            .uri(uri)
            .header(header::HOST, "proxy.local")
            .body(Body::empty())?;
        let response = send(app_with(config_for(&server)), request).await?;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "HEAD {uri}");
        assert_fixed_headers(&response);
    }
    Ok(())
}

#[tokio::test]
async fn test_help_uses_uri_authority_without_host_header() -> Result<()> {
    let request = Request::builder()
        .uri("http://wp.example.com/?help")
        .body(Body::empty())?;
    let response = send(app_with(wp_search_proxy::Config::default()), request).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["base_url"], "http://wp.example.com");
    Ok(())
}

#[tokio::test]
async fn test_forwarded_host_preferred_over_host_header() -> Result<()> {
    let request = Request::builder()
        .uri("/?help")
        .header(header::HOST, "internal:8080")
        .header("x-forwarded-host", "example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())?;
    let response = send(app_with(wp_search_proxy::Config::default()), request).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["base_url"], "https://example.com");
    Ok(())
}

#[tokio::test]
async fn test_options_returns_empty_ok() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/?endpoint=posts")
        .header(header::HOST, "proxy.local")
        .body(Body::empty())?;
    let response = send(app_with(config_for(&server)), request).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert_fixed_headers(&response);
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() -> Result<()> {
    let server = MockServer::start().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/search")
        .header(header::HOST, "proxy.local")
        .header(header::ORIGIN, "https://frontend.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())?;
    let response = send(app_with(config_for(&server)), request).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_fixed_headers(&response);
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = MockServer::start().await;

    let response = get(app_with(config_for(&server)), "/health").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"status": "ok"}));
    Ok(())
}
