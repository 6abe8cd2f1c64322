//! API Server - HTTP front of the registry and the send queue

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::handlers::{self, ApiError, AppState};
use crate::sender::EmailQueue;
use crate::templates::TemplateRegistry;

/// Which route groups are mounted
#[derive(Debug, Clone, Copy, Default)]
pub struct Routes {
    pub api: bool,
    pub preview: bool,
}

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    routes: Routes,
    addr: String,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        registry: Arc<TemplateRegistry>,
        queue: Option<EmailQueue>,
        api_key: String,
        routes: Routes,
        addr: String,
    ) -> Self {
        let state = Arc::new(AppState {
            registry,
            queue,
            api_key,
        });

        Self {
            state,
            routes,
            addr,
        }
    }

    /// Build the router with the enabled routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let mut router = Router::new().route("/health", get(handlers::health));

        if self.routes.api {
            let email_routes: Router<Arc<AppState>> = Router::new()
                .route("/email", post(handlers::send_email))
                .route_layer(middleware::from_fn_with_state(
                    self.state.clone(),
                    api_key_middleware,
                ));
            router = router.merge(email_routes);
        }

        if self.routes.preview {
            let preview_routes: Router<Arc<AppState>> = Router::new()
                .route("/preview", get(handlers::preview_locales))
                .route("/preview/:locale", get(handlers::preview_templates))
                .route("/preview/:locale/:name", get(handlers::preview_template));
            router = router.merge(preview_routes);
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Shutting down the API server");
            })
            .await?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

/// Authentication middleware - checks the `api_key` query parameter
async fn api_key_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let provided = Query::<ApiKeyQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.api_key);

    match provided {
        Some(key) if !state.api_key.is_empty() && key == state.api_key => next.run(req).await,
        _ => {
            warn!("Rejected request with missing or invalid api_key");
            (StatusCode::FORBIDDEN, Json(ApiError::new("Forbidden"))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{LocaleCatalog, LocaleTable};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn registry() -> Arc<TemplateRegistry> {
        let registry = TemplateRegistry::new();
        registry.register(
            "Welcome",
            "{% block subject %}{{ __(\"subject\") }}{% endblock %}{% block email_body %}<p>Hello</p>{% endblock %}",
        );
        let mut en = LocaleTable::new();
        en.insert("subject".to_string(), "Hi".to_string());
        registry.set_locales(LocaleCatalog::from_iter([("en".to_string(), en)]));
        Arc::new(registry)
    }

    fn server(capacity: usize) -> (ApiServer, mpsc::Receiver<crate::sender::EmailRequest>) {
        let (queue, rx) = EmailQueue::bounded(capacity);
        let server = ApiServer::new(
            registry(),
            Some(queue),
            "secret".to_string(),
            Routes {
                api: true,
                preview: true,
            },
            "127.0.0.1:0".to_string(),
        );
        (server, rx)
    }

    fn send_body(name: &str) -> String {
        json!({
            "template_name": name,
            "locale": "en",
            "email_parameters": {},
            "send_grid_parameters": {
                "from": {"email": "noreply@example.com"},
                "personalizations": [{"to": [{"email": "bob@example.com"}]}]
            }
        })
        .to_string()
    }

    fn post_email(uri: &str, content_type: &str, body: String) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _rx) = server(4);
        let response = server
            .router()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok", "templates": 1}));
    }

    #[tokio::test]
    async fn test_send_email_is_queued() {
        let (server, mut rx) = server(4);
        let response = server
            .router()
            .oneshot(post_email(
                "/email?api_key=secret",
                "application/json",
                send_body("Welcome"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"ok": true, "message": "Message successfully queued"})
        );
        assert_eq!(rx.recv().await.unwrap().template_name, "Welcome");
    }

    #[tokio::test]
    async fn test_send_email_requires_api_key() {
        let (server, _rx) = server(4);
        let response = server
            .router()
            .oneshot(post_email("/email?api_key=wrong", "application/json", send_body("Welcome")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_send_email_requires_json() {
        let (server, _rx) = server(4);
        let response = server
            .router()
            .oneshot(post_email("/email?api_key=secret", "text/plain", send_body("Welcome")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_send_email_unknown_template() {
        let (server, _rx) = server(4);
        let response = server
            .router()
            .oneshot(post_email("/email?api_key=secret", "application/json", send_body("Nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("Nope"));
    }

    #[tokio::test]
    async fn test_send_email_queue_full() {
        let (server, _rx) = server(1);
        let router = server.router();

        let first = router
            .clone()
            .oneshot(post_email("/email?api_key=secret", "application/json", send_body("Welcome")))
            .await
            .unwrap();
        let second = router
            .oneshot(post_email("/email?api_key=secret", "application/json", send_body("Welcome")))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_preview_routes() {
        let (server, _rx) = server(4);
        let router = server.router();

        let locales = router
            .clone()
            .oneshot(HttpRequest::get("/preview").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(locales).await, json!({"locales": ["en"]}));

        let html = router
            .clone()
            .oneshot(HttpRequest::get("/preview/en/Welcome").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(html.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(html.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<p>Hello</p>");

        let missing = router
            .oneshot(HttpRequest::get("/preview/fr/Welcome").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_of_parameterized_template() {
        let registry = registry();
        registry.register(
            "Order",
            "{% block subject %}Order {{ order.id }}{% endblock %}{% block email_body %}<p>Hi {{ name }}</p>{% if coupon %}<b>{{ coupon }}</b>{% endif %}{% endblock %}",
        );
        let server = ApiServer::new(
            registry,
            None,
            String::new(),
            Routes {
                api: false,
                preview: true,
            },
            "127.0.0.1:0".to_string(),
        );

        let response = server
            .router()
            .oneshot(HttpRequest::get("/preview/en/Order").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().starts_with("<p>Hi"));
    }

    #[tokio::test]
    async fn test_disabled_routes_are_not_mounted() {
        let server = ApiServer::new(
            registry(),
            None,
            String::new(),
            Routes::default(),
            "127.0.0.1:0".to_string(),
        );

        let response = server
            .router()
            .oneshot(HttpRequest::get("/preview").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
