use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::db::{Article, Category, Database};
use crate::ingest::Ingester;
use crate::subscriptions::SubscriptionRegistry;

pub struct AppState {
    pub db: Arc<Database>,
    pub ingester: Arc<Ingester>,
    pub registry: Arc<SubscriptionRegistry>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/api/categories", get(list_categories))
        .route("/api/categories/:slug", get(category_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub enum AppError {
    NotFound,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::Internal(err.into())
    }
}

/// Inbound SMS gateway payload.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Body")]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshStatus {
    pub refreshing: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithArticles {
    #[serde(flatten)]
    pub category: Category,
    pub articles: Vec<Article>,
}

// Route handlers
pub async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Form(message): Form<InboundMessage>,
) -> impl IntoResponse {
    let reply = state
        .registry
        .handle_message(message.from.as_deref(), message.body.as_deref())
        .await;

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        reply,
    )
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ingester = state.ingester.clone();
    tokio::spawn(async move {
        if let Err(e) = ingester.refresh().await {
            error!("Manual ingestion run failed: {}", e);
        }
    });

    (StatusCode::ACCEPTED, Json(RefreshStatus { refreshing: true }))
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<RefreshStatus> {
    let refreshing = state.ingester.is_refreshing().await;
    Json(RefreshStatus { refreshing })
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state.db.get_all_categories().await?;
    Ok(Json(categories))
}

pub async fn category_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryWithArticles>, AppError> {
    let category = state
        .db
        .get_category_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let articles = state.db.get_articles_for_category(category.id).await?;

    Ok(Json(CategoryWithArticles { category, articles }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::ingest::{ArticleDraft, CategoryDraft, CategoryRef, StagedCategory};
    use crate::notify::NoopDispatcher;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn create_test_app() -> (Router, Arc<Database>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        let db = Arc::new(db);

        let source = SourceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..SourceConfig::default()
        };
        let ingester =
            Arc::new(Ingester::new(db.clone(), &source, Arc::new(NoopDispatcher)).unwrap());
        let state = Arc::new(AppState {
            db: db.clone(),
            ingester,
            registry: Arc::new(SubscriptionRegistry::new(db.clone())),
        });

        (router(state), db)
    }

    async fn setup_test_data(db: &Database) {
        db.commit_run(&[StagedCategory {
            category: CategoryRef::New(CategoryDraft {
                name: "Política".to_string(),
                slug: "politica".to_string(),
            }),
            articles: vec![ArticleDraft {
                title: "Governo aprova orçamento".to_string(),
                source_url: "https://www.cartamz.com/politica/1".to_string(),
                published_at: None,
                excerpt: "Resumo".to_string(),
            }],
        }])
        .await
        .unwrap();
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn webhook_request(from: &str, body: &str) -> Request<Body> {
        let form = serde_urlencoded::to_string([("From", from), ("Body", body)]).unwrap();
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap()
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_endpoint() {
            let (app, _db) = create_test_app().await;

            let response = app
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "OK");
        }
    }

    mod webhook_tests {
        use super::*;
        use crate::subscriptions::{REPLY_ADDED, REPLY_ALREADY_SUBSCRIBED, REPLY_INVALID_FORMAT};

        #[tokio::test]
        async fn test_subscribe_via_webhook() {
            let (app, db) = create_test_app().await;

            let response = app
                .clone()
                .oneshot(webhook_request("+258840000001", "IN"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, REPLY_ADDED);

            let response = app
                .oneshot(webhook_request("+258840000001", "IN"))
                .await
                .unwrap();
            assert_eq!(body_string(response).await, REPLY_ALREADY_SUBSCRIBED);

            assert_eq!(db.subscriber_count().await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_invalid_keyword_via_webhook() {
            let (app, db) = create_test_app().await;

            let response = app
                .oneshot(webhook_request("+258840000001", "HELP"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, REPLY_INVALID_FORMAT);
            assert_eq!(db.subscriber_count().await.unwrap(), 0);
        }
    }

    mod refresh_tests {
        use super::*;

        #[tokio::test]
        async fn test_refresh_endpoint() {
            let (app, _db) = create_test_app().await;

            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/refresh")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert!(body_string(response).await.contains("\"refreshing\":true"));
        }

        #[tokio::test]
        async fn test_refresh_status_endpoint() {
            let (app, _db) = create_test_app().await;

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/refresh/status")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, r#"{"refreshing":false}"#);
        }
    }

    mod category_tests {
        use super::*;

        #[tokio::test]
        async fn test_list_categories() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/categories")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body[0]["name"], "Política");
            assert_eq!(body[0]["slug"], "politica");
        }

        #[tokio::test]
        async fn test_category_detail() {
            let (app, db) = create_test_app().await;
            setup_test_data(&db).await;

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/categories/politica")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["name"], "Política");
            assert_eq!(body["articles"][0]["title"], "Governo aprova orçamento");
        }

        #[tokio::test]
        async fn test_category_detail_unknown_slug() {
            let (app, _db) = create_test_app().await;

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/categories/nada")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
