//! HTTP layer: the browser form, the JSON API and its OpenAPI document.

use crate::aggregate::{EntityRecord, EntityReportRow};
use crate::annotate::EntityOccurrence;
use crate::article::{Article, ArticleFetcher};
use crate::error::{AnalyzeError, ErrorResponse};
use crate::ml::lexicon::DocumentSentiment;
use crate::ml::{EntityKind, SentimentLabel};
use crate::page;
use crate::reconcile::{ArticleAnalysis, Reconciler};
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub struct AppState {
    pub fetcher: ArticleFetcher,
    pub reconciler: Arc<Reconciler>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyzeQuery {
    /// Article URL
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArticleResponse {
    pub request_id: String,
    pub article: Article,
    /// Filtered body text, HTML-escaped
    pub plain_text: String,
    /// Filtered body text with sentiment-coloured entity spans
    pub highlighted_html: String,
    pub summary_html: String,
    pub entities: Vec<EntityRecord>,
    pub top_entities: Vec<EntityReportRow>,
    pub document_sentiment: Option<DocumentSentiment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(analyze_article, health),
    components(schemas(
        ArticleResponse,
        Article,
        EntityRecord,
        EntityReportRow,
        EntityOccurrence,
        EntityKind,
        SentimentLabel,
        DocumentSentiment,
        ErrorResponse,
        HealthResponse
    )),
    tags((name = "analysis", description = "Article entity sentiment API"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(index))
        .route("/api/analyze", get(analyze_article))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Fetch, then run the synchronous reconciler on a blocking thread.
async fn run_analysis(
    state: &AppState,
    url: &str,
) -> Result<(Article, ArticleAnalysis), AnalyzeError> {
    let article = state.fetcher.fetch(url).await?;
    let reconciler = state.reconciler.clone();
    let job_article = article.clone();
    let analysis = tokio::task::spawn_blocking(move || reconciler.analyze_article(&job_article))
        .await
        .map_err(|e| AnalyzeError::Worker(e.to_string()))?;
    Ok((article, analysis))
}

/// HTML form; with `?url=` the analysed article is rendered below it.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
) -> Html<String> {
    let url = query.url.unwrap_or_default();
    if url.trim().is_empty() {
        return Html(page::index_page());
    }
    match run_analysis(&state, &url).await {
        Ok((article, analysis)) => Html(page::article_page(&article, &analysis)),
        Err(e) => {
            warn!("❌ Analysis of {} failed: {}", url, e);
            Html(page::error_page(&url, &e.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/analyze",
    params(AnalyzeQuery),
    responses(
        (status = 200, description = "Article analysed", body = ArticleResponse),
        (status = 400, description = "Missing or invalid URL", body = ErrorResponse),
        (status = 502, description = "Article could not be fetched", body = ErrorResponse),
        (status = 422, description = "No article text found", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze_article(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<ArticleResponse>, AnalyzeError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AnalyzeError::InvalidUrl("missing url parameter".to_string()))?;
    let request_id = uuid::Uuid::new_v4().to_string();
    info!("🚀 [{}] Analysing {}", request_id, url);

    let (article, analysis) = run_analysis(&state, &url).await?;
    let ArticleAnalysis {
        body,
        summary,
        top_entities,
        document_sentiment,
    } = analysis;

    info!("✅ [{}] {} distinct entities", request_id, body.entities.len());
    Ok(Json(ArticleResponse {
        request_id,
        article,
        plain_text: body.plain,
        highlighted_html: body.highlighted,
        summary_html: summary.highlighted,
        entities: body.entities.records().cloned().collect(),
        top_entities,
        document_sentiment,
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "analysis"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::ml::build_backends;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig::default();
        let state = AppState {
            fetcher: ArticleFetcher::new(&config).unwrap(),
            reconciler: Arc::new(Reconciler::new(
                build_backends(&config).unwrap(),
                config.reconcile.clone(),
            )),
        };
        router(Arc::new(state))
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"ok\""));
    }

    #[tokio::test]
    async fn test_index_without_url_shows_form() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Analyse Article"));
        assert!(!body.contains("Output:"));
    }

    #[tokio::test]
    async fn test_index_with_bad_url_shows_error() {
        let (status, body) = get("/?url=ftp%3A%2F%2Fexample.com").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Output: invalid input"));
    }

    #[tokio::test]
    async fn test_api_rejects_missing_and_bad_urls() {
        let (status, body) = get("/api/analyze").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("missing url parameter"));

        let (status, _) = get("/api/analyze?url=not-a-url").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (status, body) = get("/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/api/analyze"));
    }
}
