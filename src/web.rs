use crate::{
    errors::{EngineError, EngineResult},
    query::{ProjectionResponse, QueryFacade, SimilarityResponse, TokensResponse},
    registry::SpaceInfo,
};
use anyhow::Context;
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
struct SharedState {
    facade: QueryFacade,
}

/// All query routes over `facade`.
pub fn router(facade: QueryFacade, cors_allow_any_origin: bool) -> Router {
    let shared_state = Arc::new(SharedState { facade });

    let mut app = Router::new()
        .route("/typeahead/:space", get(typeahead))
        .route("/nearest/:space", get(nearest))
        .route("/dist/:space", get(distances))
        .route("/sim/:space", get(similarity))
        .route("/sim_multiple/:space", get(similarity_multiple))
        .route("/sim_random/:space", get(similarity_random))
        .route("/token_random/:space", get(random_tokens))
        .route("/spaces", get(spaces))
        .route("/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    if cors_allow_any_origin {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([axum::http::Method::GET]),
        );
    }

    app
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn start_app(
    facade: QueryFacade,
    listen: &str,
    cors_allow_any_origin: bool,
) -> anyhow::Result<()> {
    {
        let names: Vec<&str> = facade.registry().names().collect();
        log::info!("serving {} space(s): {}", names.len(), names.join(", "));
    }
    let app = router(facade, cors_allow_any_origin);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("couldnt bind {listen}"))?;
    log::info!("listening on {listen}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    Ok(())
}

/// Serve `facade` on `listen` until Ctrl-C or SIGTERM.
pub fn start_daemon(
    facade: QueryFacade,
    listen: &str,
    cors_allow_any_origin: bool,
) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("couldnt start tokio runtime")?
        .block_on(start_app(facade, listen, cors_allow_any_origin))
}

#[derive(Debug)]
struct HttpError(EngineError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            EngineError::UnknownSpace(_) | EngineError::UnknownToken(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidParameter(_)
            | EngineError::MissingParameter(_)
            | EngineError::InsufficientVocabulary { .. } => StatusCode::BAD_REQUEST,
            _ => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<EngineError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Decoded query string. Keeps every occurrence so `q` can repeat.
#[derive(Debug, Default)]
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn parse(raw: Option<String>) -> Self {
        let raw = raw.unwrap_or_default();
        Self(
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn required(&self, key: &'static str) -> EngineResult<String> {
        self.first(key)
            .map(str::to_string)
            .ok_or(EngineError::MissingParameter(key))
    }

    fn required_list(&self, key: &'static str) -> EngineResult<Vec<String>> {
        let values = self.all(key);
        if values.is_empty() {
            return Err(EngineError::MissingParameter(key));
        }
        Ok(values)
    }

    /// Optional positive `n`.
    fn count(&self) -> EngineResult<Option<usize>> {
        let Some(raw) = self.first("n") else {
            return Ok(None);
        };
        let n: i64 = raw
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidParameter(format!("n is not an integer: {raw:?}")))?;
        if n <= 0 {
            return Err(EngineError::InvalidParameter(format!(
                "n must be a positive integer, got {n}"
            )));
        }
        usize::try_from(n)
            .map(Some)
            .map_err(|_| EngineError::InvalidParameter(format!("n is too large: {n}")))
    }
}

async fn typeahead(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<TokensResponse>, HttpError> {
    let params = QueryParams::parse(query);
    let q = params.required("q")?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .typeahead(&space, &q)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn nearest(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ProjectionResponse>, HttpError> {
    let params = QueryParams::parse(query);
    let q = params.required("q")?;
    let n = params.count()?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .nearest(&space, &q, n)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn distances(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<ProjectionResponse>, HttpError> {
    let tokens = QueryParams::parse(query).required_list("q")?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .distances(&space, &tokens)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn similarity(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<SimilarityResponse>, HttpError> {
    let params = QueryParams::parse(query);
    let q = params.required("q")?;
    let n = params.count()?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .similarity(&space, &q, n)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn similarity_multiple(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<SimilarityResponse>, HttpError> {
    let tokens = QueryParams::parse(query).required_list("q")?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .similarity_multiple(&space, &tokens)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn similarity_random(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<SimilarityResponse>, HttpError> {
    let params = QueryParams::parse(query);
    let q = params.required("q")?;
    let n = params.count()?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .similarity_random(&space, &q, n)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn random_tokens(
    State(state): State<Arc<SharedState>>,
    Path(space): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<TokensResponse>, HttpError> {
    let n = QueryParams::parse(query).count()?;

    tokio::task::block_in_place(move || {
        state
            .facade
            .random_tokens(&space, n)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn spaces(State(state): State<Arc<SharedState>>) -> Json<Vec<SpaceInfo>> {
    Json(state.facade.spaces())
}

async fn health(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "spaces": state.facade.registry().len()}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_repeated_keys() {
        let params = QueryParams::parse(Some("q=cat&q=caf%C3%A9&n=3&q=a+b".to_string()));
        assert_eq!(params.all("q"), vec!["cat", "café", "a b"]);
        assert_eq!(params.first("q"), Some("cat"));
        assert_eq!(params.count().unwrap(), Some(3));
    }

    #[test]
    fn test_query_params_missing() {
        let params = QueryParams::parse(None);
        assert_eq!(params.count().unwrap(), None);
        assert_eq!(
            params.required("q").unwrap_err(),
            EngineError::MissingParameter("q")
        );
        assert_eq!(
            params.required_list("q").unwrap_err(),
            EngineError::MissingParameter("q")
        );
    }

    #[test]
    fn test_query_params_bad_count() {
        for raw in ["n=0", "n=-2", "n=ten", "n=1.5"] {
            let params = QueryParams::parse(Some(raw.to_string()));
            assert!(
                matches!(params.count(), Err(EngineError::InvalidParameter(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_http_error_status() {
        let cases = [
            (EngineError::UnknownSpace("x".into()), StatusCode::NOT_FOUND),
            (EngineError::UnknownToken("x".into()), StatusCode::NOT_FOUND),
            (EngineError::MissingParameter("q"), StatusCode::BAD_REQUEST),
            (
                EngineError::InvalidParameter("n".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::InsufficientVocabulary {
                    requested: 5,
                    available: 2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::EmptySpace, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError(err).into_response().status(), status);
        }
    }
}
