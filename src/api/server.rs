use std::net::SocketAddr;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::cors;
use crate::api::middleware::identity::resolve_caller_ident;
use crate::db::prelude::*;
use crate::score::ScoreError;
use crate::score::aggregator::Aggregator;
use crate::score::coordinator::AwardCoordinator;
use crate::score::directory::UserDirectory;
use crate::score::history::HistoryReader;
use crate::score::notify::{LogSink, NotificationSink, WebhookSink};
use crate::score::resolver::{ActionResolver, FixedResolver};
use crate::util::env::{self, Var};
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: &'static PgPool,
    pub coordinator: AwardCoordinator,
    pub aggregator: Aggregator,
    pub history: HistoryReader,
    pub directory: Arc<dyn UserDirectory>,
}

#[instrument(skip(tx))]
pub async fn router(tx: UnboundedSender<SocketAddr>) {
    let db_pool = db_pool().await.unwrap();

    let directory: Arc<dyn UserDirectory> = Arc::new(PgUsers::new(db_pool));
    let aggregator = Aggregator::new(db_pool, Arc::clone(&directory));

    let sink: Arc<dyn NotificationSink> = match &env::load().await.unwrap().leaderboard_webhook_url
    {
        Some(url) => Arc::new(WebhookSink::new(url.clone())),
        None => Arc::new(LogSink),
    };
    let resolver: Arc<dyn ActionResolver> = Arc::new(FixedResolver::default());

    let state = Arc::new(AppState {
        db_pool,
        coordinator: AwardCoordinator::new(db_pool, resolver, aggregator.clone(), sink),
        aggregator,
        history: HistoryReader::new(db_pool),
        directory,
    });

    //
    // award + read paths require a resolved caller identity
    let protected_routes = Router::new()
        .route("/scores", get(list_scores))
        .route("/scores/action", post(award_points))
        .route("/scores/user/{user_id}", get(user_score))
        .route_layer(middleware::from_fn(resolve_caller_ident));

    let app = Router::new()
        .merge(protected_routes)
        //
        // general
        .route("/", get(|| async { Response::new(Body::empty()) }))
        //
        // public scoreboard
        .route("/scores/leaderboard", get(leaderboard))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors().await.unwrap())
        .with_state(state);

    let port = var!(Var::ServerApiPort)
        .await
        .unwrap()
        .parse::<u16>()
        .unwrap();

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await.unwrap();

    tx.send(socket_addr).unwrap();
    axum::serve(listener, app).await.unwrap()
}

/// Custom error trace handler for `RouteError`-type responses.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument]
pub async fn start_server(
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let server_handle = tokio::task::spawn(async move {
        router(tx).await;
    });

    let logging_handle = tokio::task::spawn(async move {
        while !rx.is_closed() {
            if let Some(msg) = rx.recv().await {
                tracing::info!(
                    server_url = &format!("http://127.0.0.1:{}", msg.port()),
                    "server ready"
                );
                break;
            }
        }
    });

    let handles = vec![server_handle, logging_handle];
    Ok(handles)
}

#[allow(dead_code)]
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    QueryError(#[from] PgError),

    #[error("{0}")]
    AuthError(StatusCode),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::Score(score_err) => {
                let status = match score_err {
                    ScoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    ScoreError::UnknownUser(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ScoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    ScoreError::Conflict => StatusCode::CONFLICT,
                    ScoreError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = score_err.to_string();

                // conflicts are a caller-retryable outcome, not a server fault
                let retryable = matches!(score_err, ScoreError::Conflict);
                (status, message, if retryable { None } else { Some(self) })
            }

            RouteError::QueryError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),

            RouteError::AuthError(status) => (
                status.to_owned(),
                String::from("invalid authorization header"),
                Some(self),
            ),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
