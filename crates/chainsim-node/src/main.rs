use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chainsim_core::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS},
    BlockView, ChainConfig, ChainStore, Error,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Leading zero hex digits required of each mined block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Nonce cap per mining call
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u64,
}

/// The mutex is the single-writer discipline: appends never branch off
/// the same tip, and nobody observes a tamper sweep mid-flight.
#[derive(Clone)]
struct AppState {
    chain: Arc<Mutex<ChainStore>>,
}

impl AppState {
    fn chain(&self) -> std::sync::MutexGuard<'_, ChainStore> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
struct AppendReq {
    transactions: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn error_response(err: Error) -> Response {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::MiningExhausted { .. } => StatusCode::CONFLICT,
    };
    (status, Json(ApiError { error: err.to_string() })).into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = ChainStore::new(ChainConfig {
        difficulty: args.difficulty,
        max_attempts: args.max_attempts,
    });
    let state = AppState {
        chain: Arc::new(Mutex::new(store)),
    };

    {
        let mut chain = state.chain();
        let genesis = chain.ensure_genesis();
        info!(hash = %genesis.current_hash, "genesis ready");
    }

    let app = Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route(
            "/chain/genesis",
            post({
                let state = state.clone();
                move || async move {
                    let mut chain = state.chain();
                    let view = BlockView::from_block(chain.ensure_genesis());
                    Json(view)
                }
            }),
        )
        .route(
            "/chain/blocks",
            post({
                let state = state.clone();
                move |Json(req): Json<AppendReq>| async move {
                    // Mining is synchronous; the lock holds for the whole
                    // search, serializing concurrent appends.
                    let mut chain = state.chain();
                    match chain.append_block(req.transactions) {
                        Ok(block) => {
                            (StatusCode::CREATED, Json(BlockView::from_block(&block)))
                                .into_response()
                        }
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .route(
            "/chain/status",
            get({
                let state = state.clone();
                move || async move {
                    let chain = state.chain();
                    Json(chain.get_status())
                }
            }),
        )
        .route(
            "/chain/tamper/{block_number}",
            post({
                let state = state.clone();
                move |Path(block_number): Path<u64>| async move {
                    let mut chain = state.chain();
                    match chain.simulate_tamper(block_number) {
                        Ok(report) => Json(report).into_response(),
                        Err(err) => error_response(err),
                    }
                }
            }),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!("chainsim-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
