//! The HTTP transport for clack: the JSON-RPC tool endpoint, the change feed, and the
//! account routes.

mod auth;
mod config;
mod connections;
mod context;
mod errors;
mod events;
mod feed;
mod rpc;
mod schemas;

pub use auth::Session;
pub use config::*;
pub use connections::*;
pub use context::*;
pub use errors::*;
pub use feed::*;
pub use rpc::{handle as handle_rpc, ErrorObject, RpcError, RpcReply, RpcResponse};

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
};

use axum::{routing::get, Json, Router};
use chrono::Utc;
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Builds the full application router for a context.
pub fn router(context: ServerContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .merge(rpc::router())
        .merge(events::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/__health", get(health))
        .layer(cors)
        .with_state(context)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Starts the clack server
pub async fn run_server(context: ServerContext, port: u16) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {addr}");

    axum::serve(listener, router(context).into_make_service()).await
}
