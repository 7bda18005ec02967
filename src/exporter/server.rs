//! HTTP exporter
//!
//! ```text
//!   GET /metrics[?debug=..&name[]=..] ──▶ ScrapeHandler ──▶ registry scrape
//!   GET /healthz | /livez | /readyz    ──▶ "ok"
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::handler::ScrapeHandler;
use crate::error::{Error, Result};

/// Route one request; only the URI and headers are read
pub async fn route<B>(
    handler: Arc<ScrapeHandler>,
    req: Request<B>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/metrics" => {
            let accept = req
                .headers()
                .get(ACCEPT)
                .and_then(|v| v.to_str().ok());
            let scrape = handler.handle(req.uri().query(), accept);
            Response::builder()
                .status(scrape.status)
                .header(CONTENT_TYPE, scrape.content_type)
                .body(Full::new(scrape.body))
        }
        "/healthz" | "/livez" | "/readyz" => Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok"))),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found"))),
    };
    Ok(response.unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut fallback = Response::new(Full::new(Bytes::from("internal error")));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    }))
}

/// Serve scrapes on `addr` until the listener fails
pub async fn run_metrics_server(addr: &str, handler: Arc<ScrapeHandler>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    serve(listener, handler).await
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, handler: Arc<ScrapeHandler>) -> Result<()> {
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| route(handler.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
