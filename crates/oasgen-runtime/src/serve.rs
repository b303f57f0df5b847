//! HTTP/1 serving loop for a [`Service`].

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::problem::Problem;
use crate::router::Service;

async fn handle(
    service: Service,
    request: hyper::Request<Incoming>,
) -> Result<hyper::Response<Full<bytes::Bytes>>, Infallible> {
    let (parts, body) = request.into_parts();
    let response = match body.collect().await {
        Ok(collected) => {
            let request = http::Request::from_parts(parts, collected.to_bytes());
            service.call(request).await
        }
        Err(e) => Problem::bad_request(format!("failed to read request body: {e}")).into_response(),
    };
    Ok(response.map(Full::new))
}

/// Accept connections on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, service: Service) -> std::io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let service = service.clone();
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let svc = service_fn(move |req| handle(service.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(peer = %peer, error = %e, "connection error");
            }
        });
    }
}

/// Bind `addr` and serve.
pub async fn bind(addr: SocketAddr, service: Service) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    serve(listener, service).await
}
