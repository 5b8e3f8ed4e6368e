//! Protocol multiplexer.
//!
//! One listener serves both surfaces. Each request is routed by its HTTP
//! version and `content-type` header alone: HTTP/2 with an
//! `application/grpc*` content type goes to the RPC routes, everything else
//! to the JSON gateway. The body is never read here, so the chosen service
//! receives the request untouched.

use axum::body::Body;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{header::CONTENT_TYPE, Request, Response, Version};
use sreapi_core::ProtocolConfig;
use std::task::{Context, Poll};
use tower::{BoxError, Service, ServiceExt};

/// Whether a request was framed as a binary RPC call.
pub fn is_rpc_request<B>(request: &Request<B>) -> bool {
    request.version() == Version::HTTP_2
        && request
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| {
                value
                    .as_bytes()
                    .starts_with(ProtocolConfig::RPC_CONTENT_TYPE_PREFIX)
            })
            .unwrap_or(false)
}

/// Two-way dispatcher between an RPC service and an HTTP service.
///
/// The incoming body is wrapped once into an axum [`Body`] and handed to
/// whichever side wins; both inner services take `Request<Body>`. Both are
/// cloned per request, so the multiplexer is always ready and backpressure
/// is left to each inner service's own readiness.
#[derive(Debug, Clone)]
pub struct MultiplexService<R, H> {
    rpc: R,
    http: H,
}

impl<R, H> MultiplexService<R, H> {
    pub fn new(rpc: R, http: H) -> Self {
        Self { rpc, http }
    }
}

impl<R, H, B, RB, HB> Service<Request<B>> for MultiplexService<R, H>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    R: Service<Request<Body>, Response = Response<RB>> + Clone + Send + 'static,
    R::Error: Into<BoxError>,
    R::Future: Send + 'static,
    RB: http_body::Body<Data = Bytes> + Send + 'static,
    RB::Error: Into<BoxError>,
    H: Service<Request<Body>, Response = Response<HB>> + Clone + Send + 'static,
    H::Error: Into<BoxError>,
    H::Future: Send + 'static,
    HB: http_body::Body<Data = Bytes> + Send + 'static,
    HB::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let rpc_call = is_rpc_request(&request);
        let request = request.map(Body::new);
        if rpc_call {
            let rpc = self.rpc.clone();
            Box::pin(async move {
                let response = rpc.oneshot(request).await.map_err(Into::into)?;
                Ok(response.map(Body::new))
            })
        } else {
            let http = self.http.clone();
            Box::pin(async move {
                let response = http.oneshot(request).await.map_err(Into::into)?;
                Ok(response.map(Body::new))
            })
        }
    }
}

/// Re-box an axum body into the body type tonic's routes take.
pub fn rpc_body(request: Request<Body>) -> Request<tonic::body::BoxBody> {
    request.map(tonic::body::boxed)
}
