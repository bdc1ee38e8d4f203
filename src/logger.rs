use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::USER_AGENT,
    Error,
};
use futures::future::LocalBoxFuture;
use log::info;
use std::rc::Rc;
use std::time::Instant;

/// Request logging middleware
/// Logs method, path, status, latency, peer address and user agent of every request.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let remote_ip = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            // Query strings and headers other than the user agent are never
            // logged: they may carry credentials.
            info!(
                "request method={} path={} status={} duration_ms={} remote_ip={} user_agent={}",
                method,
                path,
                res.status().as_u16(),
                start_time.elapsed().as_millis(),
                remote_ip,
                user_agent
            );

            Ok(res)
        })
    }
}
