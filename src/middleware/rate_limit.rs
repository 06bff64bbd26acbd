use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use moka::sync::Cache;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitSettings;
use crate::utils::error::AppError;

/// Fixed-window attempt counter per client address.
///
/// A client's counter is created on its first attempt and expires `window`
/// later, so the window starts at the first attempt and is not extended by
/// further ones. The cache is bounded, idle clients are evicted by moka.
pub struct LoginRateLimiter {
    max_attempts: u32,
    trust_forwarded: bool,
    attempts: Cache<Arc<str>, Arc<AtomicU32>>,
}

impl LoginRateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let attempts = Cache::builder()
            .max_capacity(settings.max_clients)
            .time_to_live(Duration::from_secs(settings.window_secs))
            .build();

        Self {
            max_attempts: settings.max_attempts,
            trust_forwarded: settings.trust_forwarded,
            attempts,
        }
    }

    /// Counts one attempt; returns false once the client is over the limit.
    pub fn check(&self, client: &str) -> bool {
        let counter = self
            .attempts
            .get_with(Arc::from(client), || Arc::new(AtomicU32::new(0)));

        counter.fetch_add(1, Ordering::Relaxed) < self.max_attempts
    }

    /// Socket peer by default. Forwarded headers are client-controlled and only
    /// used when the deployment says a proxy rewrites them.
    fn client_key(&self, req: &ServiceRequest) -> String {
        if self.trust_forwarded {
            if let Some(addr) = req.connection_info().realip_remote_addr() {
                return addr.to_string();
            }
        }

        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Middleware wrapping the login route with a shared [`LoginRateLimiter`].
#[derive(Clone)]
pub struct LoginRateLimit {
    limiter: Arc<LoginRateLimiter>,
}

impl LoginRateLimit {
    pub fn new(limiter: Arc<LoginRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoginRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = LoginRateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoginRateLimitMiddleware {
            service,
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

pub struct LoginRateLimitMiddleware<S> {
    service: S,
    limiter: Arc<LoginRateLimiter>,
}

impl<S, B> Service<ServiceRequest> for LoginRateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client = self.limiter.client_key(&req);

        if !self.limiter.check(&client) {
            log::warn!("🚫 Login rate limit exceeded for {}", client);
            let e = AppError::RateLimited(
                "Too many login attempts, please try again later".to_string(),
            );
            let (request, _) = req.into_parts();
            let response = actix_web::ResponseError::error_response(&e).map_into_right_body();
            return Box::pin(async move { Ok(ServiceResponse::new(request, response)) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
