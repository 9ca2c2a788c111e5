use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::api::metrics::HTTP_COUNTERS;

/// Feeds the `/metrics` counters with each request and its outcome.
pub struct RequestMetrics;

impl<S, B> Transform<S, ServiceRequest> for RequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestMetricsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestMetricsMiddleware { service }))
    }
}

pub struct RequestMetricsMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestMetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        HTTP_COUNTERS.request_started();
        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await;
            match &res {
                Ok(response) => HTTP_COUNTERS.request_finished(response.status()),
                Err(_) => HTTP_COUNTERS.request_failed(),
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};

    #[actix_web::test]
    async fn test_counts_requests_and_errors() {
        let app = test::init_service(
            App::new()
                .wrap(RequestMetrics)
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route("/bad", web::get().to(|| async { HttpResponse::BadRequest().finish() })),
        )
        .await;

        let ok = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(ok.status(), StatusCode::OK);
        let bad = test::call_service(&app, test::TestRequest::get().uri("/bad").to_request()).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let body = test::call_and_read_body(
            &test::init_service(App::new().route("/metrics", web::get().to(crate::api::metrics::get_metrics))).await,
            test::TestRequest::get().uri("/metrics").to_request(),
        )
        .await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        let value = |name: &str| -> u64 {
            text.lines()
                .find_map(|l| l.strip_prefix(name))
                .and_then(|v| v.trim().parse().ok())
                .unwrap()
        };
        // Counters are process-wide; other tests may have bumped them too.
        assert!(value("http_requests_total ") >= 2);
        assert!(value("http_errors_total ") >= 1);
        assert!(value("http_responses_total{class=\"4xx\"} ") >= 1);
    }
}
