use actix_web::{http::StatusCode, HttpResponse};
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-wide HTTP counters, fed by `middleware::RequestMetrics`.
pub struct HttpCounters {
    requests: AtomicU64,
    in_flight: AtomicI64,
    handler_errors: AtomicU64,
    // 1xx..5xx
    by_class: [AtomicU64; 5],
}

pub static HTTP_COUNTERS: HttpCounters = HttpCounters::new();

impl HttpCounters {
    const fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            in_flight: AtomicI64::new(0),
            handler_errors: AtomicU64::new(0),
            by_class: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }

    pub fn request_started(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self, status: StatusCode) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        let class = (status.as_u16() / 100) as usize;
        if let Some(counter) = class.checked_sub(1).and_then(|i| self.by_class.get(i)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A handler or middleware returned `Err` instead of a response.
    pub fn request_failed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Responses with status >= 400 plus failed requests.
    pub fn errors(&self) -> u64 {
        self.by_class[3].load(Ordering::Relaxed)
            + self.by_class[4].load(Ordering::Relaxed)
            + self.handler_errors.load(Ordering::Relaxed)
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP http_requests_total Requests received by the storyboard service");
        let _ = writeln!(out, "# TYPE http_requests_total counter");
        let _ = writeln!(out, "http_requests_total {}", self.requests.load(Ordering::Relaxed));

        let _ = writeln!(out, "# HELP http_responses_total Responses sent, by status class");
        let _ = writeln!(out, "# TYPE http_responses_total counter");
        for (i, counter) in self.by_class.iter().enumerate() {
            let _ = writeln!(
                out,
                "http_responses_total{{class=\"{}xx\"}} {}",
                i + 1,
                counter.load(Ordering::Relaxed)
            );
        }

        let _ = writeln!(out, "# HELP http_errors_total Responses with status >= 400 and failed requests");
        let _ = writeln!(out, "# TYPE http_errors_total counter");
        let _ = writeln!(out, "http_errors_total {}", self.errors());

        let _ = writeln!(out, "# HELP http_requests_in_flight Requests currently being handled");
        let _ = writeln!(out, "# TYPE http_requests_in_flight gauge");
        let _ = writeln!(out, "http_requests_in_flight {}", self.in_flight.load(Ordering::Relaxed));
        out
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus counters", content_type = "text/plain")
    )
)]
pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(HTTP_COUNTERS.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str, series: &str) -> u64 {
        text.lines()
            .find_map(|l| l.strip_prefix(series))
            .and_then(|v| v.trim().parse().ok())
            .unwrap()
    }

    #[test]
    fn test_status_classes_and_errors() {
        let counters = HttpCounters::new();
        for status in [StatusCode::OK, StatusCode::CREATED, StatusCode::NOT_FOUND, StatusCode::BAD_GATEWAY] {
            counters.request_started();
            counters.request_finished(status);
        }
        counters.request_started();
        counters.request_failed();
        counters.request_started();

        let text = counters.render();
        assert_eq!(value(&text, "http_requests_total "), 6);
        assert_eq!(value(&text, "http_responses_total{class=\"2xx\"} "), 2);
        assert_eq!(value(&text, "http_responses_total{class=\"4xx\"} "), 1);
        assert_eq!(value(&text, "http_responses_total{class=\"5xx\"} "), 1);
        assert_eq!(value(&text, "http_errors_total "), 3);
        assert_eq!(value(&text, "http_requests_in_flight "), 1);
    }
}
