//! # Prometheus Metrics
//!
//! Process-wide registry for storefront services.
//!
//! - HTTP request count and latency (via [`MetricsMiddleware`])
//! - Cache hit/miss counters labelled by cache backend
//! - Recommendation counters and latency labelled by algorithm
//! - Fallback counter labelled by degradation reason
//!
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer};
//! use storefront_core::metrics::{metrics_handler, MetricsMiddleware};
//!
//! # async fn run() -> std::io::Result<()> {
//! HttpServer::new(|| {
//!     App::new()
//!         .wrap(MetricsMiddleware)
//!         .route("/metrics", web::get().to(metrics_handler))
//! })
//! .bind(("0.0.0.0", 8090))?
//! .run()
//! .await
//! # }
//! ```

use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Global registry, initialised on first use
pub static METRICS_REGISTRY: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Latency buckets in seconds, 1ms to 5s
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

pub struct MetricsRegistry {
    registry: Registry,

    /// Labels: method, path, status
    pub http_requests_total: CounterVec,

    /// Labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Labels: cache_type (redis/postgres/memory)
    pub cache_hits_total: CounterVec,

    /// Labels: cache_type (redis/postgres/memory)
    pub cache_misses_total: CounterVec,

    /// Labels: algorithm, cached
    pub recommendations_total: CounterVec,

    /// Labels: reason
    pub recommendation_fallbacks_total: CounterVec,

    /// Labels: algorithm
    pub recommendation_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "path", "status"],
        )
        .expect("http_requests_total metric definition is valid");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["method", "path"],
        )
        .expect("http_request_duration_seconds metric definition is valid");

        let cache_hits_total = CounterVec::new(
            Opts::new("cache_hits_total", "Total number of cache hits"),
            &["cache_type"],
        )
        .expect("cache_hits_total metric definition is valid");

        let cache_misses_total = CounterVec::new(
            Opts::new("cache_misses_total", "Total number of cache misses"),
            &["cache_type"],
        )
        .expect("cache_misses_total metric definition is valid");

        let recommendations_total = CounterVec::new(
            Opts::new(
                "recommendations_total",
                "Recommendation responses served, by algorithm",
            ),
            &["algorithm", "cached"],
        )
        .expect("recommendations_total metric definition is valid");

        let recommendation_fallbacks_total = CounterVec::new(
            Opts::new(
                "recommendation_fallbacks_total",
                "Requests degraded to the fallback strategy",
            ),
            &["reason"],
        )
        .expect("recommendation_fallbacks_total metric definition is valid");

        let recommendation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "recommendation_duration_seconds",
                "Recommendation pipeline latency in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["algorithm"],
        )
        .expect("recommendation_duration_seconds metric definition is valid");

        for collector in [
            Box::new(http_requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(http_request_duration_seconds.clone()),
            Box::new(cache_hits_total.clone()),
            Box::new(cache_misses_total.clone()),
            Box::new(recommendations_total.clone()),
            Box::new(recommendation_fallbacks_total.clone()),
            Box::new(recommendation_duration_seconds.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are unique within the registry");
        }

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            cache_hits_total,
            cache_misses_total,
            recommendations_total,
            recommendation_fallbacks_total,
            recommendation_duration_seconds,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn record_http_request(method: &str, path: &str, status: &str) {
    METRICS_REGISTRY
        .http_requests_total
        .with_label_values(&[method, path, status])
        .inc();
}

pub fn observe_http_duration(method: &str, path: &str, duration_seconds: f64) {
    METRICS_REGISTRY
        .http_request_duration_seconds
        .with_label_values(&[method, path])
        .observe(duration_seconds);
}

pub fn record_cache_hit(cache_type: &str) {
    METRICS_REGISTRY
        .cache_hits_total
        .with_label_values(&[cache_type])
        .inc();
}

pub fn record_cache_miss(cache_type: &str) {
    METRICS_REGISTRY
        .cache_misses_total
        .with_label_values(&[cache_type])
        .inc();
}

/// Count a served recommendation response and its pipeline latency
pub fn record_recommendation(algorithm: &str, cached: bool, duration_seconds: f64) {
    let cached = if cached { "true" } else { "false" };
    METRICS_REGISTRY
        .recommendations_total
        .with_label_values(&[algorithm, cached])
        .inc();
    METRICS_REGISTRY
        .recommendation_duration_seconds
        .with_label_values(&[algorithm])
        .observe(duration_seconds);
}

pub fn record_recommendation_fallback(reason: &str) {
    METRICS_REGISTRY
        .recommendation_fallbacks_total
        .with_label_values(&[reason])
        .inc();
}

/// Actix-web handler for `/metrics`
pub async fn metrics_handler() -> actix_web::HttpResponse {
    match METRICS_REGISTRY.gather() {
        Ok(metrics) => actix_web::HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            actix_web::HttpResponse::InternalServerError()
                .body(format!("Failed to gather metrics: {}", e))
        }
    }
}

/// Records request count and latency for every request it wraps
pub struct MetricsMiddleware;

impl<S, B> actix_web::dev::Transform<S, actix_web::dev::ServiceRequest> for MetricsMiddleware
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = MetricsMiddlewareService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> actix_web::dev::Service<actix_web::dev::ServiceRequest> for MetricsMiddlewareService<S>
where
    S: actix_web::dev::Service<
        actix_web::dev::ServiceRequest,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
    B: 'static,
{
    type Response = actix_web::dev::ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        ctx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: actix_web::dev::ServiceRequest) -> Self::Future {
        let start = std::time::Instant::now();
        let method = req.method().to_string();
        // Route pattern keeps label cardinality bounded
        let path = req
            .match_pattern()
            .unwrap_or_else(|| req.path().to_string());

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status().as_u16().to_string();

            record_http_request(&method, &path, &status);
            observe_http_duration(&method, &path, start.elapsed().as_secs_f64());

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.gather().is_ok());
    }

    #[test]
    fn test_cache_metrics() {
        record_cache_hit("memory");
        record_cache_miss("memory");

        let metrics = METRICS_REGISTRY.gather().unwrap();
        assert!(metrics.contains("cache_hits_total"));
        assert!(metrics.contains("cache_misses_total"));
    }

    #[test]
    fn test_recommendation_metrics() {
        record_recommendation("trending", false, 0.012);
        record_recommendation_fallback("store_disabled");

        let metrics = METRICS_REGISTRY.gather().unwrap();
        assert!(metrics.contains("recommendations_total"));
        assert!(metrics.contains("recommendation_duration_seconds"));
        assert!(metrics.contains("recommendation_fallbacks_total"));
    }

    #[test]
    fn test_metrics_text_format() {
        record_http_request("GET", "/health", "200");
        let metrics = METRICS_REGISTRY.gather().unwrap();

        assert!(metrics.contains("# HELP"));
        assert!(metrics.contains("# TYPE"));
        assert!(metrics.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let response = metrics_handler().await;
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }
}
