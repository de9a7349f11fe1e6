//! Observability wiring for the fleet-admin service.
//!
//! # Purpose and responsibility
//! Installs the process-wide tracing subscriber, the W3C trace-context
//! propagator and the Prometheus recorder, and serves `/metrics` on its own
//! listener so scrapes never pass through the route guards.
//!
//! # Signals
//! - Logs: `tracing` events filtered by `RUST_LOG` (default `info`).
//! - Traces: exported over OTLP/gRPC only when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//!   set; incoming `traceparent` headers parent the request span.
//! - Metrics:
//!   - [`AUTHZ_DECISIONS`] by `decision` (`allow`, `deny`, `unauthenticated`)
//!   - [`LOGINS`] by `outcome`
//!   - [`USERS`] gauge, refreshed at startup and on registration
//!
//! # Key invariants and assumptions
//! - Initialization is guarded by `OnceLock`, so repeated calls in tests are no-ops
//!   and every caller shares one [`PrometheusHandle`].
//! - Metric labels never carry user ids, emails or tokens.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const AUTHZ_DECISIONS: &str = "fleetadmin_authz_decisions_total";
pub const LOGINS: &str = "fleetadmin_logins_total";
pub const USERS: &str = "fleetadmin_users_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();
static PROPAGATOR_INIT: OnceLock<()> = OnceLock::new();

/// Install logging, tracing and the metrics recorder; returns the render handle.
pub fn init_observability(service_name: &str) -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );

        let provider = build_tracer_provider(service_name);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);
        if let Some(provider) = provider {
            let tracer = provider.tracer(service_name.to_string());
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let _ = registry.with(otel_layer).try_init();
        } else {
            let _ = registry.try_init();
        }
    });

    install_metrics_recorder()
}

fn build_tracer_provider(
    service_name: &str,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    // Only export spans when an OTLP endpoint is configured.
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(service_name))
        .build();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;
    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    )
}

fn resource_attributes(service_name: &str) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new("service.name", service_name.to_string())];
    if let Ok(value) =
        std::env::var("FLEET_ADMIN_INSTANCE_ID").or_else(|_| std::env::var("HOSTNAME"))
    {
        attrs.push(KeyValue::new("service.instance.id", value));
    }
    if let Ok(value) = std::env::var("DEPLOYMENT_ENVIRONMENT") {
        attrs.push(KeyValue::new("deployment.environment", value));
    }
    attrs
}

/// Remote parent context from `traceparent`/`tracestate`, empty when absent.
pub fn trace_context_from_headers(headers: &axum::http::HeaderMap) -> opentelemetry::Context {
    PROPAGATOR_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );
    });
    global::get_text_map_propagator(|prop| prop.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderMapExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Count one guard decision (`allow`, `deny` or `unauthenticated`).
pub fn record_authz_decision(decision: &'static str) {
    metrics::counter!(AUTHZ_DECISIONS, "decision" => decision).increment(1);
}

/// Count one login attempt (`success` or `failure`).
pub fn record_login(outcome: &'static str) {
    metrics::counter!(LOGINS, "outcome" => outcome).increment(1);
}

pub fn record_user_count(count: i64) {
    metrics::gauge!(USERS).set(count as f64);
}

/// Serve `/metrics` in the Prometheus text format until the task is aborted.
pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_metrics_with_listener(handle, listener, std::future::pending()).await
}

async fn serve_metrics_with_listener<F>(
    handle: PrometheusHandle,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(err) = metrics::set_global_recorder(recorder) {
                // Another recorder won; this handle will render nothing.
                tracing::warn!(error = %err, "metrics recorder already installed");
            }
            handle
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{TraceContextExt, TraceId};
    use serial_test::serial;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    #[test]
    #[serial]
    fn resource_attributes_capture_env() {
        let _g1 = EnvGuard::set("FLEET_ADMIN_INSTANCE_ID", "instance-1");
        let _g2 = EnvGuard::set("DEPLOYMENT_ENVIRONMENT", "staging");

        let attrs = resource_attributes("fleetadmin");
        let found: std::collections::HashMap<String, String> = attrs
            .into_iter()
            .map(|attr| (attr.key.as_str().to_string(), attr.value.to_string()))
            .collect();

        assert_eq!(found.get("service.name"), Some(&"fleetadmin".to_string()));
        assert_eq!(
            found.get("service.instance.id"),
            Some(&"instance-1".to_string())
        );
        assert_eq!(
            found.get("deployment.environment"),
            Some(&"staging".to_string())
        );
    }

    #[test]
    #[serial]
    fn resource_attributes_hostname_fallback() {
        let _g1 = EnvGuard::unset("FLEET_ADMIN_INSTANCE_ID");
        let _g2 = EnvGuard::set("HOSTNAME", "host-1");

        let attrs = resource_attributes("fleetadmin");
        let instance = attrs
            .iter()
            .find(|attr| attr.key.as_str() == "service.instance.id")
            .map(|attr| attr.value.to_string());
        assert_eq!(instance, Some("host-1".to_string()));
    }

    #[test]
    fn trace_context_extracts_span_context() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
                .parse()
                .unwrap(),
        );
        let context = trace_context_from_headers(&headers);
        let binding = context.span();
        let span_ctx = binding.span_context();
        assert!(span_ctx.is_valid());
        assert_eq!(
            span_ctx.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn serve_metrics_renders_authz_counters() {
        let handle = init_observability("fleetadmin-metrics-test");
        record_authz_decision("allow");
        record_login("failure");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_metrics_with_listener(handle, listener, async move {
            let _ = shutdown_rx.await;
        }));

        let deadline = Instant::now() + Duration::from_secs(1);
        while tokio::net::TcpStream::connect(addr).await.is_err() {
            assert!(Instant::now() < deadline, "metrics server never listened");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let body = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client")
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .expect("GET /metrics")
            .text()
            .await
            .expect("body");
        assert!(body.contains(AUTHZ_DECISIONS));

        let _ = shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(1), server).await;
    }
}
