use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register descriptions for every metric the balancer emits.
///
/// Recording works without this; exporters just show the metrics undescribed.
pub fn init_metrics() {
    describe_counter!(
        "sgl_balancer_attempts_total",
        "Total attempts by service, endpoint, outcome and failure category"
    );
    describe_histogram!(
        "sgl_balancer_attempt_duration_seconds",
        "Attempt duration in seconds by service and endpoint"
    );
    describe_counter!(
        "sgl_balancer_retries_total",
        "Total retries issued by service"
    );
    describe_counter!(
        "sgl_balancer_service_unavailable_total",
        "Total requests that found no endpoint to route to"
    );
    describe_gauge!(
        "sgl_balancer_pool_size",
        "Number of endpoints currently in the pool"
    );
    describe_gauge!(
        "sgl_balancer_in_flight",
        "Attempts currently in flight per endpoint"
    );
    describe_counter!(
        "sgl_balancer_discovery_updates_total",
        "Endpoint additions and removals applied from discovery"
    );
}

pub struct BalancerMetrics;

impl BalancerMetrics {
    pub fn record_attempt(
        service: &str,
        endpoint: &str,
        outcome: &str,
        category: &str,
        duration: Duration,
    ) {
        counter!("sgl_balancer_attempts_total",
            "service" => service.to_string(),
            "endpoint" => endpoint.to_string(),
            "outcome" => outcome.to_string(),
            "category" => category.to_string()
        )
        .increment(1);

        histogram!("sgl_balancer_attempt_duration_seconds",
            "service" => service.to_string(),
            "endpoint" => endpoint.to_string()
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_retry(service: &str) {
        counter!("sgl_balancer_retries_total",
            "service" => service.to_string()
        )
        .increment(1);
    }

    pub fn record_service_unavailable(service: &str) {
        counter!("sgl_balancer_service_unavailable_total",
            "service" => service.to_string()
        )
        .increment(1);
    }

    pub fn set_pool_size(service: &str, size: usize) {
        gauge!("sgl_balancer_pool_size",
            "service" => service.to_string()
        )
        .set(size as f64);
    }

    pub fn set_in_flight(service: &str, endpoint: &str, count: usize) {
        gauge!("sgl_balancer_in_flight",
            "service" => service.to_string(),
            "endpoint" => endpoint.to_string()
        )
        .set(count as f64);
    }

    pub fn record_discovery_update(service: &str, added: usize, removed: usize) {
        counter!("sgl_balancer_discovery_updates_total",
            "service" => service.to_string(),
            "change" => "added"
        )
        .increment(added as u64);
        counter!("sgl_balancer_discovery_updates_total",
            "service" => service.to_string(),
            "change" => "removed"
        )
        .increment(removed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_static_methods() {
        // Without a recorder installed these are no-ops; they must not panic
        init_metrics();
        BalancerMetrics::record_attempt(
            "svc",
            "http://s1.example.com/",
            "FAILURE",
            "status_503",
            Duration::from_millis(12),
        );
        BalancerMetrics::record_retry("svc");
        BalancerMetrics::record_service_unavailable("svc");
        BalancerMetrics::set_pool_size("svc", 3);
        BalancerMetrics::set_in_flight("svc", "http://s1.example.com/", 0);
        BalancerMetrics::record_discovery_update("svc", 2, 1);
    }

    #[test]
    fn test_empty_string_metrics() {
        BalancerMetrics::record_retry("");
        BalancerMetrics::set_in_flight("", "", 0);
    }
}
