use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Client request duration in seconds. Tagged with operation, status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of client requests currently being processed",
};

pub const SHARD_REQUESTS: MetricDef = MetricDef {
    name: "shard.requests",
    metric_type: MetricType::Counter,
    description: "Outbound shard requests issued. Tagged with operation.",
};

pub const SHARD_FAILURES: MetricDef = MetricDef {
    name: "shard.failures",
    metric_type: MetricType::Counter,
    description: "Outbound shard requests that failed or answered with a non-2xx status. Tagged with operation.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    SHARD_REQUESTS,
    SHARD_FAILURES,
];
