use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Requests handled. Tagged with route, status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const POINTS_WRITTEN: MetricDef = MetricDef {
    name: "points.written",
    metric_type: MetricType::Counter,
    description: "Points handed to the backend. Tagged with tenant.",
};

pub const BACKEND_FAILURES: MetricDef = MetricDef {
    name: "backend.failures",
    metric_type: MetricType::Counter,
    description: "Failed backend writes. Tagged with tenant, kind.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    POINTS_WRITTEN,
    BACKEND_FAILURES,
];
