use shared::metrics_defs::{MetricDef, MetricType};

pub const DATAGRAMS_SENT: MetricDef = MetricDef {
    name: "backend.datagrams_sent",
    metric_type: MetricType::Counter,
    description: "UDP datagrams sent to the backend. Tagged with database.",
};

pub const DATABASES_CREATED: MetricDef = MetricDef {
    name: "backend.databases_created",
    metric_type: MetricType::Counter,
    description: "Databases provisioned at startup",
};

pub const ALL_METRICS: &[MetricDef] = &[DATAGRAMS_SENT, DATABASES_CREATED];
