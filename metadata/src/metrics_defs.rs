//! Metrics emitted while watching the metadata server.
//!
//! No exporter is installed here, the embedding agent decides where these go.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

macro_rules! counter {
    ($def:expr $(, $key:expr => $value:expr)* $(,)?) => {
        metrics::counter!($def.name $(, $key => $value)*)
    };
}

macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

pub(crate) use counter;
pub(crate) use histogram;

pub const METADATA_FETCH: MetricDef = MetricDef {
    name: "metadata.fetch",
    metric_type: MetricType::Counter,
    description: "Number of completed requests to the metadata server, tagged by mode and outcome",
};

pub const METADATA_FETCH_DURATION: MetricDef = MetricDef {
    name: "metadata.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting for the metadata server in seconds",
};

pub const ETAG_CHANGED: MetricDef = MetricDef {
    name: "metadata.etag.changed",
    metric_type: MetricType::Counter,
    description: "Number of long-poll responses carrying a new etag",
};

pub const MALFORMED_WINDOWS_KEY: MetricDef = MetricDef {
    name: "windows_keys.malformed",
    metric_type: MetricType::Counter,
    description: "Number of distinct windows key lines that could not be decoded",
};

pub const ALL_METRICS: &[MetricDef] = &[
    METADATA_FETCH,
    METADATA_FETCH_DURATION,
    ETAG_CHANGED,
    MALFORMED_WINDOWS_KEY,
];
