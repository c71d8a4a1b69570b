//! Dropsonde `events.Envelope`, the protobuf message Doppler sends in every
//! binary firehose frame.
//!
//! Only the fields the classifier looks at are declared; prost skips the rest
//! (http events, logs, counters, container metrics).

use std::collections::HashMap;

use prost::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    HttpStartStop = 4,
    LogMessage = 5,
    ValueMetric = 6,
    CounterEvent = 7,
    Error = 8,
    ContainerMetric = 9,
}

#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(string, required, tag = "1")]
    pub origin: String,
    #[prost(enumeration = "EventType", required, tag = "2")]
    pub event_type: i32,
    /// Unix nanoseconds.
    #[prost(int64, optional, tag = "6")]
    pub timestamp: Option<i64>,
    #[prost(message, optional, tag = "9")]
    pub value_metric: Option<ValueMetric>,
    #[prost(string, optional, tag = "13")]
    pub deployment: Option<String>,
    #[prost(string, optional, tag = "14")]
    pub job: Option<String>,
    #[prost(string, optional, tag = "15")]
    pub index: Option<String>,
    #[prost(string, optional, tag = "16")]
    pub ip: Option<String>,
    #[prost(map = "string, string", tag = "17")]
    pub tags: HashMap<String, String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueMetric {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(double, required, tag = "2")]
    pub value: f64,
    #[prost(string, required, tag = "3")]
    pub unit: String,
}

impl Envelope {
    pub fn from_frame(raw: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(raw)
    }

    #[inline]
    pub fn is_value_metric(&self) -> bool {
        EventType::try_from(self.event_type) == Ok(EventType::ValueMetric)
    }

    #[inline]
    pub fn job_name(&self) -> &str {
        self.job.as_deref().unwrap_or_default()
    }

    /// Envelope as the cell `rep` job emits it; test fixtures only.
    #[cfg(test)]
    pub(crate) fn cell_metric(
        job: &str,
        index: &str,
        name: &str,
        value: f64,
        timestamp: Option<i64>,
    ) -> Self {
        Self {
            origin: "rep".into(),
            event_type: EventType::ValueMetric as i32,
            timestamp,
            value_metric: Some(ValueMetric {
                name: name.into(),
                value,
                unit: "MiB".into(),
            }),
            deployment: Some("cf".into()),
            job: Some(job.into()),
            index: Some(index.into()),
            ip: Some("10.0.16.21".into()),
            tags: HashMap::from([("source_id".to_string(), "rep".to_string())]),
        }
    }
}
