//! Cloud Foundry service-binding discovery.
//!
//! `VCAP_SERVICES` is a JSON object of `label -> [service]`; the first service
//! carrying a `redis` tag wins.

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const VCAP_SERVICES_ENV: &str = "VCAP_SERVICES";
const REDIS_TAG: &str = "redis";

#[derive(Debug, Deserialize)]
struct VcapService {
    #[serde(default)]
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    credentials: BTreeMap<String, Value>,
}

/// Connection details of the first service tagged `redis`, if any.
pub fn redis_connection_from_vcap(vcap_services: &str) -> AppResult<Option<ConnectionInfo>> {
    let services: BTreeMap<String, Vec<VcapService>> = serde_json::from_str(vcap_services)?;

    let Some(svc) = services
        .values()
        .flatten()
        .find(|s| s.tags.iter().any(|t| t.eq_ignore_ascii_case(REDIS_TAG)))
    else {
        return Ok(None);
    };

    let host = credential(svc, "host")?;
    let port = credential(svc, "port")?;
    let port: u16 = port.parse().map_err(|e| {
        AppError::InvalidConfig(format!(
            "{VCAP_SERVICES_ENV}: redis service '{}' has invalid credentials.port '{port}': {e}",
            svc.name
        ))
    })?;
    let password = svc
        .credentials
        .get("password")
        .map(value_to_string)
        .filter(|p| !p.is_empty());

    tracing::info!(service = %svc.name, host = %host, port, "redis service found in {VCAP_SERVICES_ENV}");

    Ok(Some(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            db: 0,
            password,
            ..Default::default()
        },
    }))
}

fn credential(svc: &VcapService, key: &'static str) -> AppResult<String> {
    svc.credentials
        .get(key)
        .map(value_to_string)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::InvalidConfig(format!(
                "{VCAP_SERVICES_ENV}: redis service '{}' has no credentials.{key}",
                svc.name
            ))
        })
}

// brokers disagree on whether port is a number or a string
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(info: &ConnectionInfo) -> (&str, u16) {
        match &info.addr {
            ConnectionAddr::Tcp(host, port) => (host.as_str(), *port),
            other => panic!("expected a plain tcp address, got {other:?}"),
        }
    }

    #[test]
    fn string_port_and_special_password() {
        let vcap = r#"{"user-provided":[{"name":"cache","tags":["Redis"],
            "credentials":{"host":"redis.internal","port":"6379","password":"p@ss/word"}}]}"#;
        let info = redis_connection_from_vcap(vcap).expect("parse").expect("connection");
        assert_eq!(tcp(&info), ("redis.internal", 6379));
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/word"));
        assert_eq!(info.redis.db, 0);
    }

    #[test]
    fn empty_password_is_omitted() {
        let vcap = r#"{"p-redis":[{"name":"r","tags":["redis"],
            "credentials":{"host":"127.0.0.1","port":6379,"password":""}}]}"#;
        let info = redis_connection_from_vcap(vcap).expect("parse").expect("connection");
        assert_eq!(tcp(&info), ("127.0.0.1", 6379));
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn no_redis_tag_means_no_connection() {
        let vcap = r#"{"p-mysql":[{"name":"db","tags":["mysql"],"credentials":{}}]}"#;
        assert!(redis_connection_from_vcap(vcap).expect("parse").is_none());
    }

    #[test]
    fn missing_host_is_an_error() {
        let vcap = r#"{"p-redis":[{"name":"r","tags":["redis"],"credentials":{"port":6379}}]}"#;
        let err = redis_connection_from_vcap(vcap).unwrap_err();
        assert!(err.to_string().contains("credentials.host"), "got {err}");
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let vcap = r#"{"p-redis":[{"name":"r","tags":["redis"],
            "credentials":{"host":"h","port":"sixty"}}]}"#;
        let err = redis_connection_from_vcap(vcap).unwrap_err();
        assert!(err.to_string().contains("credentials.port"), "got {err}");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(redis_connection_from_vcap("{not json").is_err());
    }
}
