use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::{Rng, rng};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::metrics::AppMetrics;
use crate::error::{AppError, AppResult};
use crate::ingest::cf::{CfClient, CfInfo, OAuthToken};
use crate::ingest::classify::Classifier;
use crate::ingest::config::FirehoseConfig;
use crate::ingest::envelope::Envelope;
use crate::ingest::sink::CapacitySink;
use crate::ingest::tls::install_crypto_provider;

/// Doppler only forwards value metrics and counters with this filter.
const METRICS_FILTER: &str = "metrics";

/// `<prefix>-<128 random bits as hex>`; each process gets its own subscription.
pub fn subscription_id(prefix: &str) -> String {
    let n: u128 = rng().random();
    format!("{}-{n:032x}", prefix.trim())
}

/// Where to connect and what to present.
#[derive(Clone)]
pub struct FirehoseTarget {
    pub base_url: String,
    pub authorization: String,
}

impl std::fmt::Debug for FirehoseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirehoseTarget")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FirehoseTarget {
    /// CF API login when credentials are configured, the static token otherwise.
    pub async fn resolve(cfg: &FirehoseConfig) -> AppResult<Self> {
        match cfg.cf_credentials()? {
            Some(creds) => {
                let cf = CfClient::new(&creds.api, Duration::from_millis(cfg.connect_timeout_ms));
                let (info, token) = cf.login(&creds).await?;
                Self::from_login(cfg, &info, &token)
            }
            None => {
                let base_url = cfg
                    .url
                    .clone()
                    .ok_or(AppError::MissingConfig("firehose.url"))?;
                Ok(Self {
                    base_url,
                    authorization: cfg.static_authorization()?,
                })
            }
        }
    }

    /// `firehose.url` wins over the endpoint the CF API advertises.
    pub fn from_login(cfg: &FirehoseConfig, info: &CfInfo, token: &OAuthToken) -> AppResult<Self> {
        let base_url = cfg
            .url
            .clone()
            .or_else(|| info.doppler_logging_endpoint.clone())
            .ok_or_else(|| {
                AppError::InvalidConfig(
                    "CF API advertises no doppler_logging_endpoint and firehose.url is unset".into(),
                )
            })?;

        Ok(Self {
            base_url,
            authorization: token.authorization(),
        })
    }

    /// `<base>/firehose/<subscription_id>?filter-type=metrics`
    pub fn stream_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/firehose/{}?filter-type={METRICS_FILTER}",
            self.base_url.trim().trim_end_matches('/'),
            subscription_id
        )
    }
}

/// Outcome of one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Applied,
    Ignored,
    Undecodable,
    StoreFailed,
}

/// Single-connection firehose consumer. It never reconnects: when the stream
/// ends, `run` returns an error and the process is expected to exit.
#[derive(Debug)]
pub struct FirehoseClient {
    cfg: FirehoseConfig,
    classifier: Classifier,
    sink: CapacitySink,
    metrics: Option<Arc<AppMetrics>>,
}

impl FirehoseClient {
    pub fn new(
        cfg: FirehoseConfig,
        sink: CapacitySink,
        metrics: Option<Arc<AppMetrics>>,
    ) -> AppResult<Self> {
        let classifier = Classifier::from_config(&cfg)?;
        Ok(Self {
            cfg,
            classifier,
            sink,
            metrics,
        })
    }

    /// Authenticate, connect and consume until cancelled (`Ok`) or the stream
    /// breaks (`Err`).
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<()> {
        let target = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            res = FirehoseTarget::resolve(&self.cfg) => res?,
        };
        self.consume(&target, cancel).await
    }

    pub async fn consume(&self, target: &FirehoseTarget, cancel: CancellationToken) -> AppResult<()> {
        install_crypto_provider();

        let sub_id = subscription_id(&self.cfg.subscription_prefix);
        let url = target.stream_url(&sub_id);

        let mut req = url.as_str().into_client_request()?;
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&target.authorization)?);

        info!(url = %url, subscription = %sub_id, "firehose connecting");

        let connect_timeout = Duration::from_millis(self.cfg.connect_timeout_ms);
        let (ws, _resp) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            res = timeout(connect_timeout, connect_async(req)) => res??,
        };

        info!(subscription = %sub_id, "firehose connected");

        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("firehose cancelled");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            error!(error = %e, "firehose read error");
                            return Err(AppError::WebSocket(e));
                        }
                        None => {
                            return Err(AppError::FirehoseClosed("stream ended".into()));
                        }
                    };

                    match msg {
                        Message::Binary(b) => {
                            self.handle_frame(&b).await;
                        }
                        Message::Text(s) => {
                            // Doppler only speaks protobuf
                            self.count_undecodable();
                            warn!(bytes = s.len(), "skipping text firehose frame");
                        }
                        Message::Ping(p) => {
                            let _ = write.send(Message::Pong(p)).await;
                        }
                        Message::Close(frame) => {
                            let reason = format!("close: {frame:?}");
                            error!(reason = %reason, "firehose closed by server");
                            return Err(AppError::FirehoseClosed(reason));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Decode, classify and apply one binary frame. Bad frames are logged and
    /// skipped.
    pub async fn handle_frame(&self, raw: &[u8]) -> FrameOutcome {
        if let Some(m) = &self.metrics {
            m.inc_firehose_message();
        }

        let env = match Envelope::from_frame(raw) {
            Ok(env) => env,
            Err(e) => {
                self.count_undecodable();
                warn!(error = %e, bytes = raw.len(), "skipping undecodable firehose frame");
                return FrameOutcome::Undecodable;
            }
        };

        let Some(reading) = self.classifier.classify(&env) else {
            return FrameOutcome::Ignored;
        };

        match self.sink.apply(reading).await {
            Ok(()) => FrameOutcome::Applied,
            Err(e) => {
                warn!(error = %e, job = %env.job_name(), "failed to store capacity reading");
                FrameOutcome::StoreFailed
            }
        }
    }

    fn count_undecodable(&self) {
        if let Some(m) = &self.metrics {
            m.inc_firehose_decode_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::CapacityState;
    use crate::store::MetricStore;
    use chrono::Utc;
    use prost::Message as _;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn client(store: MetricStore, state: Arc<CapacityState>) -> FirehoseClient {
        let cfg: FirehoseConfig =
            toml::from_str(r#"url = "wss://doppler.example.com:443""#).expect("config");
        FirehoseClient::new(cfg, CapacitySink::new(store, state, None), None).expect("client")
    }

    fn now_ns() -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    }

    /// One-shot Doppler stand-in: accepts a single subscriber, reports the
    /// request path and Authorization header, sends `frames`, then closes.
    async fn doppler(frames: Vec<Message>) -> (String, oneshot::Receiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base = format!("ws://{}", listener.local_addr().expect("addr"));
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let seen = move |req: &Request, resp: Response| {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let _ = tx.send((req.uri().to_string(), auth));
                Ok::<Response, ErrorResponse>(resp)
            };
            let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, seen).await else {
                return;
            };
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    return;
                }
            }
            let _ = ws.close(None).await;
        });

        (base, rx)
    }

    #[test]
    fn subscription_ids_are_prefixed_and_unique() {
        let a = subscription_id("cell-capacity-monitor");
        let b = subscription_id("cell-capacity-monitor");
        println!("[subscription] a={a} b={b}");

        assert!(a.starts_with("cell-capacity-monitor-"));
        assert_eq!(a.len(), "cell-capacity-monitor-".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn stream_url_asks_for_metrics_only() {
        let target = FirehoseTarget {
            base_url: "wss://doppler.example.com:443/".into(),
            authorization: "bearer t".into(),
        };
        assert_eq!(
            target.stream_url("monitor-abc"),
            "wss://doppler.example.com:443/firehose/monitor-abc?filter-type=metrics"
        );
    }

    #[test]
    fn login_target_prefers_the_configured_url() {
        let info = CfInfo {
            token_endpoint: "https://uaa.example.com".into(),
            doppler_logging_endpoint: Some("wss://doppler.discovered:443".into()),
        };
        let token = OAuthToken {
            access_token: "abc".into(),
            token_type: "bearer".into(),
            expires_in: None,
        };

        let discovered: FirehoseConfig = toml::from_str("").expect("config");
        let target = FirehoseTarget::from_login(&discovered, &info, &token).expect("target");
        assert_eq!(target.base_url, "wss://doppler.discovered:443");
        assert_eq!(target.authorization, "bearer abc");

        let pinned: FirehoseConfig =
            toml::from_str(r#"url = "wss://doppler.pinned:443""#).expect("config");
        let target = FirehoseTarget::from_login(&pinned, &info, &token).expect("target");
        assert_eq!(target.base_url, "wss://doppler.pinned:443");

        let nothing = CfInfo {
            doppler_logging_endpoint: None,
            ..info
        };
        assert!(FirehoseTarget::from_login(&discovered, &nothing, &token).is_err());
    }

    #[tokio::test]
    async fn frames_are_applied_ignored_or_skipped() -> AppResult<()> {
        let store = MetricStore::in_memory();
        let state = Arc::new(CapacityState::new("1", Utc::now()));
        let c = client(store.clone(), state.clone());

        let remaining =
            Envelope::cell_metric("diego_cell", "abc", "CapacityRemainingMemory", 6000.0, Some(now_ns()));
        let total = Envelope::cell_metric("diego-cell", "abc", "CapacityTotalMemory", 10000.0, None);
        let router = Envelope::cell_metric("router", "r1", "CapacityRemainingMemory", 1.0, Some(now_ns()));

        assert_eq!(c.handle_frame(&remaining.encode_to_vec()).await, FrameOutcome::Applied);
        assert_eq!(c.handle_frame(&total.encode_to_vec()).await, FrameOutcome::Applied);
        assert_eq!(c.handle_frame(&router.encode_to_vec()).await, FrameOutcome::Ignored);
        assert_eq!(c.handle_frame(b"\x00garbage").await, FrameOutcome::Undecodable);

        assert_eq!(state.cell_memory(), 10000.0);
        let rec = store.get("abc").await?.expect("stored");
        assert_eq!(rec.remaining_memory, 6000.0);
        assert!(store.get("r1").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn binary_frames_from_doppler_fill_the_store() -> AppResult<()> {
        let frames = vec![
            Message::binary(
                Envelope::cell_metric("diego_cell", "a", "CapacityTotalMemory", 10000.0, None)
                    .encode_to_vec(),
            ),
            Message::binary(
                Envelope::cell_metric("diego_cell", "a", "CapacityRemainingMemory", 6321.0, Some(now_ns()))
                    .encode_to_vec(),
            ),
            Message::text(r#"{"eventType":"ValueMetric"}"#),
            Message::binary(
                Envelope::cell_metric("diego-cell", "b", "CapacityRemainingMemory", 4000.0, Some(now_ns()))
                    .encode_to_vec(),
            ),
        ];
        let (base, seen) = doppler(frames).await;

        let store = MetricStore::in_memory();
        let state = Arc::new(CapacityState::new("1", Utc::now()));
        let c = client(store.clone(), state.clone());
        let target = FirehoseTarget {
            base_url: base,
            authorization: "bearer test-token".into(),
        };

        let res = c.consume(&target, CancellationToken::new()).await;
        println!("[doppler] consume ended with {res:?}");
        assert!(matches!(res, Err(AppError::FirehoseClosed(_))), "got {res:?}");

        let (path, auth) = seen.await.expect("handshake seen");
        assert!(path.starts_with("/firehose/cell-capacity-monitor-"), "{path}");
        assert!(path.ends_with("?filter-type=metrics"), "{path}");
        assert_eq!(auth, "bearer test-token");

        assert_eq!(state.cell_memory(), 10000.0);
        let all = store.get_all().await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"].remaining_memory, 6321.0);
        assert_eq!(all["b"].remaining_memory, 4000.0);
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_before_connect_is_clean() -> AppResult<()> {
        let c = client(MetricStore::in_memory(), Arc::new(CapacityState::new("1", Utc::now())));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let target = FirehoseTarget {
            base_url: "ws://127.0.0.1:9".into(),
            authorization: "bearer t".into(),
        };
        c.consume(&target, cancel).await
    }
}
