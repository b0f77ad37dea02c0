//! Capture pipeline for inbound requests.
//!
//! `RequestRecorder` ties together the pieces that turn one fully read request
//! into a stored capture:
//! - proxy header stripping (when a proxy hostname is configured)
//! - raw wire reconstruction from the surviving headers
//! - record construction with a store-assigned id
//! - append, then retention pruning
//! - a `new_request` notification to live observers
//!
//! Pruning is silent: evicted records produce no notification.
//!
//! Minimal usage
//! ```no_run
//! use std::sync::Arc;
//! use http_intercepter::data_capture::{RawExchange, RequestRecorder};
//! use http_intercepter::live_feed::LiveFeed;
//! use http_intercepter::storage::{RequestStore, RetentionPolicy};
//!
//! let store = Arc::new(RequestStore::new(RetentionPolicy::new(3600, 500)));
//! let feed = Arc::new(LiveFeed::new());
//! let recorder = RequestRecorder::new(store, feed, None);
//!
//! let captured = recorder.record(&RawExchange {
//!     method: "POST".into(),
//!     path: "/inbound".into(),
//!     body: b"hello".to_vec(),
//!     ..Default::default()
//! });
//! assert_eq!(captured.body_length, 5);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::info;

use super::proxy_filter::ProxyHeaderFilter;
use super::raw_reconstructor::{reconstruct, RawParts};
use super::record_builder::build_record;
use super::types::{CapturedRequest, InboundRequest, RequestSummary};
use crate::live_feed::LiveFeed;
use crate::storage::RequestStore;

pub struct RequestRecorder {
    store: Arc<RequestStore>,
    live_feed: Arc<LiveFeed>,
    proxy_filter: Option<ProxyHeaderFilter>,
    /// Held from append to broadcast so observers see captures in id order.
    publish: Mutex<()>,
}

impl RequestRecorder {
    pub fn new(
        store: Arc<RequestStore>,
        live_feed: Arc<LiveFeed>,
        proxy_hostname: Option<&str>,
    ) -> Self {
        let proxy_filter = proxy_hostname.and_then(ProxyHeaderFilter::new);
        if let Some(filter) = &proxy_filter {
            info!("Stripping proxy headers for {}", filter.hostname());
        }
        Self {
            store,
            live_feed,
            proxy_filter,
            publish: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<RequestStore> {
        &self.store
    }

    pub fn live_feed(&self) -> &Arc<LiveFeed> {
        &self.live_feed
    }

    /// Captures `exchange` at the current time.
    pub fn record<R: InboundRequest + ?Sized>(&self, exchange: &R) -> Arc<CapturedRequest> {
        self.record_at(exchange, Utc::now())
    }

    /// Captures `exchange` as of `captured_at`. Always completes.
    pub fn record_at<R: InboundRequest + ?Sized>(
        &self,
        exchange: &R,
        captured_at: DateTime<Utc>,
    ) -> Arc<CapturedRequest> {
        let headers = match &self.proxy_filter {
            Some(filter) => filter.apply(exchange.headers().to_vec()),
            None => exchange.headers().to_vec(),
        };

        let raw = reconstruct(&RawParts {
            method: exchange.method(),
            path: exchange.path(),
            query: exchange.raw_query(),
            version: exchange.http_version(),
            headers: &headers,
            body: exchange.body(),
        });

        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let record = self
            .store
            .append_with(|id| build_record(id, exchange, headers, Some(raw), captured_at));
        self.store.prune();

        info!(
            "Captured request {}: {} {} ({} bytes) from {}",
            record.id,
            record.method,
            record.path,
            record.body_length,
            if record.ip.is_empty() { "unknown" } else { record.ip.as_str() }
        );

        self.live_feed.broadcast(&RequestSummary::from(record.as_ref()));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::types::{Body, RawExchange};
    use crate::storage::RetentionPolicy;

    fn recorder(policy: RetentionPolicy, proxy: Option<&str>) -> RequestRecorder {
        RequestRecorder::new(
            Arc::new(RequestStore::new(policy)),
            Arc::new(LiveFeed::new()),
            proxy,
        )
    }

    fn post(body: &[u8], headers: &[(&str, &str)]) -> RawExchange {
        RawExchange {
            method: String::from("POST"),
            path: String::from("/inbound"),
            query: None,
            version: String::from("1.1"),
            client_address: Some(String::from("127.0.0.1")),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn captures_text_post() {
        let _ = env_logger::builder().is_test(true).try_init();
        let recorder = recorder(RetentionPolicy::default(), None);

        let captured = recorder.record(&post(b"hello", &[("host", "test")]));

        assert_eq!(captured.id, 1);
        assert_eq!(captured.body, Body::Text(String::from("hello")));
        assert_eq!(captured.body_length, 5);
        let raw = recorder.store().raw(captured.id).unwrap();
        assert!(raw.starts_with(b"POST /inbound HTTP/1.1\r\n"));
        assert!(raw.ends_with(b"\r\n\r\nhello"));

        let listing = recorder.store().list();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].method, "POST");
        assert_eq!(listing[0].content_length, 5);
    }

    #[test]
    fn proxy_stripping_is_consistent_across_views() {
        let recorder = recorder(RetentionPolicy::default(), Some("p"));
        let captured = recorder.record(&post(
            b"",
            &[
                ("x-forwarded-host", "p, other.example"),
                ("x-forwarded-port", "443"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-server", "p"),
                ("x-real-ip", "10.1.1.1"),
            ],
        ));

        assert_eq!(
            captured.headers_ordered,
            vec![(String::from("x-forwarded-host"), String::from("other.example"))]
        );
        assert_eq!(captured.headers.len(), 1);
        assert_eq!(captured.headers["x-forwarded-host"], "other.example");

        let raw = String::from_utf8(captured.raw.clone().unwrap()).unwrap();
        assert_eq!(
            raw,
            "POST /inbound HTTP/1.1\r\nx-forwarded-host: other.example\r\n\r\n"
        );
    }

    #[test]
    fn capacity_is_enforced_after_each_capture() {
        let recorder = recorder(RetentionPolicy::new(0, 2), None);
        for body in [&b"a"[..], &b"b"[..], &b"c"[..], &b"d"[..]] {
            recorder.record(&post(body, &[]));
            assert!(recorder.store().len() <= 2);
        }
        let ids: Vec<u64> = recorder.store().list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[test]
    fn old_captures_expire() {
        let recorder = recorder(RetentionPolicy::new(60, 0), None);
        let old = recorder.record_at(&post(b"", &[]), Utc::now() - chrono::Duration::seconds(120));
        let fresh = recorder.record(&post(b"", &[]));

        assert!(recorder.store().get(old.id).is_err());
        assert!(recorder.store().get(fresh.id).is_ok());
    }

    #[test]
    fn observers_receive_new_captures_only() {
        let recorder = recorder(RetentionPolicy::new(0, 1), None);
        recorder.record(&post(b"before", &[]));

        let (_, mut rx) = recorder.live_feed().subscribe();
        let captured = recorder.record(&post(b"after", &[]));

        let message: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["type"], "new_request");
        assert_eq!(message["data"]["id"], captured.id);
        assert_eq!(message["data"]["content_length"], 5);
        // the eviction of the first capture is not announced
        assert!(rx.try_recv().is_err());
    }
}
