pub mod proxy_filter;
pub mod raw_reconstructor;
pub mod record_builder;
pub mod recorder;
pub mod types;

pub use proxy_filter::ProxyHeaderFilter;
pub use recorder::RequestRecorder;
pub use types::{Body, CapturedRequest, InboundRequest, RawExchange, RequestSummary};
