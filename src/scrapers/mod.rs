//! Page fetching, proxy rotation and attribute extraction for auction lots.

pub mod extract;
mod http_client;
pub mod listing;
pub mod proxy_pool;

pub use extract::{AttributeSource, Extractor};
pub use http_client::{
    browser_headers, proxy_url, random_user_agent, Document, FetchConfig, FetchError,
    FetchRequest, Fetcher, ReqwestTransport, RetryPolicy, Transport,
};
pub use listing::{resolve_url, ListingPage};
pub use proxy_pool::{
    BanOutcome, HtmlTableSource, ProxyError, ProxyPool, ProxyPoolConfig, ProxyRefresher,
    ProxySource, StaticSource,
};
