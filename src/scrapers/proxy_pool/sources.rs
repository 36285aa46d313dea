//! Upstream proxy-list providers.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use super::{Proxy, ProxyError};

/// Produces zero or more `host:port` endpoints per refresh cycle.
#[async_trait]
pub trait ProxySource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Proxy>, ProxyError>;
}

/// A public HTML table of `ip | port | ...` rows
/// (free-proxy-list.net, sslproxies.org and friends).
pub struct HtmlTableSource {
    url: String,
    max_rows: usize,
    client: Client,
}

impl HtmlTableSource {
    pub fn new(url: impl Into<String>, max_rows: usize, client: Client) -> Self {
        Self {
            url: url.into(),
            max_rows,
            client,
        }
    }
}

#[async_trait]
impl ProxySource for HtmlTableSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<Proxy>, ProxyError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ProxyError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let html = response.text().await?;
        let proxies = parse_proxy_table(&html, self.max_rows);
        if proxies.is_empty() {
            return Err(ProxyError::EmptyTable {
                url: self.url.clone(),
            });
        }
        Ok(proxies)
    }
}

/// Read `ip:port` pairs from the first two cells of each `tbody tr`.
/// Rows missing either cell are skipped.
pub fn parse_proxy_table(html: &str, max_rows: usize) -> Vec<Proxy> {
    let document = Html::parse_document(html);
    let (Ok(row_sel), Ok(cell_sel)) = (Selector::parse("tbody tr"), Selector::parse("td")) else {
        return Vec::new();
    };

    document
        .select(&row_sel)
        .take(max_rows)
        .filter_map(|row| {
            let mut cells = row
                .select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().to_string());
            let ip = cells.next().filter(|s| !s.is_empty())?;
            let port = cells.next().filter(|s| !s.is_empty())?;
            Some(format!("{}:{}", ip, port))
        })
        .collect()
}

/// Fixed list of endpoints from configuration.
pub struct StaticSource {
    proxies: Vec<Proxy>,
}

impl StaticSource {
    pub fn new(proxies: Vec<Proxy>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Proxy>, ProxyError> {
        Ok(self.proxies.clone())
    }
}
