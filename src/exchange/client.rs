//! Exchange REST client
//!
//! Public market data is fetched with GET, private endpoints with a signed
//! JSON POST. Only idempotent requests are retried.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::gateway::{AccountData, MarketData, OrderGateway};
use super::models::*;
use super::signer::{Credentials, NonceSource};
use crate::archive::{ArchiveSource, ArchiveStatus};
use crate::engine::{OrderCommand, RawOrderBook, SubmitAck};
use crate::error::{EngineError, EngineResult};
use crate::types::{Balance, OpenOrder, TradeRecord};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://cex.io/api";

/// Decode a JSON payload
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> EngineResult<T> {
    serde_json::from_slice(bytes).map_err(EngineError::from)
}

/// HTTP transport with a per-request timeout and bounded retries
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retries: u32, backoff: Duration) -> EngineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            retries,
            backoff,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request produced by `build`, retrying transport failures
    /// when `idempotent`. `build` runs once per attempt.
    pub async fn fetch<F>(&self, build: F, idempotent: bool) -> EngineResult<Vec<u8>>
    where
        F: Fn() -> EngineResult<RequestBuilder>,
    {
        let attempts = if idempotent { self.retries + 1 } else { 1 };
        let mut attempt = 1;
        loop {
            match self.send_once(build()?).await {
                Err(EngineError::Network(msg)) if attempt < attempts => {
                    warn!("attempt {}/{} failed: {}", attempt, attempts, msg);
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> EngineResult<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Network(format!("HTTP {}: {}", status, body)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Client for one trading pair
pub struct CexClient {
    fetcher: HttpFetcher,
    base_url: String,
    base: String,
    quote: String,
    credentials: Option<Credentials>,
    nonces: NonceSource,
}

impl CexClient {
    pub fn new(
        fetcher: HttpFetcher,
        base_url: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            base: base.into(),
            quote: quote.into(),
            credentials,
            nonces: NonceSource::new(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn pair_url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}/{}/", self.base_url, endpoint, self.base, self.quote)
    }

    async fn public<R: DeserializeOwned>(&self, url: String) -> EngineResult<R> {
        debug!("GET {}", url);
        let bytes = self
            .fetcher
            .fetch(|| Ok(self.fetcher.client().get(&url)), true)
            .await?;
        decode(&bytes)
    }

    /// Signed POST; a fresh nonce and signature are produced per attempt
    async fn private<R: DeserializeOwned>(&self, params: RequestParams) -> EngineResult<R> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| EngineError::logic("private endpoint called without credentials"))?;
        let url = format!("{}/{}", self.base_url, params.path(&self.base, &self.quote));
        debug!("POST {}", url);

        let bytes = self
            .fetcher
            .fetch(
                || {
                    let nonce = self.nonces.next();
                    let body = SignedRequest {
                        key: credentials.api_key.clone(),
                        signature: credentials.sign_nonce(nonce)?,
                        nonce: nonce.to_string(),
                        params: params.clone(),
                    };
                    Ok(self.fetcher.client().post(&url).json(&body))
                },
                params.is_idempotent(),
            )
            .await?;

        let value: serde_json::Value = decode(&bytes)?;
        if let Some(reason) = value.get("error").and_then(|e| e.as_str()) {
            return Err(EngineError::logic(format!("exchange rejected request: {reason}")));
        }
        serde_json::from_value(value).map_err(EngineError::from)
    }
}

impl MarketData for CexClient {
    async fn order_book(&self) -> EngineResult<RawOrderBook> {
        self.public(self.pair_url("order_book")).await
    }

    async fn ticker(&self) -> EngineResult<Ticker> {
        self.public(self.pair_url("ticker")).await
    }

    async fn last_price(&self) -> EngineResult<Decimal> {
        let prices: LastPrices = self.public(self.pair_url("last_prices")).await?;
        prices.first_price()
    }
}

impl AccountData for CexClient {
    async fn open_orders(&self) -> EngineResult<Vec<OpenOrder>> {
        let orders: Vec<RawOpenOrder> = self.private(RequestParams::OpenOrders {}).await?;
        Ok(orders.into_iter().map(OpenOrder::from).collect())
    }

    async fn balance(&self) -> EngineResult<Balance> {
        let balance: BalanceResponse = self.private(RequestParams::Balance {}).await?;
        balance.for_pair(&self.base, &self.quote)
    }
}

impl OrderGateway for CexClient {
    async fn submit(&self, command: &OrderCommand) -> EngineResult<SubmitAck> {
        let params = match command {
            OrderCommand::Place { side, price, amount } => RequestParams::Place {
                side: *side,
                amount: *amount,
                price: *price,
            },
            OrderCommand::Replace {
                order_id,
                side,
                price,
                amount,
            } => RequestParams::Replace {
                side: *side,
                amount: *amount,
                price: *price,
                order_id: order_id.clone(),
            },
            OrderCommand::Cancel { order_id } => {
                let cancelled: bool = self
                    .private(RequestParams::Cancel {
                        id: order_id.clone(),
                    })
                    .await?;
                return Ok(if cancelled {
                    SubmitAck::Accepted(None)
                } else {
                    SubmitAck::Rejected(format!("order #{} was not cancelled", order_id))
                });
            }
        };

        let order: RawOpenOrder = self.private(params).await?;
        Ok(SubmitAck::Accepted(Some(order.into())))
    }
}

impl ArchiveSource for CexClient {
    async fn fetch_archive(
        &self,
        status: ArchiveStatus,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> EngineResult<Vec<TradeRecord>> {
        let since = since.map(|t| t.timestamp());
        let orders: Vec<ArchivedOrder> = self
            .private(RequestParams::ArchivedOrders {
                date_from: since,
                last_tx_date_from: since,
                status: status.as_str().to_string(),
            })
            .await?;
        orders.iter().map(|o| o.to_record(&self.quote)).collect()
    }
}
