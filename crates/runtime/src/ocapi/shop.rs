use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use reqwest::Method;

use super::types::{Note, Order, OrderSearchHit};
use crate::accessor::{BusinessManagerAccessor, ClientCredentialsAccessor, TokenAccessor};
use crate::client::AuthenticatingClient;
use crate::config::{Environment, OCAPI_AGENT_VERSION, OCAPI_VERSION};
use crate::error::{ClientResult, ConfigError};
use crate::search::{PageFetcher, Query, SearchPage, SearchRequest, SearchResults};

fn shop_url(env: &Environment, version: &str) -> Result<String, ConfigError> {
    let site_id = env.require_site_id()?;
    Ok(format!("{}/s/{site_id}/dw/shop/{version}", env.base_url()))
}

/// OCAPI Shop API client for one site
#[derive(Clone)]
pub struct ShopApi {
    client: AuthenticatingClient,
}

impl ShopApi {
    /// Client for the site of `env`, using its client credentials
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        env.require_site_id()?;
        let accessor = Arc::new(ClientCredentialsAccessor::new(env)?);
        Self::with_accessor(env, accessor)
    }

    /// Client sharing an existing token accessor
    pub fn with_accessor(env: &Environment, accessor: Arc<dyn TokenAccessor>) -> Result<Self, ConfigError> {
        let base_url = shop_url(env, OCAPI_VERSION)?;
        Ok(Self::from_client(AuthenticatingClient::new(env.http_client()?, base_url, accessor)))
    }

    /// Client over an already configured authenticating client
    pub const fn from_client(client: AuthenticatingClient) -> Self {
        Self { client }
    }

    /// Run one page of an order search
    pub async fn search_orders(&self, request: &SearchRequest) -> ClientResult<SearchPage<OrderSearchHit>> {
        self.client
            .send_json(self.client.request(Method::POST, "/order_search").json(request))
            .await
    }

    /// The order numbered `order_no`, if any
    pub async fn search_order_by_order_no(&self, order_no: &str) -> ClientResult<Option<Order>> {
        let request = SearchRequest::new(Query::term("order_no", order_no)).with_count(1);
        let page = self.search_orders(&request).await?;
        Ok(page.hits.into_iter().next().map(|hit| hit.data))
    }

    /// All orders created between `start` and `end`, oldest first
    pub async fn search_orders_between<Tz: TimeZone>(
        &self,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> ClientResult<SearchResults<'_, OrderSearchHit>> {
        SearchResults::fetch(self, SearchRequest::between("creation_date", start, end)).await
    }
}

#[async_trait]
impl PageFetcher<OrderSearchHit> for ShopApi {
    async fn fetch_page(&self, request: &SearchRequest) -> ClientResult<SearchPage<OrderSearchHit>> {
        self.search_orders(request).await
    }
}

/// Shop API client acting as a Business Manager user
#[derive(Clone)]
pub struct AgentShopApi {
    client: AuthenticatingClient,
}

impl AgentShopApi {
    /// Client authenticated with the account and client credentials of `env`
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        env.require_site_id()?;
        let accessor = Arc::new(BusinessManagerAccessor::new(env)?);
        Self::with_accessor(env, accessor)
    }

    /// Client sharing an existing delegated-grant accessor
    pub fn with_accessor(env: &Environment, accessor: Arc<dyn TokenAccessor>) -> Result<Self, ConfigError> {
        let base_url = shop_url(env, OCAPI_AGENT_VERSION)?;
        Ok(Self {
            client: AuthenticatingClient::new(env.http_client()?, base_url, accessor),
        })
    }

    /// The order numbered `order_no`
    pub async fn get_order(&self, order_no: &str) -> ClientResult<Order> {
        self.client
            .send_json(self.client.request_segments(Method::GET, &["orders", order_no]))
            .await
    }

    /// Attach `note` to the order numbered `order_no`
    pub async fn add_order_note(&self, order_no: &str, note: &Note) -> ClientResult<Order> {
        let request = self
            .client
            .request_segments(Method::POST, &["orders", order_no, "notes"])
            .json(note);
        self.client.send_json(request).await
    }
}
