//! Paged search over OCAPI search resources
//!
//! A search endpoint takes a [`SearchRequest`] and answers with one
//! [`SearchPage`] of hits. [`SearchResults`] turns that into a lazy sequence
//! over every hit while keeping a single page in memory, refetching through a
//! [`PageFetcher`] whenever the cursor leaves the current window.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Default page size of a search request
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Select expression returning every property
pub const SELECT_ALL: &str = "(**)";

/// Format an instant the way OCAPI range filters expect it.
///
/// Some resources (job execution search) reject the usual RFC 3339 form
/// with fractional seconds or offsets, so this is always UTC with a literal
/// `Z`.
pub fn format_search_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    date.with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Body of a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Property selector, `(**)` for everything
    pub select: String,
    /// Query the hits must match
    pub query: Query,
    /// Sort keys, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<Sort>,
    /// Page size
    pub count: usize,
    /// Offset of the first hit of the page
    pub start: usize,
}

impl SearchRequest {
    /// Request for the first page of `query`, with every property selected
    pub fn new(query: Query) -> Self {
        Self {
            select: SELECT_ALL.to_string(),
            query,
            sorts: Vec::new(),
            count: DEFAULT_PAGE_SIZE,
            start: 0,
        }
    }

    /// Everything whose `field` lies between `start` and `end`, oldest first
    pub fn between<Tz: TimeZone>(field: &str, start: &DateTime<Tz>, end: &DateTime<Tz>) -> Self {
        Self::new(Query::FilteredQuery {
            query: Box::new(Query::match_all()),
            filter: Filter::RangeFilter {
                field: field.to_string(),
                from: format_search_date(start),
                to: format_search_date(end),
                from_inclusive: false,
                to_inclusive: false,
            },
        })
        .with_sort(field, SortOrder::Asc)
    }

    /// Append a sort key
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, sort_order: SortOrder) -> Self {
        self.sorts.push(Sort {
            field: field.into(),
            sort_order,
        });
        self
    }

    /// Set the page size
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Replace the property selector
    #[must_use]
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }
}

/// Search query, serialised under its snake_case name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Every document
    MatchAllQuery {},
    /// Documents whose fields compare to the given values
    TermQuery {
        /// Fields to compare
        fields: Vec<String>,
        /// Comparison applied to each field
        operator: Operator,
        /// Values compared against
        values: Vec<String>,
    },
    /// A query narrowed by a filter
    FilteredQuery {
        /// Inner query
        query: Box<Query>,
        /// Filter applied to the inner query's hits
        filter: Filter,
    },
}

impl Query {
    /// Query matching every document
    pub const fn match_all() -> Self {
        Self::MatchAllQuery {}
    }

    /// `field` equals `value`
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TermQuery {
            fields: vec![field.into()],
            operator: Operator::Is,
            values: vec![value.into()],
        }
    }
}

/// Filter narrowing a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// `field` lies between `from` and `to`
    RangeFilter {
        /// Field compared
        field: String,
        /// Lower bound
        from: String,
        /// Upper bound
        to: String,
        /// Whether the lower bound matches
        from_inclusive: bool,
        /// Whether the upper bound matches
        to_inclusive: bool,
    },
}

/// Term query comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal to one of the values
    Is,
    /// Greater than the value
    Greater,
}

/// Sort key of a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Field sorted on
    pub field: String,
    /// Direction
    pub sort_order: SortOrder,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// One page (window) of a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage<T> {
    /// Hits of this page
    #[serde(default = "Vec::new")]
    pub hits: Vec<T>,
    /// Hits across every page
    #[serde(default)]
    pub total: usize,
    /// Hits in this page
    #[serde(default)]
    pub count: usize,
    /// Offset of the first hit of this page
    #[serde(default)]
    pub start: usize,
}

impl<T> SearchPage<T> {
    /// Whether `position` lies in `[start, start + count)`
    pub const fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.start + self.count
    }
}

/// Hit wrapper used by resources that score their results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit<T> {
    /// Score assigned by the search
    #[serde(default)]
    pub relevance: f64,
    /// The matched document
    pub data: T,
}

/// Something that can run a search request and return one page
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch the page starting at `request.start`
    async fn fetch_page(&self, request: &SearchRequest) -> ClientResult<SearchPage<T>>;
}

/// Cursor over all hits of a search, one page resident at a time.
///
/// Single consumer. A new scan needs a new `SearchResults`.
pub struct SearchResults<'a, T> {
    fetcher: &'a dyn PageFetcher<T>,
    request: SearchRequest,
    window: SearchPage<T>,
    position: Option<usize>,
}

impl<'a, T: Send + Sync> SearchResults<'a, T> {
    /// Wrap the first page fetched for `request`
    pub fn new(fetcher: &'a dyn PageFetcher<T>, request: SearchRequest, first: SearchPage<T>) -> Self {
        Self {
            fetcher,
            request,
            window: first,
            position: None,
        }
    }

    /// Run `request` and wrap its first page
    pub async fn fetch(fetcher: &'a dyn PageFetcher<T>, request: SearchRequest) -> ClientResult<Self> {
        let first = fetcher.fetch_page(&request).await?;
        Ok(Self::new(fetcher, request, first))
    }

    /// Total number of hits reported by the remote
    pub const fn total(&self) -> usize {
        self.window.total
    }

    /// Current position, None before the first advance
    pub const fn position(&self) -> Option<usize> {
        self.position
    }

    /// The request template, with the offset of the current window
    pub const fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Move to the next position. Returns false once past the last hit.
    pub async fn advance(&mut self) -> ClientResult<bool> {
        let next = self.position.map_or(0, |position| position + 1);
        self.seek(next).await
    }

    /// Move to `position`, refetching the page that holds it if needed.
    /// Returns false if `position` is past the last hit.
    pub async fn seek(&mut self, position: usize) -> ClientResult<bool> {
        self.position = Some(position);
        if position >= self.window.total {
            return Ok(false);
        }

        if !self.window.contains(position) {
            let page_size = self.request.count.max(1);
            self.request.start = position / page_size * page_size;
            debug!(position, start = self.request.start, "fetching search page");
            self.window = self.fetcher.fetch_page(&self.request).await?;
        }
        Ok(true)
    }

    /// Hit at the current position
    pub fn current(&self) -> Option<&T> {
        let position = self.position?;
        self.window.hits.get(position.checked_sub(self.window.start)?)
    }

    /// Advance and return the hit there, or None when the scan is over.
    ///
    /// Fails if the fetched page does not hold the position, which happens
    /// when the remote serves fewer hits per page than requested.
    pub async fn next_item(&mut self) -> ClientResult<Option<T>>
    where
        T: Clone,
    {
        if !self.advance().await? {
            return Ok(None);
        }
        match self.current() {
            Some(item) => Ok(Some(item.clone())),
            None => Err(ClientError::InvalidResponse(format!(
                "search page starting at {} with {} hits does not hold position {}",
                self.window.start,
                self.window.hits.len(),
                self.position.unwrap_or_default()
            ))),
        }
    }

    /// Consume the cursor as a stream of hits
    pub fn into_stream(self) -> impl Stream<Item = ClientResult<T>> + Send + 'a
    where
        T: Clone + 'a,
    {
        futures::stream::try_unfold(self, |mut results| async move {
            let item = results.next_item().await?;
            Ok::<_, ClientError>(item.map(|item| (item, results)))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::FixedOffset;
    use futures::{StreamExt, TryStreamExt};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct Numbers {
        total: usize,
        starts: Mutex<Vec<usize>>,
    }

    impl Numbers {
        fn new(total: usize) -> Self {
            Self {
                total,
                starts: Mutex::new(Vec::new()),
            }
        }

        fn page(&self, start: usize, count: usize) -> SearchPage<usize> {
            let hits: Vec<usize> = (start..self.total.min(start + count)).collect();
            SearchPage {
                count: hits.len(),
                hits,
                total: self.total,
                start,
            }
        }

        fn refetches(&self) -> Vec<usize> {
            self.starts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher<usize> for Numbers {
        async fn fetch_page(&self, request: &SearchRequest) -> ClientResult<SearchPage<usize>> {
            self.starts.lock().unwrap().push(request.start);
            Ok(self.page(request.start, request.count))
        }
    }

    fn request(count: usize) -> SearchRequest {
        SearchRequest::new(Query::match_all()).with_count(count)
    }

    #[tokio::test]
    async fn test_sequential_scan_visits_every_hit_once() {
        let numbers = Numbers::new(10);
        let mut results = SearchResults::new(&numbers, request(3), numbers.page(0, 3));

        let mut seen = Vec::new();
        while let Some(item) = results.next_item().await.unwrap() {
            seen.push(item);
        }

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(numbers.refetches(), vec![3, 6, 9]);
        assert!(!results.advance().await.unwrap());
    }

    #[tokio::test]
    async fn test_seek_outside_window_refetches_aligned_page() {
        let numbers = Numbers::new(10);
        let mut results = SearchResults::new(&numbers, request(3), numbers.page(0, 3));
        assert!(results.advance().await.unwrap());

        assert!(results.seek(7).await.unwrap());

        assert_eq!(numbers.refetches(), vec![6]);
        assert_eq!(results.current(), Some(&7));
        assert_eq!(results.request().start, 6);
    }

    #[tokio::test]
    async fn test_seek_backward_refetches_earlier_page() {
        let numbers = Numbers::new(10);
        let mut results = SearchResults::new(&numbers, request(3), numbers.page(6, 3));

        assert!(results.seek(1).await.unwrap());

        assert_eq!(numbers.refetches(), vec![0]);
        assert_eq!(results.current(), Some(&1));
    }

    #[tokio::test]
    async fn test_seek_within_window_does_not_refetch() {
        let numbers = Numbers::new(10);
        let mut results = SearchResults::new(&numbers, request(3), numbers.page(0, 3));

        assert!(results.seek(2).await.unwrap());

        assert!(numbers.refetches().is_empty());
        assert_eq!(results.current(), Some(&2));
    }

    #[tokio::test]
    async fn test_empty_result_terminates_immediately() {
        let numbers = Numbers::new(0);
        let results = SearchResults::fetch(&numbers, request(3)).await.unwrap();

        let items: Vec<usize> = results.into_stream().try_collect().await.unwrap();

        assert!(items.is_empty());
        assert_eq!(numbers.refetches(), vec![0]);
    }

    #[tokio::test]
    async fn test_stream_yields_all_hits() {
        let numbers = Numbers::new(5);
        let results = SearchResults::fetch(&numbers, request(2)).await.unwrap();
        assert_eq!(results.total(), 5);

        let items: Vec<usize> = results.into_stream().try_collect().await.unwrap();

        assert_eq!(items, vec![0, 1, 2, 3, 4]);
    }

    /// Serves at most `cap` hits per page whatever count is requested
    struct Capped {
        inner: Numbers,
        cap: usize,
    }

    #[async_trait]
    impl PageFetcher<usize> for Capped {
        async fn fetch_page(&self, request: &SearchRequest) -> ClientResult<SearchPage<usize>> {
            self.inner.starts.lock().unwrap().push(request.start);
            Ok(self.inner.page(request.start, request.count.min(self.cap)))
        }
    }

    #[tokio::test]
    async fn test_short_page_is_an_error_not_a_short_stream() {
        let capped = Capped {
            inner: Numbers::new(10),
            cap: 2,
        };
        let results = SearchResults::fetch(&capped, request(4)).await.unwrap();

        let items: Vec<ClientResult<usize>> = results.into_stream().collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &0);
        assert_eq!(items[1].as_ref().unwrap(), &1);
        assert!(matches!(items[2], Err(ClientError::InvalidResponse(_))));
    }

    #[test]
    fn test_format_search_date_is_utc_with_literal_z() {
        let local = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 12, 22, 10, 37)
            .unwrap();

        assert_eq!(format_search_date(&local), "2020-01-12T20:10:37Z");
    }

    #[test]
    fn test_between_request_wire_format() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();

        let request = SearchRequest::between("start_time", &start, &end);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "select": "(**)",
                "query": {
                    "filtered_query": {
                        "query": { "match_all_query": {} },
                        "filter": {
                            "range_filter": {
                                "field": "start_time",
                                "from": "2020-01-01T00:00:00Z",
                                "to": "2020-01-02T00:00:00Z",
                                "from_inclusive": false,
                                "to_inclusive": false
                            }
                        }
                    }
                },
                "sorts": [{ "field": "start_time", "sort_order": "asc" }],
                "count": 25,
                "start": 0
            })
        );
    }

    #[test]
    fn test_term_query_omits_empty_sorts() {
        let request = SearchRequest::new(Query::term("order_no", "00001")).with_count(1);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "select": "(**)",
                "query": {
                    "term_query": { "fields": ["order_no"], "operator": "is", "values": ["00001"] }
                },
                "count": 1,
                "start": 0
            })
        );
    }

    #[test]
    fn test_page_without_hits_decodes() {
        let page: SearchPage<usize> =
            serde_json::from_value(json!({ "_v": "20.8", "count": 0, "start": 0, "total": 0 })).unwrap();

        assert!(page.hits.is_empty());
    }
}
