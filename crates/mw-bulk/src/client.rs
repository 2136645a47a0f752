//! Paging and list-splitting on top of [`MwClient`].

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use busbar_mw_auth::AuthStrategy;
use busbar_mw_client::{CallOptions, CallParams, ClientConfig, MwClient, ParamValue};

use crate::error::{Error, ErrorKind, Result};

/// Per-call ceiling on multi-value fields for ordinary accounts.
pub const MASS_QUERY_LIMIT: usize = 50;

/// Per-call ceiling for accounts holding `apihighlimits`.
pub const MASS_QUERY_HIGH_LIMIT: usize = 500;

type ClientResult<T> = busbar_mw_client::Result<T>;

/// Bulk helpers bound to one [`MwClient`].
///
/// Every page request goes through [`MwClient::call`], so token refresh,
/// maxlag backoff and re-login apply to each page individually.
///
/// # Example
///
/// ```rust,ignore
/// use busbar_mw_bulk::BulkClient;
/// use busbar_mw_client::{AuthStrategy, CallParams};
///
/// let bulk = BulkClient::new("https://test.wikipedia.org/w/api.php", AuthStrategy::anonymous())?;
///
/// let pages = bulk
///     .continued_query(
///         CallParams::new()
///             .with("action", "query")
///             .with("list", "allpages")
///             .with("aplimit", "max"),
///         Some(5),
///     )
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct BulkClient {
    client: MwClient,
}

impl BulkClient {
    /// Create a bulk client for the given `api.php` URL.
    pub fn new(api_url: impl AsRef<str>, auth: AuthStrategy) -> Result<Self> {
        Ok(Self {
            client: MwClient::new(api_url, auth)?,
        })
    }

    /// Create a bulk client with custom HTTP configuration.
    pub fn with_config(
        api_url: impl AsRef<str>,
        auth: AuthStrategy,
        config: ClientConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: MwClient::with_config(api_url, auth, config)?,
        })
    }

    /// Wrap an existing client, sharing its session.
    pub fn from_client(client: MwClient) -> Self {
        Self { client }
    }

    /// Get the underlying MwClient.
    pub fn inner(&self) -> &MwClient {
        &self.client
    }

    /// Follow `continue` tokens, collecting every page.
    ///
    /// Stops when a page carries no `continue` object or after `limit`
    /// calls. The first failing page aborts the whole query.
    #[instrument(skip(self, query), fields(action = query.action().unwrap_or("")))]
    pub async fn continued_query(
        &self,
        query: CallParams,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        let pages: Vec<Value> = self
            .continued_query_stream(query, limit)
            .try_collect()
            .await?;
        debug!(pages = pages.len(), "Continued query finished");
        Ok(pages)
    }

    /// Lazy form of [`continued_query`](Self::continued_query).
    ///
    /// Each poll issues at most one request. The stream ends after the last
    /// page, after `limit` pages, or right after yielding an error. It cannot
    /// be restarted; build a new one to query again.
    pub fn continued_query_stream(
        &self,
        query: CallParams,
        limit: Option<usize>,
    ) -> impl Stream<Item = ClientResult<Value>> {
        let client = self.client.clone();
        let original = query.clone();

        stream::unfold(Some((query, 0usize)), move |state| {
            let client = client.clone();
            let original = original.clone();
            async move {
                let (params, calls) = state?;
                if limit.is_some_and(|limit| calls >= limit) {
                    return None;
                }

                match client.call(params, CallOptions::new()).await {
                    Ok(page) => {
                        let next = continuation(&original, &page).map(|next| (next, calls + 1));
                        if next.is_some() {
                            debug!(page = calls + 1, "Following continuation");
                        }
                        Some((Ok(page), next))
                    }
                    Err(err) => Some((Err(err), None)),
                }
            }
        })
    }

    /// Split the list in `field` into server-sized chunks and send one
    /// request per chunk.
    ///
    /// Chunks are sent in order, always as POST. A chunk that fails keeps
    /// its error in its slot; the remaining chunks still run.
    #[instrument(skip(self, query), fields(action = query.action().unwrap_or("")))]
    pub async fn mass_query(
        &self,
        query: CallParams,
        field: &str,
    ) -> Result<Vec<ClientResult<Value>>> {
        let chunks = self.split_query(&query, field)?;
        let total = chunks.len();
        let mut pages = Vec::with_capacity(total);

        for (index, params) in chunks.into_iter().enumerate() {
            let page = self.client.call(params, CallOptions::new().post()).await;
            if let Err(err) = &page {
                warn!(chunk = index, total, error = %err, "Mass query chunk failed");
            }
            pages.push(page);
        }
        Ok(pages)
    }

    /// Lazy form of [`mass_query`](Self::mass_query): one page per chunk.
    ///
    /// The field is validated up front; the returned stream never ends early
    /// on a failed chunk.
    pub fn mass_query_stream(
        &self,
        query: CallParams,
        field: &str,
    ) -> Result<impl Stream<Item = ClientResult<Value>>> {
        let chunks = self.split_query(&query, field)?;
        let client = self.client.clone();

        Ok(stream::iter(chunks).then(move |params| {
            let client = client.clone();
            async move { client.call(params, CallOptions::new().post()).await }
        }))
    }

    /// Items per mass-query chunk for the current account.
    pub fn chunk_size(&self) -> usize {
        if self.client.has_api_high_limits() {
            MASS_QUERY_HIGH_LIMIT
        } else {
            MASS_QUERY_LIMIT
        }
    }

    fn split_query(&self, query: &CallParams, field: &str) -> Result<Vec<CallParams>> {
        let size = self.chunk_size();
        let value = query.get(field).ok_or_else(|| {
            Error::new(ErrorKind::Usage(format!("mass query field `{field}` is not set")))
        })?;

        let chunks: Vec<ParamValue> = match value {
            ParamValue::TextList(items) => items
                .chunks(size)
                .map(|chunk| ParamValue::TextList(chunk.to_vec()))
                .collect(),
            ParamValue::IntList(items) => items
                .chunks(size)
                .map(|chunk| ParamValue::IntList(chunk.to_vec()))
                .collect(),
            _ => {
                return Err(Error::new(ErrorKind::Usage(format!(
                    "mass query field `{field}` must hold a list"
                ))))
            }
        };

        debug!(field, chunks = chunks.len(), size, "Split mass query");
        Ok(chunks
            .into_iter()
            .map(|chunk| query.clone().with(field, chunk))
            .collect())
    }
}

/// Parameters for the page after `page`, if the server asked for one.
///
/// The continuation is layered over the original query, not the previous
/// page's parameters, so keys from an older `continue` object do not leak.
fn continuation(original: &CallParams, page: &Value) -> Option<CallParams> {
    let token = page.get("continue")?.as_object()?;
    let mut next = original.clone();
    for (key, value) in token {
        next.set(key.as_str(), json_to_param(value));
    }
    Some(next)
}

fn json_to_param(value: &Value) -> ParamValue {
    match value {
        Value::String(s) => ParamValue::Text(s.clone()),
        Value::Bool(b) => ParamValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(ParamValue::Int)
            .or_else(|| n.as_f64().map(ParamValue::Float))
            .unwrap_or_else(|| ParamValue::Text(n.to_string())),
        Value::Array(items) => ParamValue::TextList(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        Value::Null => ParamValue::Unset,
        Value::Object(_) => ParamValue::Text(value.to_string()),
    }
}
