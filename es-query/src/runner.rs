//! Query execution
//!
//! [`QueryRunner`] applies incoming request parameters to a [`Query`]
//! (facet hooks, pagination, free-text search), renders the request
//! envelope, hands it to the transport and parses the reply.
//!
//! Facet hooks and the free-text term mutate the query in place. Reusing one
//! query for several executions therefore requires idempotent hooks and
//! sequential use.

use crate::config::RunnerConfig;
use crate::error::EsQueryError;
use crate::params::RequestParams;
use crate::query::Query;
use crate::response::{ParseMode, Response};
use crate::transport::{SearchRequest, SearchTransport};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct QueryRunner {
    config: RunnerConfig,
    transport: Option<Arc<dyn SearchTransport>>,
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl QueryRunner {
    /// Runner without transport, usable for [`QueryRunner::to_request`] only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            config: RunnerConfig::default(),
            transport: Some(transport),
        }
    }

    pub fn from_config(config: RunnerConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RunnerConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn set_transport(&mut self, transport: Arc<dyn SearchTransport>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    pub fn set_index(&mut self, index: impl Into<String>) -> &mut Self {
        self.config.index = Some(index.into());
        self
    }

    pub fn set_doc_type(&mut self, doc_type: impl Into<String>) -> &mut Self {
        self.config.doc_type = doc_type.into();
        self
    }

    pub fn set_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.config.limit = limit;
        self
    }

    pub fn set_page_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.page_param = name.into();
        self
    }

    pub fn set_page_delta(&mut self, delta: i64) -> &mut Self {
        self.config.page_delta = delta;
        self
    }

    pub fn set_fulltext_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.fulltext_param = name.into();
        self
    }

    pub fn set_fulltext_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.config.fulltext_field = Some(field.into());
        self
    }

    pub fn set_fulltext_roaming(&mut self, roaming: f64) -> &mut Self {
        self.config.fulltext_roaming = roaming;
        self
    }

    pub fn set_strict(&mut self, strict: bool) -> &mut Self {
        self.config.strict = strict;
        self
    }

    pub fn parse_mode(&self) -> ParseMode {
        ParseMode::from_strict(self.config.strict)
    }

    /// Page number requested by `params`, delta applied
    pub fn page(&self, params: &RequestParams) -> i64 {
        let name = &self.config.page_param;
        let raw = match params.get_i64(name) {
            Some(page) => page,
            None => {
                if params.has_value(name) {
                    warn!(param = %name, "ignoring non-numeric page parameter");
                }
                0
            }
        };
        raw.saturating_add(self.config.page_delta)
    }

    /// `size` and `from` for `params`, both `None` when no limit is set
    ///
    /// Fails when the offset of the requested page does not fit in `usize`.
    pub fn pagination(&self, params: &RequestParams) -> Result<(Option<usize>, Option<usize>)> {
        let Some(limit) = self.config.limit.filter(|l| *l > 0) else {
            return Ok((None, None));
        };

        let page = self.page(params);
        let from = usize::try_from(page.saturating_sub(1).max(0))
            .ok()
            .and_then(|pages| pages.checked_mul(limit))
            .ok_or_else(|| EsQueryError::InvalidParameter {
                name: self.config.page_param.clone(),
                reason: format!("page {page} is out of range for a limit of {limit}"),
            })?;

        debug!(page, size = limit, from, "resolved pagination");
        Ok((Some(limit), Some(from)))
    }

    /// Apply `params` to `query` and render the request envelope, without
    /// touching the transport
    pub fn to_request(&self, query: &mut Query, params: &RequestParams) -> Result<SearchRequest> {
        self.config.validate()?;
        let index = self.config.index.clone().unwrap_or_default();

        // Rejected pages must leave the query untouched
        let (size, from) = self.pagination(params)?;

        // Hooks may add terms to the filter and post-filter, so they run
        // before anything is rendered
        query.apply_facets(params);
        self.apply_fulltext(query, params);

        Ok(SearchRequest {
            index,
            doc_type: self.config.doc_type.clone(),
            body: query.to_body(),
            size,
            from,
        })
    }

    /// Execute `query` with `params` and parse the reply
    #[tracing::instrument(level = "debug", skip_all, fields(index = ?self.config.index))]
    pub async fn execute(&self, query: &mut Query, params: &RequestParams) -> Result<Response> {
        self.config.validate()?;
        let transport = self.transport.as_ref().ok_or_else(|| {
            EsQueryError::Configuration("a transport must be set before execution".to_string())
        })?;

        let request = self.to_request(query, params)?;
        let raw = transport
            .search(request)
            .await
            .map_err(EsQueryError::Transport)?;

        Response::parse(query, raw, self.parse_mode())
    }

    // Skipped when the parameter is absent or blank: an empty query string
    // is rejected by the engine
    fn apply_fulltext(&self, query: &mut Query, params: &RequestParams) {
        let name = &self.config.fulltext_param;
        if !params.has_value(name) {
            return;
        }
        let Some(text) = params.get_str(name) else {
            warn!(param = %name, "ignoring non-scalar fulltext parameter");
            return;
        };

        debug!(field = ?self.config.fulltext_field, "adding fulltext term");
        query.query_mut().match_term_with(
            self.config.fulltext_field.as_deref(),
            text,
            None,
            Some(self.config.fulltext_roaming),
        );
    }
}
