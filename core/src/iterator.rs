//! Sequential pagination over a resource's GET operation.
//!
//! # Design
//! The page counters are taken from the server after every fetch rather than
//! computed locally: items created between two fetches can change the page
//! count, and the headers always reflect the current state. An iterator
//! starts at `page = 0, pages = 1` so `has_next` is true before the first
//! fetch. `next_page` takes `&mut self`, so one iterator can only ever be
//! driven by one caller at a time.
//!
//! A response without both `x-page` and `x-pages`, or one reporting a page
//! behind the one requested, ends the iteration at the requested page.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::resource::Resource;
use crate::transport::Transport;
use crate::types::Params;

pub struct PageIterator<'r, T> {
    resource: &'r Resource<T>,
    params: Params,
    page: u32,
    pages: u32,
    complete: bool,
}

impl<'r, T: Transport> PageIterator<'r, T> {
    pub(crate) fn new(resource: &'r Resource<T>, params: Params) -> Self {
        Self {
            resource,
            params,
            page: 0,
            pages: 1,
            complete: false,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Fetch the next page and return its items.
    ///
    /// Fails with `IterationComplete` without any I/O once the last page has
    /// been delivered. On a fetch error the page counter stays incremented and
    /// the iterator should be discarded.
    pub async fn next_page(&mut self) -> Result<Vec<Value>> {
        if self.complete {
            return Err(ApiError::IterationComplete);
        }
        let Some(requested) = self.page.checked_add(1) else {
            self.complete = true;
            return Err(ApiError::IterationComplete);
        };

        self.page = requested;
        self.params.insert("page", requested);
        debug!(resource = self.resource.name(), page = requested, "fetching page");

        let (body, meta) = self.resource.get(self.params.clone()).await?;

        if !meta.paged || meta.page < requested {
            warn!(
                resource = self.resource.name(),
                requested,
                page = meta.page,
                pages = meta.pages,
                "paging headers missing or behind the request, ending iteration"
            );
            self.pages = requested;
            self.complete = true;
        } else {
            self.page = meta.page;
            self.pages = meta.pages;
            self.complete = self.page >= self.pages;
        }
        debug!(
            resource = self.resource.name(),
            page = self.page,
            pages = self.pages,
            complete = self.complete,
            "page received"
        );

        Ok(page_items(body))
    }
}

/// Arrays yield their elements, `null` yields nothing, anything else is a
/// single item.
fn page_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
