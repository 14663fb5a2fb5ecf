//! Resumable catalog paging.
//!
//! A [`CatalogPager`] owns the walk position the engine persists between
//! ticks: `None` is the catalog origin, `Some(cursor)` resumes mid-walk.
//! Cursor invalidation recovery is a [`CatalogPager::restart`] back to the
//! origin; the page after the final one is the origin again, which is how
//! a job that filled its quota exactly on the last page wraps around.

use crate::client::AdminClient;
use crate::error::ShopifyError;
use crate::types::ProductsPage;

pub struct CatalogPager<'a> {
    client: &'a AdminClient,
    page_size: u32,
    position: Option<String>,
}

impl<'a> CatalogPager<'a> {
    /// Resume a walk from a persisted cursor (`None` starts at the origin).
    #[must_use]
    pub fn resume(client: &'a AdminClient, page_size: u32, cursor: Option<String>) -> Self {
        CatalogPager {
            client,
            page_size,
            position: cursor,
        }
    }

    /// The position to persist for the next tick.
    #[must_use]
    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    /// Forget the cursor and walk from the catalog origin again.
    pub fn restart(&mut self) {
        self.position = None;
    }

    /// Fetch the page at the current position and advance past it.
    ///
    /// On error the position is left untouched, so the same page is
    /// retried on the next invocation.
    ///
    /// # Errors
    ///
    /// Everything [`AdminClient::fetch_products_page`] returns, including
    /// [`ShopifyError::CursorInvalid`] for an expired position.
    pub async fn next_page(&mut self) -> Result<ProductsPage, ShopifyError> {
        let page = self
            .client
            .fetch_products_page(self.page_size, self.position.as_deref())
            .await?;
        self.position.clone_from(&page.next_cursor);
        Ok(page)
    }
}
