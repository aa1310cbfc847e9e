use std::future::Future;

/// One page of a cursor-paginated listing. The remote caps pages at 100
/// items and signals continuation with `has_more` plus an opaque cursor.
pub trait Page {
    type Item;

    fn next_cursor(&self) -> Option<&str>;
    fn has_more(&self) -> bool;
    fn into_items(self) -> Vec<Self::Item>;
}

/// Follows continuation cursors until the remote reports no more pages,
/// returning every item without omission or duplication. `fetch` receives
/// the cursor of the page to load (`None` for the first).
pub async fn collect_all<P, F, Fut, E>(mut fetch: F) -> Result<Vec<P::Item>, E>
where
    P: Page,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<P, E>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch(cursor.take()).await?;
        let has_more = page.has_more();
        let next = page.next_cursor().map(str::to_string);
        items.extend(page.into_items());
        if has_more {
            cursor = next;
        } else {
            return Ok(items);
        }
    }
}

impl Page for crate::types::QueryPage {
    type Item = crate::types::PageObject;

    fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    fn has_more(&self) -> bool {
        self.has_more
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.results
    }
}

impl Page for crate::types::UserPage {
    type Item = crate::types::UserObject;

    fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    fn has_more(&self) -> bool {
        self.has_more
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.results
    }
}
