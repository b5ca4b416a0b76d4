//! Table flows driven by the bounded poller
//!
//! Both flows step a dashboard table through states that only settle after
//! the backend responds: walking every page of a paginated table, and
//! applying each option of a column filter in turn. The page layer is
//! reached through the [`Paginated`] and [`FilterMenu`] seams.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use backoffice_recurse::{Poller, ProbeErrorPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// What the pagination controls and table currently show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// 1-based page marked active in the paginator
    pub active_page: u32,
    /// First cell of the last rendered row
    pub last_row: Option<String>,
    pub next_disabled: bool,
}

#[async_trait]
pub trait Paginated: Send + Sync {
    async fn snapshot(&self) -> E2eResult<PageSnapshot>;

    async fn click_next(&self) -> E2eResult<()>;
}

/// Rendered body of a filtered table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCount {
    Rows(usize),
    /// The single "no data" placeholder row
    Placeholder,
}

impl RowCount {
    pub fn expected(count: usize) -> Self {
        if count == 0 {
            RowCount::Placeholder
        } else {
            RowCount::Rows(count)
        }
    }
}

#[async_trait]
pub trait FilterMenu: Send + Sync {
    /// Open the column's filter dropdown
    async fn open(&self) -> E2eResult<()>;

    /// Number of options in the open dropdown. `ElementNotFound` while the
    /// dropdown has not rendered.
    async fn option_count(&self) -> E2eResult<usize>;

    /// Label of the option at `index`. `ElementNotFound` while the dropdown
    /// has not rendered it.
    async fn option_label(&self, index: usize) -> E2eResult<String>;

    /// Tick the option at `index` and confirm the filter
    async fn apply(&self, index: usize) -> E2eResult<()>;

    async fn visible_rows(&self) -> E2eResult<RowCount>;

    /// Reopen the dropdown and clear the filter
    async fn reset(&self) -> E2eResult<()>;
}

/// Walk a paginated table from page 1 until the next button disables.
///
/// A snapshot whose active page lags behind the page just requested counts
/// as "not rendered yet" and is polled again. `check` runs on every settled
/// page before deciding whether to stop; an error from it fails the walk
/// immediately. Returns the number of pages visited.
///
/// A lagging page is always retried, even if `poller` is configured strict.
pub async fn walk_pages<P, F>(table: &P, poller: &Poller, mut check: F) -> E2eResult<u32>
where
    P: Paginated + ?Sized,
    F: FnMut(u32, &PageSnapshot) -> E2eResult<()>,
{
    let poller = tolerant(poller);
    let page_cell = Cell::new(1u32);
    let page = &page_cell;

    let last = poller
        .until_with(
            move || settled_snapshot(table, page.get()),
            move |snapshot| {
                check(page.get(), snapshot)?;
                Ok(snapshot.next_disabled)
            },
            move |_| {
                page.set(page.get() + 1);
                debug!(page = page.get(), "Advancing to next page");
                table.click_next()
            },
        )
        .await?;

    info!(pages = last.active_page, "Walked every page");
    Ok(page_cell.get())
}

async fn settled_snapshot<P>(table: &P, expected_page: u32) -> E2eResult<PageSnapshot>
where
    P: Paginated + ?Sized,
{
    let snapshot = table.snapshot().await?;
    if snapshot.active_page != expected_page {
        return Err(E2eError::AssertionFailed(format!(
            "expected page {} to be active, found {}",
            expected_page, snapshot.active_page
        )));
    }
    Ok(snapshot)
}

/// Apply each filter option in turn, from index 0 through `max_index`, or
/// through the last option the dropdown offers if that comes first.
///
/// A dropdown or option that has not rendered yet is retried until the
/// deadline, even if `poller` is configured strict. After applying an option
/// the table must show `expected(label)` rows; a mismatch fails immediately.
/// Returns the labels that were applied.
pub async fn cycle_filters<M, F>(
    menu: &M,
    poller: &Poller,
    max_index: usize,
    mut expected: F,
) -> E2eResult<Vec<String>>
where
    M: FilterMenu + ?Sized,
    F: FnMut(&str) -> RowCount,
{
    let poller = tolerant(poller);
    let index_cell = Cell::new(0usize);
    let applied_cell = RefCell::new(Vec::new());
    let (index, applied) = (&index_cell, &applied_cell);

    poller
        .until_with(
            move || next_option(menu, index.get(), max_index),
            |label| Ok(label.is_none()),
            move |label| {
                let label = label.clone().unwrap_or_default();
                let want = expected(&label);
                let current = index.get();
                async move {
                    let outcome = verify_option(menu, current, &label, want).await;
                    outcome.map(|rows| {
                        debug!(filter = %label, ?rows, "Filter option verified");
                        applied.borrow_mut().push(label);
                        index.set(current + 1);
                    })
                }
            },
        )
        .await?;

    let applied = applied_cell.into_inner();
    info!(filters = applied.len(), "Cycled filter options");
    Ok(applied)
}

/// Same label and budget, but "not rendered yet" is never fatal
fn tolerant(poller: &Poller) -> Poller {
    let config = poller
        .config()
        .clone()
        .with_probe_errors(ProbeErrorPolicy::Tolerant);
    Poller::new(poller.label(), config)
}

/// `None` once every option up to `max_index`, or every option the dropdown
/// has, has been applied
async fn next_option<M>(menu: &M, index: usize, max_index: usize) -> E2eResult<Option<String>>
where
    M: FilterMenu + ?Sized,
{
    if index > max_index {
        return Ok(None);
    }
    menu.open().await?;
    if index >= menu.option_count().await? {
        return Ok(None);
    }
    menu.option_label(index).await.map(Some)
}

async fn verify_option<M>(menu: &M, index: usize, label: &str, want: RowCount) -> E2eResult<RowCount>
where
    M: FilterMenu + ?Sized,
{
    menu.apply(index).await?;
    let got = menu.visible_rows().await?;
    if got != want {
        return Err(E2eError::AssertionFailed(format!(
            "filter '{}' showed {:?}, expected {:?}",
            label, got, want
        )));
    }
    menu.reset().await?;
    Ok(got)
}
