//! Balance screen table flows against a stubbed backend
//!
//! `BalanceTable` plays the rendered page: it loads its rows through the
//! interceptor like the dashboard does, and renders a new page only a short
//! while after "next" is clicked.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoffice_e2e::flows::{cycle_filters, walk_pages, FilterMenu, PageSnapshot, Paginated, RowCount};
use backoffice_e2e::intercept::InterceptedRequest;
use backoffice_e2e::{E2eError, E2eResult, Flow, PollConfig, ProbeErrorPolicy, Route, SuiteConfig, TestContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const RENDER_DELAY: Duration = Duration::from_millis(20);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Balance {
    username: String,
    currency: String,
}

fn generate_balances(n: usize) -> Vec<Balance> {
    let currencies = ["USD", "JPY", "EUR"];
    (0..n)
        .map(|i| Balance {
            username: format!("user{:03}", i),
            currency: currencies[i % currencies.len()].to_string(),
        })
        .collect()
}

fn context(pagination_timeout: Duration) -> TestContext {
    let mut config = SuiteConfig::default();
    config.poll.pagination = PollConfig::default()
        .with_timeout(pagination_timeout)
        .with_interval(Duration::from_millis(5));
    config.poll.filters = PollConfig::default()
        .with_timeout(Duration::from_secs(5))
        .with_interval(Duration::from_millis(5));
    TestContext::with_fixtures("balance", &config, Default::default())
}

fn intercept_balance(ctx: &TestContext, items: &[Balance]) {
    ctx.intercept(
        Route::new("POST", "**/balance")
            .unwrap()
            .alias("balancePost")
            .reply(
                202,
                json!({
                    "success": true,
                    "balance": {
                        "Count": items.len(),
                        "Items": items,
                        "ScannedCount": items.len(),
                    },
                }),
            ),
    );
}

struct TableState {
    rows: Vec<Balance>,
    requested_page: u32,
    shown_page: u32,
    settles_at: Instant,
    frozen: bool,
    menu_open: bool,
    menu_ready_at: Instant,
    filter: Option<String>,
}

struct BalanceTable {
    page_size: usize,
    filter_options: Vec<String>,
    menu_delay: Duration,
    state: Mutex<TableState>,
}

impl BalanceTable {
    fn load(ctx: &TestContext, page_size: usize) -> Self {
        let response = ctx
            .interceptor()
            .handle(InterceptedRequest::new("POST", ctx.url("/v5/balance")), None)
            .expect("balance endpoint is stubbed");
        assert_eq!(response.status, 202);
        let rows: Vec<Balance> =
            serde_json::from_value(response.body["balance"]["Items"].clone()).unwrap();

        Self {
            page_size,
            filter_options: ["EUR", "JPY", "USD", "BTC"].iter().map(|s| s.to_string()).collect(),
            menu_delay: Duration::ZERO,
            state: Mutex::new(TableState {
                rows,
                requested_page: 1,
                shown_page: 1,
                settles_at: Instant::now(),
                frozen: false,
                menu_open: false,
                menu_ready_at: Instant::now(),
                filter: None,
            }),
        }
    }

    fn frozen(self) -> Self {
        self.state.lock().unwrap().frozen = true;
        self
    }

    /// The filter dropdown renders its options only a while after opening
    fn with_menu_delay(mut self, delay: Duration) -> Self {
        self.menu_delay = delay;
        self
    }

    fn rendered_menu(&self) -> E2eResult<()> {
        let state = self.state.lock().unwrap();
        if !state.menu_open || Instant::now() < state.menu_ready_at {
            return Err(E2eError::ElementNotFound(".ant-table-filter-dropdown".to_string()));
        }
        Ok(())
    }

    fn page_count(&self, rows: usize) -> u32 {
        rows.div_ceil(self.page_size).max(1) as u32
    }
}

#[async_trait]
impl Paginated for BalanceTable {
    async fn snapshot(&self) -> E2eResult<PageSnapshot> {
        let mut state = self.state.lock().unwrap();
        if Instant::now() >= state.settles_at {
            state.shown_page = state.requested_page;
        }

        let shown = state.shown_page;
        let start = (shown as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(state.rows.len());
        Ok(PageSnapshot {
            active_page: shown,
            last_row: state.rows[start..end].last().map(|b| b.username.clone()),
            next_disabled: shown >= self.page_count(state.rows.len()),
        })
    }

    async fn click_next(&self) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.frozen {
            return Ok(());
        }
        if state.shown_page >= self.page_count(state.rows.len()) {
            return Err(E2eError::ElementNotFound("enabled next-page button".to_string()));
        }
        state.requested_page += 1;
        state.settles_at = Instant::now() + RENDER_DELAY;
        Ok(())
    }
}

#[async_trait]
impl FilterMenu for BalanceTable {
    async fn open(&self) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.menu_open {
            state.menu_open = true;
            state.menu_ready_at = Instant::now() + self.menu_delay;
        }
        Ok(())
    }

    async fn option_count(&self) -> E2eResult<usize> {
        self.rendered_menu()?;
        Ok(self.filter_options.len())
    }

    async fn option_label(&self, index: usize) -> E2eResult<String> {
        self.rendered_menu()?;
        self.filter_options
            .get(index)
            .cloned()
            .ok_or_else(|| E2eError::ElementNotFound(format!("filter option {}", index)))
    }

    async fn apply(&self, index: usize) -> E2eResult<()> {
        let label = self.option_label(index).await?;
        let mut state = self.state.lock().unwrap();
        state.filter = Some(label);
        state.menu_open = false;
        Ok(())
    }

    async fn visible_rows(&self) -> E2eResult<RowCount> {
        let state = self.state.lock().unwrap();
        let count = match &state.filter {
            Some(currency) => state.rows.iter().filter(|b| &b.currency == currency).count(),
            None => state.rows.len().min(self.page_size),
        };
        Ok(RowCount::expected(count))
    }

    async fn reset(&self) -> E2eResult<()> {
        let mut state = self.state.lock().unwrap();
        state.filter = None;
        state.menu_open = false;
        Ok(())
    }
}

#[tokio::test]
async fn walks_every_balance_page() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    let balances = generate_balances(23);
    intercept_balance(&ctx, &balances);
    let table = BalanceTable::load(&ctx, 10);

    let mut checked = Vec::new();
    let pages = walk_pages(&table, &ctx.poller(Flow::Pagination, "balance pages"), |page, snapshot| {
        let last_index = (page as usize * 10).min(balances.len()) - 1;
        if snapshot.last_row.as_deref() != Some(balances[last_index].username.as_str()) {
            return Err(E2eError::AssertionFailed(format!(
                "page {} ends with {:?}",
                page, snapshot.last_row
            )));
        }
        checked.push(page);
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(pages, 3);
    assert_eq!(checked, vec![1, 2, 3]);
    assert_eq!(ctx.interceptor().all("balancePost").len(), 1);
}

#[tokio::test]
async fn single_page_table_needs_no_click() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    intercept_balance(&ctx, &generate_balances(4));
    let table = BalanceTable::load(&ctx, 10);

    let pages = walk_pages(&table, &ctx.poller(Flow::Pagination, "balance pages"), |_, _| Ok(()))
        .await
        .unwrap();
    assert_eq!(pages, 1);
}

#[tokio::test]
async fn failed_page_check_stops_walk_immediately() {
    init_tracing();
    let ctx = context(Duration::from_secs(30));
    intercept_balance(&ctx, &generate_balances(50));
    let table = BalanceTable::load(&ctx, 10);
    let start = Instant::now();

    let err = walk_pages(&table, &ctx.poller(Flow::Pagination, "balance pages"), |page, _| {
        if page == 2 {
            Err(E2eError::AssertionFailed("wrong username on page 2".to_string()))
        } else {
            Ok(())
        }
    })
    .await
    .unwrap_err();

    assert!(!err.is_timeout());
    assert!(matches!(err, E2eError::AssertionFailed(ref msg) if msg.contains("page 2")));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn stuck_paginator_times_out_with_last_observation() {
    init_tracing();
    let ctx = context(Duration::from_millis(200));
    intercept_balance(&ctx, &generate_balances(30));
    let table = BalanceTable::load(&ctx, 10).frozen();

    let err = walk_pages(&table, &ctx.poller(Flow::Pagination, "balance pages"), |_, _| Ok(()))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("expected page 2 to be active, found 1"), "{}", err);
}

#[tokio::test]
async fn cycles_every_currency_filter() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    let balances = generate_balances(23);
    intercept_balance(&ctx, &balances);
    let table = BalanceTable::load(&ctx, 10);

    let applied = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 10, |currency| {
        RowCount::expected(balances.iter().filter(|b| b.currency == currency).count())
    })
    .await
    .unwrap();

    assert_eq!(applied, vec!["EUR", "JPY", "USD", "BTC"]);
    assert_eq!(table.visible_rows().await.unwrap(), RowCount::Rows(10));
}

#[tokio::test]
async fn filter_cycle_respects_max_index() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    let balances = generate_balances(9);
    intercept_balance(&ctx, &balances);
    let table = BalanceTable::load(&ctx, 10);

    let applied = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 1, |currency| {
        RowCount::expected(balances.iter().filter(|b| b.currency == currency).count())
    })
    .await
    .unwrap();

    assert_eq!(applied, vec!["EUR", "JPY"]);
}

#[tokio::test]
async fn filter_row_mismatch_fails_fast() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    intercept_balance(&ctx, &generate_balances(23));
    let table = BalanceTable::load(&ctx, 10);

    let err = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 10, |_| {
        RowCount::Rows(1)
    })
    .await
    .unwrap_err();

    assert!(!err.is_timeout());
    assert!(err.to_string().contains("filter 'EUR'"), "{}", err);
}

#[tokio::test]
async fn empty_balance_shows_placeholder() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    intercept_balance(&ctx, &[]);
    let table = BalanceTable::load(&ctx, 10);

    let applied = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 0, |_| {
        RowCount::Placeholder
    })
    .await
    .unwrap();

    assert_eq!(applied, vec!["EUR"]);
    let snapshot = table.snapshot().await.unwrap();
    assert_eq!(snapshot.last_row, None);
    assert!(snapshot.next_disabled);
}

#[tokio::test]
async fn late_dropdown_still_cycles_every_option() {
    init_tracing();
    let ctx = context(Duration::from_secs(5));
    let balances = generate_balances(23);
    intercept_balance(&ctx, &balances);
    let table = BalanceTable::load(&ctx, 10).with_menu_delay(RENDER_DELAY);

    let applied = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 10, |currency| {
        RowCount::expected(balances.iter().filter(|b| b.currency == currency).count())
    })
    .await
    .unwrap();

    assert_eq!(applied, vec!["EUR", "JPY", "USD", "BTC"]);
}

#[tokio::test]
async fn strict_budgets_still_retry_unrendered_state() {
    init_tracing();
    let strict = PollConfig::default()
        .with_timeout(Duration::from_secs(5))
        .with_interval(Duration::from_millis(5))
        .with_probe_errors(ProbeErrorPolicy::Strict);
    let mut config = SuiteConfig::default();
    config.poll.pagination = strict.clone();
    config.poll.filters = strict;
    let ctx = TestContext::with_fixtures("balance", &config, Default::default());

    let balances = generate_balances(23);
    intercept_balance(&ctx, &balances);
    let table = BalanceTable::load(&ctx, 10).with_menu_delay(RENDER_DELAY);

    let pages = walk_pages(&table, &ctx.poller(Flow::Pagination, "balance pages"), |_, _| Ok(()))
        .await
        .unwrap();
    assert_eq!(pages, 3);

    let applied = cycle_filters(&table, &ctx.poller(Flow::Filters, "currency filter"), 2, |currency| {
        RowCount::expected(balances.iter().filter(|b| b.currency == currency).count())
    })
    .await
    .unwrap();
    assert_eq!(applied, vec!["EUR", "JPY", "USD"]);
}
