//! The Getir adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use restock_browser::tab::{DEFAULT_WAIT_TIMEOUT, POLL_INTERVAL};
use restock_browser::{
    BrowserError, BrowserHandle, LaunchProfile, Launcher, PageTab, RetryPolicy, SessionStore,
};
use restock_protocols::{
    AdapterError, CartReceipt, ProductCandidate, ProviderId, SessionStatus, Storefront,
};

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

/// Every product card renders one of these; its text is `{name} ₺{price}`.
const PRODUCT_BUTTON: &str = "button[aria-label='Show Product']";
/// Quantity controls inside a card. One button when the product is not in
/// the cart, a decrement/increment pair once it is.
const COUNTER_BUTTON: &str = "button[aria-label='counter']";
/// Header search field variants, probed in order.
const SEARCH_INPUTS: &[&str] = &[
    "input[placeholder*='Ürün ara']",
    "[aria-label='Search Bar']",
    "input[placeholder*='ara']",
];
const CART_BADGE: &str = "[class*='cart'] [class*='badge'], [class*='Cart'] [class*='count']";
/// Attribute stamped onto card roots so a candidate's handle stays
/// resolvable across SPA re-renders.
const CARD_MARK: &str = "data-restock-card";

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(3);

/// Construction parameters for [`GetirStorefront`].
pub struct GetirConfig {
    pub base_url: String,
    pub launch: LaunchProfile,
    pub sessions: SessionStore,
    /// Cap on scraped candidates per search.
    pub max_candidates: usize,
}

impl GetirConfig {
    pub fn new(launch: LaunchProfile, sessions: SessionStore) -> Self {
        Self {
            base_url: "https://getir.com".to_string(),
            launch,
            sessions,
            max_candidates: 10,
        }
    }
}

struct Driver {
    browser: BrowserHandle,
    tab: PageTab,
}

fn active<'g>(guard: &'g MutexGuard<'_, Option<Driver>>) -> Result<&'g Driver, AdapterError> {
    guard
        .as_ref()
        .ok_or_else(|| AdapterError::Browser("no active browser session".to_string()))
}

/// Getir (getir.com) storefront.
///
/// Login state persists two ways: the Chrome profile directory keeps
/// cookies between launches, and a captured session blob reseeds a fresh
/// profile when the directory is gone.
pub struct GetirStorefront {
    config: GetirConfig,
    retry: RetryPolicy,
    driver: Mutex<Option<Driver>>,
}

impl GetirStorefront {
    pub fn new(config: GetirConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
            driver: Mutex::new(None),
        }
    }

    /// Lock the driver slot, opening the browser session on first use.
    async fn driver(&self) -> Result<MutexGuard<'_, Option<Driver>>, AdapterError> {
        let mut guard = self.driver.lock().await;
        if guard.is_none() {
            let browser = Launcher::new(self.config.launch.clone())
                .launch_or_attach()
                .await?;
            let tab = browser.client().new_tab("about:blank").await?;

            tab.navigate(&self.config.base_url).await?;
            if let Some(blob) = self.config.sessions.load(ProviderId::Getir).await? {
                if !blob.is_empty() {
                    tab.restore_session(&blob).await?;
                    // Reload so the app boots with the restored state.
                    tab.navigate(&self.config.base_url).await?;
                }
            }
            *guard = Some(Driver { browser, tab });
        }
        Ok(guard)
    }

    /// The logged-out shell shows a phone-number field and a login button;
    /// absence of both means the session is authenticated.
    async fn is_logged_in(&self, tab: &PageTab) -> Result<bool, AdapterError> {
        if let Some(node) = tab.query_selector("input[placeholder*='telefon']").await? {
            if tab.is_visible(node).await? {
                return Ok(false);
            }
        }
        if tab.text_visible("button, a", "giriş yap").await? {
            return Ok(false);
        }
        Ok(true)
    }

    /// Best-effort capture of the authenticated session.
    async fn persist_session(&self, tab: &PageTab) {
        match tab.capture_session(ProviderId::Getir).await {
            Ok(blob) if !blob.is_empty() => {
                if let Err(e) = self.config.sessions.save(&blob).await {
                    warn!("Failed to persist Getir session: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Getir session capture skipped: {e}"),
        }
    }

    /// Land on the results page for `query`: fill the header search field
    /// when one is rendered, fall back to the search URL otherwise.
    async fn open_results(&self, tab: &PageTab, query: &str) -> Result<(), AdapterError> {
        let here = tab.current_url().await?;
        if !here.starts_with(&self.config.base_url) {
            tab.navigate(&self.config.base_url).await?;
        }

        if let Some((selector, node)) = tab.find_first(SEARCH_INPUTS).await? {
            debug!("Searching Getir via field {selector}");
            tab.fill_node(node, query).await?;
            tab.press_key("Enter").await?;
        } else {
            let url = search_url(&self.config.base_url, query)?;
            debug!("Searching Getir via {url}");
            tab.navigate(&url).await?;
        }
        Ok(())
    }

    /// Stamp each product card with [`CARD_MARK`] and return
    /// `(index, button text)` rows in presentation order.
    ///
    /// Getir re-renders cards after every cart change and drops foreign
    /// attributes; interactions re-run this pass before resolving a handle.
    async fn mark_cards(&self, tab: &PageTab) -> Result<Vec<(usize, String)>, AdapterError> {
        let script = format!(
            r#"(() => {{
                document.querySelectorAll('[{mark}]').forEach(el => el.removeAttribute('{mark}'));
                const rows = [];
                let index = 0;
                for (const btn of document.querySelectorAll("{product}")) {{
                    if (index >= {max}) break;
                    const card = btn.parentElement;
                    if (!card) continue;
                    card.setAttribute('{mark}', String(index));
                    rows.push([index, (btn.innerText || '').trim()]);
                    index += 1;
                }}
                return JSON.stringify(rows);
            }})()"#,
            mark = CARD_MARK,
            product = PRODUCT_BUTTON,
            max = self.config.max_candidates,
        );
        let value = tab.evaluate(&script).await?;
        let rows: Vec<(usize, String)> = value
            .as_str()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AdapterError::Browser(e.to_string()))?
            .unwrap_or_default();
        Ok(rows)
    }

    /// Re-mark the results and resolve the candidate's card node. Node ids
    /// go stale on every re-render, so this runs before each interaction.
    async fn resolve_card(
        &self,
        tab: &PageTab,
        candidate: &ProductCandidate,
    ) -> Result<i64, AdapterError> {
        self.mark_cards(tab).await?;
        tab.query_selector(&candidate.handle).await?.ok_or_else(|| {
            AdapterError::LayoutChanged(format!(
                "results card for '{}' disappeared",
                candidate.title
            ))
        })
    }

    /// Wait until the candidate's card shows at least `controls` counter
    /// buttons. The collapse/expand swap is the signal that the cart
    /// registered the click.
    async fn await_counter(
        &self,
        tab: &PageTab,
        candidate: &ProductCandidate,
        controls: usize,
    ) -> Result<(), AdapterError> {
        let start = Instant::now();
        loop {
            let card = self.resolve_card(tab, candidate).await?;
            if tab.query_within_all(card, COUNTER_BUTTON).await?.len() >= controls {
                return Ok(());
            }
            if start.elapsed() > DEFAULT_WAIT_TIMEOUT {
                return Err(AdapterError::Timeout(format!(
                    "quantity controls for '{}'",
                    candidate.title
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    fn page_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Storefront for GetirStorefront {
    fn id(&self) -> ProviderId {
        ProviderId::Getir
    }

    fn requires_login(&self) -> bool {
        true
    }

    async fn ensure_session(&self) -> Result<SessionStatus, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        // Fresh navigation so the probe sees the storefront shell, not
        // whatever page the previous operation left open.
        tab.navigate(&self.config.base_url).await?;

        if !self.is_logged_in(tab).await? {
            info!("Getir session needs manual login");
            return Ok(SessionStatus::NeedsManualLogin);
        }

        self.persist_session(tab).await;
        debug!("Getir session ready");
        Ok(SessionStatus::Ready)
    }

    async fn search(&self, query: &str) -> Result<Vec<ProductCandidate>, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        let rows = self
            .retry
            .run("getir search", || async move {
                self.open_results(tab, query).await?;
                match tab
                    .wait_for_selector(PRODUCT_BUTTON, DEFAULT_WAIT_TIMEOUT)
                    .await
                {
                    Ok(_) => self.mark_cards(tab).await,
                    // No card inside the window means zero results, not a
                    // failure.
                    Err(BrowserError::Timeout(_)) => Ok(Vec::new()),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for (index, text) in rows {
            if text.is_empty() {
                continue;
            }
            let (title, price_text) = split_button_text(&text);
            candidates.push(ProductCandidate::from_scraped(
                title,
                price_text,
                card_handle(index),
                index,
            ));
        }
        info!("Getir search '{query}' returned {} candidates", candidates.len());
        Ok(candidates)
    }

    async fn add_to_cart(
        &self,
        candidate: &ProductCandidate,
        quantity: u32,
    ) -> Result<CartReceipt, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;
        let quantity = quantity.max(1);

        info!("Adding {quantity}x '{}' to Getir cart", candidate.title);

        // First unit: the collapsed card shows a single add control. Cart
        // mutations are never auto-retried; a slow click that did land
        // must not be clicked again.
        let card = self.resolve_card(tab, candidate).await?;
        let control = tab.query_within(card, COUNTER_BUTTON).await?.ok_or_else(|| {
            AdapterError::ElementMissing(format!("add control in card for '{}'", candidate.title))
        })?;
        tab.click_node(control).await?;
        self.await_counter(tab, candidate, 2).await?;

        // Remaining units: the rightmost counter in the card increments.
        for unit in 1..quantity {
            let card = self.resolve_card(tab, candidate).await?;
            let controls = tab.query_within_all(card, COUNTER_BUTTON).await?;
            let plus = controls.last().copied().ok_or_else(|| {
                AdapterError::ElementMissing(format!(
                    "increment control for '{}'",
                    candidate.title
                ))
            })?;
            tab.click_node(plus).await?;
            self.await_counter(tab, candidate, 2).await?;
            debug!("Incremented '{}' to {} units", candidate.title, unit + 1);
        }

        self.persist_session(tab).await;
        Ok(CartReceipt {
            title: candidate.title.clone(),
            quantity,
        })
    }

    async fn cart_count(&self) -> Result<u32, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        match tab.query_selector(CART_BADGE).await? {
            Some(node) => Ok(parse_count(&tab.inner_text(node).await?)),
            None => Ok(0),
        }
    }

    async fn clear_cart(&self) -> Result<(), AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        tab.navigate(&self.page_url("sepet/")).await?;
        if !tab.click_text("button, a", "sepeti temizle").await? {
            debug!("Getir cart already empty");
            return Ok(());
        }

        // Getir raises a confirmation dialog.
        let start = Instant::now();
        loop {
            if tab.click_text("button", "evet").await? {
                info!("Cleared Getir cart");
                return Ok(());
            }
            if start.elapsed() > CONFIRM_TIMEOUT {
                warn!("Getir clear-cart confirmation never appeared");
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn open_cart(&self) -> Result<(), AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;
        tab.navigate(&self.page_url("sepet/")).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut guard = self.driver.lock().await;
        if let Some(driver) = guard.take() {
            // Only an authenticated session is worth keeping; saving a
            // logged-out blob would clobber a good one.
            if let Ok(true) = self.is_logged_in(&driver.tab).await {
                self.persist_session(&driver.tab).await;
            }
            driver.browser.shutdown().await;
            info!("Getir session closed");
        }
        Ok(())
    }
}

fn card_handle(index: usize) -> String {
    format!("[{CARD_MARK}=\"{index}\"]")
}

/// Split a `Show Product` button's rendered text into title and price text.
fn split_button_text(text: &str) -> (String, String) {
    match text.split_once('₺') {
        Some((name, price)) => (name.trim().to_string(), format!("₺{}", price.trim())),
        None => (text.trim().to_string(), String::new()),
    }
}

fn parse_count(text: &str) -> u32 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn search_url(base: &str, query: &str) -> Result<String, AdapterError> {
    let mut url = Url::parse(base).map_err(|e| AdapterError::Navigation(e.to_string()))?;
    url.set_path("/arama");
    url.query_pairs_mut().clear().append_pair("q", query);
    Ok(url.to_string())
}
