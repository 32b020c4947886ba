//! The Migros adapter.

use std::sync::atomic::{AtomicBool, Ordering};
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

/// Product card roots, newest markup first.
const CARD_SELECTORS: &str = "[data-monitor-product], .product-card, article[class*='product']";
/// In-card add buttons that are CSS-addressable; the rendered label
/// "Sepete Ekle" is tried first since it survives class churn.
const ADD_CONTROLS: &str =
    "[data-testid='add-to-cart'], [class*='add-to-cart'], button[class*='AddToCart'], .add-button";
const INCREMENT_CONTROLS: &str = "[data-testid='increment'], .increment-btn, [class*='increment']";
const CART_BADGE: &str = "[data-testid='cart-count'], .cart-count, .basket-count";
/// Product modal roots; opened when a card has no inline add button.
const MODAL_ROOTS: &str = "[role='dialog'], [class*='modal']";
/// Attribute stamped onto card roots so a candidate's handle stays
/// resolvable across re-renders.
const CARD_MARK: &str = "data-restock-card";

const POPUP_TIMEOUT: Duration = Duration::from_secs(3);
const MODAL_TIMEOUT: Duration = Duration::from_secs(5);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(3);

const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "tr-TR,tr;q=0.9";
const TIMEZONE: &str = "Europe/Istanbul";
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];
/// Migros checks `navigator.webdriver` and serves a degraded page to
/// automation; mask it before any page script runs.
const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Construction parameters for [`MigrosStorefront`].
pub struct MigrosConfig {
    pub base_url: String,
    pub launch: LaunchProfile,
    pub sessions: SessionStore,
    /// Cap on scraped candidates per search.
    pub max_candidates: usize,
}

impl MigrosConfig {
    pub fn new(launch: LaunchProfile, sessions: SessionStore) -> Self {
        Self {
            base_url: "https://www.migros.com.tr".to_string(),
            launch,
            sessions,
            max_candidates: 10,
        }
    }
}

/// Fill in the stealth defaults, keeping any explicit override.
fn harden_profile(launch: &mut LaunchProfile) {
    if launch.user_agent.is_none() {
        launch.user_agent = Some(DESKTOP_UA.to_string());
    }
    if launch.accept_language.is_none() {
        launch.accept_language = Some(ACCEPT_LANGUAGE.to_string());
    }
    if launch.timezone.is_none() {
        launch.timezone = Some(TIMEZONE.to_string());
    }
    for arg in STEALTH_ARGS {
        if !launch.extra_args.iter().any(|a| a == arg) {
            launch.extra_args.push((*arg).to_string());
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

/// Migros Sanal Market (migros.com.tr) storefront.
pub struct MigrosStorefront {
    config: MigrosConfig,
    retry: RetryPolicy,
    driver: Mutex<Option<Driver>>,
    /// Overlay probes poll only on the first navigation of a session.
    popups_checked: AtomicBool,
}

impl MigrosStorefront {
    pub fn new(mut config: MigrosConfig) -> Self {
        harden_profile(&mut config.launch);
        Self {
            config,
            retry: RetryPolicy::default(),
            driver: Mutex::new(None),
            popups_checked: AtomicBool::new(false),
        }
    }

    /// Lock the driver slot, opening the browser session on first use.
    /// Tab-level overrides are applied before the first navigation so the
    /// storefront never sees the default fingerprint.
    async fn driver(&self) -> Result<MutexGuard<'_, Option<Driver>>, AdapterError> {
        let mut guard = self.driver.lock().await;
        if guard.is_none() {
            let browser = Launcher::new(self.config.launch.clone())
                .launch_or_attach()
                .await?;
            let tab = browser.client().new_tab("about:blank").await?;

            tab.add_init_script(STEALTH_SCRIPT).await?;
            if let Some(ua) = &self.config.launch.user_agent {
                tab.set_user_agent(ua, self.config.launch.accept_language.as_deref())
                    .await?;
            }
            if let Some(tz) = &self.config.launch.timezone {
                tab.set_timezone(tz).await?;
            }

            tab.navigate(&self.config.base_url).await?;
            if let Some(blob) = self.config.sessions.load(ProviderId::Migros).await? {
                if !blob.is_empty() {
                    tab.restore_session(&blob).await?;
                    tab.navigate(&self.config.base_url).await?;
                }
            }
            *guard = Some(Driver { browser, tab });
        }
        Ok(guard)
    }

    /// Dismiss the cookie and delivery-type overlays when they are up.
    /// Bounded and non-fatal: a missing overlay is the normal case.
    async fn dismiss_popups(&self, tab: &PageTab) -> Result<(), AdapterError> {
        let first_visit = !self.popups_checked.swap(true, Ordering::SeqCst);
        let deadline = if first_visit { POPUP_TIMEOUT } else { Duration::ZERO };

        // Cookie consent ("Kabul Et" / "Tümünü Kabul Et") renders shortly
        // after load on fresh profiles.
        let start = Instant::now();
        loop {
            if tab.click_text("button", "kabul et").await? {
                debug!("Dismissed Migros cookie banner");
                break;
            }
            if start.elapsed() >= deadline {
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        // Delivery-type prompt; home delivery keeps the product range the
        // selectors were built against.
        if let Some(node) = tab.query_selector("[data-testid='delivery-type-home']").await? {
            if tab.is_visible(node).await? {
                tab.click_node(node).await?;
                debug!("Selected Migros home delivery");
            }
        } else if tab.click_text("button, a", "adresime gelsin").await? {
            debug!("Selected Migros home delivery");
        }
        Ok(())
    }

    /// A visible login button means the session is not authenticated.
    async fn is_logged_in(&self, tab: &PageTab) -> Result<bool, AdapterError> {
        Ok(!tab.text_visible("button, a", "giriş yap").await?)
    }

    /// Best-effort capture of the authenticated session.
    async fn persist_session(&self, tab: &PageTab) {
        match tab.capture_session(ProviderId::Migros).await {
            Ok(blob) if !blob.is_empty() => {
                if let Err(e) = self.config.sessions.save(&blob).await {
                    warn!("Failed to persist Migros session: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Migros session capture skipped: {e}"),
        }
    }

    /// Stamp each product card with [`CARD_MARK`] and scrape
    /// `(index, name, price text)` rows in presentation order. Name and
    /// price come from per-field fallback chains probed inside each card.
    async fn mark_cards(&self, tab: &PageTab) -> Result<Vec<(usize, String, String)>, AdapterError> {
        let script = format!(
            r#"(() => {{
                document.querySelectorAll('[{mark}]').forEach(el => el.removeAttribute('{mark}'));
                const nameSels = ["[data-monitor-name]", ".product-name", "[class*='ProductName']", "h5", "[class*='name']"];
                const priceSels = ["[data-monitor-price]", ".product-price", "[class*='Price']", "[class*='price']", ".amount"];
                const pick = (root, sels) => {{
                    for (const sel of sels) {{
                        const el = root.querySelector(sel);
                        const text = el && el.innerText ? el.innerText.trim() : '';
                        if (text) return text;
                    }}
                    return '';
                }};
                const rows = [];
                let index = 0;
                for (const card of document.querySelectorAll("{cards}")) {{
                    if (index >= {max}) break;
                    card.setAttribute('{mark}', String(index));
                    const name = pick(card, nameSels) || (card.innerText || '').trim().split('\n')[0].slice(0, 60);
                    rows.push([index, name, pick(card, priceSels)]);
                    index += 1;
                }}
                return JSON.stringify(rows);
            }})()"#,
            mark = CARD_MARK,
            cards = CARD_SELECTORS,
            max = self.config.max_candidates,
        );
        let value = tab.evaluate(&script).await?;
        let rows: Vec<(usize, String, String)> = value
            .as_str()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AdapterError::Browser(e.to_string()))?
            .unwrap_or_default();
        Ok(rows)
    }

    /// Re-mark the results and resolve the candidate's card node.
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

    /// Click the add control inside the card. Returns whether one existed.
    async fn click_add_control(&self, tab: &PageTab, card: i64) -> Result<bool, AdapterError> {
        if tab.click_text_within(card, "button", "sepete ekle").await? {
            return Ok(true);
        }
        if let Some(node) = tab.query_within(card, ADD_CONTROLS).await? {
            if tab.is_visible(node).await? {
                tab.click_node(node).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Open the product modal and add from there; some layouts render
    /// cards without an inline add button.
    async fn add_via_modal(
        &self,
        tab: &PageTab,
        card: i64,
        candidate: &ProductCandidate,
    ) -> Result<(), AdapterError> {
        debug!("No inline add control for '{}'; trying modal", candidate.title);
        tab.click_node(card).await?;

        let dialog = match tab.wait_for_selector(MODAL_ROOTS, MODAL_TIMEOUT).await {
            Ok(node) => node,
            Err(BrowserError::Timeout(_)) => {
                return Err(AdapterError::ElementMissing(format!(
                    "add control for '{}'",
                    candidate.title
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let added = tab.click_text_within(dialog, "button", "sepete ekle").await?;
        // Close the overlay either way so the next item starts on the grid.
        // It eats clicks while animating out, so wait until it is gone.
        tab.press_key("Escape").await?;
        match tab.wait_for_selector_gone(MODAL_ROOTS, POPUP_TIMEOUT).await {
            Ok(()) => {}
            Err(BrowserError::Timeout(_)) => {
                debug!("Modal for '{}' is slow to close; moving on", candidate.title);
            }
            Err(e) => return Err(e.into()),
        }
        if !added {
            return Err(AdapterError::ElementMissing(format!(
                "modal add control for '{}'",
                candidate.title
            )));
        }
        Ok(())
    }

    /// Click the in-card increment control. Returns whether one existed.
    async fn click_increment(&self, tab: &PageTab, card: i64) -> Result<bool, AdapterError> {
        if let Some(node) = tab.query_within(card, INCREMENT_CONTROLS).await? {
            if tab.is_visible(node).await? {
                tab.click_node(node).await?;
                return Ok(true);
            }
        }
        // Last resort: a bare plus button, still scoped to this card.
        Ok(tab.click_text_within(card, "button", "+").await?)
    }

    async fn badge_count(&self, tab: &PageTab) -> Result<u32, AdapterError> {
        match tab.query_selector(CART_BADGE).await? {
            Some(node) => Ok(parse_count(&tab.inner_text(node).await?)),
            None => Ok(0),
        }
    }

    /// Wait for evidence the first unit landed: the cart badge grew or the
    /// card swapped its add button for a quantity stepper.
    async fn await_first_add(
        &self,
        tab: &PageTab,
        candidate: &ProductCandidate,
        badge_before: u32,
    ) -> Result<(), AdapterError> {
        let start = Instant::now();
        loop {
            if self.badge_count(tab).await? > badge_before {
                return Ok(());
            }
            self.mark_cards(tab).await?;
            if let Some(card) = tab.query_selector(&candidate.handle).await? {
                if tab.query_within(card, INCREMENT_CONTROLS).await?.is_some() {
                    return Ok(());
                }
            }
            if start.elapsed() > DEFAULT_WAIT_TIMEOUT {
                return Err(AdapterError::Timeout(format!(
                    "cart update for '{}'",
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
impl Storefront for MigrosStorefront {
    fn id(&self) -> ProviderId {
        ProviderId::Migros
    }

    fn requires_login(&self) -> bool {
        true
    }

    async fn ensure_session(&self) -> Result<SessionStatus, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        tab.navigate(&self.config.base_url).await?;
        self.dismiss_popups(tab).await?;

        if !self.is_logged_in(tab).await? {
            info!("Migros session needs manual login");
            return Ok(SessionStatus::NeedsManualLogin);
        }

        self.persist_session(tab).await;
        debug!("Migros session ready");
        Ok(SessionStatus::Ready)
    }

    async fn search(&self, query: &str) -> Result<Vec<ProductCandidate>, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        // The search URL is steadier than the header field, which hides
        // behind a collapsed icon on some breakpoints.
        let url = search_url(&self.config.base_url, query)?;
        let rows = self
            .retry
            .run("migros search", || {
                let url = url.clone();
                async move {
                    tab.navigate(&url).await?;
                    self.dismiss_popups(tab).await?;
                    match tab.wait_for_selector(CARD_SELECTORS, DEFAULT_WAIT_TIMEOUT).await {
                        Ok(_) => self.mark_cards(tab).await,
                        Err(BrowserError::Timeout(_)) => Ok(Vec::new()),
                        Err(e) => Err(e.into()),
                    }
                }
            })
            .await?;

        let candidates = rows
            .into_iter()
            .filter(|(_, name, _)| !name.is_empty())
            .map(|(index, name, price)| {
                ProductCandidate::from_scraped(name, price, card_handle(index), index)
            })
            .collect::<Vec<_>>();
        info!("Migros search '{query}' returned {} candidates", candidates.len());
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

        info!("Adding {quantity}x '{}' to Migros cart", candidate.title);

        // Cart mutations are never auto-retried; a slow click that did
        // land must not be clicked again.
        let badge_before = self.badge_count(tab).await?;
        let card = self.resolve_card(tab, candidate).await?;
        if !self.click_add_control(tab, card).await? {
            self.add_via_modal(tab, card, candidate).await?;
        }
        self.await_first_add(tab, candidate, badge_before).await?;

        for unit in 1..quantity {
            let card = self.resolve_card(tab, candidate).await?;
            if !self.click_increment(tab, card).await? {
                return Err(AdapterError::ElementMissing(format!(
                    "increment control for '{}'",
                    candidate.title
                )));
            }
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
        self.badge_count(tab).await
    }

    async fn clear_cart(&self) -> Result<(), AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        tab.navigate(&self.page_url("sepetim")).await?;
        self.dismiss_popups(tab).await?;

        if !tab.click_text("button, a", "sepeti boşalt").await?
            && !tab.click_text("button, a", "tümünü sil").await?
        {
            debug!("Migros cart already empty");
            return Ok(());
        }

        let start = Instant::now();
        loop {
            if tab.click_text("button", "evet").await?
                || tab.click_text("button", "onayla").await?
            {
                info!("Cleared Migros cart");
                return Ok(());
            }
            if start.elapsed() > CONFIRM_TIMEOUT {
                warn!("Migros clear-cart confirmation never appeared");
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn open_cart(&self) -> Result<(), AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;
        tab.navigate(&self.page_url("sepetim")).await?;
        self.dismiss_popups(tab).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut guard = self.driver.lock().await;
        if let Some(driver) = guard.take() {
            if let Ok(true) = self.is_logged_in(&driver.tab).await {
                self.persist_session(&driver.tab).await;
            }
            driver.browser.shutdown().await;
            info!("Migros session closed");
        }
        Ok(())
    }
}

fn card_handle(index: usize) -> String {
    format!("[{CARD_MARK}=\"{index}\"]")
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
