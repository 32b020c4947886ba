//! The Akbal adapter.

use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use restock_browser::tab::{DEFAULT_WAIT_TIMEOUT, POLL_INTERVAL};
use restock_browser::{
    BrowserError, BrowserHandle, LaunchProfile, Launcher, PageTab, RetryPolicy,
};
use restock_protocols::{
    AdapterError, CartReceipt, ProductCandidate, ProviderId, SessionStatus, Storefront,
};

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

/// Magento product cards on the catalog search results page.
const CARD_SELECTOR: &str = ".product-item";
/// In-card add-to-cart buttons across Magento theme variants.
const ADD_BUTTONS: &str =
    "button.tocart, button.action.tocart, button[title='Sepete Ekle'], .action.tocart.primary";
/// Minicart badge; Magento renders the total quantity here.
const CART_BADGE: &str = ".counter-number, .minicart-wrapper .counter-number";
/// Line-delete links on the cart page.
const DELETE_LINKS: &str = "a.action-delete, .action.delete, a[title='Sil']";
/// Attribute stamped onto card roots so a candidate's handle stays
/// resolvable after Magento swaps button state.
const CARD_MARK: &str = "data-restock-card";

const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];
const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Construction parameters for [`AkbalStorefront`]. No session store:
/// Akbal carts work without a customer account.
pub struct AkbalConfig {
    pub base_url: String,
    pub launch: LaunchProfile,
    /// Cap on scraped candidates per search.
    pub max_candidates: usize,
}

impl AkbalConfig {
    pub fn new(launch: LaunchProfile) -> Self {
        Self {
            base_url: "https://www.akbalonline.com".to_string(),
            launch,
            max_candidates: 10,
        }
    }
}

/// Fill in the stealth defaults, keeping any explicit override.
fn harden_profile(launch: &mut LaunchProfile) {
    if launch.user_agent.is_none() {
        launch.user_agent = Some(DESKTOP_UA.to_string());
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

/// Akbal Online (akbalonline.com) storefront.
pub struct AkbalStorefront {
    config: AkbalConfig,
    retry: RetryPolicy,
    driver: Mutex<Option<Driver>>,
}

impl AkbalStorefront {
    pub fn new(mut config: AkbalConfig) -> Self {
        harden_profile(&mut config.launch);
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

            tab.add_init_script(STEALTH_SCRIPT).await?;
            if let Some(ua) = &self.config.launch.user_agent {
                tab.set_user_agent(ua, self.config.launch.accept_language.as_deref())
                    .await?;
            }

            tab.navigate(&self.config.base_url).await?;
            *guard = Some(Driver { browser, tab });
        }
        Ok(guard)
    }

    /// Stamp each product card with [`CARD_MARK`] and scrape
    /// `(index, name, price text)` rows in presentation order.
    async fn mark_cards(&self, tab: &PageTab) -> Result<Vec<(usize, String, String)>, AdapterError> {
        let script = format!(
            r#"(() => {{
                document.querySelectorAll('[{mark}]').forEach(el => el.removeAttribute('{mark}'));
                const nameSels = [".product-item-link", ".product-item-name a", ".product-item-name", "a.product-item-link"];
                const priceSels = [".price", ".price-wrapper .price", "[data-price-type='finalPrice'] .price", ".special-price .price", ".regular-price .price"];
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
                    rows.push([index, pick(card, nameSels), pick(card, priceSels)]);
                    index += 1;
                }}
                return JSON.stringify(rows);
            }})()"#,
            mark = CARD_MARK,
            cards = CARD_SELECTOR,
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

    /// Re-mark the results and resolve the candidate's card node. Magento
    /// re-renders the button state after each add, so node ids go stale.
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

    async fn badge_count(&self, tab: &PageTab) -> Result<u32, AdapterError> {
        match tab.query_selector(CART_BADGE).await? {
            Some(node) => Ok(parse_count(&tab.inner_text(node).await?)),
            None => Ok(0),
        }
    }

    /// Wait for the minicart to acknowledge an add. The badge tracks total
    /// quantity; `accept_banner` additionally accepts the success banner on
    /// themes that hide the badge while the cart is empty.
    async fn await_added(
        &self,
        tab: &PageTab,
        badge_before: u32,
        accept_banner: bool,
    ) -> Result<u32, AdapterError> {
        let start = Instant::now();
        loop {
            let badge = self.badge_count(tab).await?;
            if badge > badge_before {
                return Ok(badge);
            }
            if accept_banner {
                if let Some(node) = tab.query_selector(".message-success").await? {
                    if tab.is_visible(node).await? {
                        return Ok(badge);
                    }
                }
            }
            if start.elapsed() > DEFAULT_WAIT_TIMEOUT {
                return Err(AdapterError::Timeout(format!(
                    "cart badge to pass {badge_before}"
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
impl Storefront for AkbalStorefront {
    fn id(&self) -> ProviderId {
        ProviderId::Akbal
    }

    fn requires_login(&self) -> bool {
        false
    }

    /// Akbal needs no login; a session is ready once the shop answers.
    async fn ensure_session(&self) -> Result<SessionStatus, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;
        tab.navigate(&self.config.base_url).await?;
        debug!("Akbal session ready");
        Ok(SessionStatus::Ready)
    }

    async fn search(&self, query: &str) -> Result<Vec<ProductCandidate>, AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;

        let url = search_url(&self.config.base_url, query)?;
        let rows = self
            .retry
            .run("akbal search", || {
                let url = url.clone();
                async move {
                    tab.navigate(&url).await?;
                    match tab.wait_for_selector(CARD_SELECTOR, DEFAULT_WAIT_TIMEOUT).await {
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
        info!("Akbal search '{query}' returned {} candidates", candidates.len());
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

        info!("Adding {quantity}x '{}' to Akbal cart", candidate.title);

        // Magento adds one unit per `tocart` click; repeat inside the same
        // card and wait for the badge between clicks. Never auto-retried:
        // a slow click that did land must not be clicked again.
        let mut badge = self.badge_count(tab).await?;
        for unit in 0..quantity {
            let card = self.resolve_card(tab, candidate).await?;
            let button = tab.query_within(card, ADD_BUTTONS).await?.ok_or_else(|| {
                AdapterError::ElementMissing(format!(
                    "add control in card for '{}'",
                    candidate.title
                ))
            })?;
            tab.click_node(button).await?;
            badge = self.await_added(tab, badge, unit == 0).await?;
            debug!("Added unit {} of '{}'", unit + 1, candidate.title);
        }

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

        tab.navigate(&self.page_url("checkout/cart/")).await?;

        let mut remaining = tab.query_selector_all(DELETE_LINKS).await?.len();
        if remaining == 0 {
            debug!("Akbal cart already empty");
            return Ok(());
        }
        info!("Clearing {remaining} lines from Akbal cart");

        while remaining > 0 {
            let Some(&link) = tab.query_selector_all(DELETE_LINKS).await?.first() else {
                break;
            };
            tab.click_node(link).await?;
            // Each delete posts a form and reloads the cart page.
            tab.wait_for_load().await?;

            let start = Instant::now();
            remaining = loop {
                let now = tab.query_selector_all(DELETE_LINKS).await?.len();
                if now < remaining {
                    break now;
                }
                if start.elapsed() > DEFAULT_WAIT_TIMEOUT {
                    return Err(AdapterError::Timeout("cart line removal".to_string()));
                }
                sleep(POLL_INTERVAL).await;
            };
        }
        info!("Cleared Akbal cart");
        Ok(())
    }

    async fn open_cart(&self) -> Result<(), AdapterError> {
        let guard = self.driver().await?;
        let tab = &active(&guard)?.tab;
        tab.navigate(&self.page_url("checkout/cart/")).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut guard = self.driver.lock().await;
        if let Some(driver) = guard.take() {
            driver.browser.shutdown().await;
            info!("Akbal session closed");
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
    url.set_path("/catalogsearch/result/");
    url.query_pairs_mut().clear().append_pair("q", query);
    Ok(url.to_string())
}
