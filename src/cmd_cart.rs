//! The `cart` subcommand: count, clear, open.

use tracing::warn;

use restock_protocols::{ProviderId, SessionStatus, Storefront};

use crate::config::Config;
use crate::factory;

pub(crate) async fn handle_cart(
    provider: Option<ProviderId>,
    clear: bool,
    open: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = match provider {
        Some(provider) => provider,
        None => {
            let journal = factory::open_journal(config).await?;
            journal.preference().await?.preferred_provider
        }
    };
    let storefront = factory::build_storefront(provider, config);

    let result = cart_actions(storefront.as_ref(), provider, clear, open).await;
    let keep_open = matches!(result, Ok(true));

    if !keep_open {
        if let Err(e) = storefront.close().await {
            warn!(error = %e, "Browser close failed");
        }
    }
    result.map(|_| ())
}

/// Returns whether the browser should stay open on the cart page.
async fn cart_actions(
    storefront: &dyn Storefront,
    provider: ProviderId,
    clear: bool,
    open: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    if storefront.ensure_session().await? == SessionStatus::NeedsManualLogin {
        println!("Login required. Run `restock login {provider}` first.");
        return Ok(false);
    }

    if clear {
        storefront.clear_cart().await?;
        println!("Cart cleared.");
    }

    let count = storefront.cart_count().await?;
    println!("{count} item line(s) in the {provider} cart.");

    if open {
        storefront.open_cart().await?;
        println!("Cart page left open in the browser.");
    }

    Ok(open)
}
