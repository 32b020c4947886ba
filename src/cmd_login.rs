//! The `login` subcommand: capture a storefront session by hand.

use tracing::warn;

use restock_protocols::{ProviderId, SessionStatus, Storefront};

use crate::config::Config;
use crate::factory;

pub(crate) async fn handle_login(
    provider: ProviderId,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    // Login needs a window the user can type into.
    let mut config = config.clone();
    config.browser.headless = false;

    let storefront = factory::build_storefront(provider, &config);
    if !storefront.requires_login() {
        println!("{provider} does not need a login.");
        return Ok(());
    }

    println!("Opening {provider}...");
    let result = capture_login(storefront.as_ref(), provider).await;

    // Closing persists the session blob when the login landed.
    if let Err(e) = storefront.close().await {
        warn!(error = %e, "Browser close failed");
    }
    result
}

async fn capture_login(
    storefront: &dyn Storefront,
    provider: ProviderId,
) -> Result<(), Box<dyn std::error::Error>> {
    if storefront.ensure_session().await? == SessionStatus::Ready {
        println!("Already logged in to {provider}.");
        return Ok(());
    }

    println!("Complete the login in the browser window, then press ENTER here.");
    loop {
        wait_for_enter().await?;
        match storefront.ensure_session().await? {
            SessionStatus::Ready => {
                println!("Login captured; the session will be reused on future runs.");
                return Ok(());
            }
            SessionStatus::NeedsManualLogin => {
                println!("Still logged out. Finish the login, then press ENTER (Ctrl-C aborts).");
            }
        }
    }
}

async fn wait_for_enter() -> Result<(), Box<dyn std::error::Error>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await??;
    Ok(())
}
