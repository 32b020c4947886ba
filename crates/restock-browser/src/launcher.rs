//! Chrome discovery, launch and lifecycle.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::client::CdpClient;
use crate::error::BrowserError;

/// How a Chrome instance should be launched for a storefront.
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    /// Remote debugging port.
    pub debug_port: u16,
    /// Profile directory; login cookies live here between runs.
    pub profile_dir: PathBuf,
    pub headless: bool,
    /// User agent override. Some storefronts gate on headless signatures.
    pub user_agent: Option<String>,
    /// Accept-Language sent with the user agent override.
    pub accept_language: Option<String>,
    /// Timezone id applied per tab (e.g. `Europe/Istanbul`).
    pub timezone: Option<String>,
    /// Extra command-line switches appended verbatim.
    pub extra_args: Vec<String>,
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            debug_port: 9222,
            profile_dir: PathBuf::from(".restock/browser-profile"),
            headless: false,
            user_agent: None,
            accept_language: None,
            timezone: None,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchProfile {
    pub fn endpoint(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }

    /// Command-line switches for this profile.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debug_port),
            format!("--user-data-dir={}", self.profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--metrics-recording-only".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Launches Chrome (or attaches to a running instance) for one profile.
pub struct Launcher {
    profile: LaunchProfile,
}

impl Launcher {
    pub fn new(profile: LaunchProfile) -> Self {
        Self { profile }
    }

    /// Find a Chrome executable on this machine.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];

        #[cfg(target_os = "linux")]
        let paths = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn is_running(&self) -> bool {
        reqwest::get(format!("{}/json/version", self.profile.endpoint()))
            .await
            .is_ok()
    }

    async fn spawn_chrome(&self) -> Result<Child, BrowserError> {
        let chrome = Self::find_chrome().ok_or(BrowserError::ChromeNotFound)?;

        if let Err(e) = std::fs::create_dir_all(&self.profile.profile_dir) {
            warn!("Failed to create profile directory: {e}");
        }

        info!(
            "Launching Chrome with profile at {}",
            self.profile.profile_dir.display()
        );

        let child = Command::new(&chrome)
            .args(self.profile.args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID {:?}", child.id());
        Ok(child)
    }

    /// Connect to Chrome, launching it when nothing listens on the port.
    pub async fn launch_or_attach(&self) -> Result<BrowserHandle, BrowserError> {
        let mut process = None;

        if !self.is_running().await {
            info!(
                "Chrome not running on port {}, launching",
                self.profile.debug_port
            );
            process = Some(self.spawn_chrome().await?);

            let mut attempts = 0;
            while attempts < 30 {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                if self.is_running().await {
                    break;
                }
                attempts += 1;
            }
            if attempts >= 30 {
                return Err(BrowserError::LaunchFailed(
                    "Chrome failed to start within timeout".to_string(),
                ));
            }
        } else {
            info!("Chrome already running on port {}", self.profile.debug_port);
        }

        let client = CdpClient::connect(&self.profile.endpoint()).await?;
        Ok(BrowserHandle { client, process })
    }
}

/// A connected browser, plus the child process when this handle launched it.
pub struct BrowserHandle {
    client: CdpClient,
    process: Option<Child>,
}

impl BrowserHandle {
    pub fn client(&self) -> &CdpClient {
        &self.client
    }

    /// Kill Chrome if this handle launched it; otherwise just drop the
    /// connection and leave the external instance alone.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.process.take() {
            info!("Shutting down Chrome");
            let _ = child.kill().await;
        }
    }
}
