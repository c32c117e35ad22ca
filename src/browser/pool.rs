//! Browser Pool Management
//!
//! Launches one isolated headless Chrome per session. The pool only bounds
//! how many run at once; sessions are never reused, so cookies, cache and
//! storage never leak between invocations.

use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ScrapeError, ScrapeResult};

/// Flags shared by every launched browser
const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-web-security",
    "--disable-features=VizDisplayCompositor",
    "--disable-blink-features=AutomationControlled",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--mute-audio",
    "--hide-scrollbars",
    "--log-level=3",
    "--silent",
];

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Maximum concurrent browser instances
    pub max_instances: usize,
    /// Browser executable path (auto-detect if None)
    pub chrome_path: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Navigation / CDP request timeout
    pub timeout_secs: u64,
    /// Time allowed for the process to come up
    pub launch_timeout_secs: u64,
    pub headless: bool,
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_instances: 3,
            chrome_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            timeout_secs: 30,
            launch_timeout_secs: 20,
            headless: true,
            user_agent: None,
        }
    }
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_instances: std::env::var("BROWSER_MAX_INSTANCES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_instances),
            chrome_path: std::env::var("CHROME_PATH").ok().map(PathBuf::from),
            viewport_width: std::env::var("BROWSER_VIEWPORT_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.viewport_width),
            viewport_height: std::env::var("BROWSER_VIEWPORT_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.viewport_height),
            timeout_secs: std::env::var("BROWSER_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            launch_timeout_secs: std::env::var("BROWSER_LAUNCH_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.launch_timeout_secs),
            headless: std::env::var("BROWSER_HEADLESS")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
            user_agent: std::env::var("BROWSER_USER_AGENT").ok(),
        }
    }

    /// Command-line flags for one launch
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|s| s.to_string()).collect();
        args.push(format!(
            "--window-size={},{}",
            self.viewport_width, self.viewport_height
        ));
        if let Some(ref user_agent) = self.user_agent {
            args.push(format!("--user-agent={}", user_agent));
        }
        args
    }

    /// Explicit path, else the first well-known install location
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.chrome_path {
            return Some(path.clone());
        }
        detect_chrome()
    }

    fn cdp_config(&self, profile_dir: &std::path::Path) -> ScrapeResult<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .window_size(self.viewport_width, self.viewport_height)
            .viewport(None::<Viewport>)
            .request_timeout(Duration::from_secs(self.timeout_secs))
            .launch_timeout(Duration::from_secs(self.launch_timeout_secs))
            .user_data_dir(profile_dir)
            .args(self.launch_args());

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(path) = self.resolve_executable() {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ScrapeError::SessionStart)
    }
}

/// Look for Chrome / Chromium in the usual places
pub fn detect_chrome() -> Option<PathBuf> {
    let paths = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    paths
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Live browser process owned by a session
struct BrowserProcess {
    browser: Browser,
    handler_task: JoinHandle<()>,
    profile: TempDir,
}

impl BrowserProcess {
    async fn shutdown(mut self, session_id: &str) {
        if let Err(e) = self.browser.close().await {
            debug!("Session {}: close failed: {}", session_id, e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Session {}: wait for browser exit failed: {}", session_id, e);
        }
        self.handler_task.abort();
        if let Err(e) = self.profile.close() {
            debug!("Session {}: profile cleanup failed: {}", session_id, e);
        }
    }
}

/// One isolated browser with a single working tab.
///
/// Call [`BrowserSession::release`] when done. Dropping an unreleased session
/// (error path, cancelled future) schedules the same teardown.
pub struct BrowserSession {
    id: String,
    page: Page,
    process: Option<BrowserProcess>,
    created_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl BrowserSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Terminate the browser process and free the pool slot
    pub async fn release(mut self) {
        if let Some(process) = self.process.take() {
            process.shutdown(&self.id).await;
            debug!("Session {} released after {:?}", self.id, self.age());
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(process) = self.process.take() else {
            return;
        };

        warn!("Session {} dropped without release, tearing down", self.id);
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { process.shutdown(&id).await });
            }
            Err(_) => {
                // no runtime left: dropping Browser kills the child process
                process.handler_task.abort();
            }
        }
    }
}

/// Bounded source of isolated browser sessions
pub struct BrowserPool {
    config: BrowserConfig,
    semaphore: Arc<Semaphore>,
}

impl BrowserPool {
    pub fn new(config: BrowserConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_instances));
        Self { config, semaphore }
    }

    pub fn default_pool() -> Self {
        Self::new(BrowserConfig::default())
    }

    /// Check if a Chrome executable can be found
    pub fn check_chrome(&self) -> bool {
        self.config
            .resolve_executable()
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Launch a fresh browser, waiting for a free slot first
    pub async fn acquire(&self) -> ScrapeResult<BrowserSession> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScrapeError::SessionStart(format!("pool closed: {}", e)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let profile = tempfile::Builder::new()
            .prefix("tourscrape-profile-")
            .tempdir()
            .map_err(|e| ScrapeError::SessionStart(format!("profile dir: {}", e)))?;

        let cdp_config = self.config.cdp_config(profile.path())?;
        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| ScrapeError::SessionStart(e.to_string()))?;

        let handler_id = id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("Session {}: CDP handler loop ended", handler_id);
                    break;
                }
            }
        });

        let process = BrowserProcess {
            browser,
            handler_task,
            profile,
        };

        let page = match process.browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                process.shutdown(&id).await;
                return Err(ScrapeError::SessionStart(format!("new tab: {}", e)));
            }
        };

        info!("Session {} started", id);

        Ok(BrowserSession {
            id,
            page,
            process: Some(process),
            created_at: Instant::now(),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> BrowserPoolStats {
        let available = self.semaphore.available_permits();
        BrowserPoolStats {
            active_sessions: self.config.max_instances.saturating_sub(available),
            max_instances: self.config.max_instances,
            available_permits: available,
            chrome_available: self.check_chrome(),
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct BrowserPoolStats {
    pub active_sessions: usize,
    pub max_instances: usize,
    pub available_permits: usize,
    pub chrome_available: bool,
}
