//! Scroll-Completion Loader
//!
//! Materializes lazy-loaded pages: scroll to the bottom, pause, compare the
//! document height, repeat until it stops growing.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pool::BrowserSession;
use crate::error::{ScrapeError, ScrapeResult};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a single tool invocation asks the loader to render
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub url: String,
    pub wait_timeout: Duration,
    pub scroll_pause: Duration,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, wait_timeout: Duration, scroll_pause: Duration) -> Self {
        Self {
            url: url.into(),
            wait_timeout,
            scroll_pause,
        }
    }
}

/// Fully rendered document markup
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    /// Scroll-and-compare cycles performed
    pub scroll_cycles: usize,
}

/// Page operations the loader drives
#[async_trait]
pub trait ScrollTarget: Send + Sync {
    async fn navigate(&self, url: &str) -> ScrapeResult<()>;

    /// Minimal readiness signal: the body element exists
    async fn has_body(&self) -> ScrapeResult<bool>;

    async fn scroll_height(&self) -> ScrapeResult<i64>;

    async fn scroll_to_bottom(&self) -> ScrapeResult<()>;

    async fn markup(&self) -> ScrapeResult<String>;
}

/// Scroll loop driver with liveness bounds
#[derive(Debug, Clone)]
pub struct ScrollLoader {
    /// Upper bound on scroll cycles for pages that never stop growing
    pub max_cycles: usize,
    pub navigation_timeout: Duration,
}

impl Default for ScrollLoader {
    fn default() -> Self {
        Self {
            max_cycles: 40,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

impl ScrollLoader {
    pub fn new(max_cycles: usize, navigation_timeout: Duration) -> Self {
        Self {
            max_cycles: max_cycles.max(1),
            navigation_timeout,
        }
    }

    /// Navigate, wait for readiness, scroll until height is stable, return markup
    pub async fn load<T>(&self, target: &T, request: &PageRequest) -> ScrapeResult<RenderedPage>
    where
        T: ScrollTarget + ?Sized,
    {
        debug!("Navigating to {}", request.url);
        tokio::time::timeout(self.navigation_timeout, target.navigate(&request.url))
            .await
            .map_err(|_| ScrapeError::PageLoadTimeout {
                url: request.url.clone(),
                secs: self.navigation_timeout.as_secs_f64(),
            })??;

        self.wait_for_body(target, request).await?;

        let mut last_height = target.scroll_height().await?;
        let mut cycles = 0usize;

        loop {
            target.scroll_to_bottom().await?;
            tokio::time::sleep(request.scroll_pause).await;
            cycles += 1;

            let new_height = target.scroll_height().await?;
            debug!(
                "Scroll cycle {}: height {} -> {}",
                cycles, last_height, new_height
            );

            if new_height == last_height {
                break;
            }

            if cycles >= self.max_cycles {
                warn!(
                    "Scroll ceiling of {} cycles reached on {} (height still growing at {})",
                    self.max_cycles, request.url, new_height
                );
                break;
            }

            last_height = new_height;
        }

        let html = target.markup().await?;
        info!(
            "Rendered {} ({} bytes, {} scroll cycles)",
            request.url,
            html.len(),
            cycles
        );

        Ok(RenderedPage {
            html,
            scroll_cycles: cycles,
        })
    }

    async fn wait_for_body<T>(&self, target: &T, request: &PageRequest) -> ScrapeResult<()>
    where
        T: ScrollTarget + ?Sized,
    {
        let poll = async {
            loop {
                if target.has_body().await? {
                    return Ok::<(), ScrapeError>(());
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(request.wait_timeout, poll)
            .await
            .map_err(|_| ScrapeError::PageLoadTimeout {
                url: request.url.clone(),
                secs: request.wait_timeout.as_secs_f64(),
            })?
    }
}

fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

#[async_trait]
impl ScrollTarget for BrowserSession {
    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        self.page()
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn has_body(&self) -> ScrapeResult<bool> {
        self.page()
            .evaluate("document.body !== null")
            .await
            .map_err(browser_err)?
            .into_value::<bool>()
            .map_err(browser_err)
    }

    async fn scroll_height(&self) -> ScrapeResult<i64> {
        self.page()
            .evaluate("document.body ? document.body.scrollHeight : 0")
            .await
            .map_err(browser_err)?
            .into_value::<i64>()
            .map_err(browser_err)
    }

    async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
        self.page()
            .evaluate("window.scrollTo(0, document.body.scrollHeight); true")
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn markup(&self) -> ScrapeResult<String> {
        self.page().content().await.map_err(browser_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Page whose height follows a scripted sequence, one value per read
    struct FakePage {
        heights: Mutex<Vec<i64>>,
        body_after_polls: usize,
        body_polls: AtomicUsize,
        height_reads: AtomicUsize,
        scrolls: AtomicUsize,
        fail_navigation: bool,
    }

    impl FakePage {
        fn with_heights(heights: &[i64]) -> Self {
            Self {
                heights: Mutex::new(heights.iter().rev().copied().collect()),
                body_after_polls: 0,
                body_polls: AtomicUsize::new(0),
                height_reads: AtomicUsize::new(0),
                scrolls: AtomicUsize::new(0),
                fail_navigation: false,
            }
        }
    }

    #[async_trait]
    impl ScrollTarget for FakePage {
        async fn navigate(&self, url: &str) -> ScrapeResult<()> {
            if self.fail_navigation {
                return Err(ScrapeError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        async fn has_body(&self) -> ScrapeResult<bool> {
            let polls = self.body_polls.fetch_add(1, Ordering::SeqCst);
            Ok(polls >= self.body_after_polls)
        }

        async fn scroll_height(&self) -> ScrapeResult<i64> {
            self.height_reads.fetch_add(1, Ordering::SeqCst);
            let mut heights = self.heights.lock().unwrap();
            // the last scripted height repeats forever
            Ok(if heights.len() > 1 {
                heights.pop().unwrap()
            } else {
                heights[0]
            })
        }

        async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn markup(&self) -> ScrapeResult<String> {
            Ok("<html><body>done</body></html>".to_string())
        }
    }

    fn request() -> PageRequest {
        PageRequest::new("https://ht.kz", Duration::from_secs(1), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_static_page_single_comparison() {
        let page = FakePage::with_heights(&[900]);
        let rendered = ScrollLoader::default().load(&page, &request()).await.unwrap();

        assert_eq!(rendered.scroll_cycles, 1);
        assert_eq!(page.scrolls.load(Ordering::SeqCst), 1);
        assert_eq!(page.height_reads.load(Ordering::SeqCst), 2);
        assert!(rendered.html.contains("done"));
    }

    #[tokio::test]
    async fn test_growth_until_stable() {
        let page = FakePage::with_heights(&[900, 1800, 2700, 2700]);
        let rendered = ScrollLoader::default().load(&page, &request()).await.unwrap();
        assert_eq!(rendered.scroll_cycles, 3);
    }

    #[tokio::test]
    async fn test_infinite_growth_hits_ceiling() {
        let heights: Vec<i64> = (1..=1000).map(|i| i * 100).collect();
        let page = FakePage::with_heights(&heights);
        let loader = ScrollLoader::new(5, Duration::from_secs(5));

        let rendered = loader.load(&page, &request()).await.unwrap();
        assert_eq!(rendered.scroll_cycles, 5);
    }

    #[tokio::test]
    async fn test_waits_for_body() {
        let mut page = FakePage::with_heights(&[500]);
        page.body_after_polls = 3;
        ScrollLoader::default().load(&page, &request()).await.unwrap();
        assert_eq!(page.body_polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_body_never_appears() {
        let mut page = FakePage::with_heights(&[500]);
        page.body_after_polls = usize::MAX;
        let req = PageRequest::new("https://ht.kz", Duration::from_millis(250), Duration::ZERO);

        let err = ScrollLoader::default().load(&page, &req).await.unwrap_err();
        assert!(matches!(err, ScrapeError::PageLoadTimeout { .. }));
    }

    #[tokio::test]
    async fn test_navigation_error_propagates() {
        let mut page = FakePage::with_heights(&[500]);
        page.fail_navigation = true;

        let err = ScrollLoader::default().load(&page, &request()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Navigation { .. }));
        assert_eq!(page.scrolls.load(Ordering::SeqCst), 0);
    }
}
