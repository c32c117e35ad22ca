//! Browser Automation Module
//!
//! - Session management: one isolated headless Chrome per invocation
//! - Scroll-completion loading of lazy pages
//!
//! Uses headless Chrome via chromiumoxide.

pub mod loader;
pub mod pool;

pub use loader::{PageRequest, RenderedPage, ScrollLoader, ScrollTarget};
pub use pool::{detect_chrome, BrowserConfig, BrowserPool, BrowserPoolStats, BrowserSession};
