//! Tourscrape MCP Server
//!
//! Model Context Protocol server exposing travel and news scraping tools.
//!
//! # Features
//!
//! - **MCP Protocol**: JSON-RPC 2.0 over streamable HTTP or stdio
//! - **Headless Rendering**: one isolated Chrome session per tool call
//! - **Scroll Loading**: scrolls lazy pages until their height settles
//! - **Record Extraction**: selector-driven content + link records
//! - **Travel Calendar**: month-sectioned recommendations
//! - **Tool Catalog**: destinations declared in TOML
//!
//! # Architecture
//!
//! ```text
//! MCP client ──► McpServer ──► ToolRegistry ──► scrape tool
//!  (HTTP/stdio)                                    │
//!                                                  ├── BrowserPool (chromiumoxide)
//!                                                  ├── ScrollLoader
//!                                                  └── extract (scraper)
//! ```

pub mod browser;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod pipeline;
pub mod scrape_tools;
pub mod server;
pub mod tools;

pub use browser::{BrowserConfig, BrowserPool, BrowserSession, PageRequest, RenderedPage, ScrollLoader};
pub use catalog::{Catalog, ToolSpec};
pub use config::Config;
pub use error::{ScrapeError, ScrapeResult};
pub use extract::{extract, extract_calendar, CalendarResult, ExtractionResult, ExtractionRule};
pub use mcp::{McpRequest, McpResponse, McpServer};
pub use pipeline::{BrowserRenderer, PageRenderer, SessionSource};
pub use scrape_tools::register_catalog_tools;
pub use server::HttpServer;
pub use tools::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
