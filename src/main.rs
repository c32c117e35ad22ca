//! Tourscrape MCP Server - Entry Point
//!
//! Modes:
//! - Default: MCP server over streamable HTTP
//! - --stdio / -s: MCP server over stdio
//! - --list-tools / -l: print the tool catalog and exit

use std::sync::Arc;
use std::time::Duration;

use tourscrape_mcp::{
    register_catalog_tools, BrowserPool, BrowserRenderer, Catalog, Config, HttpServer, McpServer,
    ScrollLoader, ToolRegistry,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let stdio_mode = args.iter().any(|a| a == "--stdio" || a == "-s");
    let list_mode = args.iter().any(|a| a == "--list-tools" || a == "-l");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Tourscrape MCP Server v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: tourscrape-mcp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --stdio, -s        Serve MCP over stdin/stdout");
        println!("  --list-tools, -l   Print the tool catalog and exit");
        println!("  --help, -h         Show this help");
        println!();
        println!("Default: Serve MCP over streamable HTTP");
        println!();
        println!("Environment variables:");
        println!("  MCP_HOST                  Bind address (default: 127.0.0.1)");
        println!("  MCP_PORT                  HTTP port (default: 9010)");
        println!("  MCP_PATH                  JSON-RPC endpoint path (default: /mcp)");
        println!("  CHROME_PATH               Chrome/Chromium executable");
        println!("  BROWSER_MAX_INSTANCES     Concurrent browser sessions (default: 3)");
        println!("  SCRAPE_WAIT_TIMEOUT       Seconds to wait for the page body (default: 10)");
        println!("  SCRAPE_SCROLL_PAUSE       Seconds to pause after each scroll (default: 3)");
        println!("  SCRAPE_MAX_SCROLL_CYCLES  Scroll cycle ceiling (default: 40)");
        println!("  SCRAPE_TOOLS_FILE         TOML tool catalog replacing the built-in one");
        return Ok(());
    }

    // Setup logging based on mode
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if stdio_mode {
        // stdout carries the protocol - log to stderr as JSON
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = Config::from_env()?;
    let catalog = Catalog::load(config.tools_file.as_deref(), &config.scrape)?;

    if list_mode {
        for spec in catalog.tools() {
            println!("{:<28} {}  {}", spec.name, spec.url, spec.description);
        }
        return Ok(());
    }

    info!("Tourscrape MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = Arc::new(BrowserPool::new(config.browser.clone()));
    if !pool.check_chrome() {
        warn!("No Chrome executable found; set CHROME_PATH. Tool calls will fail until one is available");
    }

    let loader = ScrollLoader::new(
        config.scrape.max_scroll_cycles,
        Duration::from_secs(config.browser.timeout_secs),
    );
    let renderer = Arc::new(BrowserRenderer::new(Arc::clone(&pool), loader));

    let mut registry = ToolRegistry::new();
    register_catalog_tools(&mut registry, &catalog, renderer);
    let mcp = Arc::new(McpServer::new(registry));

    if stdio_mode {
        mcp.run_stdio().await?;
    } else {
        HttpServer::new(config.server, mcp, Some(pool)).run().await?;
    }

    Ok(())
}
