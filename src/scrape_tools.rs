//! Scraping Tools
//!
//! Turns catalog entries into registry tools. Every tool runs the same
//! pipeline: render the configured page, extract, serialize.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::browser::PageRequest;
use crate::catalog::{Catalog, Extractor, ToolSpec};
use crate::extract::{error_payload, extract, extract_calendar, to_pretty_json};
use crate::pipeline::PageRenderer;
use crate::tools::{Tool, ToolRegistry, ToolResult, ToolSchema};

/// Upper bound accepted for per-call timing overrides
const MAX_OVERRIDE_SECS: f64 = 300.0;

fn duration_param(params: &Value, key: &str, fallback: Duration) -> Result<Duration> {
    let Some(raw) = params.get(key) else {
        return Ok(fallback);
    };
    let secs = raw
        .as_f64()
        .ok_or_else(|| anyhow!("Parameter '{}' must be a number", key))?;
    if !(0.0..=MAX_OVERRIDE_SECS).contains(&secs) {
        return Err(anyhow!(
            "Parameter '{}' must be between 0 and {} seconds",
            key,
            MAX_OVERRIDE_SECS
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Page request for one invocation: catalog timing, optionally overridden per call
pub fn page_request(spec: &ToolSpec, params: &Value) -> Result<PageRequest> {
    Ok(PageRequest::new(
        spec.url.clone(),
        duration_param(params, "wait_timeout_secs", spec.wait_timeout)?,
        duration_param(params, "scroll_pause_secs", spec.scroll_pause)?,
    ))
}

/// Parse rendered markup with the tool's extractor into the JSON body
pub fn render_output(spec: &ToolSpec, html: &str) -> Result<ToolResult> {
    match &spec.extractor {
        Extractor::Records { result_key, rule } => {
            let result = extract(html, rule);
            debug!("{}: {} records", spec.name, result.total_count());
            Ok(ToolResult::success(&spec.name, result.to_json(result_key)))
        }
        Extractor::Calendar(rule) => match extract_calendar(html, rule) {
            Ok(calendar) => {
                debug!(
                    "{}: {} monthly recommendations",
                    spec.name,
                    calendar.monthly_recommendations.len()
                );
                Ok(ToolResult::success(&spec.name, to_pretty_json(&calendar)))
            }
            // "no data" is regular output for the calling agent
            Err(e) if e.is_recoverable() => {
                info!("{}: {}", spec.name, e);
                Ok(ToolResult::success(&spec.name, error_payload(e.to_string())))
            }
            Err(e) => Err(e.into()),
        },
    }
}

/// Build the registry tool for one catalog entry
pub fn scrape_tool(spec: ToolSpec, renderer: Arc<dyn PageRenderer>) -> Tool {
    let schema = ToolSchema::new(&spec.name, &spec.description)
        .with_number_param(
            "wait_timeout_secs",
            "Seconds to wait for the page body (default from catalog)",
            false,
        )
        .with_number_param(
            "scroll_pause_secs",
            "Seconds to pause after each scroll (default from catalog)",
            false,
        );

    let spec = Arc::new(spec);
    Tool::new(schema, move |params: Value| {
        let spec = Arc::clone(&spec);
        let renderer = Arc::clone(&renderer);
        async move {
            let request = page_request(&spec, &params)?;
            let page = renderer.render(&request).await?;
            render_output(&spec, &page.html)
        }
    })
}

/// Register one tool per catalog entry
pub fn register_catalog_tools(
    registry: &mut ToolRegistry,
    catalog: &Catalog,
    renderer: Arc<dyn PageRenderer>,
) {
    for spec in catalog.tools() {
        registry.register(scrape_tool(spec.clone(), Arc::clone(&renderer)));
    }

    info!("Registered {} scraping tools", catalog.len());
}
