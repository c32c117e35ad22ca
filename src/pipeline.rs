//! Render pipeline: acquire session -> scroll-load -> release.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::browser::{BrowserPool, BrowserSession, PageRequest, RenderedPage, ScrollLoader, ScrollTarget};
use crate::error::ScrapeResult;

/// Source of fully rendered pages
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: &PageRequest) -> ScrapeResult<RenderedPage>;
}

/// Hands out one isolated session per render.
///
/// A session that is dropped instead of closed must still give its slot back.
#[async_trait]
pub trait SessionSource: Send + Sync {
    type Session: ScrollTarget + 'static;

    async fn open_session(&self) -> ScrapeResult<Self::Session>;

    async fn close_session(&self, session: Self::Session);
}

#[async_trait]
impl SessionSource for BrowserPool {
    type Session = BrowserSession;

    async fn open_session(&self) -> ScrapeResult<BrowserSession> {
        let session = self.acquire().await?;
        debug!("Session {} opened", session.id());
        Ok(session)
    }

    async fn close_session(&self, session: BrowserSession) {
        session.release().await;
    }
}

/// Renderer where every call runs in its own session
pub struct BrowserRenderer<S = BrowserPool> {
    sessions: Arc<S>,
    loader: ScrollLoader,
}

impl<S: SessionSource> BrowserRenderer<S> {
    pub fn new(sessions: Arc<S>, loader: ScrollLoader) -> Self {
        Self { sessions, loader }
    }
}

#[async_trait]
impl<S: SessionSource + 'static> PageRenderer for BrowserRenderer<S> {
    async fn render(&self, request: &PageRequest) -> ScrapeResult<RenderedPage> {
        let session = self.sessions.open_session().await?;
        debug!("Rendering {}", request.url);

        // early return, panic and cancellation drop `session`, which frees it
        let result = self.loader.load(&session, request).await;
        self.sessions.close_session(session).await;
        result
    }
}
