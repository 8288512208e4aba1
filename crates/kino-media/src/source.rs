//! Source selection
//!
//! Picks the `(source, loader)` pair for a list of candidate sources. Every
//! candidate is tested in order against the loader priority list and the
//! **last** candidate that some loader accepts wins. When nothing matches and
//! the first candidate's type is unknown, the unknown types are probed over
//! HTTP and selection runs once more after the whole probe batch settles.

use crate::{
    context::MediaContext,
    event::{PlayerEvent, Trigger},
    loader::{same_loader_opt, ProviderLoader},
    types::{MediaType, Source, UNRESOLVED_TYPE},
    Error, Result,
};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{header::CONTENT_TYPE, Client};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Discovers the MIME type of a source whose type is unknown
#[async_trait]
pub trait SourceProbe: Debug + Send + Sync {
    /// `Ok(None)` when the server does not say
    async fn probe(&self, src: &str) -> Result<Option<String>>;
}

/// Probe that issues an HTTP HEAD request and reads `Content-Type`
#[derive(Debug, Clone)]
pub struct HttpSourceProbe {
    client: Client,
}

impl HttpSourceProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceProbe for HttpSourceProbe {
    #[instrument(skip(self))]
    async fn probe(&self, src: &str) -> Result<Option<String>> {
        let response = self
            .client
            .head(src)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| Error::Probe {
                src: src.to_string(),
                source,
            })?;
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        debug!(?mime, "Probed source type");
        Ok(mime)
    }
}

/// Result of [`SourceSelector::resolve`]
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved {
        source: Source,
        loader: Option<Arc<dyn ProviderLoader>>,
        /// The source differs from the previous one
        source_changed: bool,
        /// The loader differs from the previous one
        loader_changed: bool,
    },
    /// A newer resolve started while this one was probing
    Superseded,
}

#[derive(Debug, Default)]
struct Selection {
    source: Source,
    loader: Option<Arc<dyn ProviderLoader>>,
}

/// Resolves the active source and loader
#[derive(Debug)]
pub struct SourceSelector {
    ctx: Arc<MediaContext>,
    loaders: RwLock<Vec<Arc<dyn ProviderLoader>>>,
    dom_sources: Mutex<Vec<Source>>,
    current: Mutex<Selection>,
    probe: Arc<dyn SourceProbe>,
    batch: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SourceSelector {
    pub fn new(
        ctx: Arc<MediaContext>,
        loaders: Vec<Arc<dyn ProviderLoader>>,
        probe: Arc<dyn SourceProbe>,
    ) -> Self {
        Self {
            ctx,
            loaders: RwLock::new(loaders),
            dom_sources: Mutex::new(Vec::new()),
            current: Mutex::new(Selection::default()),
            probe,
            batch: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the loader priority list; takes effect on the next resolve
    pub fn set_loaders(&self, loaders: Vec<Arc<dyn ProviderLoader>>) {
        *self.loaders.write().unwrap_or_else(|e| e.into_inner()) = loaders;
    }

    pub fn loaders(&self) -> Vec<Arc<dyn ProviderLoader>> {
        self.loaders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sources discovered outside the declared list (e.g. child elements)
    pub fn set_dom_sources(&self, sources: Vec<Source>) {
        *lock(&self.dom_sources) = sources;
    }

    pub fn source(&self) -> Source {
        lock(&self.current).source.clone()
    }

    pub fn loader(&self) -> Option<Arc<dyn ProviderLoader>> {
        lock(&self.current).loader.clone()
    }

    /// Abort an in-flight probe batch
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = lock(&self.batch).take() {
            token.cancel();
        }
    }

    /// Declared sources followed by discovered ones, with type sentinels filled in
    fn candidates(&self, sources: Vec<Source>) -> Vec<Source> {
        let dom = lock(&self.dom_sources).clone();
        sources
            .into_iter()
            .chain(dom)
            .map(Source::normalized)
            .collect()
    }

    /// Forward iteration where the last candidate with a willing loader wins
    fn pick(&self, candidates: &[Source]) -> Selection {
        let loaders = self.loaders();
        let mut selection = Selection::default();
        for candidate in candidates {
            if let Some(loader) = loaders.iter().find(|l| l.can_play(candidate)) {
                selection = Selection {
                    source: candidate.clone(),
                    loader: Some(loader.clone()),
                };
            }
        }
        selection
    }

    /// Resolve `sources` and publish the resulting changes
    #[instrument(skip_all, fields(candidates = sources.len()))]
    pub async fn resolve(&self, sources: Vec<Source>, trigger: Option<&Trigger>) -> ResolveOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.batch).replace(token.clone()) {
            previous.cancel();
        }

        let mut candidates = self.candidates(sources);
        let mut selection = self.pick(&candidates);

        let unresolved = selection.loader.is_none()
            && candidates
                .first()
                .is_some_and(|first| !first.is_empty() && first.needs_probe());
        if unresolved {
            let probed = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                types = self.probe_all(&candidates) => Some(types),
            };
            let Some(types) = probed else {
                debug!("Probe batch cancelled");
                return ResolveOutcome::Superseded;
            };
            if self.generation.load(Ordering::SeqCst) != generation {
                return ResolveOutcome::Superseded;
            }
            for (candidate, mime) in candidates.iter_mut().zip(types) {
                if let Some(mime) = mime {
                    candidate.mime = mime;
                }
            }
            selection = self.pick(&candidates);
        }

        if self.generation.load(Ordering::SeqCst) == generation {
            lock(&self.batch).take();
        }

        self.apply(candidates, selection, trigger)
    }

    /// Probe every candidate whose type is unknown, concurrently.
    ///
    /// Returns the replacement type per candidate (`None` keeps the current one).
    async fn probe_all(&self, candidates: &[Source]) -> Vec<Option<String>> {
        let timeout = self.ctx.config.probe_timeout();
        let probes = candidates.iter().map(|candidate| async move {
            if !candidate.needs_probe() || candidate.is_empty() {
                return None;
            }
            let probed = tokio::time::timeout(timeout, self.probe.probe(&candidate.src)).await;
            let mime = match probed {
                Ok(Ok(Some(mime))) => mime,
                Ok(Ok(None)) => UNRESOLVED_TYPE.to_string(),
                Ok(Err(e)) => {
                    warn!(src = %candidate.src, error = %e, "Source probe failed");
                    UNRESOLVED_TYPE.to_string()
                }
                Err(_) => {
                    warn!(src = %candidate.src, "Source probe timed out");
                    UNRESOLVED_TYPE.to_string()
                }
            };
            Some(mime)
        });
        join_all(probes).await
    }

    fn apply(&self, candidates: Vec<Source>, next: Selection, trigger: Option<&Trigger>) -> ResolveOutcome {
        let ctx = &self.ctx;
        let (source_changed, loader_changed) = {
            let mut current = lock(&self.current);
            let loader_changed = !same_loader_opt(current.loader.as_ref(), next.loader.as_ref());
            let source_changed = current.source != next.source || loader_changed;
            current.source = next.source.clone();
            current.loader = next.loader.clone();
            (source_changed, loader_changed)
        };

        if ctx.store.sources.get() != candidates {
            ctx.notify(PlayerEvent::SourcesChange(candidates), trigger);
        }

        if source_changed {
            let media_type = next
                .loader
                .as_ref()
                .map_or(MediaType::Unknown, |l| l.media_type(&next.source));
            info!(source = %next.source, %media_type, "Source changed");
            ctx.notify(PlayerEvent::SourceChange(next.source.clone()), trigger);
            ctx.notify(PlayerEvent::MediaTypeChange(media_type), trigger);
        }

        if loader_changed {
            info!(loader = next.loader.as_ref().map(|l| l.name()), "Provider loader changed");
            ctx.notify(PlayerEvent::ProviderChange(None), trigger);
            ctx.notify(PlayerEvent::ProviderLoaderChange(next.loader.clone()), trigger);
            if let Some(loader) = next.loader.clone() {
                tokio::spawn(async move {
                    if let Err(e) = loader.preconnect().await {
                        debug!(loader = loader.name(), error = %e, "Preconnect failed");
                    }
                });
            }
        }

        ResolveOutcome::Resolved {
            source: next.source,
            loader: next.loader,
            source_changed,
            loader_changed,
        }
    }
}
