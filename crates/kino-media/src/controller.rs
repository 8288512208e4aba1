//! Provider lifecycle
//!
//! Owns the attached provider. Each attachment attempt runs
//! `Idle -> Loading -> Attached` or `Idle -> Loading -> Aborted`; only the most
//! recently requested load may take effect. A generation counter is bumped by
//! every load and destroy, and a load that resumes after its generation has
//! moved on discards its provider.

use crate::{
    context::MediaContext,
    event::{PlayerEvent, Trigger},
    loader::{same_element, same_loader, same_loader_opt, MediaElement, Provider, ProviderLoader},
    types::MediaError,
    Result,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Attachment phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Attached,
    Aborted,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Attached => write!(f, "attached"),
            LoadState::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Default)]
struct Attachment {
    phase: LoadState,
    loader: Option<Arc<dyn ProviderLoader>>,
    target: Option<Arc<dyn MediaElement>>,
    provider: Option<Arc<dyn Provider>>,
}

struct PendingLoad {
    token: CancellationToken,
    /// Resolves once the spawned load finished or was cancelled
    done: Shared<BoxFuture<'static, ()>>,
}

impl std::fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoad")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Loads, swaps and tears down the provider
#[derive(Debug)]
pub struct ProviderLifecycleController {
    ctx: Arc<MediaContext>,
    state: Mutex<Attachment>,
    generation: AtomicU64,
    pending: Mutex<Option<PendingLoad>>,
}

impl ProviderLifecycleController {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self {
            ctx,
            state: Mutex::new(Attachment::default()),
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Attachment> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> LoadState {
        self.lock().phase
    }

    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.lock().provider.clone()
    }

    pub fn loader(&self) -> Option<Arc<dyn ProviderLoader>> {
        self.lock().loader.clone()
    }

    fn is_current(&self, generation: u64, loader: &Arc<dyn ProviderLoader>) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && self.lock().loader.as_ref().is_some_and(|l| same_loader(l, loader))
    }

    /// Attach a provider built by `loader` to `target`.
    ///
    /// Returns `Ok(None)` when there is no loader, or when a newer load or a
    /// destroy superseded this one while it was in flight.
    #[instrument(skip_all, fields(loader = loader.as_ref().map(|l| l.name())))]
    pub async fn load(
        &self,
        loader: Option<Arc<dyn ProviderLoader>>,
        target: Arc<dyn MediaElement>,
        trigger: Option<&Trigger>,
    ) -> Result<Option<Arc<dyn Provider>>> {
        let (generation, previous) = {
            let mut state = self.lock();
            let same_target = state.target.as_ref().is_some_and(|t| same_element(t, &target));
            let live = matches!(state.phase, LoadState::Loading | LoadState::Attached);
            if live && same_target && same_loader_opt(state.loader.as_ref(), loader.as_ref()) {
                debug!("Provider already loaded");
                return Ok(state.provider.clone());
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.loader = loader.clone();
            state.target = Some(target.clone());
            state.phase = if loader.is_some() {
                LoadState::Loading
            } else {
                LoadState::Idle
            };
            (generation, state.provider.take())
        };

        let teardown = Trigger::caused_by("provider-teardown", trigger);
        // Source selection may already have announced the detach
        if previous.is_some() && self.ctx.provider_announced() {
            self.ctx.notify(PlayerEvent::ProviderChange(None), Some(&teardown));
        }
        self.ctx.store.reset_session();
        self.ctx.reset_tracks(Some(&teardown));
        if let Some(previous) = previous {
            previous.destroy().await;
        }

        let Some(loader) = loader else {
            return Ok(None);
        };

        let loaded = loader.load(target, self.ctx.clone()).await;
        if !self.is_current(generation, &loader) {
            debug!("Discarding stale provider load");
            if let Ok(provider) = loaded {
                provider.destroy().await;
            }
            return Ok(None);
        }

        let provider = match loaded {
            Ok(provider) => provider,
            Err(e) => return Err(self.fail(generation, e, trigger)),
        };

        let defaults = self.ctx.store.playback_defaults();
        provider.set_muted(defaults.muted);
        provider.set_volume(defaults.volume);
        provider.set_plays_inline(defaults.plays_inline);

        if let Err(e) = provider.setup(self.ctx.clone()).await {
            provider.destroy().await;
            return Err(self.fail(generation, e, trigger));
        }
        if !self.is_current(generation, &loader) {
            debug!("Discarding provider superseded during setup");
            provider.destroy().await;
            return Ok(None);
        }

        {
            let mut state = self.lock();
            state.provider = Some(provider.clone());
            state.phase = LoadState::Attached;
        }
        info!(loader = loader.name(), kind = %provider.kind(), "Provider attached");
        self.ctx
            .notify(PlayerEvent::ProviderChange(Some(provider.clone())), trigger);
        Ok(Some(provider))
    }

    fn fail(&self, generation: u64, error: crate::Error, trigger: Option<&Trigger>) -> crate::Error {
        warn!(error = %error, "Provider load failed");
        if self.generation.load(Ordering::SeqCst) == generation {
            self.lock().phase = LoadState::Aborted;
        }
        self.ctx
            .notify(PlayerEvent::Error(MediaError::from(&error)), trigger);
        error
    }

    /// Load after one frame; a load scheduled earlier that has not started yet
    /// is cancelled
    pub fn schedule_load(
        self: &Arc<Self>,
        loader: Option<Arc<dyn ProviderLoader>>,
        target: Arc<dyn MediaElement>,
        trigger: Option<Trigger>,
    ) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let frame = self.ctx.config.load_frame();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => return,
                _ = tokio::time::sleep(frame) => {}
            }
            if let Err(e) = this.load(loader, target, trigger.as_ref()).await {
                debug!(error = %e, "Scheduled provider load failed");
            }
        });
        let done = async move {
            let _ = handle.await;
        }
        .boxed()
        .shared();

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(PendingLoad { token, done });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Wait for the most recently scheduled load to finish; any number of
    /// callers may wait on the same load
    pub async fn flush(&self) {
        let done = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|pending| pending.done.clone());
        if let Some(done) = done {
            done.await;
        }
    }

    /// Detach the provider; safe to call repeatedly
    pub async fn destroy(&self, trigger: Option<&Trigger>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(pending) = pending {
            pending.token.cancel();
        }

        let previous = {
            let mut state = self.lock();
            state.loader = None;
            state.target = None;
            state.phase = LoadState::Idle;
            state.provider.take()
        };
        self.ctx.notify(PlayerEvent::ProviderChange(None), trigger);
        if let Some(provider) = previous {
            provider.destroy().await;
            info!("Provider destroyed");
        }
    }
}
