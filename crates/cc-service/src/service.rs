//! Classification service: lifecycle, list loading and the classify entry
//! points used by the request pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cc_core::{ClassificationRequest, ClassificationResult, Outcome};

use crate::config::ServiceConfig;
use crate::engine_set::{lock, EngineGeneration, EngineSet, Purpose};
use crate::error::ServiceError;
use crate::loader::{load_engines, ListFetcher, ListStats};

/// Lifecycle of a [`ClassificationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitPhase {
    NotInited,
    InitSucceeded,
    InitFailed,
    ShutdownStarted,
    ShutdownEnded,
}

/// What one load produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub ticket: u64,
    pub block: ListStats,
    pub annotate: ListStats,
    /// False when a newer load won or the service shut down meanwhile
    pub installed: bool,
}

pub struct ClassificationService {
    config: Mutex<ServiceConfig>,
    phase: Mutex<InitPhase>,
    engines: EngineSet,
    fetcher: Arc<dyn ListFetcher>,
    next_ticket: AtomicU64,
}

impl ClassificationService {
    pub fn new(config: ServiceConfig, fetcher: Arc<dyn ListFetcher>) -> Self {
        Self {
            config: Mutex::new(config),
            phase: Mutex::new(InitPhase::NotInited),
            engines: EngineSet::new(),
            fetcher,
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Build a service from a JSON config file.
    pub fn from_config_file(path: impl AsRef<Path>, fetcher: Arc<dyn ListFetcher>) -> Result<Self, ServiceError> {
        Ok(Self::new(ServiceConfig::load(path)?, fetcher))
    }

    pub fn phase(&self) -> InitPhase {
        *lock(&self.phase)
    }

    pub fn is_initialized(&self) -> bool {
        self.phase() == InitPhase::InitSucceeded
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.config).is_enabled()
    }

    pub fn config(&self) -> ServiceConfig {
        lock(&self.config).clone()
    }

    /// Initialize the service and perform the first load.
    ///
    /// Classification is served (with no engines) as soon as the phase
    /// flips, before the lists arrive.
    pub async fn start(&self) -> Result<LoadSummary, ServiceError> {
        {
            let mut phase = lock(&self.phase);
            if *phase != InitPhase::NotInited {
                return Err(ServiceError::AlreadyStarted(*phase));
            }
            if !self.is_enabled() {
                log::info!("classification service disabled, not starting");
                *phase = InitPhase::InitFailed;
                return Err(ServiceError::Disabled);
            }
            log::info!("classification service initializing");
            *phase = InitPhase::InitSucceeded;
        }

        Ok(self.load().await)
    }

    /// Fetch and compile every configured list again, then swap them in.
    pub async fn reload(&self) -> Result<LoadSummary, ServiceError> {
        let phase = self.phase();
        if phase != InitPhase::InitSucceeded {
            return Err(ServiceError::NotInitialized(phase));
        }
        Ok(self.load().await)
    }

    /// Replace the configuration; reloads when the service is running.
    pub async fn reconfigure(&self, config: ServiceConfig) -> Result<Option<LoadSummary>, ServiceError> {
        *lock(&self.config) = config;
        if !self.is_initialized() {
            return Ok(None);
        }
        self.reload().await.map(Some)
    }

    /// Stop serving and drop all engines. Loads still in flight are discarded
    /// when they finish.
    pub fn shutdown(&self) {
        let mut phase = lock(&self.phase);
        if matches!(*phase, InitPhase::ShutdownStarted | InitPhase::ShutdownEnded) {
            return;
        }
        log::info!("classification service shutting down");
        *phase = InitPhase::ShutdownStarted;
        self.engines.clear();
        *phase = InitPhase::ShutdownEnded;
    }

    pub fn classify_for_block(&self, request: &ClassificationRequest) -> ClassificationResult {
        self.classify(Purpose::Block, request)
    }

    pub fn classify_for_annotate(&self, request: &ClassificationRequest) -> ClassificationResult {
        self.classify(Purpose::Annotate, request)
    }

    fn classify(&self, purpose: Purpose, request: &ClassificationRequest) -> ClassificationResult {
        let result = if self.is_initialized() {
            self.engines.classify(purpose, request)
        } else {
            ClassificationResult::failure(Outcome::NotInitialized)
        };

        log::debug!(
            "classify_for_{} - url={} hit={} exception={}",
            purpose,
            request.url(),
            result.hit(),
            result.exception()
        );
        result
    }

    async fn load(&self) -> LoadSummary {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let config = self.config();
        log::debug!(
            "load {}: {} block lists, {} annotation lists",
            ticket,
            config.active_block_lists().len(),
            config.active_annotation_lists().len()
        );

        let fetcher = self.fetcher.as_ref();
        let ((block, block_stats), (annotate, annotate_stats)) = futures::join!(
            load_engines(fetcher, config.active_block_lists()),
            load_engines(fetcher, config.active_annotation_lists())
        );

        let installed = {
            // Checked under the phase lock so shutdown cannot interleave.
            let phase = lock(&self.phase);
            *phase == InitPhase::InitSucceeded
                && self
                    .engines
                    .install(EngineGeneration::new(ticket, block, annotate))
        };

        if installed {
            log::info!(
                "load {} installed: {}/{} block lists, {}/{} annotation lists",
                ticket,
                block_stats.loaded,
                block_stats.configured,
                annotate_stats.loaded,
                annotate_stats.configured
            );
        } else {
            log::debug!("load {} discarded", ticket);
        }

        LoadSummary {
            ticket,
            block: block_stats,
            annotate: annotate_stats,
            installed,
        }
    }
}
