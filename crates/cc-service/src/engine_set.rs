//! Hot-swappable engine collection.
//!
//! The active [`EngineGeneration`] sits behind a mutex that is held only to
//! clone or replace the `Arc`. Classification runs on the cloned handle, so a
//! reload never blocks in-flight requests and a request never sees half of
//! one generation and half of another.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cc_core::{ClassificationRequest, ClassificationResult, CompiledEngine, Matcher, Outcome};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which engine list a classification uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Block,
    Annotate,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Annotate => "annotate",
        })
    }
}

/// One complete, immutable set of engines produced by a single load.
#[derive(Debug, Default)]
pub struct EngineGeneration {
    ticket: u64,
    block: Vec<CompiledEngine>,
    annotate: Vec<CompiledEngine>,
}

impl EngineGeneration {
    pub fn new(ticket: u64, block: Vec<CompiledEngine>, annotate: Vec<CompiledEngine>) -> Self {
        Self {
            ticket,
            block,
            annotate,
        }
    }

    /// Load ticket this generation was built for.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn engines(&self, purpose: Purpose) -> &[CompiledEngine] {
        match purpose {
            Purpose::Block => &self.block,
            Purpose::Annotate => &self.annotate,
        }
    }

    /// Evaluate every engine for `purpose` in order, folding with
    /// [`ClassificationResult::accumulate`]. Stops at the first important result.
    pub fn classify(&self, purpose: Purpose, request: &ClassificationRequest) -> ClassificationResult {
        if !request.is_valid() {
            return ClassificationResult::failure(Outcome::InvalidArgument);
        }

        let folded = self
            .engines(purpose)
            .iter()
            .try_fold(ClassificationResult::default(), |acc, engine| {
                let acc = acc.accumulate(Matcher::new(engine).evaluate(request));
                if acc.is_important() {
                    ControlFlow::Break(acc)
                } else {
                    ControlFlow::Continue(acc)
                }
            });

        match folded {
            ControlFlow::Break(result) | ControlFlow::Continue(result) => result,
        }
    }
}

/// Holder of the active generation.
#[derive(Debug, Default)]
pub struct EngineSet {
    current: Mutex<Arc<EngineGeneration>>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the active generation.
    pub fn snapshot(&self) -> Arc<EngineGeneration> {
        Arc::clone(&lock(&self.current))
    }

    /// Replace the active generation if `generation` comes from a newer load.
    /// Returns whether it was installed.
    pub fn install(&self, generation: EngineGeneration) -> bool {
        let mut current = lock(&self.current);
        if generation.ticket <= current.ticket {
            log::debug!(
                "discarding stale engine generation {} (active {})",
                generation.ticket,
                current.ticket
            );
            return false;
        }
        *current = Arc::new(generation);
        true
    }

    /// Drop all engines. The ticket is kept so older loads still lose.
    pub fn clear(&self) {
        let mut current = lock(&self.current);
        let ticket = current.ticket;
        *current = Arc::new(EngineGeneration {
            ticket,
            ..EngineGeneration::default()
        });
    }

    pub fn classify(&self, purpose: Purpose, request: &ClassificationRequest) -> ClassificationResult {
        self.snapshot().classify(purpose, request)
    }
}
