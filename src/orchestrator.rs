use crate::browser::{ScriptInjector, TabReference, TabService};
use crate::config::{Config, MissingCountPolicy};
use crate::extract::{ExtractionQuery, ExtractionResult, Extractor, QuerySet};
use crate::identifiers::{CapacityExceeded, IdentifierGenerator, IdentifierPool};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Locating,
    Extracting,
    Generating,
    Ready,
}

/// Everything known about the current pass. `None` fields are still pending.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session: u64,
    pub phase: Phase,
    pub tab: Option<TabReference>,
    pub title: Option<ExtractionResult>,
    pub image: Option<ExtractionResult>,
    pub like_count: Option<ExtractionResult>,
    pub pool: Option<IdentifierPool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<CapacityExceeded>,
}

impl Snapshot {
    fn new(session: u64) -> Self {
        Self {
            session,
            phase: Phase::Idle,
            tab: None,
            title: None,
            image: None,
            like_count: None,
            pool: None,
            generation_error: None,
        }
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_ref().and_then(ExtractionResult::as_text)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image.as_ref().and_then(ExtractionResult::as_text)
    }

    pub fn like_count(&self) -> Option<u32> {
        self.like_count.as_ref().and_then(ExtractionResult::as_count)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),
    #[error("session {0} was superseded before it finished")]
    Superseded(u64),
}

/// Generation counter shared with whoever may abandon a pass (e.g. the window closing).
#[derive(Debug, Clone, Default)]
pub struct Session(Arc<AtomicU64>);

impl Session {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Starts a new session; anything still running for an older one is ignored.
    pub fn supersede(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, session: u64) -> bool {
        self.current() == session
    }
}

/// Publishes state changes, dropping the ones that belong to a stale session.
struct Board {
    session: Session,
    state: watch::Sender<Snapshot>,
}

impl Board {
    fn publish(&self, session: u64, change: impl FnOnce(&mut Snapshot)) -> bool {
        if !self.session.is_current(session) {
            log::debug!("Dropping late update for superseded session {}", session);
            return false;
        }
        self.state.send_modify(change);
        true
    }

    fn current(&self) -> Snapshot {
        self.state.borrow().clone()
    }
}

/// Drives one extraction pass: locate tab, read three fields, build the pool.
pub struct Orchestrator<T, I, R> {
    tabs: T,
    extractor: Extractor<I>,
    queries: QuerySet,
    generator: IdentifierGenerator<R>,
    missing_count: MissingCountPolicy,
    board: Board,
}

impl<T, I> Orchestrator<T, I, StdRng>
where
    T: TabService,
    I: ScriptInjector,
{
    pub fn from_config(config: &Config, tabs: T, injector: I) -> anyhow::Result<Self> {
        let queries =
            QuerySet::from_config(&config.extraction).context("Invalid structural path in config")?;
        let spec = config
            .identifiers
            .spec()
            .context("Invalid identifier vocabulary in config")?;
        let rng = match config.identifiers.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self::new(
            tabs,
            Extractor::new(injector),
            queries,
            IdentifierGenerator::new(spec, config.identifiers.overflow, rng),
            config.extraction.missing_like_count,
        ))
    }
}

impl<T, I, R> Orchestrator<T, I, R>
where
    T: TabService,
    I: ScriptInjector,
    R: Rng,
{
    pub fn new(
        tabs: T,
        extractor: Extractor<I>,
        queries: QuerySet,
        generator: IdentifierGenerator<R>,
        missing_count: MissingCountPolicy,
    ) -> Self {
        let (state, _) = watch::channel(Snapshot::new(0));
        Self {
            tabs,
            extractor,
            queries,
            generator,
            missing_count,
            board: Board {
                session: Session::default(),
                state,
            },
        }
    }

    pub fn session(&self) -> Session {
        self.board.session.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.board.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.board.current()
    }

    /// Runs a full pass. The three field reads run concurrently on this task;
    /// the pool is built as soon as the like count lands, whatever the others are doing.
    pub async fn run(&mut self) -> Result<Snapshot, RunError> {
        let Self {
            tabs,
            extractor,
            queries,
            generator,
            missing_count,
            board,
        } = self;
        let extractor = &*extractor;
        let queries = &*queries;
        let board = &*board;
        let missing_count = *missing_count;

        let session = board.session.supersede();
        board.state.send_modify(|s| {
            *s = Snapshot::new(session);
            s.phase = Phase::Locating;
        });
        log::info!("Session {}: locating active tab", session);

        let tab = tabs.locate_active_tab().await;
        let located = tab.clone();
        if !board.publish(session, |s| {
            s.tab = located;
            s.phase = Phase::Extracting;
        }) {
            return Err(RunError::Superseded(session));
        }
        let tab = tab.as_ref();

        let title = async {
            let result = read_field(extractor, tab, &queries.title).await;
            board.publish(session, |s| s.title = Some(result));
        };
        let image = async {
            let result = read_field(extractor, tab, &queries.image).await;
            board.publish(session, |s| s.image = Some(result));
        };
        let like_count = async {
            let result = read_field(extractor, tab, &queries.like_count).await;
            apply_like_count(board, generator, missing_count, session, result)
        };

        let ((), (), generated) = tokio::join!(title, image, like_count);

        if !board.session.is_current(session) {
            return Err(RunError::Superseded(session));
        }
        generated?;

        let snapshot = board.current();
        log::info!(
            "Session {} ready: title={:?} likes={:?} pool={}",
            session,
            snapshot.title_text(),
            snapshot.like_count(),
            snapshot.pool.as_ref().map_or(0, IdentifierPool::len)
        );
        Ok(snapshot)
    }

    /// Like [`run`](Self::run), but a generator failure still yields the
    /// snapshot. The failure is kept in `generation_error` so callers can
    /// show the fields that were read alongside it.
    pub async fn run_settled(&mut self) -> Result<Snapshot, RunError> {
        match self.run().await {
            Err(RunError::Capacity(e)) => {
                log::warn!("Identifier generation failed: {}", e);
                Ok(self.board.current())
            }
            other => other,
        }
    }

    /// Feeds a new like-count result into the current session, discarding and
    /// rebuilding the pool from scratch.
    pub fn refresh_like_count(&mut self, result: ExtractionResult) -> Result<Snapshot, RunError> {
        let session = self.board.session.current();
        apply_like_count(&self.board, &mut self.generator, self.missing_count, session, result)?;
        Ok(self.board.current())
    }
}

async fn read_field<I: ScriptInjector>(
    extractor: &Extractor<I>,
    tab: Option<&TabReference>,
    query: &ExtractionQuery,
) -> ExtractionResult {
    match tab {
        Some(tab) => extractor.extract(tab, query).await,
        None => ExtractionResult::without_tab(query.field),
    }
}

fn apply_like_count<R: Rng>(
    board: &Board,
    generator: &mut IdentifierGenerator<R>,
    missing_count: MissingCountPolicy,
    session: u64,
    result: ExtractionResult,
) -> Result<(), CapacityExceeded> {
    let count = match (result.as_count(), missing_count) {
        (Some(n), _) => Some(n),
        (None, MissingCountPolicy::Zero) => Some(0),
        (None, MissingCountPolicy::Skip) => None,
    };

    let Some(count) = count else {
        board.publish(session, |s| {
            s.like_count = Some(result);
            s.pool = None;
            s.phase = Phase::Ready;
        });
        return Ok(());
    };

    let still_current = board.publish(session, |s| {
        s.like_count = Some(result);
        s.pool = None;
        s.generation_error = None;
        s.phase = Phase::Generating;
    });
    if !still_current {
        return Ok(());
    }

    match generator.generate(count as usize) {
        Ok(pool) => {
            board.publish(session, |s| {
                s.pool = Some(pool);
                s.phase = Phase::Ready;
            });
            Ok(())
        }
        Err(e) => {
            let recorded = e.clone();
            board.publish(session, |s| {
                s.generation_error = Some(recorded);
                s.phase = Phase::Ready;
            });
            Err(e)
        }
    }
}
