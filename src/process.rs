use std::sync::Arc;

use chrono::Local;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};

use crate::output::{write_outputs, OutputPaths};
use crate::parse::{Record, ResultBatch};
use crate::request::{HttpFetcher, PageFetcher};
use crate::{info_time, warn_time, Config, Error, FetchError, PageIndex, Result};

type WorkQueue = Arc<Mutex<mpsc::Receiver<PageIndex>>>;

/// Where a run is. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Dispatching,
    AllDispatched,
    Draining,
    Done,
}

/// What a worker sends to the sink for every page it attempted.
#[derive(Debug)]
pub enum PageOutcome {
    Fetched { page: PageIndex, records: ResultBatch },
    Failed(FetchError),
}

#[derive(Debug)]
pub struct RunReport {
    /// Every record from every page that was fetched, in arrival order.
    pub records: Vec<Record>,
    /// Pages that failed, sorted by page index.
    pub failures: Vec<FetchError>,
    pub pages_attempted: usize,
    pub transitions: Vec<RunState>,
}

impl RunReport {
    pub fn failed_pages(&self) -> Vec<PageIndex> {
        self.failures.iter().map(FetchError::page).collect()
    }
}

/// Fetches the catalog with the settings in `config` and writes both output files.
pub async fn process_catalog(config: &Config) -> Result<(RunReport, OutputPaths)> {
    let start_time = Local::now();
    config.validate()?;
    let fetcher = Arc::new(HttpFetcher::new(config)?);

    info_time!("Started scraping {}", config.base_url());
    let report = run_pipeline(fetcher, config.page_max, config.max_concurrent).await?;
    info_time!(
        start_time,
        "Fetched {} records, {} of {} pages failed.",
        report.records.len(),
        report.failures.len(),
        report.pages_attempted
    );

    let local_now = Local::now();
    let paths = write_outputs(config, &report.records, local_now.date_naive()).await?;
    info_time!(
        local_now,
        "Wrote the results to files: {} and {}",
        paths.csv.display(),
        paths.markdown.display()
    );

    Ok((report, paths))
}

/// Fetches pages `0..page_max` with `max_concurrent` workers and merges every
/// successful page into one collection.
pub async fn run_pipeline<F>(
    fetcher: Arc<F>,
    page_max: usize,
    max_concurrent: usize,
) -> Result<RunReport>
where
    F: PageFetcher + 'static,
{
    if max_concurrent == 0 {
        return Err(Error::Config {
            key: "max_concurrent",
            reason: "must be at least 1".into(),
        });
    }
    let mut coordinator = Coordinator::new();

    let (out_tx, out_rx) = mpsc::channel(max_concurrent);
    let collect_handle = tokio::spawn(async move { collect_outcomes(out_rx).await });

    let (work_tx, work_rx) = mpsc::channel(max_concurrent);
    let work_rx: WorkQueue = Arc::new(Mutex::new(work_rx));
    let mut pool = JoinSet::new();
    for _ in 0..max_concurrent.min(page_max) {
        pool.spawn({
            let fetcher = fetcher.clone();
            let work_rx = work_rx.clone();
            let out_tx = out_tx.clone();
            async move { run_worker(fetcher, work_rx, out_tx).await }
        });
    }

    for page in 0..page_max {
        work_tx.send(page).await?;
    }
    drop(work_tx);
    coordinator.advance(RunState::AllDispatched);

    let mut pages_attempted = 0;
    while let Some(task) = pool.join_next().await {
        pages_attempted += task??;
    }
    coordinator.advance(RunState::Draining);

    // Every worker has finished, closing the sink can't drop a batch.
    drop(out_tx);
    let (records, failures) = collect_handle.await?;
    coordinator.advance(RunState::Done);

    Ok(RunReport {
        records,
        failures,
        pages_attempted,
        transitions: coordinator.transitions,
    })
}

/// Pulls page indices off the shared queue until it is closed and empty.
/// Returns how many pages this worker attempted.
async fn run_worker<F>(
    fetcher: Arc<F>,
    work_rx: WorkQueue,
    out_tx: mpsc::Sender<PageOutcome>,
) -> Result<usize>
where
    F: PageFetcher + 'static,
{
    let mut attempted = 0;
    loop {
        let next = work_rx.lock().await.recv().await;
        let Some(page) = next else {
            break;
        };
        attempted += 1;

        let outcome = match fetcher.fetch(page).await {
            Ok(records) => {
                info_time!(
                    "page: {}, {}, {} records",
                    page,
                    fetcher.locate(page),
                    records.len()
                );
                PageOutcome::Fetched { page, records }
            }
            Err(err) => {
                warn_time!("Error fetching data from {err}");
                PageOutcome::Failed(err)
            }
        };
        out_tx.send(outcome).await?;
    }
    Ok(attempted)
}

/// Single consumer of the sink. Appends batches in the order they arrive.
async fn collect_outcomes(
    mut out_rx: mpsc::Receiver<PageOutcome>,
) -> (Vec<Record>, Vec<FetchError>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    while let Some(outcome) = out_rx.recv().await {
        match outcome {
            PageOutcome::Fetched { records: batch, .. } => records.extend(batch),
            PageOutcome::Failed(err) => failures.push(err),
        }
    }

    failures.sort_by_key(FetchError::page);
    (records, failures)
}

struct Coordinator {
    state: RunState,
    transitions: Vec<RunState>,
}

impl Coordinator {
    fn new() -> Self {
        Self {
            state: RunState::Dispatching,
            transitions: vec![RunState::Dispatching],
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(next > self.state, "{:?} -> {next:?}", self.state);
        info_time!("{:?} -> {:?}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }
}
