use crate::connection::{connection, PacketReceiver, PacketSender, DEFAULT_CAPACITY};
use crate::error::{PipelineError, Result};
use crate::lifecycle::Lifecycle;
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::stage::{run_sink, run_source, run_stage, Sink, Source, Stage};
use std::ffi::CString;
use std::thread::{self, JoinHandle};

/// Settings shared by every connection and stage of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Used for the tracing span and thread names
    pub name: String,
    /// Buffer size of every connection
    pub capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Reject settings no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PipelineError::ConfigError(
                "connection capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

type StageBody = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A wired but not yet running stage
struct StageTask {
    name: String,
    body: StageBody,
}

/// Builder for a linear pipeline: one source, any number of stages, one sink
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a builder with the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing config
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Set the buffer size of every connection
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the pipeline name used in logs and thread names
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Attach the source and start wiring the chain
    pub fn source<S: Source>(self, source: S) -> Result<PipelineChain<S::Output>> {
        self.config.validate()?;

        let mut wiring = Wiring {
            config: self.config,
            lifecycle: Lifecycle::new(),
            tasks: Vec::new(),
            metrics: Vec::new(),
        };

        let name = source.name().to_string();
        let (output, tail) = wiring.next_connection(&name);
        let metrics = wiring.new_metrics(&name);
        wiring.push_task(name.clone(), move || run_source(source, output, &metrics));

        Ok(PipelineChain {
            wiring,
            tail,
            tail_name: name,
        })
    }
}

/// Stages wired so far, in chain order
struct Wiring {
    config: PipelineConfig,
    lifecycle: Lifecycle,
    tasks: Vec<StageTask>,
    metrics: Vec<StageMetrics>,
}

impl Wiring {
    fn next_connection<U: Send>(&self, producer: &str) -> (PacketSender<U>, PacketReceiver<U>) {
        let label = format!("{}#{}", producer, self.tasks.len());
        connection(label, self.config.capacity)
    }

    fn new_metrics(&mut self, name: &str) -> StageMetrics {
        let metrics = StageMetrics::new(name);
        self.metrics.push(metrics.clone());
        metrics
    }

    fn push_task<F>(&mut self, name: String, body: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.tasks.push(StageTask {
            name,
            body: Box::new(body),
        });
    }

    fn finish(self) -> Pipeline {
        Pipeline {
            config: self.config,
            lifecycle: self.lifecycle,
            tasks: self.tasks,
            metrics: self.metrics,
        }
    }
}

/// A partially wired pipeline whose last connection carries `T`
pub struct PipelineChain<T> {
    wiring: Wiring,
    tail: PacketReceiver<T>,
    tail_name: String,
}

impl<T: Send + 'static> PipelineChain<T> {
    /// Append a transformation stage
    pub fn stage<S>(self, stage: S) -> PipelineChain<S::Output>
    where
        S: Stage<Input = T>,
    {
        let PipelineChain {
            mut wiring,
            tail: input,
            tail_name,
        } = self;

        let name = stage.name().to_string();
        tracing::trace!(from = %tail_name, to = %name, connection = input.label(), "wiring connection");
        let (output, tail) = wiring.next_connection(&name);
        let metrics = wiring.new_metrics(&name);
        wiring.push_task(name.clone(), move || run_stage(stage, input, output, &metrics));

        PipelineChain {
            wiring,
            tail,
            tail_name: name,
        }
    }

    /// Terminate the chain with a sink
    pub fn sink<K>(self, sink: K) -> Pipeline
    where
        K: Sink<Input = T>,
    {
        let PipelineChain {
            mut wiring,
            tail: input,
            tail_name,
        } = self;

        let name = sink.name().to_string();
        tracing::trace!(from = %tail_name, to = %name, connection = input.label(), "wiring connection");
        let metrics = wiring.new_metrics(&name);
        wiring.push_task(name, move || run_sink(sink, input, &metrics));
        wiring.finish()
    }

    /// Leave the final connection open for the caller to read
    pub fn into_output(self) -> (Pipeline, PacketReceiver<T>) {
        (self.wiring.finish(), self.tail)
    }
}

/// A fully wired pipeline, ready to start
pub struct Pipeline {
    config: PipelineConfig,
    lifecycle: Lifecycle,
    tasks: Vec<StageTask>,
    metrics: Vec<StageMetrics>,
}

impl Pipeline {
    /// Get the pipeline config
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Number of stages, source and sink included
    pub fn stage_count(&self) -> usize {
        self.tasks.len()
    }

    /// Get metrics for a stage by chain position
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Handle on the running-stage counter, usable after the pipeline is consumed
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Spawn one thread per stage.
    ///
    /// If a stage cannot be spawned, the stages not yet spawned are dropped so
    /// their connections disconnect, and every stage already running is joined
    /// before the error is returned.
    pub fn start(self) -> Result<RunningPipeline> {
        let pipeline_name = self.config.name.clone();
        let thread_names = self
            .tasks
            .iter()
            .map(|task| thread_name(&pipeline_name, &task.name))
            .collect::<Result<Vec<_>>>()?;

        let mut handles = Vec::with_capacity(self.tasks.len());
        let mut tasks = self.tasks.into_iter().zip(thread_names).enumerate();

        while let Some((index, (task, thread_name))) = tasks.next() {
            let lifecycle = self.lifecycle.clone();
            let pipeline = pipeline_name.clone();
            let stage_name = task.name.clone();
            let body = task.body;

            let spawned = thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    let span = tracing::debug_span!("stage", pipeline = %pipeline, name = %stage_name, index);
                    let _enter = span.enter();
                    let _guard = lifecycle.enter(&stage_name);

                    let result = body();
                    if let Err(ref e) = result {
                        if e.is_disconnect() {
                            tracing::debug!(error = %e, "stage stopped after neighbour failure");
                        } else {
                            tracing::error!(error = %e, "stage failed");
                        }
                    }
                    result
                });

            match spawned {
                Ok(handle) => handles.push((task.name, handle)),
                Err(source) => {
                    tracing::error!(stage = %task.name, error = %source, "failed to spawn stage");
                    drop(tasks);
                    join_abandoned(handles);
                    return Err(PipelineError::Spawn {
                        stage: task.name,
                        source,
                    });
                }
            }
        }

        tracing::debug!(pipeline = %pipeline_name, stages = handles.len(), "pipeline started");

        Ok(RunningPipeline {
            name: pipeline_name,
            lifecycle: self.lifecycle,
            handles,
            metrics: self.metrics,
        })
    }

    /// Start the pipeline and block until every stage has exited
    pub fn run(self) -> Result<PipelineReport> {
        self.start()?.wait()
    }
}

/// Thread name for a stage. Fails on an interior NUL, which the thread
/// builder would panic on.
fn thread_name(pipeline: &str, stage: &str) -> Result<String> {
    let name = format!("{}-{}", pipeline, stage);
    CString::new(name.as_str()).map_err(|_| {
        PipelineError::ConfigError(format!("stage name {:?} contains a NUL byte", name))
    })?;
    Ok(name)
}

/// Join stages left running after a failed start
fn join_abandoned(handles: Vec<(String, JoinHandle<Result<()>>)>) {
    for (name, handle) in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(stage = %name, error = %e, "abandoned stage stopped"),
            Err(_) => tracing::warn!(stage = %name, "abandoned stage panicked"),
        }
    }
}

/// A pipeline whose stages are running
pub struct RunningPipeline {
    name: String,
    lifecycle: Lifecycle,
    handles: Vec<(String, JoinHandle<Result<()>>)>,
    metrics: Vec<StageMetrics>,
}

impl RunningPipeline {
    /// Handle on the running-stage counter
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Get live metrics for a stage by chain position
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Join every stage.
    ///
    /// All stages are joined even when one fails. The returned error is the
    /// first failure in chain order that is not a disconnect; disconnects are
    /// only the knock-on effect of a neighbour going away.
    pub fn wait(self) -> Result<PipelineReport> {
        let mut failures = Vec::new();
        for (name, handle) in self.handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(_) => failures.push(PipelineError::StagePanicked(name)),
            }
        }

        if let Some(index) = failures.iter().position(|e| !e.is_disconnect()) {
            return Err(failures.swap_remove(index));
        }
        if let Some(e) = failures.into_iter().next() {
            return Err(e);
        }

        let report = PipelineReport {
            name: self.name,
            stages_started: self.lifecycle.started(),
            stages: self.metrics.iter().map(StageMetrics::snapshot).collect(),
        };
        tracing::debug!(pipeline = %report.name, "pipeline finished");
        Ok(report)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub name: String,
    pub stages_started: usize,
    pub stages: Vec<MetricsSnapshot>,
}

impl PipelineReport {
    /// Get the snapshot of a stage by name
    pub fn stage(&self, name: &str) -> Option<&MetricsSnapshot> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// Total sends that had to wait on a full connection
    pub fn total_blocks(&self) -> u64 {
        self.stages.iter().map(|s| s.total_blocks).sum()
    }

    /// Human-readable metrics for every stage
    pub fn summary(&self) -> String {
        let mut summary = format!("Pipeline {} Metrics Summary:\n", self.name);
        for (i, snapshot) in self.stages.iter().enumerate() {
            summary.push_str(&format!("  Stage {}: {}\n", i, snapshot.format()));
        }
        summary
    }
}
