use crate::connection::{PacketReceiver, PacketSender};
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::packet::Packet;
use std::time::Instant;

/// How a stage behaves when its input reaches end of stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Forward the upstream end-of-stream marker unchanged, then stop.
    Propagate,
    /// Swallow the upstream marker, emit trailing packets from
    /// [`Stage::on_end`], then issue a fresh end-of-stream of its own.
    Reframe,
}

/// The head of a pipeline. Has no input connection.
pub trait Source: Send + 'static {
    type Output: Send + 'static;

    /// Produce the next value, or `None` once the input is exhausted
    fn produce(&mut self) -> Result<Option<Self::Output>>;

    fn name(&self) -> &str {
        "source"
    }
}

/// A transformation step between one input and one output connection
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Handle one input value, emitting zero or more packets
    fn process(&mut self, input: Self::Input, output: &mut PacketSender<Self::Output>)
        -> Result<()>;

    /// Which end-of-stream convention this stage follows
    fn termination(&self) -> Termination;

    /// Called before the first input is read
    fn on_start(&mut self, _output: &mut PacketSender<Self::Output>) -> Result<()> {
        Ok(())
    }

    /// Trailing packets for a [`Termination::Reframe`] stage. Never called
    /// for propagating stages.
    fn on_end(&mut self, _output: &mut PacketSender<Self::Output>) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "stage"
    }
}

/// The tail of a pipeline. Re-framing by definition: it forwards to nothing.
pub trait Sink: Send + 'static {
    type Input: Send + 'static;

    fn consume(&mut self, input: Self::Input) -> Result<()>;

    /// Called once end of stream has been received
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "sink"
    }
}

/// Drive a source until it is exhausted, then end its stream
pub fn run_source<S: Source>(
    mut source: S,
    mut output: PacketSender<S::Output>,
    metrics: &StageMetrics,
) -> Result<()> {
    let result = (|| -> Result<()> {
        while let Some(value) = source.produce()? {
            metrics.record_processed();
            output.emit(value)?;
        }
        output.send(Packet::EndOfStream)
    })();

    metrics.record_output(output.sent_count(), output.block_count());
    result
}

/// Drive a stage until its input ends, applying its declared [`Termination`]
pub fn run_stage<S: Stage>(
    mut stage: S,
    mut input: PacketReceiver<S::Input>,
    mut output: PacketSender<S::Output>,
    metrics: &StageMetrics,
) -> Result<()> {
    let result = (|| -> Result<()> {
        stage.on_start(&mut output)?;

        loop {
            let control = match input.recv()?.cast::<S::Output>() {
                Ok(control) => control,
                Err(value) => {
                    let start = Instant::now();
                    stage.process(value, &mut output)?;
                    metrics.record_latency(start.elapsed().as_nanos() as u64);
                    metrics.record_processed();
                    continue;
                }
            };

            if !control.is_end_of_stream() {
                output.send(control)?;
                continue;
            }

            match stage.termination() {
                Termination::Propagate => {
                    tracing::trace!(stage = stage.name(), "forwarding end of stream");
                    output.send(control)?;
                }
                Termination::Reframe => {
                    tracing::trace!(stage = stage.name(), "re-framing end of stream");
                    stage.on_end(&mut output)?;
                    output.send(Packet::EndOfStream)?;
                }
            }
            return Ok(());
        }
    })();

    metrics.record_output(output.sent_count(), output.block_count());
    result
}

/// Drain the final connection into a sink
pub fn run_sink<K: Sink>(
    mut sink: K,
    mut input: PacketReceiver<K::Input>,
    metrics: &StageMetrics,
) -> Result<()> {
    loop {
        match input.recv()? {
            Packet::Value(value) => {
                let start = Instant::now();
                sink.consume(value)?;
                metrics.record_latency(start.elapsed().as_nanos() as u64);
                metrics.record_processed();
            }
            Packet::ListStart | Packet::ListEnd => {}
            Packet::EndOfStream => return sink.finish(),
        }
    }
}

/// A propagating stage that applies a function to every value
#[derive(Debug)]
pub struct MapStage<F, I, O> {
    name: String,
    mapper: F,
    _types: std::marker::PhantomData<fn(I) -> O>,
}

impl<F, I, O> MapStage<F, I, O>
where
    F: FnMut(I) -> Result<O> + Send + 'static,
{
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
            _types: std::marker::PhantomData,
        }
    }
}

impl<F, I, O> Stage for MapStage<F, I, O>
where
    F: FnMut(I) -> Result<O> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn process(&mut self, input: I, output: &mut PacketSender<O>) -> Result<()> {
        output.emit((self.mapper)(input)?)
    }

    fn termination(&self) -> Termination {
        Termination::Propagate
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A propagating stage that forwards only values matching a predicate
#[derive(Debug)]
pub struct FilterStage<F, T> {
    name: String,
    predicate: F,
    _types: std::marker::PhantomData<fn(T)>,
}

impl<F, T> FilterStage<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            _types: std::marker::PhantomData,
        }
    }
}

impl<F, T> Stage for FilterStage<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = T;

    fn process(&mut self, input: T, output: &mut PacketSender<T>) -> Result<()> {
        if (self.predicate)(&input) {
            output.emit(input)?;
        }
        Ok(())
    }

    fn termination(&self) -> Termination {
        Termination::Propagate
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A source that yields the items of an iterator
#[derive(Debug)]
pub struct IterSource<I> {
    name: String,
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    pub fn new(name: impl Into<String>, iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            name: name.into(),
            iter: iter.into_iter(),
        }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Output = I::Item;

    fn produce(&mut self) -> Result<Option<I::Item>> {
        Ok(self.iter.next())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
