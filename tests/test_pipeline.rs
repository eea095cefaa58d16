use flow_pipeline::{
    Boxed, FilterStage, IterSource, MapStage, Packet, PacketSender, PipelineBuilder,
    PipelineError, Result as PipelineResult, Sink, Source, Stage, Termination,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Collects every value it receives
struct CollectSink<T> {
    items: Arc<Mutex<Vec<T>>>,
    delay: Option<Duration>,
}

impl<T> CollectSink<T> {
    fn new() -> (Self, Arc<Mutex<Vec<T>>>) {
        let items = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                items: Arc::clone(&items),
                delay: None,
            },
            items,
        )
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl<T: Send + 'static> Sink for CollectSink<T> {
    type Input = T;

    fn consume(&mut self, input: T) -> PipelineResult<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.items.lock().push(input);
        Ok(())
    }

    fn name(&self) -> &str {
        "collect"
    }
}

#[test]
fn test_single_stage_pipeline() {
    let (sink, items) = CollectSink::new();
    let report = PipelineBuilder::new()
        .source(IterSource::new("numbers", 0u32..5))
        .expect("Pipeline build failed")
        .stage(MapStage::new("double", |v: u32| Ok(v * 2)))
        .sink(sink)
        .run()
        .expect("Pipeline run failed");

    assert_eq!(*items.lock(), vec![0, 2, 4, 6, 8]);
    assert_eq!(report.stages_started, 3);
    assert_eq!(report.stage("double").unwrap().total_processed, 5);
}

#[test]
fn test_multi_stage_order_preserved() {
    let (sink, items) = CollectSink::new();
    PipelineBuilder::new()
        .with_capacity(1)
        .source(IterSource::new("numbers", 0u64..10_000))
        .expect("Pipeline build failed")
        .stage(MapStage::new("stage1", |v: u64| Ok(v)))
        .stage(MapStage::new("stage2", |v: u64| Ok(v)))
        .stage(MapStage::new("stage3", |v: u64| Ok(v)))
        .sink(sink)
        .run()
        .expect("Pipeline run failed");

    let items = items.lock();
    assert_eq!(items.len(), 10_000);
    assert!(items.iter().enumerate().all(|(i, v)| *v == i as u64));
}

#[test]
fn test_filter_stage() {
    let (sink, items) = CollectSink::new();
    PipelineBuilder::new()
        .source(IterSource::new("numbers", 0u8..10))
        .expect("Pipeline build failed")
        .stage(FilterStage::new("even_filter", |v: &u8| v % 2 == 0))
        .sink(sink)
        .run()
        .expect("Pipeline run failed");

    assert_eq!(*items.lock(), vec![0, 2, 4, 6, 8]);
}

#[test]
fn test_backpressure_suspends_producer() {
    let (sink, items) = CollectSink::new();
    let report = PipelineBuilder::new()
        .with_capacity(2)
        .source(IterSource::new("fast", 0u32..50))
        .expect("Pipeline build failed")
        .sink(sink.slow(Duration::from_millis(1)))
        .run()
        .expect("Pipeline run failed");

    assert_eq!(items.lock().len(), 50);
    assert!(report.stage("fast").unwrap().total_blocks > 0);
    assert!(report.total_blocks() > 0);
}

#[test]
fn test_lifecycle_returns_to_zero() {
    let (sink, _items) = CollectSink::new();
    let pipeline = PipelineBuilder::new()
        .source(IterSource::new("numbers", 0u32..1000))
        .expect("Pipeline build failed")
        .stage(MapStage::new("inc", |v: u32| Ok(v + 1)))
        .sink(sink);

    let lifecycle = pipeline.lifecycle();
    assert_eq!(lifecycle.started(), 0);

    let running = pipeline.start().expect("Pipeline start failed");
    running.wait().expect("Wait failed");

    assert_eq!(lifecycle.active(), 0);
    assert_eq!(lifecycle.started(), 3);
}

#[test]
fn test_stage_error_aborts_pipeline() {
    let (sink, items) = CollectSink::new();
    let pipeline = PipelineBuilder::new()
        .source(IterSource::new("numbers", 0u32..10_000))
        .expect("Pipeline build failed")
        .stage(MapStage::new("picky", |v: u32| {
            if v == 50 {
                Err(PipelineError::StageError(format!("cannot handle {}", v)))
            } else {
                Ok(v)
            }
        }))
        .sink(sink);
    let lifecycle = pipeline.lifecycle();

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::StageError(ref msg) if msg == "cannot handle 50"));
    assert_eq!(lifecycle.active(), 0);
    assert_eq!(*items.lock(), (0..50).collect::<Vec<_>>());
}

#[test]
fn test_stage_panic_is_reported() {
    let (sink, _items) = CollectSink::<u32>::new();
    let err = PipelineBuilder::new()
        .source(IterSource::new("numbers", 0u32..100))
        .expect("Pipeline build failed")
        .stage(MapStage::new("explosive", |v: u32| -> PipelineResult<u32> {
            if v == 3 {
                panic!("boom");
            }
            Ok(v)
        }))
        .sink(sink)
        .run()
        .unwrap_err();

    assert!(matches!(err, PipelineError::StagePanicked(ref name) if name == "explosive"));
}

struct FlakySource {
    emitted: u32,
}

impl Source for FlakySource {
    type Output = u32;

    fn produce(&mut self) -> PipelineResult<Option<u32>> {
        if self.emitted == 3 {
            return Err(std::io::Error::other("device unplugged").into());
        }
        self.emitted += 1;
        Ok(Some(self.emitted))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[test]
fn test_source_error_is_fatal() {
    let (sink, items) = CollectSink::new();
    let err = PipelineBuilder::new()
        .source(FlakySource { emitted: 0 })
        .expect("Pipeline build failed")
        .stage(MapStage::new("id", |v: u32| Ok(v)))
        .sink(sink)
        .run()
        .unwrap_err();

    assert!(matches!(err, PipelineError::Io(_)));
    assert_eq!(*items.lock(), vec![1, 2, 3]);
}

#[test]
fn test_boxed_edge_type_mismatch() {
    let values = vec![Boxed::new('+'), Boxed::new('-'), Boxed::new(7u32)];
    let (sink, items) = CollectSink::new();
    let err = PipelineBuilder::new()
        .source(IterSource::new("dynamic", values))
        .expect("Pipeline build failed")
        .stage(MapStage::new("unbox", |b: Boxed| b.downcast::<char>()))
        .sink(sink)
        .run()
        .unwrap_err();

    match err {
        PipelineError::TypeMismatch { expected, found } => {
            assert_eq!(expected, "char");
            assert_eq!(found, "u32");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
    assert_eq!(*items.lock(), vec!['+', '-']);
}

/// Groups values into bracketed pairs and reports the total on end of stream
struct Pairing {
    in_group: bool,
    total: u32,
}

impl Stage for Pairing {
    type Input = u32;
    type Output = u32;

    fn process(&mut self, input: u32, output: &mut PacketSender<u32>) -> PipelineResult<()> {
        if !self.in_group {
            output.send(Packet::list_start())?;
        }
        output.emit(input)?;
        self.total += input;
        if self.in_group {
            output.send(Packet::list_end())?;
        }
        self.in_group = !self.in_group;
        Ok(())
    }

    fn termination(&self) -> Termination {
        Termination::Reframe
    }

    fn on_end(&mut self, output: &mut PacketSender<u32>) -> PipelineResult<()> {
        if self.in_group {
            output.send(Packet::list_end())?;
        }
        output.emit(self.total)
    }

    fn name(&self) -> &str {
        "pairing"
    }
}

#[test]
fn test_list_markers_pass_through_propagating_stages() {
    let (pipeline, mut output) = PipelineBuilder::new()
        .source(IterSource::new("numbers", 1u32..=3))
        .expect("Pipeline build failed")
        .stage(Pairing {
            in_group: false,
            total: 0,
        })
        .stage(MapStage::new("tenfold", |v: u32| Ok(v * 10)))
        .into_output();
    let running = pipeline.start().expect("Pipeline start failed");

    let mut packets = Vec::new();
    loop {
        let packet = output.recv().expect("Receive failed");
        let done = packet.is_end_of_stream();
        packets.push(packet);
        if done {
            break;
        }
    }
    running.wait().expect("Wait failed");

    assert_eq!(
        packets,
        vec![
            Packet::ListStart,
            Packet::Value(10),
            Packet::Value(20),
            Packet::ListEnd,
            Packet::ListStart,
            Packet::Value(30),
            Packet::ListEnd,
            Packet::Value(60),
            Packet::EndOfStream,
        ]
    );
}

#[test]
fn test_shared_metrics() {
    let (sink, _items) = CollectSink::new();
    let pipeline = PipelineBuilder::new()
        .with_name("metrics_test")
        .source(IterSource::new("numbers", 0u32..100))
        .expect("Pipeline build failed")
        .stage(MapStage::new("id", |v: u32| Ok(v)))
        .sink(sink);
    let metrics = pipeline.stage_metrics(1).expect("Metrics not found").clone();

    let report = pipeline.run().expect("Pipeline run failed");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_processed, 100);
    // 100 values plus the forwarded end of stream
    assert_eq!(snapshot.total_emitted, 101);
    assert!(report.summary().starts_with("Pipeline metrics_test Metrics Summary:"));
}
