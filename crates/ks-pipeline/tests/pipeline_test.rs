//! Pipeline engine tests
//!
//! Ordering, filtering, failure propagation and cancellation across real
//! stage tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use ks_core::{Error, Result, Scope};
use ks_pipeline::{
    FilterStage, Frame, FrameReceiver, FrameSender, MapStage, PassThrough, Pipeline, Stage,
    StageState,
};

fn frames(n: u64) -> Vec<Frame> {
    (0..n)
        .map(|i| Frame::new(vec![i as u8], Duration::from_millis(i * 40)).with_dimensions(4, 4))
        .collect()
}

fn timestamps(frames: &[Frame]) -> Vec<Duration> {
    frames.iter().map(|f| f.timestamp).collect()
}

/// Fails when it sees the frame whose first byte equals `at`.
struct FailAt {
    at: u8,
}

#[async_trait]
impl Stage for FailAt {
    fn name(&self) -> &str {
        "fail-at"
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        while let Some(frame) = input.recv().await? {
            if frame.data[0] == self.at {
                return Err(Error::Internal(format!("corrupt frame {}", self.at)));
            }
            output.send(frame).await?;
        }
        Ok(())
    }
}

/// Takes one frame, then stalls until the pipeline is cancelled.
struct Stuck;

#[async_trait]
impl Stage for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        input.recv().await?;
        output
            .scope()
            .run("stuck", tokio::time::sleep(Duration::from_secs(3600)))
            .await?;
        Ok(())
    }
}

/// Two pass-through stages preserve count and order.
#[tokio::test]
async fn test_pass_through_preserves_order() {
    let mut pipeline = Pipeline::new();
    pipeline.add_stage(PassThrough::new("first")).unwrap();
    pipeline.add_stage(PassThrough::new("second")).unwrap();

    let input = frames(10);
    let output = pipeline.run(&Scope::new(), input.clone()).await.unwrap();

    assert_eq!(output.len(), 10);
    assert_eq!(timestamps(&output), timestamps(&input));

    let report = pipeline.last_report().unwrap();
    assert!(report.all_completed());
    assert_eq!(report.stages.len(), 2);
    for stage in &report.stages {
        assert_eq!(stage.frames_in, 10);
        assert_eq!(stage.frames_out, 10);
    }
}

/// Backpressure: more frames than channel capacity still flow through.
#[tokio::test]
async fn test_small_capacity_backpressure() {
    let mut pipeline = Pipeline::with_capacity(1);
    pipeline.add_stage(PassThrough::default()).unwrap();
    pipeline
        .add_stage(MapStage::new("slow", |f: Frame| Ok(f)))
        .unwrap();

    let output = pipeline.run(&Scope::new(), frames(100)).await.unwrap();
    assert_eq!(output.len(), 100);
    assert!(output.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

/// A filtering stage never emits more frames than it receives.
#[tokio::test]
async fn test_filter_reduces_count() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_stage(FilterStage::new("odd", |f: &Frame| f.data[0] % 2 == 1))
        .unwrap();
    pipeline.add_stage(PassThrough::default()).unwrap();

    let output = pipeline.run(&Scope::new(), frames(10)).await.unwrap();
    assert_eq!(output.len(), 5);

    let report = pipeline.last_report().unwrap();
    let odd = report.stage("odd").unwrap();
    assert_eq!(odd.frames_in, 10);
    assert_eq!(odd.frames_out, 5);
}

/// A pipeline without stages connects feed straight to drain.
#[tokio::test]
async fn test_empty_pipeline_forwards() {
    let mut pipeline = Pipeline::new();
    assert!(pipeline.is_empty());
    let output = pipeline.run(&Scope::new(), frames(3)).await.unwrap();
    assert_eq!(output.len(), 3);
}

/// A mid-pipeline failure is reported with the failing stage's identity and
/// does not leave other stages blocked.
#[tokio::test]
async fn test_stage_failure_is_reported_promptly() {
    let mut pipeline = Pipeline::with_capacity(2);
    pipeline.add_stage(PassThrough::new("decode")).unwrap();
    pipeline.add_stage(FailAt { at: 3 }).unwrap();
    pipeline.add_stage(PassThrough::new("encode")).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(&Scope::new(), frames(1000)),
    )
    .await
    .expect("pipeline did not unwind after a stage failure");

    assert_matches!(
        result,
        Err(Error::StageFailure { ref stage, index: 1, ref message })
            if stage == "fail-at" && message.contains("corrupt frame 3")
    );
}

/// Stage states after a failure.
#[tokio::test]
async fn test_failure_marks_states() {
    let mut pipeline = Pipeline::new();
    pipeline.add_stage(PassThrough::new("upstream")).unwrap();
    pipeline.add_stage(FailAt { at: 0 }).unwrap();

    let scope = Scope::new();
    let mut run = pipeline.start(&scope).unwrap();
    let feed = run.take_feed().unwrap();
    let _drain = run.take_drain();
    // The failing stage may cancel the pipeline before the send completes.
    let _ = feed.send(frames(1).remove(0)).await;
    drop(feed);

    let err = run.wait().await.unwrap_err();
    assert_matches!(err, Error::StageFailure { index: 1, .. });
    // The caller's scope is untouched.
    assert!(!scope.is_cancelled());
}

/// Stages cannot be added once the pipeline has started, and it cannot run
/// twice.
#[tokio::test]
async fn test_single_use() {
    let mut pipeline = Pipeline::new();
    pipeline.add_stage(PassThrough::default()).unwrap();
    pipeline.run(&Scope::new(), frames(2)).await.unwrap();

    assert!(pipeline.is_started());
    assert_matches!(
        pipeline.add_stage(PassThrough::default()),
        Err(Error::PipelineAlreadyStarted)
    );
    assert_matches!(
        pipeline.run(&Scope::new(), frames(2)).await,
        Err(Error::PipelineAlreadyStarted)
    );
}

/// Cancelling the caller's scope unblocks a stuck pipeline.
#[tokio::test]
async fn test_caller_cancellation() {
    let mut pipeline = Pipeline::with_capacity(1);
    pipeline.add_stage(PassThrough::default()).unwrap();
    pipeline.add_stage(Stuck).unwrap();

    let scope = Scope::new();
    let canceller = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&scope, frames(50)))
        .await
        .expect("cancellation did not unblock the pipeline");
    assert_matches!(result, Err(ref e) if e.is_cancelled());

    let report = pipeline.last_report();
    // wait() returned an error, so no report was stored.
    assert!(report.is_none());
}

/// A scope deadline ends the run the same way.
#[tokio::test]
async fn test_deadline_cancels() {
    let mut pipeline = Pipeline::new();
    pipeline.add_stage(Stuck).unwrap();

    let scope = Scope::with_timeout(Duration::from_millis(50));
    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&scope, frames(1)))
        .await
        .expect("deadline did not end the pipeline");
    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.to_string().contains("deadline"), "got: {err}");
}

/// Live metrics can be read while stages run.
#[tokio::test]
async fn test_live_report() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = seen.clone();

    let mut pipeline = Pipeline::new();
    pipeline
        .add_stage(MapStage::new("count", move |f: Frame| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(f)
        }))
        .unwrap();

    let mut run = pipeline.start(&Scope::new()).unwrap();
    let feed = run.take_feed().unwrap();
    let drain = run.take_drain().unwrap();

    for frame in frames(4) {
        feed.send(frame).await.unwrap();
    }
    drop(feed);
    let out = drain.collect().await.unwrap();
    assert_eq!(out.len(), 4);

    let report = run.wait().await.unwrap();
    assert_eq!(report.stages[0].state, StageState::Completed);
    assert_eq!(report.stages[0].frames_out, 4);
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}
