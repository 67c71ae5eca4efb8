//! Frame pipeline tests through the top-level crate

use std::time::Duration;

use kurosawa::config::PipelineConfig;
use kurosawa::{Config, Frame, Pipeline, Scope, StageState};
use ks_pipeline::{FrameRateStage, MapStage};

/// A pipeline built from config normalises a 60 fps stream to 30 fps and
/// tags every frame.
#[tokio::test]
async fn test_frame_rate_normalisation() {
    let config = Config::from_json(r#"{"pipeline": {"channel_capacity": 4}}"#).unwrap();
    let mut pipeline = Pipeline::from_config(&config.pipeline);
    assert_eq!(pipeline.capacity(), 4);

    pipeline
        .add_stage(MapStage::new("tag", |f: Frame| Ok(f.with_format("rgb24"))))
        .unwrap();
    pipeline
        .add_stage(FrameRateStage::new(30.0).unwrap())
        .unwrap();

    let input: Vec<Frame> = (0..60u64)
        .map(|i| Frame::new(vec![0u8; 16], Duration::from_nanos(i * 1_000_000_000 / 60)))
        .collect();
    let output = pipeline.run(&Scope::new(), input).await.unwrap();

    assert_eq!(output.len(), 30);
    assert!(output.iter().all(|f| f.format.as_deref() == Some("rgb24")));

    let report = pipeline.last_report().unwrap();
    assert!(report.stages.iter().all(|s| s.state == StageState::Completed));
}

/// The default capacity comes from the pipeline config defaults.
#[test]
fn test_default_capacity() {
    let pipeline = Pipeline::from_config(&PipelineConfig::default());
    assert_eq!(pipeline.capacity(), 16);
}
