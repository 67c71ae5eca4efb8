//! Film composition tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kurosawa::config::OutputConfig;
use kurosawa::{
    film_invocation, write_film, Clip, Config, Error, Fade, FilmBuilder, MediaFile, Position,
    Scope,
};

fn clip(path: &str, start: u64, len: u64) -> Clip {
    let source = Arc::new(MediaFile::video(path).with_duration(Duration::from_secs(60)));
    Clip::new(
        source,
        Duration::from_secs(start),
        Duration::from_secs(len),
        Position::default(),
    )
}

/// The canvas takes the configured default size and the full running time.
#[test]
fn test_canvas_from_config() {
    let film = FilmBuilder::from_config(&OutputConfig::default())
        .add_clip(clip("a.mp4", 0, 2))
        .add_clip(clip("b.mp4", 10, 3))
        .add_clip(clip("c.mp4", 20, 4))
        .build()
        .unwrap();
    assert_eq!(film.duration(), Duration::from_secs(9));

    let args = film_invocation(&film, Path::new("out.mp4")).build_arguments();
    assert!(args.contains(&"color=c=black:s=1920x1080:d=9.000".to_string()));
}

/// Every clip's effects are rendered inside its own branch of the graph.
#[test]
fn test_clip_effects_in_graph() {
    let film = FilmBuilder::new(640, 480)
        .add_clip(clip("a.mp4", 0, 5).with_effect(Fade::fade_out(Duration::from_secs(1))))
        .build()
        .unwrap();
    let args = film_invocation(&film, Path::new("out.mp4")).build_arguments();
    let fc = args.iter().position(|a| a == "-filter_complex").unwrap();
    assert!(
        args[fc + 1].starts_with("[1:v]fade=t=out:st=4.000:d=1.000,setpts=PTS-STARTPTS+0.000/TB[c0]"),
        "graph: {}",
        args[fc + 1]
    );
}

/// A clip that runs past the end of its source fails the build.
#[test]
fn test_clip_past_source_end() {
    let result = FilmBuilder::new(640, 480).add_clip(clip("a.mp4", 58, 5)).build();
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

/// Writing under a cancelled scope never launches the encoder.
#[tokio::test]
async fn test_write_film_respects_cancellation() {
    let film = FilmBuilder::new(640, 480)
        .add_clip(clip("a.mp4", 0, 1))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let scope = Scope::new();
    scope.cancel();

    let err = write_film(&scope, &film, dir.path().join("film.mp4"), &Config::default())
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "got: {err}");
}
