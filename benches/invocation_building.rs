//! Benchmarks for argument building
//!
//! Tests the cost of rendering editor and film invocations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kurosawa::{film_invocation, Clip, Fade, FilmBuilder, MediaFile, Position, Scale};

fn bench_film_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("film_invocation");

    for clips in [1u64, 10, 50] {
        let mut builder = FilmBuilder::new(1920, 1080);
        for i in 0..clips {
            let source = Arc::new(
                MediaFile::video(format!("/media/clip{i}.mp4")).with_duration(Duration::from_secs(60)),
            );
            builder = builder.add_clip(
                Clip::new(source, Duration::from_secs(i % 30), Duration::from_secs(5), Position::default())
                    .with_effect(Scale::new(1280, 720))
                    .with_effect(Fade::fade_in(Duration::from_millis(500))),
            );
        }
        let film = builder.build().unwrap();

        group.bench_function(format!("{clips}_clips"), |b| {
            b.iter(|| {
                film_invocation(black_box(&film), Path::new("/out/film.mp4")).build_arguments()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_film_graph);
criterion_main!(benches);
