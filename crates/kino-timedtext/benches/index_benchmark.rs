//! Benchmark tests for kino-timedtext operations
//!
//! Run with: cargo bench -p kino-timedtext

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use kino_timedtext::{
    CaptionIndex, Cue, LayoutMode, LayoutPolicy, LoadedTrack, MemoryTrackLoader, RecordingSurface,
    RenderScheduler, SurfaceSize, TimedText, TimedTextConfig, TrackDescriptor,
};
use kino_timedtext::render::ActiveCue;
use kino_timedtext::CueKey;

// ============================================================================
// Helpers
// ============================================================================

/// A feature-length track: back-to-back 3s cues with an occasional overlap
fn generate_cues(count: usize) -> Vec<Cue> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 3.0;
            let end = if i % 10 == 0 { start + 7.5 } else { start + 2.8 };
            Cue::new(i.to_string(), start, end, format!("Caption line {}", i))
        })
        .collect()
}

fn linear_active_at(cues: &[Cue], time: f64) -> Vec<&Cue> {
    cues.iter().filter(|c| c.is_active_at(time)).collect()
}

// ============================================================================
// Index Benchmarks
// ============================================================================

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Index Build");

    for &count in &[100, 1_000, 10_000] {
        let cues = generate_cues(count);
        group.bench_with_input(BenchmarkId::new("CaptionIndex::build", count), &cues, |b, cues| {
            b.iter(|| black_box(CaptionIndex::build(cues.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_active_at(c: &mut Criterion) {
    let mut group = c.benchmark_group("Active Cue Query");

    for &count in &[100, 1_000, 10_000] {
        let cues = generate_cues(count);
        let index = CaptionIndex::build(cues.clone()).unwrap();
        let mid = count as f64 * 1.5;

        group.bench_with_input(BenchmarkId::new("index", count), &mid, |b, &t| {
            b.iter(|| black_box(index.active_at(black_box(t))));
        });

        group.bench_with_input(BenchmarkId::new("linear_scan", count), &mid, |b, &t| {
            b.iter(|| black_box(linear_active_at(&cues, black_box(t))));
        });

        // A banner spanning the whole track must not degrade lookups
        let mut banner = cues.clone();
        banner.push(Cue::new("banner", 0.0, count as f64 * 3.0, "[music]"));
        let banner_index = CaptionIndex::build(banner).unwrap();
        group.bench_with_input(BenchmarkId::new("index_with_banner", count), &mid, |b, &t| {
            b.iter(|| black_box(banner_index.active_at(black_box(t))));
        });
    }

    group.finish();
}

// ============================================================================
// Render Benchmarks
// ============================================================================

fn bench_reconcile(c: &mut Criterion) {
    let cues = generate_cues(1_000);
    let index = CaptionIndex::build(cues).unwrap();
    let layout = LayoutPolicy::new(LayoutMode::OnTop, 60);

    c.bench_function("reconcile_playback_second", |b| {
        b.iter(|| {
            let mut scheduler = RenderScheduler::new(std::time::Duration::from_millis(250));
            let mut surface = RecordingSurface::new();
            // One second of playback at a 250ms monitor rate
            for step in 0..4 {
                let t = 600.0 + step as f64 * 0.25;
                let active: Vec<ActiveCue<'_>> = index
                    .active_at(t)
                    .into_iter()
                    .map(|cue| ActiveCue {
                        key: CueKey::new("en", cue.id.as_str()),
                        cue,
                        style: None,
                    })
                    .collect();
                black_box(scheduler.reconcile(&active, &layout, SurfaceSize::default(), &mut surface));
            }
        });
    });
}

fn bench_controller_tick(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let timed_text = rt.block_on(async {
        let loader = MemoryTrackLoader::new().with_track(
            "en/SUB",
            LoadedTrack {
                cues: generate_cues(1_000),
                ..Default::default()
            },
        );
        let discovery = Arc::new(vec![TrackDescriptor::new("en", "SUB")]);
        let timed_text = TimedText::builder(Arc::new(loader), discovery)
            .config(TimedTextConfig::default())
            .build()
            .await;
        timed_text.setup_sources().await;
        timed_text
    });

    let mut t = 0.0;
    c.bench_function("controller_tick", |b| {
        b.iter(|| {
            t = (t + 0.25) % 3_000.0;
            rt.block_on(async { black_box(timed_text.tick(t).await) })
        });
    });
}

criterion_group!(index_benches, bench_index_build, bench_active_at);
criterion_group!(render_benches, bench_reconcile, bench_controller_tick);

criterion_main!(index_benches, render_benches);
