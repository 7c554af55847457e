//! Chroma Matte Performance Benchmarks
//!
//! Benchmarks for:
//! - Matte pass over full frames at streaming resolutions (the pass runs
//!   per repaint tick, so it must stay well under the 30ms throttle gate)
//! - Per-branch kernel cost: pure chroma, green spill, character pixels
//! - Throttle decisions at display cadence

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use avatar_rtc::matte::{matte_frame, rgba_buffer_len, FrameThrottle};

// ============================================================================
// Matte Kernel Benchmarks
// ============================================================================

mod kernel_bench {
    use super::*;

    /// Interleaved chroma background, spill edge, and character pixels, so
    /// every kernel branch is exercised.
    fn synthetic_frame(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(rgba_buffer_len(width, height));
        for i in 0..(width as usize * height as usize) {
            match i % 3 {
                0 => data.extend_from_slice(&[0, 255, 0, 255]),
                1 => data.extend_from_slice(&[100, 200, 40, 255]),
                _ => data.extend_from_slice(&[200, 100, 50, 255]),
            }
        }
        data
    }

    fn uniform_frame(pixel: [u8; 4], width: u32, height: u32) -> Vec<u8> {
        pixel.repeat(width as usize * height as usize)
    }

    pub fn bench_matte_full_frame(c: &mut Criterion) {
        let mut group = c.benchmark_group("matte_full_frame");

        // 720x1080 is the cropped avatar strip; the rest are common stream sizes
        for &(width, height) in &[(640u32, 360u32), (720, 1080), (1280, 720), (1920, 1080)] {
            let data = synthetic_frame(width, height);
            group.throughput(Throughput::Bytes(data.len() as u64));

            group.bench_with_input(
                BenchmarkId::new("mixed_content", format!("{}x{}", width, height)),
                &data,
                |b, data| {
                    b.iter_batched(
                        || data.clone(),
                        |mut frame| {
                            matte_frame(&mut frame, width, height).unwrap();
                            black_box(frame)
                        },
                        BatchSize::LargeInput,
                    );
                },
            );
        }

        group.finish();
    }

    pub fn bench_matte_branches(c: &mut Criterion) {
        let mut group = c.benchmark_group("matte_branches");

        let (width, height) = (720u32, 1080u32);
        let cases = [
            ("pure_chroma", [0u8, 255, 0, 255]),
            ("green_spill", [100, 200, 40, 255]),
            ("character", [200, 100, 50, 255]),
        ];

        for (label, pixel) in cases {
            let data = uniform_frame(pixel, width, height);
            group.throughput(Throughput::Bytes(data.len() as u64));

            group.bench_with_input(BenchmarkId::new("uniform", label), &data, |b, data| {
                b.iter_batched(
                    || data.clone(),
                    |mut frame| {
                        matte_frame(&mut frame, width, height).unwrap();
                        black_box(frame)
                    },
                    BatchSize::LargeInput,
                );
            });
        }

        group.finish();
    }
}

// ============================================================================
// Throttle Benchmarks
// ============================================================================

mod throttle_bench {
    use super::*;

    pub fn bench_throttle_decisions(c: &mut Criterion) {
        let mut group = c.benchmark_group("frame_throttle");
        group.throughput(Throughput::Elements(1000));

        // 16ms repaint cadence against the default 30ms gate
        group.bench_function("display_cadence_ticks", |b| {
            b.iter(|| {
                let mut throttle = FrameThrottle::new(30);
                let mut admitted = 0u32;
                for tick in 1..=1000u64 {
                    if throttle.should_process(tick * 16) {
                        admitted += 1;
                    }
                }
                black_box(admitted)
            });
        });

        group.finish();
    }
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    matte_kernel_benches,
    kernel_bench::bench_matte_full_frame,
    kernel_bench::bench_matte_branches,
);

criterion_group!(throttle_benches, throttle_bench::bench_throttle_decisions);

criterion_main!(matte_kernel_benches, throttle_benches);
