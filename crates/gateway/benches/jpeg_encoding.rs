use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gateway::cv_utils::{reconcile_channels, should_flip};
use gateway::response::{encode_annotated, encode_jpeg, encode_jpeg_turbo};
use inference::ChannelOrder;
use inference::buffer::reverse_channels;
use ndarray::Array3;

/// Gradient pattern, more realistic than a solid colour
fn gradient_pixels(width: usize, height: usize) -> Array3<u8> {
    Array3::from_shape_fn((height, width, 3), |(y, x, c)| match c {
        0 => ((x * 255) / width) as u8,
        1 => ((y * 255) / height) as u8,
        _ => (((x + y) * 127) / (width + height)) as u8,
    })
}

const SIZES: [(usize, usize, &str); 3] = [(640, 480, "VGA"), (1280, 720, "HD"), (1920, 1080, "Full HD")];

fn benchmark_jpeg_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("jpeg_encoding");

    for (width, height, label) in SIZES {
        let pixels = gradient_pixels(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(BenchmarkId::new("image_rgb", label), &pixels, |b, pixels| {
            b.iter(|| encode_jpeg(black_box(pixels), ChannelOrder::Rgb));
        });

        group.bench_with_input(BenchmarkId::new("image_bgr", label), &pixels, |b, pixels| {
            b.iter(|| encode_jpeg(black_box(pixels), ChannelOrder::Bgr));
        });

        group.bench_with_input(BenchmarkId::new("turbo_bgr", label), &pixels, |b, pixels| {
            b.iter(|| encode_jpeg_turbo(black_box(pixels), ChannelOrder::Bgr));
        });

        group.bench_with_input(BenchmarkId::new("base64", label), &pixels, |b, pixels| {
            b.iter(|| encode_annotated(black_box(pixels), ChannelOrder::Rgb));
        });
    }

    group.finish();
}

fn benchmark_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_reconciliation");

    for (width, height, label) in SIZES {
        let original = gradient_pixels(width, height);
        let annotated = reverse_channels(&original);
        let smaller = gradient_pixels(width / 2, height / 2);

        group.bench_with_input(BenchmarkId::new("same_size", label), &annotated, |b, annotated| {
            b.iter(|| reconcile_channels(black_box(&original), annotated.clone(), ChannelOrder::Bgr));
        });

        group.bench_with_input(BenchmarkId::new("resampled", label), &smaller, |b, smaller| {
            b.iter(|| should_flip(black_box(&original), black_box(smaller)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_jpeg_encoding, benchmark_reconciliation);
criterion_main!(benches);
