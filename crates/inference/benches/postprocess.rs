use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use inference::processing::{
    post::{PostProcessor, TransformParams},
    pre::PreProcessor,
};
use ndarray::{Array, IxDyn};

const NUM_CLASSES: usize = 24;
const NUM_ANCHORS: usize = 8400;

/// Mock YOLOv8 output with `num_detections` confident, overlapping boxes
fn create_mock_yolo_output(num_detections: usize) -> Array<f32, IxDyn> {
    let mut output = Array::from_elem(IxDyn(&[1, 4 + NUM_CLASSES, NUM_ANCHORS]), 0.01f32);

    for i in 0..num_detections.min(NUM_ANCHORS) {
        output[[0, 0, i]] = 100.0 + (i % 50) as f32 * 10.0;
        output[[0, 1, i]] = 100.0 + (i / 50) as f32 * 10.0;
        output[[0, 2, i]] = 40.0;
        output[[0, 3, i]] = 40.0;
        output[[0, 4 + i % NUM_CLASSES, i]] = 0.9;
    }

    output
}

fn benchmark_postprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");

    let transform = TransformParams {
        orig_width: 1280,
        orig_height: 720,
        input_width: 640,
        input_height: 640,
        scale: 0.5,
        offset_x: 0.0,
        offset_y: 140.0,
    };
    let post = PostProcessor::new(0.6);

    for num_detections in [0, 10, 100, 500] {
        let output = create_mock_yolo_output(num_detections);
        group.bench_with_input(
            BenchmarkId::new("parse_detections", num_detections),
            &output,
            |b, output| b.iter(|| post.parse_detections(black_box(&output.view()), &transform)),
        );
    }

    group.finish();
}

fn benchmark_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");

    for (width, height, label) in [(640, 480, "VGA"), (1920, 1080, "Full HD")] {
        let image = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        let mut pre = PreProcessor::new(640);

        group.bench_with_input(BenchmarkId::new("letterbox", label), &image, |b, image| {
            b.iter(|| pre.preprocess(black_box(image)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_postprocess, benchmark_preprocess);
criterion_main!(benches);
