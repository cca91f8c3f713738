use boxconv_core::{Conv2d, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn benchmark_box_sum_forward(c: &mut Criterion) {
    let conv = Conv2d::box_sum_3x3().expect("build operator");
    let mut group = c.benchmark_group("box_sum_forward");

    for size in [5usize, 32, 128] {
        let len = size * size;
        let input_data: Vec<f32> = (0..len).map(|i| (i % 100) as f32 / 100.0).collect();
        let input = Tensor::from_slice([1usize, 1, size, size], &input_data).expect("build input");

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| conv.forward(black_box(&input)).expect("forward pass"));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_box_sum_forward);
criterion_main!(benches);
