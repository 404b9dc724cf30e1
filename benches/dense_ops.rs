use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trueno_dense::cholesky::chol;
use trueno_dense::gemm::{adj_gemm, gemm};
use trueno_dense::launch::{launch_adj_mlp, launch_gemm, launch_mlp};
use trueno_dense::mlp::Tanh;
use trueno_dense::solve::solve;
use trueno_dense::{
    ArrayView, ArrayViewMut, GemmBatch, GemmMode, LaunchConfig, SampleLayout, Transpose,
};

fn fill(len: usize, mul: usize) -> Vec<f32> {
    (0..len).map(|i| ((i * mul) % 100) as f32 * 0.01).collect()
}

/// Diagonally dominant symmetric matrix
fn spd(n: usize) -> Vec<f32> {
    let mut a = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            a[i * n + j] = if i == j { n as f32 } else { 1.0 / (1 + i + j) as f32 };
        }
    }
    a
}

fn bench_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm");

    for size in [4, 16, 64] {
        let a = fill(size * size, 1);
        let b = fill(size * size, 2);

        for (label, t1, t2) in [
            ("nn", Transpose::No, Transpose::No),
            ("tn", Transpose::Yes, Transpose::No),
            ("nt", Transpose::No, Transpose::Yes),
        ] {
            group.bench_with_input(
                BenchmarkId::new(label, size),
                &(&a, &b),
                |bench, (a, b)| {
                    let mut out = vec![0.0; size * size];
                    bench.iter(|| {
                        gemm(size, size, size, t1, t2, black_box(a), black_box(b), &mut out, GemmMode::Overwrite);
                        black_box(&out);
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_adj_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("adj_gemm");

    for size in [4, 16, 64] {
        let a = fill(size * size, 1);
        let b = fill(size * size, 2);
        let adj_c = fill(size * size, 3);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bench, &size| {
            let mut adj_a = vec![0.0; size * size];
            let mut adj_b = vec![0.0; size * size];
            bench.iter(|| {
                adj_gemm(size, size, size, Transpose::No, Transpose::No, black_box(&a), black_box(&b), &mut adj_a, &mut adj_b, &adj_c);
                black_box((&adj_a, &adj_b));
            });
        });
    }

    group.finish();
}

fn bench_chol_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("chol_solve");

    for n in [4, 16, 64] {
        let a = spd(n);
        let reg = vec![0.0; n];
        let rhs = fill(n, 7);

        group.bench_with_input(BenchmarkId::new("chol", n), &n, |bench, &n| {
            let mut l = vec![0.0; n * n];
            bench.iter(|| {
                chol(n, black_box(&a), &reg, &mut l);
                black_box(&l);
            });
        });

        let mut l = vec![0.0; n * n];
        chol(n, &a, &reg, &mut l);
        group.bench_with_input(BenchmarkId::new("solve", n), &n, |bench, &n| {
            let mut x = vec![0.0; n];
            bench.iter(|| {
                solve(n, &a, black_box(&l), black_box(&rhs), &mut [], &mut x);
                black_box(&x);
            });
        });
    }

    group.finish();
}

fn bench_mlp_launch(c: &mut Criterion) {
    let mut group = c.benchmark_group("mlp_launch");
    let (m, n) = (64, 32);
    let w = fill(m * n, 3);
    let bias = fill(m, 5);

    for batch in [16, 256] {
        let x = fill(n * batch, 7);
        let adj_out = fill(m * batch, 11);

        for (label, config) in [
            ("sequential", LaunchConfig::sequential()),
            ("parallel", LaunchConfig::parallel()),
        ] {
            group.bench_with_input(BenchmarkId::new(format!("forward_{label}"), batch), &batch, |bench, &batch| {
                let mut out = vec![0.0; m * batch];
                bench.iter(|| {
                    let wv = ArrayView::new(m, n, &w).unwrap();
                    let xv = ArrayView::new(n, batch, &x).unwrap();
                    let mut ov = ArrayViewMut::new(m, batch, &mut out).unwrap();
                    launch_mlp(&config, &wv, &ArrayView::vector(&bias), &Tanh, &xv, &mut ov, SampleLayout::Strided).unwrap();
                    black_box(&out);
                });
            });

            group.bench_with_input(BenchmarkId::new(format!("adjoint_{label}"), batch), &batch, |bench, &batch| {
                let mut adj_w = vec![0.0; m * n];
                let mut adj_b = vec![0.0; m];
                bench.iter(|| {
                    let wv = ArrayView::new(m, n, &w).unwrap();
                    let xv = ArrayView::new(n, batch, &x).unwrap();
                    launch_adj_mlp(
                        &config,
                        &wv,
                        &ArrayView::vector(&bias),
                        &Tanh,
                        &xv,
                        Some(adj_w.as_mut_slice()),
                        Some(adj_b.as_mut_slice()),
                        None,
                        Some(adj_out.as_slice()),
                        SampleLayout::Strided,
                    )
                    .unwrap();
                    black_box((&adj_w, &adj_b));
                });
            });
        }
    }

    group.finish();
}

fn bench_batched_gemm_launch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_gemm_launch");
    let size = 8;
    let block = size * size;

    for batches in [16, 512] {
        let dims = vec![size; batches];
        let starts: Vec<usize> = (0..batches).map(|k| k * block).collect();
        let a = fill(batches * block, 1);
        let b = fill(batches * block, 2);

        for (label, config) in [
            ("sequential", LaunchConfig::sequential()),
            ("parallel", LaunchConfig::parallel()),
        ] {
            group.bench_with_input(BenchmarkId::new(label, batches), &batches, |bench, &batches| {
                let desc = GemmBatch {
                    m: &dims,
                    n: &dims,
                    p: &dims,
                    a_start: &starts,
                    b_start: &starts,
                    c_start: &starts,
                };
                let mut out = vec![0.0; batches * block];
                bench.iter(|| {
                    launch_gemm(&config, &desc, Transpose::No, Transpose::No, black_box(&a), black_box(&b), &mut out, GemmMode::Overwrite).unwrap();
                    black_box(&out);
                });
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_gemm,
    bench_adj_gemm,
    bench_chol_solve,
    bench_mlp_launch,
    bench_batched_gemm_launch
);
criterion_main!(benches);
