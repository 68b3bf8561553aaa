use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use perceptron::{Decoding, SequencePerceptron};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Transitions = fn(&[&String]) -> Vec<String>;

fn previous(history: &[&String]) -> Vec<String> {
    history.iter().map(|y| format!("prev={}", y)).collect()
}

fn random_sequence(rng: &mut StdRng, len: usize, vocab: usize) -> Vec<Vec<String>> {
    (0..len)
        .map(|_| {
            let w = rng.gen_range(0..vocab);
            vec![format!("w={}", w), format!("w%7={}", w % 7)]
        })
        .collect()
}

/// Train a small model with `num_labels` labels on random data
fn model(num_labels: usize) -> SequencePerceptron<String, String, Transitions> {
    let mut rng = StdRng::seed_from_u64(0);
    let mut model = SequencePerceptron::new(previous as Transitions, 1);
    for _ in 0..50 {
        let xx = random_sequence(&mut rng, 10, 100);
        let yy: Vec<String> = (0..xx.len())
            .map(|_| format!("L{}", rng.gen_range(0..num_labels)))
            .collect();
        model.fit_one(&xx, &yy).unwrap();
    }
    model.finalize().unwrap();
    model
}

fn benchmark_decode_by_l(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_by_l");
    let t = 10; // Sequence length

    for l in [2, 4, 8, 16] {
        let greedy = model(l);
        let viterbi = greedy.clone().with_decoding(Decoding::Viterbi);
        let mut rng = StdRng::seed_from_u64(1);
        let xx = random_sequence(&mut rng, t, 100);

        group.bench_with_input(BenchmarkId::new("greedy", l), &xx, |b, xx| {
            b.iter(|| black_box(greedy.predict(xx)));
        });
        group.bench_with_input(BenchmarkId::new("viterbi", l), &xx, |b, xx| {
            b.iter(|| black_box(viterbi.predict(xx)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode_by_l);
criterion_main!(benches);
