use perceptron::{
    Decoding, Error, NoTransitions, SequenceAveragedPerceptron, SequencePerceptron,
};

type Tokens = Vec<Vec<String>>;

fn tokens(words: &[&str]) -> Tokens {
    words
        .iter()
        .map(|w| vec![format!("w={}", w), format!("suffix={}", &w[w.len() - 1..])])
        .collect()
}

fn labels(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn previous(history: &[&String]) -> Vec<String> {
    match history.last() {
        Some(y) => vec![format!("prev={}", y)],
        None => vec!["prev=<s>".to_string()],
    }
}

fn corpus() -> Vec<(Tokens, Vec<String>)> {
    vec![
        (tokens(&["the", "dog", "runs"]), labels(&["D", "N", "V"])),
        (tokens(&["a", "cat", "sleeps"]), labels(&["D", "N", "V"])),
        (tokens(&["dogs", "run"]), labels(&["N", "V"])),
        (tokens(&["the", "run"]), labels(&["D", "N"])),
        (tokens(&["cats", "sleep", "a", "lot"]), labels(&["N", "V", "D", "N"])),
    ]
}

type Transitions = fn(&[&String]) -> Vec<String>;

fn trained(decoding: Decoding) -> SequenceAveragedPerceptron<String, String, Transitions> {
    let mut model =
        SequencePerceptron::new(previous as Transitions, 1).with_decoding(decoding);
    for _ in 0..5 {
        for (xx, yy) in corpus() {
            model.fit_one(&xx, &yy).unwrap();
        }
    }
    model.finalize().unwrap();
    model
}

#[test]
fn test_greedy_without_transitions_matches_independent() {
    let mut order0: SequencePerceptron<String, String, _> =
        SequencePerceptron::new(NoTransitions, 0);
    let mut order1: SequencePerceptron<String, String, _> =
        SequencePerceptron::new(NoTransitions, 1);
    for _ in 0..3 {
        for (xx, yy) in corpus() {
            let a = order0.fit_one(&xx, &yy).unwrap();
            let b = order1.fit_one(&xx, &yy).unwrap();
            assert_eq!(a, b);
        }
    }
    let xx = tokens(&["a", "dog", "sleeps", "the", "cat"]);
    assert_eq!(order0.predict(&xx), order1.predict(&xx));
    let (transitions, _) = order1.predict_with_transitions(&xx);
    assert!(transitions.iter().all(Vec::is_empty));
}

#[test]
fn test_predict_shapes() {
    let model = trained(Decoding::Greedy);
    let xx = tokens(&["the", "cat", "runs"]);
    let (transitions, yhat) = model.predict_with_transitions(&xx);
    assert_eq!(yhat.len(), 3);
    assert_eq!(transitions[0], vec!["prev=<s>".to_string()]);
    assert_eq!(transitions[1], vec![format!("prev={}", yhat[0])]);
    assert_eq!(model.predict(&xx), yhat);

    let empty: Tokens = Vec::new();
    assert!(model.predict(&empty).is_empty());
}

#[test]
fn test_learns_training_data() {
    let model = trained(Decoding::Viterbi);
    for (xx, yy) in corpus() {
        let yhat: Vec<String> = model.predict(&xx).into_iter().cloned().collect();
        assert_eq!(yhat, yy);
    }

    // Greedy search commits early and cannot recover from "sleep a lot"
    let model = trained(Decoding::Greedy);
    for (xx, yy) in corpus().into_iter().take(4) {
        let yhat: Vec<String> = model.predict(&xx).into_iter().cloned().collect();
        assert_eq!(yhat, yy);
    }
}

#[test]
fn test_backtrace_follows_pointers() {
    let model = trained(Decoding::Viterbi);
    let xx = tokens(&["a", "dog", "runs", "the", "cat"]);
    let trellis = model.viterbi(&xx);
    assert_eq!(trellis.len(), xx.len());
    for state in 0..trellis.num_states() as u32 {
        let path = trellis.backtrace(state);
        assert_eq!(path.len(), xx.len());
        assert_eq!(path[path.len() - 1], state);
        assert_eq!(trellis.cell(0, path[0]).pointer, None);
        for t in 1..path.len() {
            assert_eq!(trellis.cell(t, path[t]).pointer, Some(path[t - 1]));
        }
    }
}

#[test]
fn test_viterbi_finds_best_path() {
    let model = trained(Decoding::Viterbi);
    let classes: Vec<String> = model.classes().iter().cloned().collect();
    let xx = tokens(&["cats", "run", "a", "dog"]);

    // Enumerate every labeling
    let n = xx.len();
    let k = classes.len();
    let mut best = f64::NEG_INFINITY;
    for mut code in 0..k.pow(n as u32) {
        let mut yy = Vec::with_capacity(n);
        for _ in 0..n {
            yy.push(classes[code % k].clone());
            code /= k;
        }
        best = best.max(model.score_sequence(&xx, &yy).unwrap());
    }

    let yhat: Vec<String> = model.predict(&xx).into_iter().cloned().collect();
    let score = model.score_sequence(&xx, &yhat).unwrap();
    assert!((score - best).abs() < 1e-9, "{} vs {}", score, best);

    let trellis = model.viterbi(&xx);
    let last = trellis.best_last().unwrap();
    assert!((trellis.cell(n - 1, last).score - best).abs() < 1e-9);
}

#[test]
fn test_score_sequence_length_mismatch() {
    let model = trained(Decoding::Greedy);
    let err = model
        .score_sequence(&tokens(&["a", "dog"]), &labels(&["D"]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
