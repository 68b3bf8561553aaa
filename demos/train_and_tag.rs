use perceptron::train::Trainer;
use perceptron::{Decoding, ModelFile, SequenceAveragedPerceptron, SequencePerceptron};

fn previous(history: &[&String]) -> Vec<String> {
    match history.last() {
        Some(y) => vec![format!("prev={}", y)],
        None => vec!["prev=<s>".to_string()],
    }
}

fn features(activity: &str) -> Vec<String> {
    vec![format!("act={}", activity), "bias".to_string()]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Perceptron Training and Tagging Example");
    println!("=======================================\n");

    // Create training data
    let days = [
        (vec!["walk", "walk", "shop", "clean"], vec!["sunny", "sunny", "rainy", "rainy"]),
        (vec!["shop", "clean", "walk"], vec!["rainy", "rainy", "sunny"]),
        (vec!["walk", "shop", "shop", "walk"], vec!["sunny", "rainy", "rainy", "sunny"]),
        (vec!["clean", "walk", "walk"], vec!["rainy", "sunny", "sunny"]),
    ];

    let mut trainer = Trainer::new().with_epochs(10)?.with_shuffle_seed(1);
    for (activities, weather) in &days {
        let xseq: Vec<Vec<String>> = activities.iter().map(|a| features(a)).collect();
        let yseq: Vec<String> = weather.iter().map(|y| y.to_string()).collect();
        trainer.append(xseq, yseq);
    }
    println!("Training data:");
    println!("  Sequences: {}", trainer.len());
    println!("  Epochs: {}\n", trainer.params().epochs());

    // Train
    let mut model: SequenceAveragedPerceptron<String, String, _> =
        SequencePerceptron::new(previous, 1).with_decoding(Decoding::Viterbi);
    let reports = trainer.train(&mut model)?;
    if let Some(last) = reports.last() {
        println!("\nFinal epoch accuracy: {:.4}", last.accuracy);
    }

    let model_path = std::env::temp_dir().join("example_model.lpcp");
    model.save(&model_path)?;
    println!("Model written to {}\n", model_path.display());

    // Load model and tag
    println!("Loading trained model...");
    let model_data = std::fs::read(&model_path)?;
    let stored = ModelFile::new(&model_data)?;
    let tagger: SequencePerceptron<String, String, _> =
        SequencePerceptron::from_model(&stored, previous)?;
    println!("  Labels: {:?}", tagger.classes().as_slice());

    let test_seq = ["walk", "shop", "clean"];
    let xseq: Vec<Vec<String>> = test_seq.iter().map(|a| features(a)).collect();
    let result = tagger.predict(&xseq);
    println!("  Input: {}", test_seq.join(" -> "));
    println!("  Predicted labels: {:?}", result);

    Ok(())
}
