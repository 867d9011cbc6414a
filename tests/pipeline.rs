mod common;

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use callfinder::audio::windows::MAX_WINDOW_SECONDS;
use callfinder::audio::DecodingLoader;
use callfinder::config::BatchParams;
use callfinder::extractor::{Embedder, SpectralEmbedder};
use callfinder::pipeline::BatchPipeline;
use callfinder::store::{self, Precision};
use callfinder::OutcomeStatus;
use common::{write_sine_wave, BrokenEmbedder, MeanEmbedder, RampLoader, SAMPLE_RATE};
use tempfile::tempdir;

#[test]
fn unreadable_file_does_not_stop_the_batch() -> Result<()> {
    let temp = tempdir()?;
    let a = temp.path().join("A.wav");
    let b = temp.path().join("B.wav");
    let c = temp.path().join("C.wav");
    write_sine_wave(&a, 440.0, 2.0)?;
    fs::write(&b, b"definitely not a riff header, just bytes")?;
    write_sine_wave(&c, 880.0, 1.0)?;
    let out = temp.path().join("embeddings");

    let embedder = SpectralEmbedder::new();
    assert_eq!(embedder.sample_rate(), SAMPLE_RATE);
    let params = BatchParams {
        batch_size: 64,
        num_workers: 1,
        output_dir: Some(out.clone()),
        ..BatchParams::default()
    };
    let pipeline = BatchPipeline::new(DecodingLoader::new(SAMPLE_RATE), &embedder, params)?;
    let run = pipeline.run(&[&a, &b, &c]);

    let outcomes = run.outcomes();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].source_id, a.display().to_string());
    assert_eq!(outcomes[0].status, OutcomeStatus::Success { windows: 1 });
    assert!(matches!(outcomes[1].status, OutcomeStatus::Failed(_)));
    assert_eq!(outcomes[2].status, OutcomeStatus::Success { windows: 1 });
    assert_eq!(run.summary.successes(), 2);
    assert_eq!(run.summary.failures(), 1);

    assert_eq!(run.collection.len(), 2);
    assert_eq!(run.collection.dimension(), Some(embedder.dimension()));
    assert!(out.join("A_embeddings.json").is_file());
    assert!(!out.join("B_embeddings.json").exists());
    assert!(out.join("C_embeddings.json").is_file());

    let stored = store::load(&out.join("A_embeddings.json"))?;
    let original = &run.collection.records()[0];
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored.records()[0].vector,
        Precision::Half.reduce_vector(&original.vector)
    );
    Ok(())
}

#[test]
fn empty_batch_is_valid() -> Result<()> {
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        MeanEmbedder::new(100),
        BatchParams::default(),
    )?;
    let run = pipeline.run::<PathBuf>(&[]);
    assert!(run.collection.is_empty());
    assert!(run.outcomes().is_empty());
    Ok(())
}

#[test]
fn load_failures_are_isolated_in_input_order() -> Result<()> {
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        MeanEmbedder::new(100),
        BatchParams::default(),
    )?;
    let files = ["one.wav", "bad.wav", "two.wav", "bad2.wav"];
    let mut seen = Vec::new();
    let run = pipeline.run_with_progress(&files, |progress| {
        seen.push((progress.completed, progress.succeeded));
        assert_eq!(progress.total, 4);
    });

    assert_eq!(seen, vec![(1, true), (2, false), (3, true), (4, false)]);
    let ids: Vec<_> = run.outcomes().iter().map(|o| o.source_id.as_str()).collect();
    assert_eq!(ids, files);
    match &run.outcomes()[1].status {
        OutcomeStatus::Failed(reason) => assert!(reason.contains("unreadable input")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(run.collection.source_ids(), vec!["one.wav", "two.wav"]);
    Ok(())
}

#[test]
fn sliding_windows_are_batched_and_positioned() -> Result<()> {
    let embedder = MeanEmbedder::new(100);
    let params = BatchParams {
        batch_size: 2,
        window_length: Some(3.0),
        window_stride: Some(3.0),
        ..BatchParams::default()
    };
    let pipeline = BatchPipeline::new(RampLoader { sample_rate: 100 }, &embedder, params)?;
    let run = pipeline.run(&["clip10.wav"]);

    assert_eq!(
        run.outcomes()[0].status,
        OutcomeStatus::Success { windows: 3 }
    );
    let starts: Vec<f64> = run
        .collection
        .iter()
        .map(|r| r.window_start_time)
        .collect();
    assert_eq!(starts, vec![0.0, 3.0, 6.0]);
    assert!(run.collection.iter().all(|r| r.vector[1] == 300.0));
    assert_eq!(embedder.calls.get(), 2);
    Ok(())
}

#[test]
fn wrong_embedding_width_fails_the_file() -> Result<()> {
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        BrokenEmbedder,
        BatchParams::default(),
    )?;
    let run = pipeline.run(&["clip.wav"]);
    match &run.outcomes()[0].status {
        OutcomeStatus::Failed(reason) => assert!(reason.contains("columns")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(run.collection.is_empty());
    Ok(())
}

#[test]
fn sample_rate_mismatch_fails_the_file() -> Result<()> {
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 200 },
        MeanEmbedder::new(100),
        BatchParams::default(),
    )?;
    let run = pipeline.run(&["clip.wav"]);
    assert!(!run.outcomes()[0].status.is_success());
    Ok(())
}

#[test]
fn repeated_source_is_rejected_as_duplicate() -> Result<()> {
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        MeanEmbedder::new(100),
        BatchParams::default(),
    )?;
    let run = pipeline.run(&["same.wav", "same.wav"]);
    assert!(run.outcomes()[0].status.is_success());
    match &run.outcomes()[1].status {
        OutcomeStatus::Failed(reason) => assert!(reason.contains("duplicate")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(run.collection.len(), 1);
    Ok(())
}

#[test]
fn colliding_artifact_names_keep_the_later_file() -> Result<()> {
    let temp = tempdir()?;
    let out = temp.path().join("out");
    let params = BatchParams {
        output_dir: Some(out.clone()),
        output_precision: Precision::Single,
        ..BatchParams::default()
    };
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        MeanEmbedder::new(100),
        params,
    )?;
    let run = pipeline.run(&["left/x2.wav", "right/x2.wav"]);
    assert_eq!(run.summary.successes(), 2);

    let stored = store::load(&out.join("x2_embeddings.json"))?;
    assert_eq!(stored.source_ids(), vec!["right/x2.wav"]);
    Ok(())
}

#[test]
fn structural_parameter_errors_are_raised_up_front() {
    let params = BatchParams {
        batch_size: 0,
        ..BatchParams::default()
    };
    let result = BatchPipeline::new(RampLoader { sample_rate: 100 }, MeanEmbedder::new(100), params);
    assert!(result.is_err());

    let params = BatchParams {
        window_stride: Some(1.0),
        ..BatchParams::default()
    };
    let result = BatchPipeline::new(RampLoader { sample_rate: 100 }, MeanEmbedder::new(100), params);
    assert!(result.is_err());

    for length in [1e30, 1e6, f64::MAX] {
        let params = BatchParams {
            window_length: Some(length),
            ..BatchParams::default()
        };
        let result =
            BatchPipeline::new(RampLoader { sample_rate: 100 }, MeanEmbedder::new(100), params);
        assert!(result.is_err(), "window_length {length} accepted");
    }
}

#[test]
fn longest_allowed_window_pads_short_clips() -> Result<()> {
    let params = BatchParams {
        window_length: Some(MAX_WINDOW_SECONDS),
        ..BatchParams::default()
    };
    let pipeline = BatchPipeline::new(
        RampLoader { sample_rate: 100 },
        MeanEmbedder::new(100),
        params,
    )?;
    let run = pipeline.run(&["a.wav", "b.wav"]);
    assert_eq!(run.summary.successes(), 2);
    let expected = (MAX_WINDOW_SECONDS * 100.0) as f32;
    assert!(run.collection.iter().all(|r| r.vector[1] == expected));
    Ok(())
}
