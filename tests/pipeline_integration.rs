use anyhow::Result;
use tempfile::tempdir;

use ads_pipeline::config::{ExtractionMode, MockConfig, PipelineConfig};
use ads_pipeline::context::RunContext;
use ads_pipeline::enrich::WhatlangDetector;
use ads_pipeline::error::PipelineError;
use ads_pipeline::pipeline::run_full_pipeline;
use ads_pipeline::{artifact, normalize};

fn mock_config(data_root: &std::path::Path, count: usize, top_n: usize) -> PipelineConfig {
    PipelineConfig {
        top_n,
        data_root: data_root.to_path_buf(),
        mock: MockConfig {
            count,
            seed: Some(42),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn full_mock_run_produces_all_four_versioned_artifacts() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = mock_config(temp_dir.path(), 12, 5);
    let ctx = RunContext::new(temp_dir.path(), Some("20250601_120000".to_string()));

    let run = run_full_pipeline(&ctx, &config, &WhatlangDetector).await?;
    assert_eq!(run.stages.len(), 4);

    // Naming convention: {layer}/{dataset}_{run_id}.{ext}
    let bronze = temp_dir.path().join("bronze/ads_raw_20250601_120000.jsonl");
    let silver = temp_dir
        .path()
        .join("silver/ads_normalized_20250601_120000.jsonl");
    let gold = temp_dir.path().join("gold/ads_enriched_20250601_120000.jsonl");
    let ranked = temp_dir.path().join("gold/top_ads_20250601_120000.csv");
    for path in [&bronze, &silver, &gold, &ranked] {
        assert!(path.exists(), "missing artifact {}", path.display());
    }

    // The 12-record mock batch carries one record without an ad_id and one
    // duplicate, so normalization drops exactly two
    assert_eq!(artifact::read_lines(&bronze)?.len(), 12);
    assert_eq!(artifact::read_lines(&silver)?.len(), 10);
    assert_eq!(run.stages[1].dropped, 2);

    // Enrichment is total
    assert_eq!(artifact::read_lines(&gold)?.len(), 10);
    assert_eq!(run.stages[2].output_count, run.stages[2].input_count);

    // Ranked export: header plus at most top_n rows, highest score first
    let csv = std::fs::read_to_string(&ranked)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "ad_id,duration_hours,media_type,language,score");
    assert_eq!(lines.len(), 1 + 5);
    let scores: Vec<f64> = lines[1..]
        .iter()
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));

    Ok(())
}

#[tokio::test]
async fn normalize_rerun_over_the_same_bronze_is_deterministic() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = mock_config(temp_dir.path(), 10, 10);
    let first_ctx = RunContext::new(temp_dir.path(), Some("20250601_120000".to_string()));
    run_full_pipeline(&first_ctx, &config, &WhatlangDetector).await?;

    // A second run over the first run's bronze artifact must not disturb it
    // and must reproduce the same records in the same order
    let bronze = first_ctx.raw_artifact_path();
    let bronze_before = std::fs::read_to_string(&bronze)?;

    let second_ctx = RunContext::new(temp_dir.path(), Some("20250601_130000".to_string()));
    let report = normalize::normalize(&second_ctx, &bronze)?;
    assert_eq!(std::fs::read_to_string(&bronze)?, bronze_before);
    assert!(second_ctx.normalized_artifact_path().exists());

    let first_ids = ad_ids(&artifact::read_lines(&first_ctx.normalized_artifact_path())?);
    let second_ids = ad_ids(&artifact::read_lines(&report.artifact.path)?);
    assert_eq!(first_ids, second_ids);

    Ok(())
}

#[tokio::test]
async fn api_mode_without_token_fails_before_writing_anything() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut config = mock_config(temp_dir.path(), 10, 10);
    config.mode = ExtractionMode::Api;
    config.access_token = None;
    let ctx = RunContext::new(temp_dir.path(), Some("20250601_120000".to_string()));

    let err = run_full_pipeline(&ctx, &config, &WhatlangDetector)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert!(!err.is_retryable());
    assert!(!temp_dir.path().join("bronze").exists());

    Ok(())
}

#[tokio::test]
async fn small_clean_batches_pass_through_without_drops() -> Result<()> {
    let temp_dir = tempdir()?;
    // Batches under eight records carry no injected edge cases
    let config = mock_config(temp_dir.path(), 5, 10);
    let ctx = RunContext::new(temp_dir.path(), Some("20250601_120000".to_string()));

    let run = run_full_pipeline(&ctx, &config, &WhatlangDetector).await?;
    assert_eq!(run.stages[1].dropped, 0);
    assert_eq!(run.stages[3].output_count, 5);

    Ok(())
}

fn ad_ids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["ad_id"].as_str().unwrap().to_string()
        })
        .collect()
}
