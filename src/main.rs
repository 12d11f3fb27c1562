use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use ads_pipeline::config::PipelineConfig;
use ads_pipeline::context::RunContext;
use ads_pipeline::enrich::WhatlangDetector;
use ads_pipeline::logging;
use ads_pipeline::pipeline::{self, StageReport};
use ads_pipeline::{enrich, extract, normalize, rank};

#[derive(Parser)]
#[command(name = "ads_pipeline")]
#[command(about = "Ad-library batch ETL: extract, normalize, enrich, rank")]
#[command(version = "0.1.0")]
struct Cli {
    /// Run identifier shared across stages; defaults to the current timestamp
    #[arg(long, global = true)]
    run_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw ads into the bronze layer
    Extract {
        /// Source mode: mock or api
        #[arg(long)]
        mode: Option<String>,
    },
    /// Normalize a bronze artifact into the silver layer
    Normalize {
        /// Bronze artifact to read
        #[arg(long)]
        input: PathBuf,
    },
    /// Enrich a silver artifact into the gold layer
    Enrich {
        /// Silver artifact to read
        #[arg(long)]
        input: PathBuf,
    },
    /// Rank a gold artifact and export the top-N CSV
    Rank {
        /// Gold artifact to read
        #[arg(long)]
        input: PathBuf,
        /// Number of top ads to keep
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Run the complete pipeline: extract, normalize, enrich, rank
    Run {
        /// Source mode: mock or api
        #[arg(long)]
        mode: Option<String>,
        /// Number of top ads to keep
        #[arg(long)]
        top_n: Option<usize>,
    },
}

fn print_report(report: &StageReport) {
    println!("\n📊 {} stage results:", report.stage);
    println!("   Input records:  {}", report.input_count);
    println!("   Output records: {}", report.output_count);
    if report.dropped > 0 {
        println!("   Dropped:        {}", report.dropped);
    }
    if report.degraded > 0 {
        println!("   Degraded:       {}", report.degraded);
    }
    println!("   Artifact:       {}", report.artifact.path.display());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load()?;

    let result = match cli.command {
        Commands::Extract { mode } => {
            if let Some(mode) = mode {
                config.mode = mode.parse()?;
            }
            config.validate()?;
            let ctx = RunContext::new(config.data_root.clone(), cli.run_id);
            extract::extract(&ctx, &config).await
        }
        Commands::Normalize { input } => {
            let ctx = RunContext::new(config.data_root.clone(), cli.run_id);
            normalize::normalize(&ctx, &input)
        }
        Commands::Enrich { input } => {
            let ctx = RunContext::new(config.data_root.clone(), cli.run_id);
            enrich::enrich(&ctx, &input, &WhatlangDetector)
        }
        Commands::Rank { input, top_n } => {
            if let Some(top_n) = top_n {
                config.top_n = top_n;
            }
            let ctx = RunContext::new(config.data_root.clone(), cli.run_id);
            rank::rank(&ctx, &input, config.top_n, &config.scoring)
        }
        Commands::Run { mode, top_n } => {
            if let Some(mode) = mode {
                config.mode = mode.parse()?;
            }
            if let Some(top_n) = top_n {
                config.top_n = top_n;
            }
            let ctx = RunContext::new(config.data_root.clone(), cli.run_id);
            println!("🔄 Running full pipeline (run {})...", ctx.run_id);

            match pipeline::run_full_pipeline(&ctx, &config, &WhatlangDetector).await {
                Ok(run) => {
                    for report in &run.stages {
                        print_report(report);
                    }
                    if let Some(ranked) = run.ranked_artifact() {
                        println!(
                            "\n✅ Pipeline run {} completed, top ads at {}",
                            run.run_id,
                            ranked.path.display()
                        );
                    }
                    return Ok(());
                }
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    };

    match result {
        Ok(report) => {
            info!("{} stage finished", report.stage);
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            error!("Stage failed: {}", e);
            Err(e.into())
        }
    }
}
