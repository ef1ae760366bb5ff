//! `vocab-sync`: merges vocabulary batches into the flashcard store, keeping
//! the synthesized audio in step with it.

mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vocab_config::Config;
use vocab_library::report::Report;
use vocab_library::sync::{dedup_store, verify_store};
use vocab_library::{AudioNamer, Context, DedupPolicy, Keep, SyncEvent, SyncOptions, sync};
use vocab_storage::BackendHandle;
use vocab_storage::backend::{LocalBackend, ReadOnlyBackend};
use vocab_synth::error::ErrorKind as SynthErrorKind;
use vocab_synth::{HttpSettings, HttpSynthesizer, RetryPolicy, SynthesisRequest, Synthesizer, SynthesizerHandle};

/// Exit status of a run that finished but left something for a human.
const ATTENTION: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::builder().with_default_directive(cli.level().into()).from_env_lossy())
        .with(fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(retryable = e.is_retryable(), "{e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Config => {
            let yaml = serde_yaml::to_string(&config.redacted()).or_raise(|| ErrorKind::Output)?;
            print!("{yaml}");
            Ok(ExitCode::SUCCESS)
        },
        Command::Sync { delete_orphans } => {
            let ctx = context(&config, cli.dry_run, true)?;
            let mut options = options(&config);
            options.delete_orphans = delete_orphans;
            run_sync(&ctx, &options).await
        },
        Command::Verify { delete_orphans } => {
            let ctx = context(&config, cli.dry_run, false)?;
            let (verification, deleted) =
                verify_store(&ctx, &config.paths.store, delete_orphans).await.or_raise(|| ErrorKind::Aborted)?;
            for missing in &verification.missing {
                tracing::warn!(
                    word = %missing.word,
                    role = %missing.role,
                    file = %missing.file_name,
                    problem = %missing.problem,
                    "Missing audio"
                );
            }
            for orphan in &verification.orphaned {
                tracing::warn!(audio = %orphan, "Orphaned audio");
            }
            if !verification.rank_gaps.is_empty() {
                tracing::info!(gaps = ?verification.rank_gaps, "Rank gaps");
            }
            for (rank, words) in &verification.duplicate_ranks {
                tracing::info!(rank, words = ?words, "Duplicate rank");
            }
            tracing::info!(
                missing = verification.missing.len(),
                orphaned = verification.orphaned.len(),
                deleted = deleted.len(),
                "Verification complete"
            );
            Ok(if verification.is_consistent() { ExitCode::SUCCESS } else { ExitCode::from(ATTENTION) })
        },
        Command::Dedup => {
            let ctx = context(&config, cli.dry_run, false)?;
            let (duplicates, deleted) = dedup_store(&ctx, &options(&config)).await.or_raise(|| ErrorKind::Aborted)?;
            tracing::info!(
                entries = duplicates.removed_entries.len(),
                cards = duplicates.removed_cards.len(),
                scheduled = duplicates.scheduled.len(),
                deleted,
                dry_run = cli.dry_run,
                "Deduplication complete"
            );
            Ok(ExitCode::SUCCESS)
        },
    }
}

async fn run_sync(ctx: &Context, options: &SyncOptions) -> Result<ExitCode> {
    let mut report: Option<Report> = None;
    let mut failures = 0;
    let mut events = std::pin::pin!(sync(ctx, options));
    while let Some(event) = events.next().await {
        match event {
            Ok(SyncEvent::Started) => tracing::info!(store = %options.store.display(), "Sync started"),
            Ok(SyncEvent::Loaded { entries, records }) => tracing::info!(entries, records, "Loaded"),
            Ok(SyncEvent::Validated { valid, invalid }) => tracing::info!(valid, invalid, "Validated"),
            Ok(SyncEvent::Deduplicated { entries, cards }) => tracing::info!(entries, cards, "Deduplicated"),
            Ok(SyncEvent::Merged(merged)) => tracing::debug!(word = %merged.key, change = ?merged.change, "Merged"),
            Ok(SyncEvent::Saved(path)) => tracing::info!(path = %path.display(), "Store saved"),
            Ok(SyncEvent::Verified { missing, orphaned }) => tracing::info!(missing, orphaned, "Verified"),
            Ok(SyncEvent::Complete(complete)) => report = Some(*complete),
            Err(e) if e.is_fatal() => return Err(e).or_raise(|| ErrorKind::Aborted),
            Err(e) => {
                failures += 1;
                tracing::warn!("{e:?}");
            },
        }
    }
    let Some(report) = report else {
        exn::bail!(ErrorKind::Aborted);
    };
    tracing::info!(
        inserted = report.merge.inserted.len(),
        extended = report.merge.extended.len(),
        failed = report.merge.failed.len(),
        audio_created = report.merge.audio.created,
        audio_reused = report.merge.audio.reused,
        dry_run = report.dry_run,
        "Sync complete"
    );
    if report.dry_run
        && let Ok(rendered) = report.render()
    {
        print!("{rendered}");
    }
    let attention = failures > 0 || !report.verification.missing.is_empty() || !report.batch.unfixable.is_empty();
    Ok(if attention { ExitCode::from(ATTENTION) } else { ExitCode::SUCCESS })
}

fn options(config: &Config) -> SyncOptions {
    let paths = &config.paths;
    let mut options = SyncOptions::new(&paths.store, &paths.batch);
    options.batch_log = paths.batch_log.clone();
    options.corrected_batch = paths.corrected_batch.clone();
    options.backups = paths.backups.clone();
    options.reports = Some(paths.reports.clone());
    options.max_unfixable_ratio = config.batch.max_unfixable_ratio;
    options.clear_after_merge = config.batch.clear_after_merge;
    options
}

/// Builds the run context. `synthesis` is false for commands that never
/// synthesize, so they work without an endpoint configured.
fn context(config: &Config, dry_run: bool, synthesis: bool) -> Result<Context> {
    let format = config.voice.audio_format().or_raise(|| ErrorKind::Config)?;
    let word_audio = audio_root("front", &config.paths.word_audio, dry_run)?;
    let sentence_audio = audio_root("back", &config.paths.sentence_audio, dry_run)?;
    let synthesizer: SynthesizerHandle = if synthesis {
        let settings = HttpSettings {
            endpoint: config.synthesis.endpoint.clone(),
            api_key: config.synthesis.api_key.clone(),
            engine: config.synthesis.engine.clone(),
            timeout: config.synthesis.timeout(),
        };
        Arc::new(HttpSynthesizer::new(settings).or_raise(|| ErrorKind::Setup("synthesizer"))?)
    } else {
        Arc::new(Offline)
    };
    let namer =
        AudioNamer::new(&config.naming.word, &config.naming.sentence).or_raise(|| ErrorKind::Setup("file naming"))?;
    let keep = match config.dedup.keep {
        vocab_config::Keep::Richest => Keep::Richest,
        vocab_config::Keep::First => Keep::First,
    };
    Ok(Context::new(word_audio, sentence_audio, synthesizer, config.voice.id.clone(), namer)
        .with_format(format, config.voice.ssml)
        .with_retry(RetryPolicy::new(config.synthesis.retry_attempts, config.synthesis.retry_delay()))
        .with_dedup(DedupPolicy {
            keep,
            scope_by_voice: config.dedup.scope_by_voice,
        })
        .with_dry_run(dry_run))
}

fn audio_root(name: &'static str, root: &Path, dry_run: bool) -> Result<BackendHandle> {
    let root = std::path::absolute(root).or_raise(|| ErrorKind::Setup(name))?;
    let local: BackendHandle = Arc::new(LocalBackend::new(name, root).or_raise(|| ErrorKind::Setup(name))?);
    Ok(if dry_run { Arc::new(ReadOnlyBackend::new(local)) } else { local })
}

/// Stands in for the synthesizer in commands that only read audio.
struct Offline;

#[async_trait]
impl Synthesizer for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> vocab_synth::error::Result<Vec<u8>> {
        exn::bail!(SynthErrorKind::Settings("synthesis is not available for this command".to_string()))
    }
}
