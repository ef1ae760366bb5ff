//! The sync run: load, validate, deduplicate, merge, save, verify, report.

use crate::cache::AudioRef;
use crate::dedup::{Dedup, dedup, delete_scheduled, unreferenced};
use crate::error::{ErrorKind, Result};
use crate::merge::{Merged, Merger};
use crate::report::{BatchSummary, DedupSummary, LineNote, Report, VerificationSummary};
use crate::verify::{Verification, delete_orphans, verify};
use crate::Context;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::instrument;
use vocab_records::batch::{self, DEFAULT_MAX_UNFIXABLE_RATIO};
use vocab_records::models::VocabularyEntry;
use vocab_records::{Batch, RunStamp, store, validate};

/// Where a run reads and writes, and how careful it is about it.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub store: PathBuf,
    pub batch: PathBuf,
    /// Append every loaded batch record here (JSONL).
    pub batch_log: Option<PathBuf>,
    /// Write the parsed batch here when any line needed repair.
    pub corrected_batch: Option<PathBuf>,
    /// Directory for batch and store backups; beside the originals if unset.
    pub backups: Option<PathBuf>,
    /// Directory for the report; no report file if unset.
    pub reports: Option<PathBuf>,
    pub max_unfixable_ratio: f64,
    /// Rewrite the batch afterwards so that it holds only records whose
    /// audio could not be synthesized.
    pub clear_after_merge: bool,
    pub delete_orphans: bool,
    pub stamp: RunStamp,
}
impl SyncOptions {
    pub fn new(store: impl Into<PathBuf>, batch: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            batch: batch.into(),
            batch_log: None,
            corrected_batch: None,
            backups: None,
            reports: None,
            max_unfixable_ratio: DEFAULT_MAX_UNFIXABLE_RATIO,
            clear_after_merge: true,
            delete_orphans: false,
            stamp: RunStamp::now(),
        }
    }

    fn backup_path(&self, original: &Path) -> PathBuf {
        self.stamp.backup_path(original, self.backups.as_deref())
    }
}

/// Progress events emitted by [`sync`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started)
/// 2. [`Loaded`](Self::Loaded)
/// 3. [`Validated`](Self::Validated)
/// 4. [`Deduplicated`](Self::Deduplicated)
/// 5. [`Merged`](Self::Merged), once per valid record that merged
/// 6. [`Saved`](Self::Saved), only if the store changed and this isn't a dry run
/// 7. [`Verified`](Self::Verified)
/// 8. [`Complete`](Self::Complete)
///
/// A fatal error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum SyncEvent {
    Started,
    Loaded { entries: usize, records: usize },
    Validated { valid: usize, invalid: usize },
    Deduplicated { entries: usize, cards: usize },
    Merged(Merged),
    Saved(PathBuf),
    Verified { missing: usize, orphaned: usize },
    Complete(Box<Report>),
}

/// Streams [`SyncEvent`]s while merging the batch into the store.
///
/// Errors the run can continue past (a record whose audio failed, a report
/// that could not be written) are yielded as `Err` items and the stream goes
/// on. Errors it can't are yielded last: a [fatal load](ErrorKind::FatalLoad)
/// before anything was changed, a [synthesis abort](ErrorKind::SynthesisAborted)
/// before the store was saved, or a failed [save](ErrorKind::Save).
pub fn sync<'a>(ctx: &'a Context, options: &'a SyncOptions) -> impl Stream<Item = Result<SyncEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(SyncEvent::Started);
        let mut report = Report::new(&options.stamp, ctx.dry_run);

        let (mut entries, batch) = match load(ctx, options) {
            Ok(loaded) => loaded,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        report.store.loaded = entries.len();
        report.batch = summarize(&batch);
        yield Ok(SyncEvent::Loaded { entries: entries.len(), records: batch.records.len() });
        if !ctx.dry_run {
            keep_batch_records(options, &batch);
        }

        let mut valid = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            match validate(&record.value) {
                Ok(entry) => valid.push((entry, &record.value)),
                Err(e) => {
                    tracing::warn!(line = record.line, error = %*e, "Invalid batch record");
                    report.batch.invalid.push(LineNote { line: record.line, detail: (*e).to_string() });
                },
            }
        }
        report.batch.valid = valid.len();
        yield Ok(SyncEvent::Validated { valid: valid.len(), invalid: report.batch.invalid.len() });

        let original = entries.clone();
        let duplicates = dedup(&mut entries, &ctx.dedup);
        report.dedup = DedupSummary::from(&duplicates);
        yield Ok(SyncEvent::Deduplicated {
            entries: duplicates.removed_entries.len(),
            cards: duplicates.removed_cards.len(),
        });

        let mut merger = Merger::new(ctx, entries);
        let mut pending: Vec<&Value> = Vec::new();
        for (entry, value) in valid {
            let word = entry.word.clone();
            match merger.merge(entry).await {
                Ok(merged) => {
                    report.merge.record(&merged);
                    yield Ok(SyncEvent::Merged(merged));
                },
                Err(e) if e.is_fatal() => {
                    tracing::error!(word, error = %*e, "Aborting run, the store was not saved");
                    yield Err(e);
                    return;
                },
                Err(e) => {
                    tracing::warn!(word, error = %*e, "Skipping record");
                    report.merge.record_failure(&word, &*e);
                    pending.push(value);
                    yield Err(e);
                },
            }
        }
        let mut entries = merger.into_entries();
        entries.sort_by_key(|entry| entry.rank);

        report.store.saved = entries.len();
        report.store.changed = entries != original;
        if report.store.changed && !ctx.dry_run {
            let backup = options.backup_path(&options.store);
            if let Err(e) = store::save(&options.store, &entries, Some(&backup)).or_raise(|| ErrorKind::Save) {
                yield Err(e);
                return;
            }
            yield Ok(SyncEvent::Saved(options.store.clone()));
        }

        if options.clear_after_merge && !ctx.dry_run && batch.lines > 0 {
            match batch::write(&options.batch, pending.iter().copied()).or_raise(|| ErrorKind::Save) {
                Ok(()) => tracing::info!(pending = pending.len(), "Batch consumed"),
                Err(e) => yield Err(e),
            }
        }

        // The merge may have picked scheduled audio back up; those files stay.
        let scheduled = unreferenced(duplicates.scheduled.iter().cloned(), &entries);
        if !ctx.dry_run {
            match delete_scheduled(ctx, &scheduled).await {
                Ok(deleted) => report.dedup.audio_deleted = deleted,
                Err(e) => yield Err(e),
            }
        }

        match verify(ctx, &entries).await {
            Ok(verification) => {
                report.verification = VerificationSummary::from(&verification);
                if options.delete_orphans && !ctx.dry_run {
                    match delete_orphans(ctx, &verification.orphaned).await {
                        Ok(deleted) => report.verification.orphans_deleted = deleted.len(),
                        Err(e) => yield Err(e),
                    }
                }
                yield Ok(SyncEvent::Verified {
                    missing: verification.missing.len(),
                    orphaned: verification.orphaned.len(),
                });
            },
            Err(e) => yield Err(e),
        }

        if let Some(dir) = &options.reports
            && !ctx.dry_run
            && let Err(e) = report.write(dir).await
        {
            yield Err(e);
        }
        yield Ok(SyncEvent::Complete(Box::new(report)));
    })
}

/// Loads the store, then the batch. Nothing has been written when this fails
/// except the batch backup.
#[instrument(skip_all)]
fn load(ctx: &Context, options: &SyncOptions) -> Result<(Vec<VocabularyEntry>, Batch)> {
    let entries = store::load(&options.store).or_raise(|| ErrorKind::FatalLoad)?;
    let backup = (!ctx.dry_run).then(|| options.backup_path(&options.batch));
    let batch = batch::load(&options.batch, options.max_unfixable_ratio, backup.as_deref())
        .or_raise(|| ErrorKind::FatalLoad)?;
    Ok((entries, batch))
}

fn summarize(batch: &Batch) -> BatchSummary {
    BatchSummary {
        lines: batch.lines,
        parsed: batch.records.len(),
        corrections: batch
            .corrections
            .iter()
            .map(|c| LineNote { line: c.line, detail: format!("{} (was: {})", c.error, c.original) })
            .collect(),
        unfixable: batch.unfixable.iter().map(|u| LineNote { line: u.line, detail: u.error.clone() }).collect(),
        ..BatchSummary::default()
    }
}

/// Writes the corrected batch and appends to the batch log. Both are for
/// later inspection only, so failures are logged and the run goes on.
fn keep_batch_records(options: &SyncOptions, batch: &Batch) {
    if let Some(path) = &options.corrected_batch
        && !batch.corrections.is_empty()
        && let Err(e) = batch::write(path, batch.values())
    {
        tracing::warn!(path = %path.display(), error = %*e, "Unable to write corrected batch");
    }
    if let Some(path) = &options.batch_log
        && let Err(e) = batch::append(path, batch.values())
    {
        tracing::warn!(path = %path.display(), error = %*e, "Unable to append to batch log");
    }
}

/// Deduplicates the store on its own, outside a sync run. Returns what was
/// removed and how many audio files were deleted.
#[instrument(skip_all, fields(store = %options.store.display()))]
pub async fn dedup_store(ctx: &Context, options: &SyncOptions) -> Result<(Dedup, usize)> {
    let mut entries = store::load(&options.store).or_raise(|| ErrorKind::FatalLoad)?;
    let duplicates = dedup(&mut entries, &ctx.dedup);
    if duplicates.is_empty() || ctx.dry_run {
        return Ok((duplicates, 0));
    }
    entries.sort_by_key(|entry| entry.rank);
    let backup = options.backup_path(&options.store);
    store::save(&options.store, &entries, Some(&backup)).or_raise(|| ErrorKind::Save)?;
    let deleted = delete_scheduled(ctx, &duplicates.scheduled).await?;
    Ok((duplicates, deleted))
}

/// Verifies the store on its own, optionally deleting orphans. Returns the
/// findings and the orphans deleted.
#[instrument(skip_all, fields(store = %store_path.display()))]
pub async fn verify_store(ctx: &Context, store_path: &Path, remove_orphans: bool) -> Result<(Verification, Vec<AudioRef>)> {
    let entries = store::load(store_path).or_raise(|| ErrorKind::FatalLoad)?;
    let verification = verify(ctx, &entries).await?;
    if !remove_orphans || ctx.dry_run {
        return Ok((verification, Vec::new()));
    }
    delete_orphans(ctx, &verification.orphaned).await?;
    let deleted = verification.orphaned.clone();
    Ok((verification, deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use futures::StreamExt;
    use std::fs;

    const RECORD: &str = r#"{"word":"apple","rank":1,"freq":120,"back_cards":[{"definition_en":"a fruit","example_en":"An apple a day."}]}"#;

    fn options(dir: &Path) -> SyncOptions {
        let mut options = SyncOptions::new(dir.join("vocab.yaml"), dir.join("batch.jsonl"));
        options.backups = Some(dir.join("backups"));
        options.reports = Some(dir.join("reports"));
        options
    }

    async fn run(ctx: &Context, options: &SyncOptions) -> (Vec<SyncEvent>, Vec<ErrorKind>) {
        let results: Vec<_> = sync(ctx, options).collect().await;
        let mut events = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(event) => events.push(event),
                Err(e) => errors.push((*e).clone()),
            }
        }
        (events, errors)
    }

    #[tokio::test]
    async fn test_event_order() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        fs::write(&options.batch, format!("{RECORD}\n")).unwrap();
        let fixture = Fixture::new();

        let (events, errors) = run(&fixture.context(), &options).await;
        assert!(errors.is_empty(), "{errors:?}");
        let names: Vec<_> = events
            .iter()
            .map(|event| match event {
                SyncEvent::Started => "started",
                SyncEvent::Loaded { .. } => "loaded",
                SyncEvent::Validated { .. } => "validated",
                SyncEvent::Deduplicated { .. } => "deduplicated",
                SyncEvent::Merged(_) => "merged",
                SyncEvent::Saved(_) => "saved",
                SyncEvent::Verified { .. } => "verified",
                SyncEvent::Complete(_) => "complete",
            })
            .collect();
        assert_eq!(names, ["started", "loaded", "validated", "deduplicated", "merged", "saved", "verified", "complete"]);

        assert_eq!(store::load(&options.store).unwrap().len(), 1);
        assert_eq!(fs::read_to_string(&options.batch).unwrap(), "");
        assert_eq!(fs::read_dir(dir.path().join("reports")).unwrap().count(), 1);
        assert_eq!(fs::read_dir(dir.path().join("backups")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_records_are_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let invalid = r#"{"word":"pear","rank":2,"freq":80,"back_cards":[]}"#;
        fs::write(&options.batch, format!("{RECORD}\n{invalid}\n")).unwrap();
        let fixture = Fixture::new();

        let (events, errors) = run(&fixture.context(), &options).await;
        assert!(errors.is_empty());
        let Some(SyncEvent::Complete(report)) = events.last() else { panic!("run did not complete") };
        assert_eq!(report.batch.valid, 1);
        assert_eq!(report.batch.invalid, vec![LineNote { line: 2, detail: "record has no back cards".to_string() }]);
        assert_eq!(report.merge.inserted, vec!["apple".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_records_stay_in_batch() {
        use vocab_synth::MockSynthesizer;
        use vocab_synth::error::ErrorKind as SynthErrorKind;

        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let pear = r#"{"word":"pear","rank":2,"freq":80,"back_cards":[{"definition_en":"a fruit","example_en":"A ripe pear."}]}"#;
        fs::write(&options.batch, format!("{RECORD}\n{pear}\n")).unwrap();
        let synth = MockSynthesizer::default()
            .fail_on("A ripe pear.", SynthErrorKind::Rejected { status: 400, message: "no".into() });
        let fixture = Fixture::with_synth(synth);

        let (events, errors) = run(&fixture.context(), &options).await;
        assert_eq!(errors, vec![ErrorKind::Synthesis("A ripe pear.".to_string())]);
        assert!(matches!(events.last(), Some(SyncEvent::Complete(_))));
        assert_eq!(store::load(&options.store).unwrap().len(), 1);
        let remaining = fs::read_to_string(&options.batch).unwrap();
        assert_eq!(remaining.lines().count(), 1);
        assert!(remaining.contains("\"pear\""));
    }

    #[tokio::test]
    async fn test_quota_aborts_before_save() {
        use vocab_synth::MockSynthesizer;
        use vocab_synth::error::ErrorKind as SynthErrorKind;

        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        fs::write(&options.batch, format!("{RECORD}\n")).unwrap();
        let fixture = Fixture::with_synth(MockSynthesizer::with_failures([SynthErrorKind::QuotaExceeded(402)]));

        let (events, errors) = run(&fixture.context(), &options).await;
        assert_eq!(errors, vec![ErrorKind::SynthesisAborted]);
        assert!(!events.iter().any(|event| matches!(event, SyncEvent::Saved(_) | SyncEvent::Complete(_))));
        assert!(!options.store.exists());
        assert_eq!(fs::read_to_string(&options.batch).unwrap(), format!("{RECORD}\n"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        fs::write(&options.batch, format!("{RECORD}\n")).unwrap();
        let fixture = Fixture::new();
        let ctx = fixture.context().with_dry_run(true);

        let (events, errors) = run(&ctx, &options).await;
        assert!(errors.is_empty());
        let Some(SyncEvent::Complete(report)) = events.last() else { panic!("run did not complete") };
        assert!(report.store.changed);
        assert_eq!(report.merge.audio.planned, 2);
        assert!(!options.store.exists());
        assert!(!dir.path().join("backups").exists());
        assert!(!dir.path().join("reports").exists());
        assert_eq!(fixture.synth.calls().await, 0);
        assert_eq!(fs::read_to_string(&options.batch).unwrap(), format!("{RECORD}\n"));
    }

    #[tokio::test]
    async fn test_corrected_batch_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.corrected_batch = Some(dir.path().join("corrected.jsonl"));
        options.batch_log = Some(dir.path().join("log.jsonl"));
        // Trailing comma inside the card, repaired on load.
        let broken = r#"{"word":"pear","rank":2,"freq":80,"back_cards":[{"definition_en":"a fruit","example_en":"A ripe pear.",}]}"#;
        fs::write(&options.batch, format!("{RECORD}\n{broken}\n")).unwrap();

        let (_, errors) = run(&Fixture::new().context(), &options).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(fs::read_to_string(dir.path().join("corrected.jsonl")).unwrap().lines().count(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("log.jsonl")).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_dedup_store() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path());
        let entries = vec![
            crate::fixtures::entry("apple", 1, &["a", "b"]),
            crate::fixtures::entry("apple", 1, &["a"]),
        ];
        store::save(&options.store, &entries, None).unwrap();

        let (duplicates, _) = dedup_store(&Fixture::new().context(), &options).await.unwrap();
        assert_eq!(duplicates.removed_entries.len(), 1);
        assert_eq!(store::load(&options.store).unwrap().len(), 1);
    }
}
