//! Progress reporting and display
//!
//! The migration driver reports through [`ProgressReporter`] so that it stays
//! independent of how (or whether) progress is shown.

use std::sync::Arc;

use crate::store::RecordId;

/// Status of a single record being migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// Being read and normalized
    Processing,
    /// Content was replaced
    Migrated,
    /// Left untouched, with the reason
    Skipped(&'static str),
    /// Failed with error
    Failed(String),
}

/// Phase of the overall run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationPhase {
    LoadingConfig,
    OpeningDatabase,
    ListingRecords { page: u32 },
    MigratingRecords,
    StoringResult,
    Completed,
    Failed(String),
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    fn set_phase(&self, phase: MigrationPhase);

    /// Total number of matching records (known after the first page).
    fn register_total(&self, total: u64);

    fn update_record(&self, id: RecordId, status: RecordStatus);

    fn log_warn(&self, message: &str);

    fn log_error(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: MigrationPhase) {}
    fn register_total(&self, _total: u64) {}
    fn update_record(&self, _id: RecordId, _status: RecordStatus) {}
    fn log_warn(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Statistics collected during a run.
#[derive(Debug, Default)]
struct Stats {
    total: u64,
    migrated: u64,
    skipped: u64,
    failed: u64,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    fn count(&mut self, status: &RecordStatus) {
        match status {
            RecordStatus::Processing => {}
            RecordStatus::Migrated => self.migrated += 1,
            RecordStatus::Skipped(_) => self.skipped += 1,
            RecordStatus::Failed(_) => self.failed += 1,
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📄 Records:    {} total", self.total);
        eprintln!("   ✅ Migrated:   {}", self.migrated);
        eprintln!("   ⏭️  Skipped:    {}", self.skipped);
        if self.failed > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed);
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

fn phase_message(phase: &MigrationPhase) -> String {
    match phase {
        MigrationPhase::LoadingConfig => "📋 Loading configuration...".to_owned(),
        MigrationPhase::OpeningDatabase => "🗄️  Opening database...".to_owned(),
        MigrationPhase::ListingRecords { page } => format!("🔎 Listing records (page {page})..."),
        MigrationPhase::MigratingRecords => "📄 Migrating records...".to_owned(),
        MigrationPhase::StoringResult => "💾 Storing result...".to_owned(),
        MigrationPhase::Completed => "✅ Completed!".to_owned(),
        MigrationPhase::Failed(e) => format!("❌ Failed: {e}"),
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: MigrationPhase) {
        eprintln!("{}", phase_message(&phase));
    }

    fn register_total(&self, total: u64) {
        self.stats.write().unwrap().total = total;
        eprintln!("   Found {total} records");
    }

    fn update_record(&self, id: RecordId, status: RecordStatus) {
        self.stats.write().unwrap().count(&status);
        match status {
            RecordStatus::Migrated => eprintln!("   ✓ #{id}"),
            RecordStatus::Failed(ref e) => eprintln!("   ✗ #{id}: {e}"),
            _ => {}
        }
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn log_error(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print_summary();
    }
}

/// Interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    records: std::sync::RwLock<std::collections::HashMap<RecordId, indicatif::ProgressBar>>,
    main_progress: std::sync::RwLock<Option<indicatif::ProgressBar>>,
    stats: std::sync::RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            records: std::sync::RwLock::new(std::collections::HashMap::new()),
            main_progress: std::sync::RwLock::new(None),
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: MigrationPhase) {
        let msg = phase_message(&phase);
        if matches!(phase, MigrationPhase::Completed | MigrationPhase::Failed(_)) {
            self.phase_bar.finish_with_message(msg);
        } else {
            self.phase_bar.set_message(msg);
        }
    }

    fn register_total(&self, total: u64) {
        self.stats.write().unwrap().total = total;

        let main_pb = self.multi.add(indicatif::ProgressBar::new(total));
        main_pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} records")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        *self.main_progress.write().unwrap() = Some(main_pb);
    }

    fn update_record(&self, id: RecordId, status: RecordStatus) {
        let mut records = self.records.write().unwrap();

        if status == RecordStatus::Processing {
            // Spinners exist only while a record is in flight
            let pb = self.multi.add(indicatif::ProgressBar::new_spinner());
            pb.set_style(
                indicatif::ProgressStyle::default_spinner()
                    .template("   {msg}")
                    .unwrap(),
            );
            pb.set_message(format!("⚙️  #{id}: processing"));
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            records.insert(id, pb);
            return;
        }

        if let Some(pb) = records.remove(&id) {
            pb.finish_and_clear();
        }
        if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
            main_pb.inc(1);
        }
        if let RecordStatus::Failed(ref e) = status {
            self.multi.println(format!("   ✗ #{id}: {e}")).ok();
        }
        self.stats.write().unwrap().count(&status);
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn log_error(&self, message: &str) {
        self.multi.println(format!("❌ {message}")).ok();
    }

    fn finish(&self) {
        for pb in self.records.read().unwrap().values() {
            pb.finish_and_clear();
        }
        if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
            main_pb.finish_and_clear();
        }
        self.phase_bar.finish_and_clear();

        self.stats.read().unwrap().print_summary();
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
