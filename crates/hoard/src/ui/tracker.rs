use console::style;
use hoard_transfer::ItemOutcome;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use once_cell::sync::Lazy;
use tracing::debug;

const ITEM_STYLE: &str =
    "{spinner:.blue} {prefix:>10.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({eta}) {wide_msg}";

const BYTE_STYLE: &str = "{spinner:.blue} {prefix:>10.cyan.bold} {bytes} ({bytes_per_sec})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static ITEM_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    ProgressStyle::with_template(ITEM_STYLE)
        .ok()
        .map(|s| s.tick_chars(TICK).progress_chars(PB_CHARS))
});

static BYTE_TEMPLATE: Lazy<Option<ProgressStyle>> =
    Lazy::new(|| ProgressStyle::with_template(BYTE_STYLE).ok().map(|s| s.tick_chars(TICK)));

fn styled(pb: ProgressBar, template: &Lazy<Option<ProgressStyle>>) -> ProgressBar {
    match template.as_ref() {
        Some(style) => pb.with_style(style.clone()),
        None => pb,
    }
}

/// An items bar and a byte counter, drawn on stdout so log lines on stderr
/// stay readable.
#[derive(Clone)]
pub struct TransferTracker {
    multi: MultiProgress,
    items: ProgressBar,
    bytes: ProgressBar,
}

impl Default for TransferTracker {
    fn default() -> Self { Self::new() }
}

impl TransferTracker {
    pub fn new() -> Self { Self::with_draw_target(ProgressDrawTarget::stdout()) }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let items = multi.add(styled(ProgressBar::new(0), &ITEM_TEMPLATE));
        items.set_prefix("assets");
        let bytes = multi.add(styled(ProgressBar::no_length(), &BYTE_TEMPLATE));
        bytes.set_prefix("received");
        Self { multi, items, bytes }
    }

    pub fn multi(&self) -> MultiProgress { self.multi.clone() }

    pub fn set_len(&self, len: u64) { self.items.set_length(len); }

    pub fn on_chunk(&self, len: u64) { self.bytes.inc(len); }

    pub fn on_item(&self, id: &str, outcome: &ItemOutcome) {
        self.items.inc(1);
        match outcome {
            ItemOutcome::Succeeded { .. } => self.items.set_message(format!("{id} {}", style("ok").green())),
            ItemOutcome::Skipped { .. } => self.items.set_message(format!("{id} {}", style("absent").yellow())),
            ItemOutcome::Failed { reason } => {
                let line = format!("{} {id}: {reason}", style("failed").red().bold());
                if let Err(e) = self.multi.println(line) {
                    debug!(asset = id, error = %e, "progress line not written");
                }
            }
        }
    }

    pub fn finish(&self) {
        self.items.finish_and_clear();
        self.bytes.finish();
    }
}
