use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::services::JobProgress;

/// Progress bar on stderr fed by the executor's progress channel
pub struct ProgressReporter {
    bar: ProgressBar,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Whether a human is watching stderr
    pub fn enabled() -> bool {
        console::user_attended_stderr()
    }

    /// Start drawing; the returned sender goes to [`JobExecutor::with_progress_sender`]
    ///
    /// [`JobExecutor::with_progress_sender`]: crate::application::services::JobExecutor::with_progress_sender
    pub fn start() -> (Self, mpsc::UnboundedSender<JobProgress>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<JobProgress>();
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);

        let drawing = bar.clone();
        let handle = tokio::spawn(async move {
            while let Some(progress) = receiver.recv().await {
                drawing.set_length(progress.total as u64);
                drawing.set_position(progress.completed as u64);
                let path = progress.path.display().to_string();
                if !progress.success {
                    drawing.println(format!("{} {}", "failed:".red(), path));
                }
                drawing.set_message(path);
            }
        });

        (Self { bar, handle }, sender)
    }

    /// Remove the bar from the terminal
    pub fn finish(self) {
        self.handle.abort();
        self.bar.finish_and_clear();
    }
}
