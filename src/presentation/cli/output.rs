use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use crate::application::services::dependency_graph::normalize_path;
use crate::application::services::JobReport;
use crate::domain::value_objects::VcsType;

/// Prints job results in submission order
pub struct ReportPrinter {
    format: OutputFormat,
    hide_empty: bool,
    base: PathBuf,
}

impl ReportPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            hide_empty: false,
            base: env::current_dir().unwrap_or_default(),
        }
    }

    pub fn with_hide_empty(mut self, hide_empty: bool) -> Self {
        self.hide_empty = hide_empty;
        self
    }

    /// Paths are shown relative to this directory
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    pub fn print(&self, reports: &[JobReport]) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&self.visible(reports))?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(&self.visible(reports))?);
            }
            OutputFormat::Text => {
                for report in self.visible(reports) {
                    println!("{}", self.render(report));
                }
            }
        }
        Ok(())
    }

    /// Failed results only, on stderr
    pub fn print_failures(&self, reports: &[JobReport]) {
        for report in reports.iter().filter(|r| !r.is_success()) {
            eprintln!("{}", self.render(report));
        }
    }

    /// `--repos` listing
    pub fn print_repositories(&self, repositories: &[(PathBuf, VcsType)]) {
        for (path, vcs_type) in repositories {
            println!("{} ({})", self.display_path(path).bold(), vcs_type);
        }
    }

    fn visible<'a>(&self, reports: &'a [JobReport]) -> Vec<&'a JobReport> {
        reports
            .iter()
            .filter(|r| !(self.hide_empty && r.result.output.trim().is_empty()))
            .collect()
    }

    fn render(&self, report: &JobReport) -> String {
        let title = format!(
            "{} {} ({}) {}",
            "===".blue(),
            self.display_path(&report.path).blue().bold(),
            report.vcs_type.to_string().blue(),
            "===".blue()
        );

        let mut output = report.result.output.trim_end().to_string();
        if !report.is_success() {
            if output.is_empty() {
                output = format!("Failed with return code {}", report.result.returncode);
            }
            if !report.result.cmd.is_empty() {
                output = format!("{}\n{}", report.result.cmd.yellow(), output);
            }
            output = output.red().to_string();
        }

        if output.is_empty() {
            title
        } else {
            format!("{}\n{}", title, output)
        }
    }

    /// Path relative to the base directory, `.` for the base itself
    pub fn display_path(&self, path: &Path) -> String {
        let absolute = normalize_path(&self.base.join(path));
        match pathdiff::diff_paths(&absolute, &self.base) {
            Some(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Some(relative) => relative.display().to_string(),
            None => path.display().to_string(),
        }
    }
}
