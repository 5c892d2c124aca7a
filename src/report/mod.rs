//! Report generation.
//!
//! Results are projected into flat string records only here, at the render
//! boundary. Three interchangeable renderers consume them:
//! - Markdown: pipe tables for review tools and wikis
//! - CSV: spreadsheet import
//! - XML: CI tooling

mod console;
mod render;

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::scan::{ComponentResult, ComponentSummary, SEVERITY_ORDER};

pub use console::write_pretty;
pub use render::{CsvProjector, MarkdownProjector, XmlProjector};

/// Detail fields that come from blame data.
pub const PROVENANCE_FIELDS: &[&str] = &["commit", "author", "author_mail", "source"];

/// Destination name of the summary report.
pub const SUMMARY_NAME: &str = "summary";

/// One flat, already-stringified report row. Field order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field, replacing the value in place if the key exists.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

/// Ordered allow-list of report fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SectionSpec {
    /// Every field, in record order
    #[default]
    All,
    Fields(Vec<String>),
}

impl SectionSpec {
    /// Parse a comma-separated field list. Empty means all fields.
    pub fn parse(list: &str) -> Self {
        let fields: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            SectionSpec::All
        } else {
            SectionSpec::Fields(fields)
        }
    }

    pub fn includes(&self, field: &str) -> bool {
        match self {
            SectionSpec::All => true,
            SectionSpec::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }

    /// Column names for `records`. With `All`, the union of record keys in
    /// first-seen order.
    pub fn columns(&self, records: &[Record]) -> Vec<String> {
        match self {
            SectionSpec::Fields(fields) => fields.clone(),
            SectionSpec::All => {
                let mut seen = HashSet::new();
                records
                    .iter()
                    .flat_map(Record::keys)
                    .filter(|k| seen.insert(*k))
                    .map(str::to_string)
                    .collect()
            }
        }
    }
}

/// Rendering interface shared by every output format.
pub trait Projector {
    /// Emit `records`, restricted to and ordered by `sections`.
    fn render(&mut self, records: &[Record], sections: &SectionSpec) -> io::Result<()>;

    /// Finish the document and flush the sink.
    fn close(&mut self) -> io::Result<()>;
}

/// Available report formats, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Markdown,
    Csv,
    Xml,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Csv => "csv",
            Format::Xml => "xml",
        }
    }

    /// A projector of this format writing to `sink`.
    pub fn projector<'a>(self, sink: Box<dyn Write + 'a>) -> Box<dyn Projector + 'a> {
        match self {
            Format::Markdown => Box::new(MarkdownProjector::new(sink)),
            Format::Csv => Box::new(CsvProjector::new(sink)),
            Format::Xml => Box::new(XmlProjector::new(sink)),
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Format::Markdown),
            "csv" => Ok(Format::Csv),
            "xml" => Ok(Format::Xml),
            _ => Err(format!(
                "unknown format {:?}, must be 'markdown', 'csv', or 'xml'",
                s
            )),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Markdown => write!(f, "markdown"),
            Format::Csv => write!(f, "csv"),
            Format::Xml => write!(f, "xml"),
        }
    }
}

// =============================================================================
// Projection
// =============================================================================

/// Hyperlink to a finding's line at the commit that owns it.
pub fn link_for(base_url: &str, identity: &str, commit: &str, file: &str, line: &str) -> String {
    format!("{}/{}/+/{}/{}#{}", base_url, identity, commit, file, line)
}

/// One record per finding of a component.
///
/// With `link_base`, the `line` value becomes a link when both the finding's
/// commit and the component's repository identity are known.
pub fn detail_records(result: &ComponentResult, link_base: Option<&str>) -> Vec<Record> {
    let identity = result.component.git_identity.as_deref();

    result
        .findings
        .iter()
        .map(|f| {
            let line = match (link_base, identity, f.commit()) {
                (Some(base), Some(identity), Some(commit)) => {
                    link_for(base, identity, commit, &f.file, &f.line)
                }
                _ => f.line.clone(),
            };

            let mut record = Record::new()
                .with("file", f.file.as_str())
                .with("line", line)
                .with("severity", f.severity.as_str())
                .with("id", f.rule_id.as_str())
                .with("message", f.message.as_str());

            if let Some(p) = &f.provenance {
                record.set("commit", p.commit.as_str());
                record.set("author", p.author.clone().unwrap_or_default());
                record.set("author_mail", p.author_mail.clone().unwrap_or_default());
                record.set("source", p.source_line.clone().unwrap_or_default());
            }
            record
        })
        .collect()
}

/// One record per component: severity counts in report order and a total.
pub fn summary_records(summaries: &[ComponentSummary]) -> Vec<Record> {
    let extra: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.counts.labels())
        .filter(|l| !SEVERITY_ORDER.contains(l))
        .collect();
    let labels: Vec<&str> = SEVERITY_ORDER.iter().copied().chain(extra).collect();

    summaries
        .iter()
        .map(|s| {
            let mut record = Record::new()
                .with("component", s.component.display_name.as_str())
                .with("path", s.component.relative_path.as_str());
            for label in &labels {
                record.set(label, s.counts.get(label).unwrap_or(0).to_string());
            }
            record.set("total", s.counts.total().to_string());
            record
        })
        .collect()
}

/// Destination file per component.
///
/// The first component to claim a name keeps it. Later components with the
/// same name use their path with separators replaced by underscores.
pub fn assign_destinations(
    results: &[ComponentResult],
    out_dir: &Path,
    format: Format,
    reserved: &[&str],
) -> Vec<PathBuf> {
    let mut used: HashSet<String> = reserved.iter().map(|s| s.to_string()).collect();

    results
        .iter()
        .map(|r| {
            let mut name = r.component.display_name.clone();
            if !used.insert(name.clone()) {
                name = r.component.relative_path.replace(['/', '\\'], "_");
                used.insert(name.clone());
            }
            out_dir.join(format!("{}.{}", name, format.extension()))
        })
        .collect()
}

// =============================================================================
// Writing
// =============================================================================

/// Render one report to `path`.
///
/// The report is rendered next to its destination and moved into place only
/// once complete, so a failed render never leaves a truncated file behind.
pub fn write_report(
    path: &Path,
    format: Format,
    records: &[Record],
    sections: &SectionSpec,
) -> Result<()> {
    let render_err = |source: io::Error| Error::Render {
        path: path.to_path_buf(),
        source,
    };
    let staging = staging_path(path);

    let rendered = File::create(&staging).and_then(|file| {
        let mut projector = format.projector(Box::new(BufWriter::new(file)));
        projector.render(records, sections)?;
        projector.close()
    });

    match rendered.and_then(|()| fs::rename(&staging, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&staging);
            Err(render_err(e))
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// What [`write_reports`] produced.
#[derive(Debug, Clone, Default)]
pub struct ReportOutcome {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Write the summary and per-component reports requested by `config`.
///
/// A report that cannot be written is logged and skipped; the others are
/// still produced. If the output directory cannot be created, every report
/// is recorded as failed.
pub fn write_reports(
    results: &[ComponentResult],
    summaries: &[ComponentSummary],
    config: &ScanConfig,
) -> ReportOutcome {
    let out_dir = &config.out_dir;
    if let Err(e) = fs::create_dir_all(out_dir) {
        tracing::error!(out_dir = %out_dir.display(), error = %e, "cannot create report directory");
    }

    let mut outcome = ReportOutcome::default();
    let mut record = |path: PathBuf, written: Result<()>| match written {
        Ok(()) => outcome.written.push(path),
        Err(e) => {
            tracing::error!(error = %e, "report not written");
            outcome.failed.push(path);
        }
    };

    let mut reserved = Vec::new();
    if config.output.wants_summary() {
        let path = out_dir.join(format!("{}.{}", SUMMARY_NAME, config.format.extension()));
        let records = summary_records(summaries);
        let written = write_report(&path, config.format, &records, &config.summary_sections);
        record(path, written);
        reserved.push(SUMMARY_NAME);
    }

    if config.output.wants_detail() {
        let destinations = assign_destinations(results, out_dir, config.format, &reserved);
        for (result, path) in results.iter().zip(destinations) {
            let records = detail_records(result, config.link_base.as_deref());
            let written = write_report(&path, config.format, &records, &config.detail_sections);
            record(path, written);
        }
    }

    outcome
}
