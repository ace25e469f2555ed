use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use ecow::EcoVec;
use shared_types::{AppError, Complaint, ComplaintStatistics, User};
use typst::diag::{FileError, FileResult, SourceDiagnostic};
use typst::foundations::{Bytes, Datetime};
use typst::layout::PagedDocument;
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};

/// Escape text for use inside a Typst string literal.
pub fn escape_typst(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// A quoted Typst string literal.
fn lit(s: &str) -> String {
    format!("\"{}\"", escape_typst(s))
}

fn opt_lit(s: Option<&str>) -> String {
    lit(s.unwrap_or(""))
}

/// A Typst dictionary literal from already-rendered values.
fn dict(pairs: &[(&str, String)]) -> String {
    let body: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("({})", body.join(", "))
}

/// A Typst array literal. A single element needs a trailing comma.
fn array(items: Vec<String>) -> String {
    match items.len() {
        0 => "()".to_string(),
        1 => format!("({},)", items[0]),
        _ => format!("({})", items.join(", ")),
    }
}

fn human_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Data for the First Information Report of one complaint.
pub struct FirParams<'a> {
    pub complaint: &'a Complaint,
    pub reporter: Option<&'a User>,
    pub officer: Option<&'a User>,
    pub generated_at: DateTime<Utc>,
}

/// The FIR: `fir.typ` preceded by `#let` bindings for one complaint.
///
/// Only administrative notes are printed; officer notes stay internal.
pub fn fir_report(params: &FirParams<'_>) -> Report {
    let c = params.complaint;

    let victims = array(
        c.victims
            .iter()
            .map(|v| {
                dict(&[
                    ("name", lit(&v.name)),
                    ("gender", lit(&v.gender)),
                    ("age", lit(&v.age)),
                    ("address", lit(&v.address)),
                    ("injury", lit(&v.injury_loss)),
                    (
                        "medical_aid",
                        lit(match v.medical_aid {
                            Some(true) => "Yes",
                            Some(false) => "No",
                            None => "",
                        }),
                    ),
                ])
            })
            .collect(),
    );
    let accused = array(
        c.accused
            .iter()
            .map(|a| {
                dict(&[
                    ("name", lit(&a.name)),
                    ("alias", lit(&a.alias)),
                    ("age", lit(&a.age)),
                    ("address", lit(&a.address)),
                    ("status", lit(a.status.as_str())),
                    ("remarks", lit(&a.remarks)),
                ])
            })
            .collect(),
    );
    let evidence = array(
        c.evidence
            .iter()
            .map(|e| {
                dict(&[
                    ("filename", lit(&e.filename)),
                    ("size", lit(&human_size(e.size))),
                    ("mimetype", lit(&e.mimetype)),
                ])
            })
            .collect(),
    );
    let notes = array(
        c.admin_notes()
            .into_iter()
            .map(|n| dict(&[("date", lit(&stamp(n.created_at))), ("note", lit(&n.note))]))
            .collect(),
    );

    let reporter_name = if c.anonymous {
        "Anonymous".to_string()
    } else {
        params.reporter.map(|r| r.full_name.clone()).unwrap_or_default()
    };

    let bindings = format!(
        r##"#let case_number = {case_number}
#let generated_at = {generated_at}
#let filed_at = {filed_at}
#let complaint_type = {complaint_type}
#let status = {status}
#let emergency = {emergency}
#let anonymous = {anonymous}
#let incident_date = {incident_date}
#let incident_time = {incident_time}
#let location = {location}
#let landmark = {landmark}
#let description = {description}
#let relation = {relation}
#let reporter_name = {reporter_name}
#let reporter_email = {reporter_email}
#let officer_name = {officer_name}
#let officer_badge = {officer_badge}
#let officer_site = {officer_site}
#let victims = {victims}
#let accused = {accused}
#let evidence = {evidence}
#let notes = {notes}

"##,
        case_number = lit(&c.case_number()),
        generated_at = lit(&stamp(params.generated_at)),
        filed_at = lit(&stamp(c.created_at)),
        complaint_type = lit(&c.complaint_type),
        status = lit(c.status.as_str()),
        emergency = c.emergency,
        anonymous = c.anonymous,
        incident_date = lit(&c.incident_date.format("%Y-%m-%d").to_string()),
        incident_time = lit(&c.incident_time.format("%H:%M").to_string()),
        location = lit(&c.location),
        landmark = opt_lit(c.nearest_landmark.as_deref()),
        description = lit(&c.description),
        relation = opt_lit(c.relation_to_victim.as_deref()),
        reporter_name = lit(&reporter_name),
        reporter_email = opt_lit(params.reporter.filter(|_| !c.anonymous).map(|r| r.email.as_str())),
        officer_name = opt_lit(params.officer.map(|o| o.full_name.as_str())),
        officer_badge = opt_lit(params.officer.and_then(|o| o.badge_number.as_deref())),
        officer_site = opt_lit(params.officer.and_then(|o| o.posting_site.as_deref())),
        victims = victims,
        accused = accused,
        evidence = evidence,
        notes = notes,
    );

    let template = include_str!("../../../templates/fir.typ");
    Report::new(format!("{bindings}{template}"), params.generated_at)
}

/// The administrative statistics report.
pub fn statistics_report(stats: &ComplaintStatistics, generated_at: DateTime<Utc>) -> Report {
    let counts = |entries: &[shared_types::CountEntry]| {
        array(
            entries
                .iter()
                .map(|e| {
                    dict(&[
                        ("label", lit(&e.label)),
                        ("count", lit(&e.count.to_string())),
                        ("share", lit(&format!("{:.1}%", e.percentage))),
                    ])
                })
                .collect(),
        )
    };
    let workload = array(
        stats
            .officer_workload
            .iter()
            .map(|w| {
                dict(&[
                    ("name", lit(&w.full_name)),
                    ("badge", opt_lit(w.badge_number.as_deref())),
                    ("assigned", lit(&w.assigned_cases.to_string())),
                    ("open", lit(&w.open_cases.to_string())),
                ])
            })
            .collect(),
    );

    let bindings = format!(
        r##"#let generated_at = {generated_at}
#let summary = {summary}
#let by_type = {by_type}
#let by_status = {by_status}
#let workload = {workload}

"##,
        generated_at = lit(&stamp(generated_at)),
        summary = array(
            [
                ("Total complaints", stats.total_complaints.to_string()),
                ("Active cases", stats.active_cases.to_string()),
                ("Closed cases", stats.closed_cases.to_string()),
                ("Withdrawn cases", stats.withdrawn_cases.to_string()),
                ("Unassigned cases", stats.unassigned_cases.to_string()),
                ("Resolution rate", format!("{}%", stats.resolution_rate)),
                ("Total officers", stats.total_officers.to_string()),
                ("Verified officers", stats.verified_officers.to_string()),
            ]
            .iter()
            .map(|(label, value)| format!("({}, {})", lit(label), lit(value)))
            .collect(),
        ),
        by_type = counts(&stats.by_type),
        by_status = counts(&stats.by_status),
        workload = workload,
    );

    let template = include_str!("../../../templates/statistics.typ");
    Report::new(format!("{bindings}{template}"), generated_at)
}

static FONTS: LazyLock<Vec<Font>> = LazyLock::new(|| {
    typst_assets::fonts()
        .flat_map(|data| Font::iter(Bytes::new(data)))
        .collect()
});

static FONT_BOOK: LazyLock<LazyHash<FontBook>> =
    LazyLock::new(|| LazyHash::new(FontBook::from_fonts(FONTS.iter())));

static LIBRARY: LazyLock<LazyHash<Library>> = LazyLock::new(|| LazyHash::new(Library::default()));

/// A fully bound report source, ready to compile.
pub struct Report {
    source: Source,
    generated_at: DateTime<Utc>,
}

impl Report {
    fn new(text: String, generated_at: DateTime<Utc>) -> Self {
        Self {
            source: Source::detached(text),
            generated_at,
        }
    }

    /// Compile to PDF on a blocking thread.
    pub async fn render(self) -> Result<Vec<u8>, AppError> {
        tokio::task::spawn_blocking(move || self.render_blocking())
            .await
            .map_err(|e| AppError::internal(format!("Report rendering task failed: {e}")))?
    }

    fn render_blocking(&self) -> Result<Vec<u8>, AppError> {
        let document = typst::compile::<PagedDocument>(self)
            .output
            .map_err(|diagnostics| report_error("Report layout failed", &diagnostics))?;
        typst_pdf::pdf(&document, &typst_pdf::PdfOptions::default())
            .map_err(|diagnostics| report_error("PDF export failed", &diagnostics))
    }
}

/// A report is its own single-file Typst world. `today()` is the report's
/// generation date, so the same inputs always lay out the same way.
impl World for Report {
    fn library(&self) -> &LazyHash<Library> {
        &LIBRARY
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &FONT_BOOK
    }

    fn main(&self) -> FileId {
        self.source.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.source.id() {
            Ok(self.source.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rooted_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rooted_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        FONTS.get(index).cloned()
    }

    fn today(&self, offset: Option<i64>) -> Option<Datetime> {
        let date = match offset {
            Some(hours) => {
                let tz = FixedOffset::east_opt(i32::try_from(hours).ok()?.checked_mul(3600)?)?;
                self.generated_at.with_timezone(&tz).date_naive()
            }
            None => self.generated_at.date_naive(),
        };
        Datetime::from_ymd(date.year(), date.month() as u8, date.day() as u8)
    }
}

fn report_error(stage: &str, diagnostics: &EcoVec<SourceDiagnostic>) -> AppError {
    let detail = diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    tracing::error!(%detail, "{stage}");
    AppError::internal(format!("{stage}: {detail}"))
}
