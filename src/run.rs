use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use strum::VariantNames;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, to_hours, GroupBy};
use crate::billing::compose_services;
use crate::calendar::{parse_calendar, CalendarEvent};
use crate::cli::Opts;
use crate::config::Config;
use crate::document;
use crate::error::{
    CalendarError, ConfigError, DateError, DocumentError, RenderError,
};
use crate::templates::{compose_invoice, InvoiceTemplate};
use crate::window::{parse_date, parse_month, TimeWindow};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Date {
        #[from]
        source: DateError,
    },

    #[error("{source}")]
    Calendar {
        #[from]
        source: CalendarError,
    },

    #[error("{source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("{source}")]
    Render {
        #[from]
        source: RenderError,
    },

    #[error("{source}")]
    Document {
        #[from]
        source: DocumentError,
    },

    #[error(
        "Unknown grouping field '{value}', expected one of: {}",
        GroupBy::VARIANTS.join(", ")
    )]
    GroupBy { value: String },
}

/// Command line values that take precedence over the config.
#[derive(Debug, Default, PartialEq)]
struct Overrides {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    month: Option<TimeWindow>,
    group_by: Option<GroupBy>,
    date: Option<String>,
}

impl Overrides {
    fn from_opts(opts: &Opts) -> Result<Self, RunError> {
        let month = match opts.month.as_deref() {
            Some(input) => Some(
                TimeWindow::month(parse_month(input)?).ok_or_else(|| {
                    DateError::Month {
                        input: input.to_string(),
                    }
                })?,
            ),
            None => None,
        };
        let group_by = opts
            .group_by
            .as_deref()
            .map(|value| {
                GroupBy::from_str(value).map_err(|_| RunError::GroupBy {
                    value: value.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            start: opts.start.as_deref().map(parse_date).transpose()?,
            end: opts.end.as_deref().map(parse_date).transpose()?,
            month,
            group_by,
            date: opts.date.clone(),
        })
    }

    fn apply(self, config: &mut Config) {
        if let Some(window) = self.month {
            config.invoice.start = window.start;
            config.invoice.end = window.end;
        }
        if self.start.is_some() {
            config.invoice.start = self.start;
        }
        if self.end.is_some() {
            config.invoice.end = self.end;
        }
        if self.group_by.is_some() {
            config.group_by = self.group_by;
        }
        if self.date.is_some() {
            config.invoice.date = self.date;
        }
    }
}

fn read(path: &Path) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|source| RunError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn run(opts: Opts) -> Result<(), RunError> {
    let stdout = io::stdout();
    run_with_output(opts, &mut stdout.lock())
}

fn run_with_output<W: Write>(opts: Opts, out: &mut W) -> Result<(), RunError> {
    // Dates are checked before anything is read.
    let overrides = Overrides::from_opts(&opts)?;

    let events = parse_calendar(&read(&opts.calendar)?)?;
    let mut config = Config::load(&opts.config)?;
    overrides.apply(&mut config);

    let window = config.window();
    let group_by = config.group_by.unwrap_or_default();
    debug!(events = events.len(), %window, %group_by, "calendar loaded");

    if opts.no_invoice {
        report(&events, &window, group_by, out)?;
        return Ok(());
    }

    let template = match &opts.template {
        Some(path) => InvoiceTemplate::Source(read(path)?),
        None => InvoiceTemplate::Bundled,
    };

    for service in config.service.iter() {
        debug!(%service, "price");
    }
    let durations = aggregate(&events, &window, group_by);
    if durations.is_empty() {
        warn!(%window, "no time tracked inside the invoice window");
    }
    debug!(groups = durations.len(), "durations aggregated");
    let services = compose_services(&durations, &config.price_table());
    for diagnostic in services.diagnostics.iter() {
        warn!("{}", diagnostic);
    }
    for line in services.lines.iter() {
        debug!(%line, "service");
    }

    let latex = compose_invoice(
        &config.invoice,
        &config.contract,
        &config.company,
        &config.client,
        &template,
        &services.lines,
        config.invoice.date.as_deref(),
    )?;

    if opts.latex {
        writeln!(out, "{}", latex)?;
        return Ok(());
    }

    let path = config.output_path();
    document::write_docx(&latex, &path, config.reference_doc.as_deref())?;
    info!(path = %path.display(), "invoice written");
    writeln!(out, "{}", path.display())?;
    Ok(())
}

/// Print the time spent per group, without any pricing.
pub fn report<W: Write>(
    events: &[CalendarEvent],
    window: &TimeWindow,
    group_by: GroupBy,
    out: &mut W,
) -> io::Result<()> {
    for (name, duration) in aggregate(events, window, group_by).iter() {
        writeln!(out, "{}: {}h", name, display_hours(to_hours(duration)))?;
    }
    Ok(())
}

fn display_hours(hours: Decimal) -> Decimal {
    hours.round_dp(2).normalize()
}
