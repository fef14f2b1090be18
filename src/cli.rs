use clap::{Parser, ValueHint};
use std::path::PathBuf;

/* Argument Stucture
 *
 * calinvoice <calendar.ics>
 *      [--config <file>] [--template <file>]
 *      [--start <date>] [--end <date>] | [--month <YYYY-MM>]
 *      [--group-by <field>] [--date <text>]
 *      [--no-invoice | --latex]
 */

/// Make an invoice from the time tracked in an iCalendar ics file
#[derive(Parser)]
#[clap(name = "calinvoice", version)]
pub struct Opts {
    /// Calendar file to read events from
    #[clap(value_hint=ValueHint::FilePath)]
    pub calendar: PathBuf,

    /// Invoice configuration (company, client, contract and service prices)
    #[clap(long, default_value="configs/config_example.yaml",
        value_hint=ValueHint::FilePath)]
    pub config: PathBuf,

    /// Invoice template, the bundled LaTeX template is used when omitted
    #[clap(long, value_hint=ValueHint::FilePath)]
    pub template: Option<PathBuf>,

    /// Only count time after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[clap(long)]
    pub start: Option<String>,

    /// Only count time before this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[clap(long)]
    pub end: Option<String>,

    /// Count time for a whole month (YYYY-MM)
    #[clap(long, conflicts_with_all=["start", "end"])]
    pub month: Option<String>,

    /// Event field used to group time into services
    #[clap(long, value_parser=["summary", "title", "description",
        "location", "categories"])]
    pub group_by: Option<String>,

    /// Date printed on the invoice, defaults to today
    #[clap(long)]
    pub date: Option<String>,

    /// Don't generate an invoice, only display the time sum per event
    #[clap(long)]
    pub no_invoice: bool,

    /// Print the filled template instead of converting it to a document
    #[clap(long, conflicts_with="no_invoice")]
    pub latex: bool,
}
