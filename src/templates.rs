use std::fmt;

use askama::Template;
use askama_escape::Escaper;
use chrono::Local;
use minijinja::value::Value;
use minijinja::{Environment, Error, ErrorKind, Output, State, UndefinedBehavior};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::billing::{format_hours, format_money, grand_total, ServiceLine};
use crate::config::{Contract, InvoiceMeta, Party};
use crate::error::RenderError;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Where the invoice template comes from.
pub enum InvoiceTemplate {
    /// `templates/invoice.tex`, compiled in.
    Bundled,
    /// Jinja source read at runtime.
    Source(String),
}

#[derive(Template, Serialize)]
#[template(path = "invoice.tex")]
pub struct InvoiceData<'a> {
    pub invoice: &'a InvoiceMeta,
    pub contract: &'a Contract,
    pub company: &'a Party,
    pub client: &'a Party,
    pub services: &'a [ServiceLine],
    pub total: Decimal,
    pub date: String,
}

pub fn compose_invoice(
    invoice: &InvoiceMeta,
    contract: &Contract,
    company: &Party,
    client: &Party,
    template: &InvoiceTemplate,
    services: &[ServiceLine],
    date: Option<&str>,
) -> Result<String, RenderError> {
    let data = InvoiceData {
        invoice,
        contract,
        company,
        client,
        services,
        total: grand_total(services),
        date: date.map_or_else(
            || Local::now().format(DATE_FORMAT).to_string(),
            String::from,
        ),
    };

    match template {
        InvoiceTemplate::Bundled => Ok(data.render()?),
        InvoiceTemplate::Source(source) => Ok(render_source(source, &data)?),
    }
}

fn render_source(source: &str, data: &InvoiceData) -> Result<String, Error> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_formatter(tex_formatter);
    env.add_filter("money", money_filter);
    env.add_filter("hours", hours_filter);
    env.add_filter("lines", lines_filter);
    env.add_template("invoice", source)?;
    env.get_template("invoice")?.render(data)
}

fn tex_formatter(
    out: &mut Output,
    _state: &State,
    value: &Value,
) -> Result<(), Error> {
    let text = value.to_string();
    let written = if value.is_safe() {
        fmt::Write::write_str(out, &text)
    } else {
        Tex.write_escaped(&mut *out, &text)
    };
    written.map_err(|_| Error::new(ErrorKind::WriteFailure, "formatting failed"))
}

fn to_decimal(value: f64) -> Result<Decimal, Error> {
    Decimal::from_f64(value).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("{} is not a representable amount", value),
        )
    })
}

fn money_filter(value: f64) -> Result<String, Error> {
    Ok(format_money(to_decimal(value)?))
}

fn hours_filter(value: f64) -> Result<String, Error> {
    Ok(format_hours(to_decimal(value)?))
}

fn lines_filter(value: String) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

mod filters {
    use super::*;

    pub trait Amount {
        fn amount(&self) -> Decimal;
    }

    impl Amount for Decimal {
        fn amount(&self) -> Decimal {
            *self
        }
    }

    impl<T: Amount + ?Sized> Amount for &T {
        fn amount(&self) -> Decimal {
            (**self).amount()
        }
    }

    pub fn money<T: Amount>(value: T) -> askama::Result<String> {
        Ok(format_money(value.amount()))
    }

    pub fn hours<T: Amount>(value: T) -> askama::Result<String> {
        Ok(format_hours(value.amount()))
    }
}

/// Escapes characters LaTeX treats as markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tex;

impl Escaper for Tex {
    fn write_escaped<W>(&self, mut fmt: W, string: &str) -> fmt::Result
    where
        W: fmt::Write,
    {
        for c in string.chars() {
            match c {
                '%' => fmt.write_str("\\%")?,
                '$' => fmt.write_str("\\$")?,
                '&' => fmt.write_str("\\&")?,
                '#' => fmt.write_str("\\#")?,
                '_' => fmt.write_str("\\_")?,
                '{' => fmt.write_str("\\{")?,
                '}' => fmt.write_str("\\}")?,
                '\\' => fmt.write_str("\\textbackslash{}")?,
                '~' => fmt.write_str("\\textasciitilde{}")?,
                '^' => fmt.write_str("\\textasciicircum{}")?,
                _ => fmt.write_char(c)?,
            }
        }
        Ok(())
    }
}
