use std::collections::HashMap;
use std::fmt;

use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::aggregate::{to_hours, DurationByGroup};

/// A billable service as listed in the config.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Service {
    pub name: String,
    pub price: Decimal,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}/h", self.name, format_money(self.price))
    }
}

/// Non-fatal advisories produced while pricing.
#[derive(Debug, PartialEq, Clone)]
pub enum Diagnostic {
    MissingPrice { service: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::MissingPrice { service } => write!(
                f,
                "{} not in the config, assigning its price to 0",
                service
            ),
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct PriceTable {
    prices: HashMap<String, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    pub fn insert(&mut self, service: &str, price: Decimal) {
        self.prices.insert(service.to_string(), price);
    }

    /// Hourly price of a service, zero with a diagnostic when it isn't listed.
    pub fn lookup(&self, service: &str) -> (Decimal, Option<Diagnostic>) {
        match self.prices.get(service) {
            Some(price) => (*price, None),
            None => (
                Decimal::ZERO,
                Some(Diagnostic::MissingPrice {
                    service: service.to_string(),
                }),
            ),
        }
    }
}

impl<'a> FromIterator<&'a Service> for PriceTable {
    fn from_iter<I: IntoIterator<Item = &'a Service>>(services: I) -> Self {
        let mut table = Self::new();
        for service in services {
            table.insert(&service.name, service.price);
        }
        table
    }
}

#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct ServiceLine {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
}

impl ServiceLine {
    pub fn new(name: &str, quantity: Decimal, price: Decimal) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            price,
            total: quantity * price,
        }
    }
}

impl fmt::Display for ServiceLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}h @ {}: {}",
            self.name,
            format_hours(self.quantity),
            format_money(self.price),
            format_money(self.total)
        )
    }
}

/// Priced lines in discovery order, with whatever diagnostics pricing raised.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Services {
    pub lines: Vec<ServiceLine>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compose_services(
    durations: &DurationByGroup,
    prices: &PriceTable,
) -> Services {
    let mut services = Services::default();
    for (name, duration) in durations.iter() {
        let (price, diagnostic) = prices.lookup(name);
        services.diagnostics.extend(diagnostic);
        services
            .lines
            .push(ServiceLine::new(name, to_hours(duration), price));
    }
    services
}

pub fn grand_total(lines: &[ServiceLine]) -> Decimal {
    lines.iter().map(|l| l.total).sum()
}

/// Two decimal places with thousands separators, e.g. `1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded =
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let whole = rounded.trunc().abs().to_u128().unwrap_or_default();
    let cents = (rounded.fract().abs() * Decimal::ONE_HUNDRED)
        .to_u32()
        .unwrap_or_default();
    format!(
        "{}{}.{:02}",
        sign,
        whole.to_formatted_string(&Locale::en),
        cents
    )
}

pub fn format_hours(hours: Decimal) -> String {
    format!("{:.2}", hours)
}
