//! Cashback rows as read off a bank statement screenshot.
//!
//! A row carries the three fields the model extracts (`Category`, `Percent`,
//! `Bank`), two fields stamped by the pipeline (`Person`, `Date`), and two
//! optional extras (`Limit, ₽`, `Info`). Serde names match the column names
//! of the target database so the model can be prompted with them directly.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::Value;

/// A named column of a [`Row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowField {
    Category,
    Percent,
    Bank,
    Person,
    Date,
    Limit,
    Info,
}

impl RowField {
    /// Fields every persisted row must carry, in the order they are checked.
    pub const REQUIRED: [RowField; 5] = [
        RowField::Category,
        RowField::Percent,
        RowField::Bank,
        RowField::Person,
        RowField::Date,
    ];

    /// Column name in the target database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Percent => "Percent",
            Self::Bank => "Bank",
            Self::Person => "Person",
            Self::Date => "Date",
            Self::Limit => "Limit, ₽",
            Self::Info => "Info",
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cashback entry.
///
/// A required column the model sent as an explicit `null` counts as
/// specified: it is written empty and left for the user to correct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawRow")]
pub struct Row {
    pub category: Option<String>,
    pub percent: Option<f64>,
    pub bank: Option<String>,
    pub person: Option<String>,
    /// ISO date (`YYYY-MM-DD`) of the billing period start.
    pub date: Option<String>,
    pub limit: Option<f64>,
    pub info: Option<String>,
    nulls: BTreeSet<RowField>,
}

/// Wire shape of a row. For required columns the outer `Option` records
/// whether the key was present at all.
#[derive(Deserialize)]
struct RawRow {
    #[serde(rename = "Category", default, deserialize_with = "declared_text")]
    category: Option<Option<String>>,
    #[serde(rename = "Percent", default, deserialize_with = "declared_number")]
    percent: Option<Option<f64>>,
    #[serde(rename = "Bank", default, deserialize_with = "declared_text")]
    bank: Option<Option<String>>,
    #[serde(rename = "Person", default, deserialize_with = "declared_text")]
    person: Option<Option<String>>,
    #[serde(rename = "Date", default, deserialize_with = "declared_text")]
    date: Option<Option<String>>,
    #[serde(
        rename = "Limit, ₽",
        alias = "Limit",
        default,
        deserialize_with = "lenient_number"
    )]
    limit: Option<f64>,
    #[serde(rename = "Info", default, deserialize_with = "lenient_text")]
    info: Option<String>,
}

impl From<RawRow> for Row {
    fn from(raw: RawRow) -> Self {
        let mut nulls: BTreeSet<RowField> = BTreeSet::new();
        let mut take = |field: RowField, value: Option<Option<String>>| {
            if matches!(value, Some(None)) {
                nulls.insert(field);
            }
            value.flatten()
        };
        let category = take(RowField::Category, raw.category);
        let bank = take(RowField::Bank, raw.bank);
        let person = take(RowField::Person, raw.person);
        let date = take(RowField::Date, raw.date);
        if matches!(raw.percent, Some(None)) {
            nulls.insert(RowField::Percent);
        }

        Self {
            category,
            percent: raw.percent.flatten(),
            bank,
            person,
            date,
            limit: raw.limit,
            info: raw.info,
            nulls,
        }
    }
}

impl Row {
    /// Row with the three model-extracted fields set.
    pub fn new(category: impl Into<String>, percent: f64, bank: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            percent: Some(percent),
            bank: Some(bank.into()),
            ..Self::default()
        }
    }

    /// Whether `field` holds a value.
    pub fn has(&self, field: RowField) -> bool {
        match field {
            RowField::Category => self.category.is_some(),
            RowField::Percent => self.percent.is_some(),
            RowField::Bank => self.bank.is_some(),
            RowField::Person => self.person.is_some(),
            RowField::Date => self.date.is_some(),
            RowField::Limit => self.limit.is_some(),
            RowField::Info => self.info.is_some(),
        }
    }

    /// Whether `field` was given explicitly as null.
    pub fn is_null(&self, field: RowField) -> bool {
        self.nulls.contains(&field)
    }

    /// First required field that is neither set nor explicitly null, in
    /// [`RowField::REQUIRED`] order.
    pub fn missing_required(&self) -> Option<RowField> {
        RowField::REQUIRED
            .into_iter()
            .find(|f| !self.has(*f) && !self.is_null(*f))
    }

    /// Overwrite `Person` and `Date`.
    pub fn stamp(&mut self, person: &str, date: &str) {
        self.person = Some(person.to_string());
        self.date = Some(date.to_string());
    }

    /// Set `Person` and `Date` only where they are still absent.
    pub fn fill_identity(&mut self, person: &str, date: &str) {
        if self.person.is_none() {
            self.person = Some(person.to_string());
        }
        if self.date.is_none() {
            self.date = Some(date.to_string());
        }
    }
}

/// Accepts strings, numbers and booleans (stringified) or null.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!("expected text, got {other}"))),
    }
}

fn declared_text<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Some)
}

fn declared_number<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(Some)
}

/// Accepts numbers, numeric strings (`"5"`, `"5.5%"`, `"1,5"`) or null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("number out of range: {n}"))),
        Value::String(s) => {
            let cleaned = s.trim().trim_end_matches('%').trim().replace(',', ".");
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("not a number: {s:?}")))
        }
        other => Err(de::Error::custom(format!("expected number, got {other}"))),
    }
}
