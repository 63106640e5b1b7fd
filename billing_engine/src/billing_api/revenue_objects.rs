use std::{collections::HashMap, fmt::Display, str::FromStr};

use billing_common::Amount;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl FromStr for RevenuePeriod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(RevenuePeriod::Year),
            "month" => Ok(RevenuePeriod::Month),
            "week" => Ok(RevenuePeriod::Week),
            "day" => Ok(RevenuePeriod::Day),
            "hour" => Ok(RevenuePeriod::Hour),
            _ => Err(ConversionError(format!("Invalid revenue period: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicRequest {
    pub projects: Vec<String>,
    pub period: RevenuePeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Identifies one bucket of a revenue report. Only the components relevant to the period are set.
///
/// | period | components                 |
/// |--------|----------------------------|
/// | year   | year                       |
/// | month  | year, month                |
/// | week   | year, week                 |
/// | day    | year, month, day           |
/// | hour   | year, month, day, hour     |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevenuePointKey {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

impl RevenuePointKey {
    /// The bucket `timestamp` falls into. Weeks are numbered like sqlite's `%W`: week 1 starts on the year's first
    /// Monday and earlier days are in week 0.
    pub fn for_timestamp(period: RevenuePeriod, timestamp: DateTime<Utc>) -> Self {
        let year = timestamp.year();
        let mut key = Self { year, ..Default::default() };
        match period {
            RevenuePeriod::Year => {},
            RevenuePeriod::Month => key.month = Some(timestamp.month()),
            RevenuePeriod::Week => {
                let weekday = timestamp.weekday().num_days_from_monday();
                key.week = Some((timestamp.ordinal0() + 7 - weekday) / 7);
            },
            RevenuePeriod::Day => {
                key.month = Some(timestamp.month());
                key.day = Some(timestamp.day());
            },
            RevenuePeriod::Hour => {
                key.month = Some(timestamp.month());
                key.day = Some(timestamp.day());
                key.hour = Some(timestamp.hour());
            },
        }
        key
    }
}

impl Display for RevenuePointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(week) = self.week {
            write!(f, "-W{week:02}")?;
        }
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
        }
        if let Some(day) = self.day {
            write!(f, "-{day:02}")?;
        }
        if let Some(hour) = self.hour {
            write!(f, "T{hour:02}")?;
        }
        Ok(())
    }
}

/// The total of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetPoint {
    pub key: RevenuePointKey,
    pub total: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSummary {
    pub count: i64,
    pub total: Amount,
    pub avg: Amount,
}

impl FacetSummary {
    pub fn new(count: i64, total: Amount) -> Self {
        let avg = if count > 0 { Amount::from_f64(total.as_f64() / count as f64) } else { Amount::ZERO };
        Self { count, total, avg }
    }
}

/// Raw revenue and refund aggregates, as produced by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicFacets {
    pub points_revenue: Vec<FacetPoint>,
    pub points_refund: Vec<FacetPoint>,
    pub revenue: FacetSummary,
    pub refund: FacetSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicPoint {
    pub date: RevenuePointKey,
    /// Revenue less refunds for the bucket
    pub amount: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueDynamicResult {
    pub points: Vec<RevenueDynamicPoint>,
    pub revenue: FacetSummary,
    pub refund: FacetSummary,
}

impl From<RevenueDynamicFacets> for RevenueDynamicResult {
    /// One point per revenue bucket. Refunds are subtracted from the revenue bucket with the same key; refund
    /// buckets without revenue do not produce a point.
    fn from(facets: RevenueDynamicFacets) -> Self {
        let refunds = facets.points_refund.iter().map(|p| (p.key.to_string(), p.total)).collect::<HashMap<_, _>>();
        let points = facets
            .points_revenue
            .iter()
            .map(|p| {
                let refund = refunds.get(&p.key.to_string()).copied().unwrap_or_default();
                RevenueDynamicPoint { date: p.key, amount: p.total - refund }
            })
            .collect();
        Self { points, revenue: facets.revenue, refund: facets.refund }
    }
}
