//! Pricing policy and the quote calculation
//!
//! Prices are computed with exact decimal arithmetic so that the same
//! (spot type, window, policy) always yields the same amount.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::reservation::TimeWindow;
use crate::domain::spot::SpotType;
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Hourly base rate per spot type, in whole currency units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRates {
    pub standard: Decimal,
    pub compact: Decimal,
    pub accessible: Decimal,
    pub electric: Decimal,
}

impl BaseRates {
    pub fn rate_for(&self, spot_type: SpotType) -> Decimal {
        match spot_type {
            SpotType::Standard => self.standard,
            SpotType::Compact => self.compact,
            SpotType::Accessible => self.accessible,
            SpotType::Electric => self.electric,
        }
    }
}

/// Daily hour range, both bounds inclusive (`8..=10` covers 08:00-10:59)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourRange {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour <= self.end_hour
    }
}

/// Bookings strictly longer than `over_hours` are multiplied by `multiplier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub over_hours: Decimal,
    pub multiplier: Decimal,
}

/// Immutable pricing configuration. Missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub base_rates: BaseRates,
    pub peak_hours: Vec<HourRange>,
    pub peak_multiplier: Decimal,
    pub off_peak_multiplier: Decimal,
    /// Start hours strictly before this are off-peak
    pub off_peak_before_hour: u32,
    /// Start hours strictly after this are off-peak
    pub off_peak_after_hour: u32,
    pub duration_discounts: Vec<DiscountTier>,
    /// Facility wall-clock offset used to read the start hour
    pub utc_offset_minutes: i32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_rates: BaseRates {
                standard: Decimal::from(50),
                compact: Decimal::from(40),
                accessible: Decimal::from(45),
                electric: Decimal::from(60),
            },
            peak_hours: vec![HourRange::new(8, 10), HourRange::new(17, 19)],
            peak_multiplier: Decimal::new(15, 1),
            off_peak_multiplier: Decimal::new(8, 1),
            off_peak_before_hour: 6,
            off_peak_after_hour: 22,
            duration_discounts: vec![
                DiscountTier {
                    over_hours: Decimal::from(6),
                    multiplier: Decimal::new(9, 1),
                },
                DiscountTier {
                    over_hours: Decimal::from(12),
                    multiplier: Decimal::new(8, 1),
                },
            ],
            utc_offset_minutes: 0,
        }
    }
}

impl PricingPolicy {
    /// Reject configurations that would produce nonsensical prices.
    pub fn validate(&self) -> DomainResult<()> {
        for spot_type in SpotType::ALL {
            if self.base_rates.rate_for(spot_type).is_sign_negative() {
                return Err(DomainError::InvalidRequest(format!(
                    "negative base rate for {}",
                    spot_type
                )));
            }
        }
        for range in &self.peak_hours {
            if range.start_hour > range.end_hour || range.end_hour > 23 {
                return Err(DomainError::InvalidRequest(format!(
                    "invalid peak range {}..={}",
                    range.start_hour, range.end_hour
                )));
            }
        }
        if self.peak_multiplier.is_sign_negative() || self.off_peak_multiplier.is_sign_negative()
        {
            return Err(DomainError::InvalidRequest(
                "multipliers must not be negative".into(),
            ));
        }
        if self.off_peak_before_hour > 24 || self.off_peak_after_hour > 23 {
            return Err(DomainError::InvalidRequest(
                "off-peak cutoffs must be hours of the day".into(),
            ));
        }
        for tier in &self.duration_discounts {
            if tier.over_hours.is_sign_negative() || tier.multiplier.is_sign_negative() {
                return Err(DomainError::InvalidRequest(
                    "discount tiers must not be negative".into(),
                ));
            }
        }
        self.offset()?;
        Ok(())
    }

    pub fn offset(&self) -> DomainResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            DomainError::InvalidRequest(format!(
                "utc offset {} minutes is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Facility-local hour of `instant`
    pub fn local_hour(&self, instant: DateTime<Utc>) -> DomainResult<u32> {
        Ok(instant.with_timezone(&self.offset()?).hour())
    }

    pub fn time_multiplier(&self, start_hour: u32) -> Decimal {
        if self.peak_hours.iter().any(|r| r.contains(start_hour)) {
            self.peak_multiplier
        } else if start_hour < self.off_peak_before_hour || start_hour > self.off_peak_after_hour {
            self.off_peak_multiplier
        } else {
            Decimal::ONE
        }
    }

    /// Factor of the longest threshold the duration strictly exceeds.
    pub fn discount_factor(&self, duration_hours: Decimal) -> Decimal {
        self.duration_discounts
            .iter()
            .filter(|tier| duration_hours > tier.over_hours)
            .max_by(|a, b| a.over_hours.cmp(&b.over_hours))
            .map(|tier| tier.multiplier)
            .unwrap_or(Decimal::ONE)
    }
}

/// Result of a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub spot_type: SpotType,
    /// Hourly base rate
    pub base_price: Decimal,
    pub duration_hours: Decimal,
    pub multiplier: Decimal,
    pub discount_factor: Decimal,
    /// Rounded half away from zero to whole currency units
    pub final_price: i64,
}

/// Quote a booking. An `end` earlier than `start` is read as the next day.
pub fn quote(
    spot_type: SpotType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    policy: &PricingPolicy,
) -> DomainResult<PriceBreakdown> {
    let window = TimeWindow::resolve(start, end)?;
    quote_window(spot_type, &window, policy)
}

/// Quote an already resolved window.
pub fn quote_window(
    spot_type: SpotType,
    window: &TimeWindow,
    policy: &PricingPolicy,
) -> DomainResult<PriceBreakdown> {
    let seconds = (window.end - window.start).num_seconds();
    if seconds <= 0 {
        return Err(DomainError::InvalidWindow(
            "end must be after start".into(),
        ));
    }

    let duration_hours = Decimal::from(seconds) / Decimal::from(3600);
    let base_price = policy.base_rates.rate_for(spot_type);
    let multiplier = policy.time_multiplier(policy.local_hour(window.start)?);
    let discount_factor = policy.discount_factor(duration_hours);

    let final_price = (base_price * duration_hours * multiplier * discount_factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| DomainError::InvalidRequest("price out of range".into()))?;

    Ok(PriceBreakdown {
        spot_type,
        base_price,
        duration_hours: duration_hours.normalize(),
        multiplier,
        discount_factor,
        final_price,
    })
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, day, hour, minute, 0).unwrap()
    }

    fn policy() -> PricingPolicy {
        PricingPolicy::default()
    }

    #[test]
    fn standard_peak_morning() {
        let q = quote(SpotType::Standard, at(1, 9, 0), at(1, 11, 0), &policy()).unwrap();
        assert_eq!(q.duration_hours, Decimal::from(2));
        assert_eq!(q.multiplier, Decimal::new(15, 1));
        assert_eq!(q.discount_factor, Decimal::ONE);
        assert_eq!(q.final_price, 150);
    }

    #[test]
    fn electric_exactly_six_hours_gets_no_discount() {
        let q = quote(SpotType::Electric, at(1, 14, 0), at(1, 20, 0), &policy()).unwrap();
        assert_eq!(q.duration_hours, Decimal::from(6));
        assert_eq!(q.multiplier, Decimal::ONE);
        assert_eq!(q.discount_factor, Decimal::ONE);
        assert_eq!(q.final_price, 360);
    }

    #[test]
    fn compact_overnight_wraps_to_next_day() {
        // end given on the same date as start, before it
        let q = quote(SpotType::Compact, at(1, 23, 0), at(1, 1, 0), &policy()).unwrap();
        assert_eq!(q.duration_hours, Decimal::from(2));
        assert_eq!(q.multiplier, Decimal::new(8, 1));
        assert_eq!(q.final_price, 64);
    }

    #[test]
    fn just_over_six_hours_is_discounted() {
        let q = quote(SpotType::Electric, at(1, 12, 0), at(1, 18, 1), &policy()).unwrap();
        assert_eq!(q.discount_factor, Decimal::new(9, 1));
    }

    #[test]
    fn exactly_twelve_hours_gets_smaller_discount_only() {
        let q = quote(SpotType::Standard, at(1, 11, 0), at(1, 23, 0), &policy()).unwrap();
        assert_eq!(q.discount_factor, Decimal::new(9, 1));
        // 50 * 12 * 1.0 * 0.9
        assert_eq!(q.final_price, 540);
    }

    #[test]
    fn over_twelve_hours_gets_largest_discount() {
        let q = quote(SpotType::Standard, at(1, 11, 0), at(2, 0, 0), &policy()).unwrap();
        assert_eq!(q.discount_factor, Decimal::new(8, 1));
        // 50 * 13 * 1.0 * 0.8
        assert_eq!(q.final_price, 520);
    }

    #[test]
    fn peak_upper_bound_is_inclusive() {
        let p = policy();
        assert_eq!(p.time_multiplier(10), Decimal::new(15, 1));
        assert_eq!(p.time_multiplier(19), Decimal::new(15, 1));
        assert_eq!(p.time_multiplier(11), Decimal::ONE);
    }

    #[test]
    fn off_peak_cutoffs_are_strict() {
        let p = policy();
        assert_eq!(p.time_multiplier(5), Decimal::new(8, 1));
        assert_eq!(p.time_multiplier(6), Decimal::ONE);
        assert_eq!(p.time_multiplier(22), Decimal::ONE);
        assert_eq!(p.time_multiplier(23), Decimal::new(8, 1));
    }

    #[test]
    fn half_unit_rounds_away_from_zero() {
        // 45 * 1 * 1.5 = 67.5
        let q = quote(SpotType::Accessible, at(1, 8, 0), at(1, 9, 0), &policy()).unwrap();
        assert_eq!(q.final_price, 68);
    }

    #[test]
    fn fractional_hours_are_priced() {
        // 20 minutes of peak standard: 50 * 1/3 * 1.5 = 25
        let q = quote(SpotType::Standard, at(1, 9, 0), at(1, 9, 20), &policy()).unwrap();
        assert_eq!(q.final_price, 25);
    }

    #[test]
    fn zero_length_window_is_invalid() {
        let err = quote(SpotType::Standard, at(1, 9, 0), at(1, 9, 0), &policy()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidWindow(_)));
    }

    #[test]
    fn quote_is_deterministic() {
        let p = policy();
        let a = quote(SpotType::Compact, at(3, 7, 15), at(3, 19, 45), &p).unwrap();
        let b = quote(SpotType::Compact, at(3, 7, 15), at(3, 19, 45), &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn utc_offset_shifts_the_start_hour() {
        let mut p = policy();
        p.utc_offset_minutes = 5 * 60;
        // 04:00 UTC is 09:00 local -> peak
        let q = quote(SpotType::Standard, at(1, 4, 0), at(1, 6, 0), &p).unwrap();
        assert_eq!(q.multiplier, Decimal::new(15, 1));
    }

    #[test]
    fn default_policy_is_valid_and_bad_ranges_are_not() {
        assert!(policy().validate().is_ok());

        let mut p = policy();
        p.peak_hours.push(HourRange::new(20, 18));
        assert!(p.validate().is_err());

        let mut p = policy();
        p.utc_offset_minutes = 30 * 60;
        assert!(p.validate().is_err());
    }
}
