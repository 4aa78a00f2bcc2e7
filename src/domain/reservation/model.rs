//! Reservation domain entity

use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::pricing::PriceBreakdown;
use crate::domain::spot::SpotType;
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Half-open booking window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, reading an `end` before `start` as the next day.
    pub fn resolve(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        let end = if end < start {
            end + Duration::days(1)
        } else {
            end
        };
        if end <= start {
            return Err(DomainError::InvalidWindow(
                "end must be after start".into(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// End falls on the start's calendar day or the one after, in `offset` wall time.
    /// An end exactly at the following midnight still counts as that next day.
    pub fn within_next_calendar_day(&self, offset: &FixedOffset) -> bool {
        let start_day = self.start.with_timezone(offset).date_naive();
        let last_instant = self.end - Duration::nanoseconds(1);
        let end_day = last_instant.with_timezone(offset).date_naive();
        (end_day - start_day).num_days() <= 1
    }
}

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Booked, window not started yet
    Upcoming,
    /// Window in progress
    Active,
    /// Window fully elapsed
    Completed,
    /// Cancelled by the requester
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Holds a spot
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Upcoming | Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    /// Statuses only move forward, and never skip `active`.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Upcoming, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Upcoming, Self::Cancelled)
                | (Self::Active, Self::Cancelled)
        )
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Persistence(format!(
                "unknown reservation status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle the spot is booked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub plate: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Upi,
    NetBanking,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::NetBanking => "net_banking",
            Self::Wallet => "wallet",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            "net_banking" => Ok(Self::NetBanking),
            "wallet" => Ok(Self::Wallet),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown payment method '{}'",
                other
            ))),
        }
    }
}

/// Confirmation handed over by the payment collaborator after a charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub method: PaymentMethod,
    /// Gateway reference, opaque to this service
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

/// A time-bounded claim on one spot by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub spot_id: String,
    pub user_id: String,
    pub window: TimeWindow,
    /// Spot type at booking time
    pub unit_type: SpotType,
    pub price: PriceBreakdown,
    pub status: ReservationStatus,
    pub vehicle: VehicleInfo,
    pub payment: Option<PaymentConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        spot_id: impl Into<String>,
        user_id: impl Into<String>,
        window: TimeWindow,
        price: PriceBreakdown,
        vehicle: VehicleInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            spot_id: spot_id.into(),
            user_id: user_id.into(),
            window,
            unit_type: price.spot_type,
            price,
            status: ReservationStatus::Upcoming,
            vehicle,
            payment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn final_price(&self) -> i64 {
        self.price.final_price
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Same booking, regardless of later status or payment changes
    pub fn same_booking(&self, other: &Reservation) -> bool {
        self.id == other.id
            && self.spot_id == other.spot_id
            && self.user_id == other.user_id
            && self.window == other.window
            && self.created_at == other.created_at
    }

    /// Whether the stored `other` already reflects this transition
    pub fn transition_applied(&self, other: &Reservation) -> bool {
        self.id == other.id
            && self.status == other.status
            && self.updated_at == other.updated_at
    }

    /// Move to `next`, enforcing forward-only transitions.
    pub fn transition(&mut self, next: ReservationStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == ReservationStatus::Cancelled && next == ReservationStatus::Cancelled {
            return Err(DomainError::AlreadyCancelled(self.id.clone()));
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ReservationStatus::Cancelled, now)
    }

    /// Status the time-driven lifecycle should be in at `now`.
    /// Terminal statuses never change.
    pub fn scheduled_status(&self, now: DateTime<Utc>) -> ReservationStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if now >= self.window.end {
            ReservationStatus::Completed
        } else if now >= self.window.start {
            ReservationStatus::Active
        } else {
            ReservationStatus::Upcoming
        }
    }

    /// Next single transition towards `scheduled_status(now)`, if any.
    /// A window that elapsed entirely still passes through `Active` first.
    pub fn next_scheduled_step(&self, now: DateTime<Utc>) -> Option<ReservationStatus> {
        match (self.status, self.scheduled_status(now)) {
            (ReservationStatus::Upcoming, ReservationStatus::Active | ReservationStatus::Completed) => {
                Some(ReservationStatus::Active)
            }
            (ReservationStatus::Active, ReservationStatus::Completed) => {
                Some(ReservationStatus::Completed)
            }
            _ => None,
        }
    }

    /// Attach payment metadata. Returns `false` when the same payment is
    /// already recorded.
    pub fn record_payment(&mut self, payment: PaymentConfirmation) -> DomainResult<bool> {
        match &self.payment {
            Some(existing) if existing.reference == payment.reference => Ok(false),
            Some(_) => Err(DomainError::AlreadyPaid(self.id.clone())),
            None => {
                self.payment = Some(payment);
                Ok(true)
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{quote_window, PricingPolicy};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, hour, 0, 0).unwrap()
    }

    fn sample_reservation() -> Reservation {
        let window = TimeWindow::resolve(at(10), at(12)).unwrap();
        let price = quote_window(SpotType::Standard, &window, &PricingPolicy::default()).unwrap();
        Reservation::new(
            "A1",
            "user-1",
            window,
            price,
            VehicleInfo {
                plate: "KA01AB1234".into(),
                description: None,
            },
            at(8),
        )
    }

    #[test]
    fn new_reservation_is_upcoming() {
        let r = sample_reservation();
        assert_eq!(r.status, ReservationStatus::Upcoming);
        assert_eq!(r.unit_type, SpotType::Standard);
        // 10:00 start is still inside the inclusive 8-10 peak range
        assert_eq!(r.final_price(), 150);
        assert!(r.is_live());
    }

    #[test]
    fn windows_are_half_open() {
        let a = TimeWindow::resolve(at(10), at(12)).unwrap();
        let b = TimeWindow::resolve(at(12), at(13)).unwrap();
        let c = TimeWindow::resolve(at(11), at(13)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
        assert!(a.contains(at(10)));
        assert!(!a.contains(at(12)));
    }

    #[test]
    fn next_calendar_day_limit() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let overnight = TimeWindow::resolve(at(23), at(1)).unwrap();
        assert!(overnight.within_next_calendar_day(&utc));

        let to_midnight_after = TimeWindow {
            start: at(9),
            end: at(0) + Duration::days(2),
        };
        assert!(to_midnight_after.within_next_calendar_day(&utc));

        let too_long = TimeWindow {
            start: at(9),
            end: at(1) + Duration::days(2),
        };
        assert!(!too_long.within_next_calendar_day(&utc));
    }

    #[test]
    fn cancel_twice_reports_already_cancelled() {
        let mut r = sample_reservation();
        r.cancel(at(9)).unwrap();
        assert_eq!(r.status, ReservationStatus::Cancelled);
        assert_eq!(
            r.cancel(at(9)).unwrap_err(),
            DomainError::AlreadyCancelled(r.id.clone())
        );
    }

    #[test]
    fn completed_cannot_be_cancelled() {
        let mut r = sample_reservation();
        r.transition(ReservationStatus::Active, at(10)).unwrap();
        r.transition(ReservationStatus::Completed, at(12)).unwrap();
        assert!(matches!(
            r.cancel(at(13)),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn statuses_never_move_backwards() {
        use ReservationStatus::*;
        assert!(!Active.can_transition_to(Upcoming));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Upcoming));
        assert!(Upcoming.can_transition_to(Active));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Upcoming.can_transition_to(Completed));
    }

    #[test]
    fn elapsed_window_steps_through_active() {
        let mut r = sample_reservation();
        assert_eq!(r.next_scheduled_step(at(9)), None);
        assert_eq!(r.next_scheduled_step(at(13)), Some(ReservationStatus::Active));

        r.transition(ReservationStatus::Active, at(13)).unwrap();
        assert_eq!(r.next_scheduled_step(at(13)), Some(ReservationStatus::Completed));

        r.transition(ReservationStatus::Completed, at(13)).unwrap();
        assert_eq!(r.next_scheduled_step(at(14)), None);
    }

    #[test]
    fn scheduled_status_follows_the_clock() {
        let r = sample_reservation();
        assert_eq!(r.scheduled_status(at(9)), ReservationStatus::Upcoming);
        assert_eq!(r.scheduled_status(at(10)), ReservationStatus::Active);
        assert_eq!(r.scheduled_status(at(12)), ReservationStatus::Completed);

        let mut cancelled = sample_reservation();
        cancelled.cancel(at(9)).unwrap();
        assert_eq!(cancelled.scheduled_status(at(13)), ReservationStatus::Cancelled);
    }

    #[test]
    fn payment_is_recorded_once() {
        let mut r = sample_reservation();
        let payment = PaymentConfirmation {
            method: PaymentMethod::Upi,
            reference: "pay_123".into(),
            paid_at: at(9),
        };
        assert!(r.record_payment(payment.clone()).unwrap());
        assert!(!r.record_payment(payment.clone()).unwrap());

        let other = PaymentConfirmation {
            reference: "pay_456".into(),
            ..payment
        };
        assert!(matches!(
            r.record_payment(other),
            Err(DomainError::AlreadyPaid(_))
        ));
        assert_eq!(r.status, ReservationStatus::Upcoming);
    }
}
