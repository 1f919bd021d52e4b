//! Delivery-day clubbing.
//!
//! A multi-day cart has to reach the location's minimum order value before
//! it can be delivered. Days that fall short are either clubbed into another
//! day's delivery or reported with the amount still missing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::Weekday;
use crate::cart::CartDaySnapshot;
use crate::order::Money;

/// Errors raised for malformed clubbing input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClubbingError {
    /// A cart day carries a negative amount.
    #[error("Invalid cart day {day}: {reason}")]
    InvalidCartDay { day: Weekday, reason: String },

    /// The minimum cart value is negative.
    #[error("Invalid minimum cart value: {0}")]
    InvalidMinimum(Money),
}

/// Colour hint shown next to a day's clubbing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageColor {
    Red,
    Green,
    Orange,
}

/// A pair of consecutive days that always ship together when the first
/// meets the minimum and the second does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedPair {
    pub day: Weekday,
    pub next_day: Weekday,
}

/// Rule table for forward clubbing between the two earliest cart days.
///
/// The default table holds the single Friday -> Saturday pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubbingRules {
    forced_pairs: Vec<ForcedPair>,
}

impl ClubbingRules {
    /// A table with no forced pairs: every day is evaluated on its own.
    pub fn none() -> Self {
        Self {
            forced_pairs: Vec::new(),
        }
    }

    /// Adds a forced pair to the table.
    pub fn with_forced_pair(mut self, day: Weekday, next_day: Weekday) -> Self {
        self.forced_pairs.push(ForcedPair { day, next_day });
        self
    }

    /// Returns the forced pairs in the table.
    pub fn forced_pairs(&self) -> &[ForcedPair] {
        &self.forced_pairs
    }

    /// Returns true if `day` must be delivered together with `next_day`.
    pub fn should_force_club(&self, day: Weekday, next_day: Weekday) -> bool {
        self.forced_pairs
            .iter()
            .any(|pair| pair.day == day && pair.next_day == next_day)
    }
}

impl Default for ClubbingRules {
    fn default() -> Self {
        Self::none().with_forced_pair(Weekday::Friday, Weekday::Saturday)
    }
}

/// How one cart day will be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubbingPlanEntry {
    /// The cart day this entry describes.
    pub day: Weekday,

    /// Total of the cart day before any clubbing.
    pub original_day_total: Money,

    /// Day whose delivery carries this day's items.
    pub delivery_day: Weekday,

    /// Date of that delivery.
    pub delivery_date: NaiveDate,

    /// Amount this day alone is short of the minimum (zero when met).
    pub shortfall: Money,

    /// True when the items ship with another day's delivery.
    pub is_clubbed: bool,

    /// Colour hint for the message.
    pub message_color: MessageColor,

    /// Customer-facing explanation.
    pub message: String,
}

impl ClubbingPlanEntry {
    // Starts as an unclubbed red entry on the day's own date.
    fn for_line(line: &DayLine, min_cart_value: Money) -> Self {
        let shortfall = line.total.shortfall_to(min_cart_value);
        Self {
            day: line.day,
            original_day_total: line.total,
            delivery_day: line.day,
            delivery_date: line.date,
            shortfall,
            is_clubbed: false,
            message_color: MessageColor::Red,
            message: shortfall_message(shortfall, line.day),
        }
    }

    fn delivered_on(mut self, target: &DayLine) -> Self {
        self.delivery_day = target.day;
        self.delivery_date = target.date;
        self.is_clubbed = true;
        self
    }

    fn colored(mut self, color: MessageColor, message: String) -> Self {
        self.message_color = color;
        self.message = message;
        self
    }
}

/// Outcome of planning a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubbingResult {
    /// True if the cart may proceed to checkout.
    pub can_checkout: bool,

    /// One entry per cart day, ordered by date.
    pub plan: Vec<ClubbingPlanEntry>,

    /// Amount the whole cart is short of the minimum when checkout is
    /// blocked; zero otherwise.
    pub total_shortfall: Money,
}

impl ClubbingResult {
    /// The result for an empty cart.
    pub fn empty() -> Self {
        Self {
            can_checkout: false,
            plan: Vec::new(),
            total_shortfall: Money::zero(),
        }
    }

    /// Returns the entry for `day`, if the cart had one.
    pub fn entry_for(&self, day: Weekday) -> Option<&ClubbingPlanEntry> {
        self.plan.iter().find(|entry| entry.day == day)
    }

    /// Returns the number of days shipped with another day.
    pub fn clubbed_count(&self) -> usize {
        self.plan.iter().filter(|entry| entry.is_clubbed).count()
    }
}

/// Decides which cart days ship on their own and which are clubbed.
#[derive(Debug, Clone, Default)]
pub struct ClubbingCalculator {
    rules: ClubbingRules,
}

#[derive(Debug, Clone, Copy)]
struct DayLine {
    day: Weekday,
    date: NaiveDate,
    total: Money,
}

impl TryFrom<&CartDaySnapshot> for DayLine {
    type Error = ClubbingError;

    fn try_from(snapshot: &CartDaySnapshot) -> Result<Self, Self::Error> {
        if let Some(item) = snapshot.first_negative_price() {
            return Err(ClubbingError::InvalidCartDay {
                day: snapshot.day,
                reason: format!(
                    "negative unit price {} for product {}",
                    item.unit_price, item.product_id
                ),
            });
        }
        let total = snapshot.day_total().ok_or_else(|| ClubbingError::InvalidCartDay {
            day: snapshot.day,
            reason: "day total out of range".to_string(),
        })?;
        Ok(Self {
            day: snapshot.day,
            date: snapshot.date,
            total,
        })
    }
}

impl ClubbingCalculator {
    /// Creates a calculator with the given rule table.
    pub fn new(rules: ClubbingRules) -> Self {
        Self { rules }
    }

    /// Returns the rule table in use.
    pub fn rules(&self) -> &ClubbingRules {
        &self.rules
    }

    /// Plans delivery for `cart` against `min_cart_value`.
    ///
    /// Not meeting the minimum is reported through `can_checkout`; only
    /// negative amounts are errors.
    pub fn plan(
        &self,
        cart: &[CartDaySnapshot],
        min_cart_value: Money,
    ) -> Result<ClubbingResult, ClubbingError> {
        if min_cart_value.is_negative() {
            return Err(ClubbingError::InvalidMinimum(min_cart_value));
        }
        let mut lines = Vec::with_capacity(cart.len());
        let mut cart_total = Money::zero();
        for snapshot in cart {
            let line = DayLine::try_from(snapshot)?;
            // Suffix sums below stay in range once the whole cart does.
            cart_total = cart_total.checked_add(line.total).ok_or_else(|| {
                ClubbingError::InvalidCartDay {
                    day: line.day,
                    reason: "cart total out of range".to_string(),
                }
            })?;
            lines.push(line);
        }

        if lines.is_empty() {
            return Ok(ClubbingResult::empty());
        }
        lines.sort_by_key(|line| line.date);

        let result = if lines.iter().any(|line| line.total >= min_cart_value) {
            self.plan_with_qualifying_days(&lines, min_cart_value)
        } else {
            plan_combined(&lines, min_cart_value)
        };

        tracing::debug!(
            days = lines.len(),
            min_cart_value = %min_cart_value,
            can_checkout = result.can_checkout,
            clubbed = result.clubbed_count(),
            total_shortfall = %result.total_shortfall,
            "clubbing plan computed"
        );

        Ok(result)
    }

    // At least one day meets the minimum on its own.
    fn plan_with_qualifying_days(&self, lines: &[DayLine], min: Money) -> ClubbingResult {
        let meets = |line: &DayLine| line.total >= min;
        let mut plan = Vec::with_capacity(lines.len());
        let mut evaluated = 0;

        if let [first, second, ..] = lines
            && meets(first)
            && !meets(second)
            && self.rules.should_force_club(first.day, second.day)
        {
            let message = delivered_with_message(first.day, second.day);
            plan.push(
                ClubbingPlanEntry::for_line(first, min)
                    .delivered_on(second)
                    .colored(MessageColor::Orange, message),
            );
            plan.push(
                ClubbingPlanEntry::for_line(second, min)
                    .colored(MessageColor::Green, same_day_message(second.day)),
            );
            evaluated = 2;
        }

        let anchor_index = lines
            .iter()
            .rposition(|line| meets(line))
            .unwrap_or(lines.len() - 1);
        let anchor = &lines[anchor_index];

        for (index, line) in lines.iter().enumerate().skip(evaluated) {
            let entry = ClubbingPlanEntry::for_line(line, min);
            let entry = if meets(line) {
                entry.colored(MessageColor::Green, same_day_message(line.day))
            } else {
                let remaining: Money = lines[index..].iter().map(|later| later.total).sum();
                if remaining >= min && index != anchor_index {
                    let message = shortfall_message(entry.shortfall, anchor.day);
                    entry
                        .delivered_on(anchor)
                        .colored(MessageColor::Red, message)
                } else {
                    entry
                }
            };
            plan.push(entry);
        }

        ClubbingResult {
            can_checkout: true,
            plan,
            total_shortfall: Money::zero(),
        }
    }
}

// No day meets the minimum on its own.
fn plan_combined(lines: &[DayLine], min: Money) -> ClubbingResult {
    let Some((last, earlier)) = lines.split_last() else {
        return ClubbingResult::empty();
    };
    let grand_total: Money = lines.iter().map(|line| line.total).sum();

    if grand_total < min {
        return ClubbingResult {
            can_checkout: false,
            plan: lines
                .iter()
                .map(|line| ClubbingPlanEntry::for_line(line, min))
                .collect(),
            total_shortfall: min - grand_total,
        };
    }

    let mut plan: Vec<ClubbingPlanEntry> = earlier
        .iter()
        .map(|line| ClubbingPlanEntry::for_line(line, min).delivered_on(last))
        .collect();
    plan.push(
        ClubbingPlanEntry::for_line(last, min)
            .colored(MessageColor::Green, same_day_message(last.day)),
    );

    ClubbingResult {
        can_checkout: true,
        plan,
        total_shortfall: Money::zero(),
    }
}

fn shortfall_message(shortfall: Money, day: Weekday) -> String {
    format!("Add {shortfall} to your order for delivery on '{day}'")
}

fn same_day_message(day: Weekday) -> String {
    format!("Min. order value met, your '{day}' order will be delivered the same day.")
}

fn delivered_with_message(day: Weekday, delivery_day: Weekday) -> String {
    format!("Min. order value met, your '{day}' order will be delivered on '{delivery_day}'")
}
