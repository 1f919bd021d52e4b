//! Delivery configuration loaded from environment variables.

use std::collections::HashMap;

use crate::calendar::{DEFAULT_CUTOFF_HOUR, DayDateResolver};
use crate::order::{AmendmentMerger, Money};
use crate::totals::FeePolicy;

const DEFAULT_MIN_CART_VALUE_CENTS: i64 = 1000;
const DEFAULT_MAX_MERGE_ATTEMPTS: u32 = 3;

/// Delivery settings with sensible defaults.
///
/// Reads from environment variables:
/// - `DELIVERY_MIN_CART_VALUE_CENTS` (default: `1000`)
/// - `DELIVERY_LOCATION_MINIMUMS`: `location=cents` pairs separated by commas
/// - `DELIVERY_CUTOFF_HOUR` (default: `13`)
/// - `DELIVERY_PLATFORM_FEE_CENTS` (default: `100`)
/// - `DELIVERY_DELIVERY_FEE_CENTS` (default: `1000`)
/// - `DELIVERY_DISCOUNT_THRESHOLD_CENTS` (default: `10000`)
/// - `DELIVERY_DISCOUNT_HIGH_CENTS` (default: `1000`)
/// - `DELIVERY_DISCOUNT_LOW_CENTS` (default: `500`)
/// - `DELIVERY_TAX_RATE_BPS` (default: `1000`)
/// - `DELIVERY_RECOMPUTE_DISCOUNT_ON_AMEND` (default: `false`)
/// - `DELIVERY_MAX_MERGE_ATTEMPTS` (default: `3`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
///
/// Values that fail to parse, and negative amounts, fall back to their
/// default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub min_cart_value: Money,
    pub location_minimums: HashMap<String, Money>,
    pub cutoff_hour: u32,
    pub fee_policy: FeePolicy,
    pub recompute_discount_on_amend: bool,
    pub max_merge_attempts: u32,
    pub log_level: String,
}

impl DeliveryConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let cents = |key: &str, default: Money| {
            lookup(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|cents| *cents >= 0)
                .map(Money::from_cents)
                .unwrap_or(default)
        };
        let number = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };

        let fee_policy = FeePolicy {
            platform_fee: cents("DELIVERY_PLATFORM_FEE_CENTS", defaults.fee_policy.platform_fee),
            delivery_fee: cents("DELIVERY_DELIVERY_FEE_CENTS", defaults.fee_policy.delivery_fee),
            discount_threshold: cents(
                "DELIVERY_DISCOUNT_THRESHOLD_CENTS",
                defaults.fee_policy.discount_threshold,
            ),
            discount_high: cents("DELIVERY_DISCOUNT_HIGH_CENTS", defaults.fee_policy.discount_high),
            discount_low: cents("DELIVERY_DISCOUNT_LOW_CENTS", defaults.fee_policy.discount_low),
            tax_rate_bps: number("DELIVERY_TAX_RATE_BPS", defaults.fee_policy.tax_rate_bps),
        };

        Self {
            min_cart_value: cents("DELIVERY_MIN_CART_VALUE_CENTS", defaults.min_cart_value),
            location_minimums: lookup("DELIVERY_LOCATION_MINIMUMS")
                .map(|raw| parse_location_minimums(&raw))
                .unwrap_or_default(),
            cutoff_hour: Some(number("DELIVERY_CUTOFF_HOUR", defaults.cutoff_hour))
                .filter(|hour| *hour <= 24)
                .unwrap_or(defaults.cutoff_hour),
            fee_policy,
            recompute_discount_on_amend: lookup("DELIVERY_RECOMPUTE_DISCOUNT_ON_AMEND")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.recompute_discount_on_amend),
            max_merge_attempts: Some(number(
                "DELIVERY_MAX_MERGE_ATTEMPTS",
                defaults.max_merge_attempts,
            ))
            .filter(|attempts| *attempts > 0)
            .unwrap_or(defaults.max_merge_attempts),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the minimum cart value for `location`, or the default one
    /// when the location has no override.
    pub fn min_cart_value_for(&self, location: Option<&str>) -> Money {
        location
            .and_then(|name| self.location_minimums.get(name))
            .copied()
            .unwrap_or(self.min_cart_value)
    }

    /// Returns a resolver using the configured cutoff hour.
    pub fn resolver(&self) -> DayDateResolver {
        DayDateResolver::new(self.cutoff_hour)
    }

    /// Returns a merger using the configured fees and discount policy.
    pub fn merger(&self) -> AmendmentMerger {
        AmendmentMerger::new(self.fee_policy)
            .with_discount_recompute(self.recompute_discount_on_amend)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            min_cart_value: Money::from_cents(DEFAULT_MIN_CART_VALUE_CENTS),
            location_minimums: HashMap::new(),
            cutoff_hour: DEFAULT_CUTOFF_HOUR,
            fee_policy: FeePolicy::default(),
            recompute_discount_on_amend: false,
            max_merge_attempts: DEFAULT_MAX_MERGE_ATTEMPTS,
            log_level: "info".to_string(),
        }
    }
}

// Malformed pairs are skipped.
fn parse_location_minimums(raw: &str) -> HashMap<String, Money> {
    raw.split(',')
        .filter_map(|pair| {
            let (location, cents) = pair.split_once('=')?;
            let location = location.trim();
            let cents = cents.trim().parse::<i64>().ok()?;
            (!location.is_empty() && cents >= 0)
                .then(|| (location.to_string(), Money::from_cents(cents)))
        })
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> DeliveryConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeliveryConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);
        assert_eq!(config, DeliveryConfig::default());
        assert_eq!(config.min_cart_value, Money::from_dollars(10));
        assert_eq!(config.cutoff_hour, 13);
        assert_eq!(config.max_merge_attempts, 3);
        assert!(!config.recompute_discount_on_amend);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DELIVERY_MIN_CART_VALUE_CENTS", "1500"),
            ("DELIVERY_CUTOFF_HOUR", "11"),
            ("DELIVERY_TAX_RATE_BPS", "825"),
            ("DELIVERY_RECOMPUTE_DISCOUNT_ON_AMEND", "yes"),
            ("DELIVERY_MAX_MERGE_ATTEMPTS", "5"),
            ("RUST_LOG", "debug"),
        ]);

        assert_eq!(config.min_cart_value, Money::from_cents(1500));
        assert_eq!(config.resolver().cutoff_hour(), 11);
        assert_eq!(config.fee_policy.tax_rate_bps, 825);
        assert!(config.recompute_discount_on_amend);
        assert_eq!(config.max_merge_attempts, 5);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_negative_amounts_fall_back() {
        let config = config_from(&[
            ("DELIVERY_MIN_CART_VALUE_CENTS", "-5"),
            ("DELIVERY_PLATFORM_FEE_CENTS", "-100"),
            ("DELIVERY_DISCOUNT_LOW_CENTS", "-1"),
            ("DELIVERY_DELIVERY_FEE_CENTS", "0"),
        ]);

        assert_eq!(config.min_cart_value, Money::from_dollars(10));
        assert_eq!(config.fee_policy.platform_fee, Money::from_dollars(1));
        assert_eq!(config.fee_policy.discount_low, Money::from_dollars(5));
        assert_eq!(config.fee_policy.delivery_fee, Money::zero());
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[
            ("DELIVERY_MIN_CART_VALUE_CENTS", "ten dollars"),
            ("DELIVERY_CUTOFF_HOUR", "99"),
            ("DELIVERY_MAX_MERGE_ATTEMPTS", "0"),
            ("DELIVERY_RECOMPUTE_DISCOUNT_ON_AMEND", "maybe"),
        ]);

        assert_eq!(config.min_cart_value, Money::from_dollars(10));
        assert_eq!(config.cutoff_hour, 13);
        assert_eq!(config.max_merge_attempts, 3);
        assert!(!config.recompute_discount_on_amend);
    }

    #[test]
    fn test_location_minimums() {
        let config = config_from(&[(
            "DELIVERY_LOCATION_MINIMUMS",
            "downtown=2000, airport = 2500,broken,=300,negative=-1",
        )]);

        assert_eq!(config.location_minimums.len(), 2);
        assert_eq!(
            config.min_cart_value_for(Some("downtown")),
            Money::from_dollars(20)
        );
        assert_eq!(config.min_cart_value_for(Some("airport")), Money::from_dollars(25));
        assert_eq!(config.min_cart_value_for(Some("suburb")), Money::from_dollars(10));
        assert_eq!(config.min_cart_value_for(None), Money::from_dollars(10));
    }
}
