//! Currency Table with Macro-Based Currency Generation
//!
//! Currencies are defined declaratively with a macro that generates the
//! `CurrencyCode` enum, its metadata accessors, and runtime rate lookup.
//! Rates are indicative mid-market rates against USD, suitable for
//! development and testing; a production deployment quotes against a real
//! exchange through the `ExchangeApi` port instead.
//!
//! # Adding a New Currency
//! Add a line to the `define_currencies!` invocation:
//! ```ignore
//! define_currencies! {
//!     // ... existing currencies ...
//!     KES => ("KES", "KSh", "cent", 100, 0.0077, 0.4),
//! }
//! ```
//!
//! # Example
//! ```
//! use fx_rates::{CurrencyCode, convert_minor, get_rate};
//!
//! // $100.00 in minor units
//! let kobo = convert_minor(10_000, CurrencyCode::USD, CurrencyCode::NGN);
//! let rate = get_rate(CurrencyCode::USD, CurrencyCode::NGN);
//! assert!(rate > 1.0);
//! assert!(kobo > 10_000);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

// ─────────────────────────────────────────────────────────────────────────────
// Global Fluctuation Control
// ─────────────────────────────────────────────────────────────────────────────

static FLUCTUATION_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable random rate fluctuation for realistic simulation.
pub fn enable_fluctuation() {
    FLUCTUATION_ENABLED.store(true, Ordering::Relaxed);
}

/// Disable rate fluctuation (use base rates only).
pub fn disable_fluctuation() {
    FLUCTUATION_ENABLED.store(false, Ordering::Relaxed);
}

/// Check if fluctuation is enabled.
pub fn is_fluctuation_enabled() -> bool {
    FLUCTUATION_ENABLED.load(Ordering::Relaxed)
}

fn fluctuate(base_rate: f64, max_variance_percent: f64) -> f64 {
    if !is_fluctuation_enabled() {
        return base_rate;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let random_factor = ((nanos % 2001) as f64 / 1000.0) - 1.0;
    let variance = base_rate * (max_variance_percent / 100.0) * random_factor;
    base_rate + variance
}

// ─────────────────────────────────────────────────────────────────────────────
// THE MACRO: Defines all currencies, CurrencyCode enum, and rate lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Macro to define currencies with auto-generated metadata and rate lookup.
///
/// # Syntax
/// ```ignore
/// define_currencies! {
///     CurrencyName => ("CODE", "SYMBOL", "minor_unit", minor_per_major, to_usd_rate, variance%),
/// }
/// ```
#[macro_export]
macro_rules! define_currencies {
    (
        $(
            $name:ident => ($code:literal, $symbol:literal, $minor:literal, $minor_per_major:expr, $to_usd:expr, $variance:expr)
        ),* $(,)?
    ) => {
        /// Supported currencies.
        ///
        /// Serializes as the upper-case ISO code, so it is usable directly as
        /// a JSON map key for per-currency balances.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "UPPERCASE")]
        pub enum CurrencyCode {
            $($name),*
        }

        impl CurrencyCode {
            pub fn code(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $code),*
                }
            }

            pub fn symbol(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $symbol),*
                }
            }

            pub fn minor_unit(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $minor),*
                }
            }

            pub fn minor_units_per_major(&self) -> i64 {
                match self {
                    $(CurrencyCode::$name => $minor_per_major),*
                }
            }

            pub fn base_to_usd_rate(&self) -> f64 {
                match self {
                    $(CurrencyCode::$name => $to_usd),*
                }
            }

            /// Current rate against USD, with fluctuation applied if enabled.
            pub fn to_usd_rate(&self) -> f64 {
                match self {
                    $(CurrencyCode::$name => fluctuate($to_usd, $variance)),*
                }
            }

            pub fn all() -> &'static [CurrencyCode] {
                &[$(CurrencyCode::$name),*]
            }
        }

        impl std::fmt::Display for CurrencyCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.code())
            }
        }

        impl std::str::FromStr for CurrencyCode {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($code => Ok(CurrencyCode::$name),)*
                    _ => Err(format!("Unknown currency: {}", s)),
                }
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Lookup & Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Rate for one unit of `from` expressed in `to`.
pub fn get_rate(from: CurrencyCode, to: CurrencyCode) -> f64 {
    if from == to {
        return 1.0;
    }
    from.to_usd_rate() / to.to_usd_rate()
}

/// Convert an amount in minor units of `from` to minor units of `to`.
pub fn convert_minor(amount: i64, from: CurrencyCode, to: CurrencyCode) -> i64 {
    if from == to {
        return amount;
    }
    let usd_amount = amount as f64 * from.to_usd_rate();
    let target_amount = usd_amount / to.to_usd_rate();
    target_amount.round() as i64
}

/// All rates against a base currency.
pub fn get_all_rates(base: CurrencyCode) -> std::collections::HashMap<CurrencyCode, f64> {
    CurrencyCode::all()
        .iter()
        .map(|&c| (c, get_rate(base, c)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// CURRENCY DEFINITIONS - Add new currencies here!
// ─────────────────────────────────────────────────────────────────────────────

define_currencies! {
    USD => ("USD", "$", "cent", 100, 1.0, 0.0),
    EUR => ("EUR", "€", "cent", 100, 1.087, 0.5),
    GBP => ("GBP", "£", "penny", 100, 1.266, 0.5),
    NGN => ("NGN", "₦", "kobo", 100, 0.00065, 0.8),
    GHS => ("GHS", "GH₵", "pesewa", 100, 0.064, 0.6),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        disable_fluctuation();
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!("ngn".parse::<CurrencyCode>().unwrap(), CurrencyCode::NGN);
        assert!("XXX".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_currency_code_display() {
        assert_eq!(CurrencyCode::NGN.to_string(), "NGN");
    }

    #[test]
    fn test_same_currency_rate_is_one() {
        setup();
        assert_eq!(get_rate(CurrencyCode::USD, CurrencyCode::USD), 1.0);
        assert_eq!(convert_minor(12345, CurrencyCode::EUR, CurrencyCode::EUR), 12345);
    }

    #[test]
    fn test_usd_to_ngn_conversion() {
        setup();
        // $100.00 at 1 USD = 1538.46 NGN
        let kobo = convert_minor(10_000, CurrencyCode::USD, CurrencyCode::NGN);
        assert!((kobo - 15_384_615).abs() < 100);
    }

    #[test]
    fn test_round_trip_is_close() {
        setup();
        let kobo = convert_minor(10_000, CurrencyCode::USD, CurrencyCode::NGN);
        let cents = convert_minor(kobo, CurrencyCode::NGN, CurrencyCode::USD);
        assert!((cents - 10_000).abs() < 10);
    }

    #[test]
    fn test_get_all_rates() {
        setup();
        let rates = get_all_rates(CurrencyCode::USD);
        assert_eq!(rates.get(&CurrencyCode::USD), Some(&1.0));
        assert!(rates.contains_key(&CurrencyCode::NGN));
    }

    #[test]
    fn test_serde_as_map_key() {
        setup();
        let mut balances = std::collections::BTreeMap::new();
        balances.insert(CurrencyCode::USD, 1000i64);
        balances.insert(CurrencyCode::NGN, 250i64);
        let json = serde_json::to_string(&balances).unwrap();
        assert!(json.contains("\"USD\":1000"));
        let back: std::collections::BTreeMap<CurrencyCode, i64> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, balances);
    }

    #[test]
    fn test_currency_code_all() {
        let all = CurrencyCode::all();
        assert_eq!(all.len(), 5);
    }
}
