//! Decimal amounts and balances
//!
//! Amounts are entered as decimal strings ("1.5") and held as integer base
//! units (`1.5 * 10^decimals`), the same way token amounts are handled
//! on-chain.

use std::fmt;

use num_bigint::BigUint;
use shade_primitives::{FieldElement, modulus};

use crate::WalletError;

/// Decimals of the native unit
pub const DEFAULT_DECIMALS: u32 = 18;

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// Parse a positive decimal amount into base units.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`; rejects signs, exponents,
/// more fractional digits than `decimals`, zero, and values that do not fit
/// in the field.
pub fn parse_units(amount: &str, decimals: u32) -> Result<FieldElement, WalletError> {
    let amount = amount.trim();
    let invalid =
        |reason: &str| WalletError::InputValidation(format!("amount {:?}: {}", amount, reason));

    if amount.is_empty() {
        return Err(invalid("is empty"));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("has no digits"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("must be a plain decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid(&format!("more than {} decimal places", decimals)));
    }

    let padded = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    let units = BigUint::parse_bytes(padded.as_bytes(), 10).unwrap_or_default();

    if units == BigUint::default() {
        return Err(invalid("must be greater than zero"));
    }
    if units >= modulus() {
        return Err(invalid("is too large"));
    }
    Ok(FieldElement::from_biguint(&units))
}

/// An amount in base units with its decimal scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    units: BigUint,
    decimals: u32,
}

impl Balance {
    pub fn new(units: BigUint, decimals: u32) -> Self {
        Self { units, decimals }
    }

    pub fn from_field(value: FieldElement, decimals: u32) -> Self {
        Self::new(value.to_biguint(), decimals)
    }

    pub fn units(&self) -> &BigUint {
        &self.units
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.units == BigUint::default()
    }

    /// Render with exactly `places` decimals, rounding half up
    pub fn to_fixed(&self, places: u32) -> String {
        let scaled = if places >= self.decimals {
            &self.units * pow10(places - self.decimals)
        } else {
            let divisor = pow10(self.decimals - places);
            (&self.units + &divisor / 2u32) / divisor
        };

        if places == 0 {
            return scaled.to_string();
        }
        let unit = pow10(places);
        format!(
            "{}.{:0>width$}",
            &scaled / &unit,
            (&scaled % &unit).to_string(),
            width = places as usize
        )
    }
}

/// Shortest exact rendering, always with a fractional part: "1.5", "0.0"
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = pow10(self.decimals);
        let whole = &self.units / &unit;
        let fraction = format!(
            "{:0>width$}",
            (&self.units % &unit).to_string(),
            width = self.decimals as usize
        );
        let fraction = fraction.trim_end_matches('0');

        if fraction.is_empty() {
            write!(f, "{}.0", whole)
        } else {
            write!(f, "{}.{}", whole, fraction)
        }
    }
}
