use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr, VariantNames, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PaymentMethod {
    Efectivo,
    Qr,
    Transferencia,
    Stripe,
}

/// Accepts any casing ("efectivo", "Qr", ...); always serializes upper-case.
impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|_| de::Error::unknown_variant(&raw, Self::VARIANTS))
    }
}

/// Paid so far and what is still owed on an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSummary {
    pub total: Decimal,
    pub total_pagado: Decimal,
    pub saldo: Decimal,
}

impl PaymentSummary {
    pub fn new<I>(total: Decimal, montos: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let total_pagado: Decimal = montos.into_iter().sum();
        Self {
            total,
            total_pagado,
            saldo: total - total_pagado,
        }
    }

    pub fn is_fully_paid(&self) -> bool {
        self.saldo <= Decimal::ZERO
    }
}

/// Minor currency units, half-up.
pub fn to_cents(amount: Decimal) -> i64 {
    let cents = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    i64::try_from(cents).unwrap_or(i64::MAX)
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn method_parsing_ignores_case() {
        assert_eq!("efectivo".parse::<PaymentMethod>().unwrap(), PaymentMethod::Efectivo);
        assert_eq!("Qr".parse::<PaymentMethod>().unwrap(), PaymentMethod::Qr);
        assert_eq!(PaymentMethod::Transferencia.to_string(), "TRANSFERENCIA");
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn json_input_ignores_case() {
        let method: PaymentMethod = serde_json::from_str("\"transferencia\"").unwrap();
        assert_eq!(method, PaymentMethod::Transferencia);
        assert_eq!(serde_json::to_string(&method).unwrap(), "\"TRANSFERENCIA\"");
        assert!(serde_json::from_str::<PaymentMethod>("\"cheque\"").is_err());
    }

    #[test]
    fn summary_reports_balance() {
        let summary = PaymentSummary::new(dec!(60.00), [dec!(20.00), dec!(15.50)]);
        assert_eq!(summary.total_pagado, dec!(35.50));
        assert_eq!(summary.saldo, dec!(24.50));
        assert!(!summary.is_fully_paid());
        assert!(PaymentSummary::new(dec!(10), [dec!(10)]).is_fully_paid());
    }

    #[test]
    fn cents_round_half_up() {
        assert_eq!(to_cents(dec!(24.50)), 2450);
        assert_eq!(to_cents(dec!(0.125)), 13);
        assert_eq!(to_cents(dec!(0.124)), 12);
        assert_eq!(from_cents(2450), dec!(24.50));
    }
}
