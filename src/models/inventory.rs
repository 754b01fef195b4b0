use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Unit {
    Kg,
    G,
    Lt,
    Ml,
    Und,
    Bote,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MovementType {
    Entrada,
    Salida,
}

impl MovementType {
    /// Quantity with the sign this movement contributes to stock.
    pub fn signed(self, cantidad: Decimal) -> Decimal {
        match self {
            MovementType::Entrada => cantidad,
            MovementType::Salida => -cantidad,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MovementReason {
    Compra,
    Produccion,
    Ajuste,
    Merma,
}

/// Σ ENTRADA − Σ SALIDA over ledger rows. Rows with an unknown type are skipped.
pub fn ledger_balance<'a, I>(rows: I) -> Decimal
where
    I: IntoIterator<Item = (&'a str, Decimal)>,
{
    rows.into_iter()
        .filter_map(|(tipo, cantidad)| {
            tipo.parse::<MovementType>()
                .ok()
                .map(|t| t.signed(cantidad))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_is_ins_minus_outs() {
        let rows = [
            ("ENTRADA", dec!(10.000)),
            ("SALIDA", dec!(2.500)),
            ("ENTRADA", dec!(0.250)),
            ("BOGUS", dec!(99)),
        ];
        assert_eq!(ledger_balance(rows), dec!(7.750));
    }

    #[test]
    fn units_parse_case_insensitively() {
        assert_eq!("KG".parse::<Unit>().unwrap(), Unit::Kg);
        assert_eq!(Unit::Bote.to_string(), "bote");
        assert!("lb".parse::<Unit>().is_err());
    }
}
