use dulce_bocatto::models::{from_cents, ledger_balance, order_total, to_cents, PaymentSummary};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn cents() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #[test]
    fn order_total_is_lines_plus_shipping(
        lines in prop::collection::vec((1i32..=99, cents()), 1..6),
        envio in cents(),
    ) {
        let expected: Decimal = lines
            .iter()
            .map(|(cantidad, precio)| Decimal::from(*cantidad) * *precio)
            .sum::<Decimal>()
            + envio;
        prop_assert_eq!(order_total(lines, envio), expected);
    }

    #[test]
    fn balance_never_counts_unknown_movement_types(
        entradas in prop::collection::vec(cents(), 0..8),
        salidas in prop::collection::vec(cents(), 0..8),
    ) {
        let rows: Vec<(&str, Decimal)> = entradas
            .iter()
            .map(|c| ("ENTRADA", *c))
            .chain(salidas.iter().map(|c| ("SALIDA", *c)))
            .chain(std::iter::once(("TRASPASO", Decimal::ONE_HUNDRED)))
            .collect();
        let expected = entradas.iter().sum::<Decimal>() - salidas.iter().sum::<Decimal>();
        prop_assert_eq!(ledger_balance(rows), expected);
    }

    #[test]
    fn summary_balances_to_the_order_total(
        total in cents(),
        montos in prop::collection::vec(cents(), 0..5),
    ) {
        let summary = PaymentSummary::new(total, montos.iter().copied());
        prop_assert_eq!(summary.total_pagado + summary.saldo, total);
        prop_assert_eq!(summary.is_fully_paid(), summary.total_pagado >= total);
    }

    #[test]
    fn two_decimal_amounts_survive_cents(c in 0i64..10_000_000_000) {
        prop_assert_eq!(to_cents(from_cents(c)), c);
    }
}
