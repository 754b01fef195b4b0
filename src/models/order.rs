use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Lifecycle of a pedido.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pendiente,
    Confirmado,
    EnProduccion,
    ListoEntrega,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    /// States an order has reached once the customer confirmed it.
    pub const CONFIRMED_STATES: [OrderStatus; 4] = [
        OrderStatus::Confirmado,
        OrderStatus::EnProduccion,
        OrderStatus::ListoEntrega,
        OrderStatus::Entregado,
    ];

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pendiente, Confirmado)
                | (Pendiente, Cancelado)
                | (Confirmado, EnProduccion)
                | (Confirmado, ListoEntrega)
                | (EnProduccion, ListoEntrega)
                | (ListoEntrega, Entregado)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Entregado | OrderStatus::Cancelado)
    }

    /// Orders that may still be produced
    pub fn is_in_production_queue(self) -> bool {
        matches!(self, OrderStatus::Confirmado | OrderStatus::EnProduccion)
    }

    pub fn confirmed_codes() -> Vec<String> {
        Self::CONFIRMED_STATES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ShippingMethod {
    Local,
    Delivery,
}

impl ShippingMethod {
    pub fn shipping_cost(self, delivery_cost: Decimal) -> Decimal {
        match self {
            ShippingMethod::Local => Decimal::ZERO,
            ShippingMethod::Delivery => delivery_cost.round_dp(2),
        }
    }
}

/// Σ cantidad × precio_unitario plus shipping, rounded to cents.
pub fn order_total<I>(lines: I, costo_envio: Decimal) -> Decimal
where
    I: IntoIterator<Item = (i32, Decimal)>,
{
    let subtotal: Decimal = lines
        .into_iter()
        .map(|(cantidad, precio)| Decimal::from(cantidad) * precio)
        .sum();
    (subtotal + costo_envio).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    #[test_case(OrderStatus::Pendiente, OrderStatus::Confirmado, true)]
    #[test_case(OrderStatus::Pendiente, OrderStatus::Cancelado, true)]
    #[test_case(OrderStatus::Confirmado, OrderStatus::EnProduccion, true)]
    #[test_case(OrderStatus::Confirmado, OrderStatus::ListoEntrega, true)]
    #[test_case(OrderStatus::EnProduccion, OrderStatus::ListoEntrega, true)]
    #[test_case(OrderStatus::ListoEntrega, OrderStatus::Entregado, true)]
    #[test_case(OrderStatus::Confirmado, OrderStatus::Cancelado, false)]
    #[test_case(OrderStatus::Entregado, OrderStatus::Pendiente, false)]
    #[test_case(OrderStatus::EnProduccion, OrderStatus::Confirmado, false)]
    #[test_case(OrderStatus::Pendiente, OrderStatus::Entregado, false)]
    fn transition_table(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [OrderStatus::Entregado, OrderStatus::Cancelado] {
            assert!(OrderStatus::iter().all(|to| !from.can_transition_to(to)));
        }
    }

    #[test]
    fn status_codes_round_trip_through_strings() {
        assert_eq!(OrderStatus::EnProduccion.to_string(), "EN_PRODUCCION");
        assert_eq!(
            "LISTO_ENTREGA".parse::<OrderStatus>().unwrap(),
            OrderStatus::ListoEntrega
        );
        assert!("listo".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn shipping_cost_depends_on_method() {
        assert_eq!(ShippingMethod::Local.shipping_cost(dec!(5.00)), dec!(0));
        assert_eq!(ShippingMethod::Delivery.shipping_cost(dec!(5.00)), dec!(5.00));
        assert_eq!(
            "DELIVERY".parse::<ShippingMethod>().unwrap(),
            ShippingMethod::Delivery
        );
    }

    #[test]
    fn total_adds_lines_and_shipping() {
        let total = order_total([(3, dec!(10)), (2, dec!(12.50))], dec!(5.00));
        assert_eq!(total, dec!(60.00));
        assert_eq!(order_total(Vec::new(), dec!(0)), dec!(0));
    }
}
