use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use strum::{EnumString, IntoEnumIterator};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::DbPool,
    entities::{cliente, pago, pedido, usuario},
    errors::ServiceError,
    models::{
        calendar::{parse_flexible_date, start_of_business_day},
        OrderStatus,
    },
};

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Matches customer email or name
    pub q: Option<String>,
    /// Inclusive start date
    pub d1: Option<String>,
    /// Inclusive end date
    pub d2: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HistorySort {
    Cliente,
    #[default]
    Creado,
    Total,
    Estado,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryRow {
    pub pedido_id: i32,
    pub cliente: String,
    pub email: Option<String>,
    pub creado: DateTime<Utc>,
    pub estado: String,
    pub total: Decimal,
    pub pagado: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerHistory {
    pub cantidad: usize,
    pub suma_total: Decimal,
    pub filas: Vec<HistoryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusCount {
    pub estado: OrderStatus,
    pub cantidad: u64,
    pub total: Decimal,
}

/// Sort key and direction from raw query values. Unknown keys fall back to newest first.
fn sort_spec(sort: Option<&str>, dir: Option<&str>) -> (HistorySort, bool) {
    match sort.and_then(|s| s.parse::<HistorySort>().ok()) {
        Some(key) => {
            let descending = !matches!(dir.map(str::to_ascii_lowercase).as_deref(), Some("asc"));
            (key, descending)
        }
        None => (HistorySort::Creado, true),
    }
}

fn compare_rows(a: &HistoryRow, b: &HistoryRow, key: HistorySort) -> Ordering {
    match key {
        HistorySort::Cliente => a.cliente.to_lowercase().cmp(&b.cliente.to_lowercase()),
        HistorySort::Creado => a.creado.cmp(&b.creado),
        HistorySort::Total => a.total.cmp(&b.total),
        HistorySort::Estado => a.estado.cmp(&b.estado),
    }
}

/// Blank names sort after every real one in either direction
fn sort_rows(rows: &mut [HistoryRow], key: HistorySort, descending: bool) {
    rows.sort_by(|a, b| {
        if key == HistorySort::Cliente {
            match (a.cliente.is_empty(), b.cliente.is_empty()) {
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                _ => {}
            }
        }
        let ord = compare_rows(a, b, key);
        let ord = if descending { ord.reverse() } else { ord };
        ord.then_with(|| b.pedido_id.cmp(&a.pedido_id))
    });
}

/// Read-only operational reports
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    row_limit: u64,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, row_limit: u64) -> Self {
        Self {
            db_pool,
            row_limit: row_limit.max(1),
        }
    }

    /// Confirmed-or-later orders with what each customer paid
    #[instrument(skip(self))]
    pub async fn customer_history(&self, query: HistoryQuery) -> Result<CustomerHistory, ServiceError> {
        let db = &*self.db_pool;
        let mut select = pedido::Entity::find()
            .filter(pedido::Column::Estado.is_in(OrderStatus::confirmed_codes()));
        if let Some(from) = query.d1.as_deref().and_then(parse_flexible_date) {
            select = select.filter(pedido::Column::CreatedAt.gte(start_of_business_day(from)));
        }
        if let Some(to) = query.d2.as_deref().and_then(parse_flexible_date) {
            let next_day = start_of_business_day(to) + Duration::days(1);
            select = select.filter(pedido::Column::CreatedAt.lt(next_day));
        }
        let orders = select
            .find_also_related(cliente::Entity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let emails: HashMap<i32, String> = usuario::Entity::find()
            .filter(usuario::Column::Id.is_in(
                orders.iter().filter_map(|(_, c)| c.as_ref().map(|c| c.usuario_id)),
            ))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();

        let mut paid: HashMap<i32, Decimal> = HashMap::new();
        for payment in pago::Entity::find()
            .filter(pago::Column::PedidoId.is_in(orders.iter().map(|(p, _)| p.id)))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            *paid.entry(payment.pedido_id).or_default() += payment.monto;
        }

        let needle = query
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let mut rows: Vec<HistoryRow> = orders
            .into_iter()
            .map(|(p, c)| {
                let email = c.as_ref().and_then(|c| emails.get(&c.usuario_id).cloned());
                HistoryRow {
                    pedido_id: p.id,
                    cliente: c.map(|c| c.nombre).unwrap_or_default(),
                    email,
                    creado: p.created_at,
                    estado: p.estado,
                    total: p.total,
                    pagado: paid.get(&p.id).copied().unwrap_or_default(),
                }
            })
            .filter(|row| match &needle {
                Some(n) => {
                    row.cliente.to_lowercase().contains(n)
                        || row.email.as_deref().is_some_and(|e| e.to_lowercase().contains(n))
                }
                None => true,
            })
            .collect();

        let (key, descending) = sort_spec(query.sort.as_deref(), query.dir.as_deref());
        sort_rows(&mut rows, key, descending);
        rows.truncate(self.row_limit as usize);

        debug!(rows = rows.len(), ?key, descending, "customer history built");
        Ok(CustomerHistory {
            cantidad: rows.len(),
            suma_total: rows.iter().map(|r| r.total).sum(),
            filas: rows,
        })
    }

    /// Count and Σ total for every status, including empty ones
    #[instrument(skip(self))]
    pub async fn status_summary(&self) -> Result<Vec<StatusCount>, ServiceError> {
        let orders = pedido::Entity::find()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        let mut buckets: HashMap<OrderStatus, (u64, Decimal)> = HashMap::new();
        for order in &orders {
            if let Some(status) = order.status() {
                let bucket = buckets.entry(status).or_default();
                bucket.0 += 1;
                bucket.1 += order.total;
            }
        }
        Ok(OrderStatus::iter()
            .map(|estado| {
                let (cantidad, total) = buckets.get(&estado).copied().unwrap_or_default();
                StatusCount {
                    estado,
                    cantidad,
                    total,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(id: i32, cliente: &str, total: Decimal, minutes: i64) -> HistoryRow {
        HistoryRow {
            pedido_id: id,
            cliente: cliente.into(),
            email: None,
            creado: Utc::now() - Duration::minutes(minutes),
            estado: "CONFIRMADO".into(),
            total,
            pagado: Decimal::ZERO,
        }
    }

    #[test]
    fn unknown_sort_falls_back_to_newest_first() {
        assert_eq!(sort_spec(Some("password"), Some("asc")), (HistorySort::Creado, true));
        assert_eq!(sort_spec(None, None), (HistorySort::Creado, true));
        assert_eq!(sort_spec(Some("TOTAL"), Some("asc")), (HistorySort::Total, false));
        assert_eq!(sort_spec(Some("cliente"), None), (HistorySort::Cliente, true));
    }

    #[test]
    fn blank_customer_names_sort_last() {
        let mut rows = vec![row(1, "", dec!(5), 1), row(2, "beto", dec!(9), 2), row(3, "Ana", dec!(7), 3)];
        sort_rows(&mut rows, HistorySort::Cliente, false);
        let ids: Vec<i32> = rows.iter().map(|r| r.pedido_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        sort_rows(&mut rows, HistorySort::Cliente, true);
        let ids: Vec<i32> = rows.iter().map(|r| r.pedido_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn default_order_is_newest_first() {
        let mut rows = vec![row(1, "a", dec!(1), 30), row(2, "b", dec!(1), 10), row(3, "c", dec!(1), 20)];
        sort_rows(&mut rows, HistorySort::Creado, true);
        let ids: Vec<i32> = rows.iter().map(|r| r.pedido_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
