//! Kitchen workflow: which orders to bake, what they need, and the stock they consume.

use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{cliente, detalle_pedido, insumo, pedido, receta},
    errors::ServiceError,
    models::{AuditAction, MovementReason, MovementType, OrderStatus},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        inventory::{append_movement, ledger_stock},
        orders::{apply_transition, load_order, order_lines, status_of, OrderSummary},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Requirement {
    pub insumo_id: i32,
    pub insumo_nombre: String,
    pub unidad_medida: String,
    pub requerido: Decimal,
    pub stock: Decimal,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanLine {
    pub producto_id: i32,
    pub producto_nombre: String,
    pub sabor_id: i32,
    pub sabor_nombre: String,
    pub cantidad: i32,
    pub producido: bool,
    pub insumos: Vec<Requirement>,
    /// Every ingredient is covered
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductionPlan {
    pub pedido_id: i32,
    pub estado: String,
    pub lineas: Vec<PlanLine>,
    pub listo_para_entrega: bool,
}

/// Queue order: scheduled delivery first (unscheduled last), then creation time
fn queue_order(a: &OrderSummary, b: &OrderSummary) -> Ordering {
    match (a.fecha_entrega_programada, b.fecha_entrega_programada) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.created_at.cmp(&b.created_at))
    .then_with(|| a.id.cmp(&b.id))
}

/// Per-ingredient needs for `cantidad` units of a product
async fn requirements<C>(conn: &C, producto_id: i32, cantidad: i32) -> Result<Vec<Requirement>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = receta::Entity::find()
        .filter(receta::Column::ProductoId.eq(producto_id))
        .find_also_related(insumo::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut needs = Vec::with_capacity(rows.len());
    for (row, ingredient) in rows {
        let Some(ingredient) = ingredient else { continue };
        let requerido = (row.cantidad * Decimal::from(cantidad)).round_dp(3);
        let stock = ledger_stock(conn, ingredient.id).await?;
        needs.push(Requirement {
            insumo_id: ingredient.id,
            insumo_nombre: ingredient.nombre,
            unidad_medida: ingredient.unidad_medida,
            requerido,
            ok: stock >= requerido,
            stock,
        });
    }
    needs.sort_by(|a, b| a.insumo_nombre.cmp(&b.insumo_nombre));
    Ok(needs)
}

#[derive(Clone)]
pub struct ProductionService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl ProductionService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    /// CONFIRMADO and EN_PRODUCCION orders in baking order
    #[instrument(skip(self))]
    pub async fn production_queue(&self) -> Result<Vec<OrderSummary>, ServiceError> {
        let codes: Vec<String> = [OrderStatus::Confirmado, OrderStatus::EnProduccion]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut queue: Vec<OrderSummary> = pedido::Entity::find()
            .filter(pedido::Column::Estado.is_in(codes))
            .find_also_related(cliente::Entity)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|(p, c)| OrderSummary::from_parts(p, c))
            .collect();
        queue.sort_by(queue_order);
        Ok(queue)
    }

    #[instrument(skip(self))]
    pub async fn production_plan(&self, pedido_id: i32) -> Result<ProductionPlan, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, pedido_id).await?;

        let mut lineas = Vec::new();
        for line in order_lines(db, pedido_id).await? {
            let insumos = requirements(db, line.producto_id, line.cantidad).await?;
            lineas.push(PlanLine {
                ok: insumos.iter().all(|r| r.ok),
                producto_id: line.producto_id,
                producto_nombre: line.producto_nombre,
                sabor_id: line.sabor_id,
                sabor_nombre: line.sabor_nombre,
                cantidad: line.cantidad,
                producido: line.producido,
                insumos,
            });
        }

        Ok(ProductionPlan {
            pedido_id,
            listo_para_entrega: !lineas.is_empty() && lineas.iter().all(|l| l.producido),
            estado: order.estado,
            lineas,
        })
    }

    /// CONFIRMADO → EN_PRODUCCION
    #[instrument(skip(self, ctx))]
    pub async fn start_production(
        &self,
        pedido_id: i32,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let order = load_order(&txn, pedido_id).await?;
        let order = apply_transition(&txn, order, OrderStatus::EnProduccion).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", pedido_id, AuditAction::Actualizar)
                    .detail(OrderStatus::EnProduccion.to_string()),
            )
            .await;
        Ok(order)
    }

    /// Consumes the recipe for one line and marks it produced.
    ///
    /// A CONFIRMADO order moves to EN_PRODUCCION with its first produced line.
    #[instrument(skip(self, ctx))]
    pub async fn produce_item(
        &self,
        pedido_id: i32,
        producto_id: i32,
        sabor_id: i32,
        ctx: &AuditContext,
    ) -> Result<ProductionPlan, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, pedido_id).await?;
        let estado = status_of(&order)?;
        if !estado.is_in_production_queue() {
            return Err(ServiceError::InvalidStatus(format!(
                "Pedido {pedido_id} en estado {estado} no admite producción"
            )));
        }

        let line = detalle_pedido::Entity::find_by_id((pedido_id, producto_id, sabor_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Item producto {producto_id} sabor {sabor_id} del pedido {pedido_id}"
                ))
            })?;
        if line.producido {
            return Err(ServiceError::Conflict(
                "El item ya fue producido".to_string(),
            ));
        }

        let needs = requirements(&txn, producto_id, line.cantidad).await?;
        let missing: Vec<String> = needs
            .iter()
            .filter(|r| !r.ok)
            .map(|r| format!("{} (requiere {}, hay {})", r.insumo_nombre, r.requerido, r.stock))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InsufficientStock(format!(
                "Faltan insumos: {}",
                missing.join(", ")
            )));
        }

        let observacion = format!("PRODUCCION PEDIDO #{pedido_id}");
        for need in &needs {
            let ingredient = insumo::Entity::find_by_id(need.insumo_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Insumo {}", need.insumo_id)))?;
            append_movement(
                &txn,
                ingredient,
                MovementType::Salida,
                MovementReason::Produccion,
                need.requerido,
                Some(observacion.clone()),
            )
            .await?;
            counter!("dulce_bocatto.production.deductions", 1);
        }

        let mut active = line.into_active_model();
        active.producido = Set(true);
        active.update(&txn).await.map_err(ServiceError::db_error)?;

        if estado == OrderStatus::Confirmado {
            apply_transition(&txn, order, OrderStatus::EnProduccion).await?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, producto_id, sabor_id, insumos = needs.len(), "order line produced");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", pedido_id, AuditAction::Actualizar)
                    .detail(format!("PRODUCIDO producto {producto_id} sabor {sabor_id}")),
            )
            .await;
        self.production_plan(pedido_id).await
    }

    /// Every line must be produced before the order is ready
    #[instrument(skip(self, ctx))]
    pub async fn mark_ready(
        &self,
        pedido_id: i32,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let order = load_order(&txn, pedido_id).await?;

        let lines = detalle_pedido::Entity::find()
            .filter(detalle_pedido::Column::PedidoId.eq(pedido_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if lines.is_empty() || lines.iter().any(|l| !l.producido) {
            return Err(ServiceError::ValidationError("Faltan insumos".to_string()));
        }

        let order = apply_transition(&txn, order, OrderStatus::ListoEntrega).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", pedido_id, AuditAction::Actualizar)
                    .detail(OrderStatus::ListoEntrega.to_string()),
            )
            .await;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn summary(id: i32, minutes_ago: i64, scheduled_in_days: Option<i64>) -> OrderSummary {
        let now = Utc::now();
        OrderSummary {
            id,
            cliente_id: 1,
            cliente_nombre: "Ana".into(),
            estado: "CONFIRMADO".into(),
            metodo_envio: "local".into(),
            total: dec!(10),
            created_at: now - Duration::minutes(minutes_ago),
            fecha_entrega_programada: scheduled_in_days.map(|d| now + Duration::days(d)),
        }
    }

    #[test]
    fn scheduled_orders_come_first_then_oldest() {
        let mut queue = vec![
            summary(1, 10, None),
            summary(2, 5, Some(3)),
            summary(3, 30, None),
            summary(4, 1, Some(1)),
        ];
        queue.sort_by(queue_order);
        let ids: Vec<i32> = queue.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }
}
