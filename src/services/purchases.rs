use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::DbPool,
    entities::{compra, compra_detalle, insumo, proveedor},
    errors::ServiceError,
    models::{AuditAction, MovementReason, MovementType},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        inventory::{append_movement, load_ingredient},
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurchaseLineInput {
    pub insumo_id: i32,
    pub cantidad: Decimal,
    pub costo_unitario: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePurchaseInput {
    pub proveedor_id: i32,
    pub fecha: Option<DateTime<Utc>>,
    pub lineas: Vec<PurchaseLineInput>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct PurchaseQuery {
    pub proveedor_id: Option<i32>,
    pub recepcionada: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseLineView {
    pub id: i32,
    pub insumo_id: i32,
    pub insumo_nombre: String,
    pub cantidad: Decimal,
    pub costo_unitario: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseView {
    #[schema(value_type = Object)]
    pub compra: compra::Model,
    pub proveedor_nombre: String,
    pub lineas: Vec<PurchaseLineView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseSummary {
    pub id: i32,
    pub proveedor_id: i32,
    pub proveedor_nombre: String,
    pub fecha: DateTime<Utc>,
    pub total: Decimal,
    pub recepcionada: bool,
}

/// Σ cantidad × costo_unitario, rounded to cents
pub fn purchase_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    lines
        .into_iter()
        .map(|(cantidad, costo)| cantidad * costo)
        .sum::<Decimal>()
        .round_dp(2)
}

fn validate_lines(lines: &[PurchaseLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "La compra debe tener al menos una línea".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if line.cantidad.round_dp(3) <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "La cantidad debe ser mayor a cero".to_string(),
            ));
        }
        if line.costo_unitario.round_dp(2) < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "El costo unitario no puede ser negativo".to_string(),
            ));
        }
        if !seen.insert(line.insumo_id) {
            return Err(ServiceError::ValidationError(format!(
                "Insumo {} repetido en la compra",
                line.insumo_id
            )));
        }
    }
    Ok(())
}

/// Supplier purchase orders and their reception into stock
#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    #[instrument(skip(self, input, ctx), fields(proveedor_id = input.proveedor_id))]
    pub async fn create_purchase(
        &self,
        input: CreatePurchaseInput,
        ctx: &AuditContext,
    ) -> Result<PurchaseView, ServiceError> {
        validate_lines(&input.lineas)?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        proveedor::Entity::find_by_id(input.proveedor_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Proveedor {}", input.proveedor_id)))?;
        let known = insumo::Entity::find()
            .filter(insumo::Column::Id.is_in(input.lineas.iter().map(|l| l.insumo_id)))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if known as usize != input.lineas.len() {
            return Err(ServiceError::ValidationError(
                "La compra referencia insumos inexistentes".to_string(),
            ));
        }

        let lines: Vec<(i32, Decimal, Decimal)> = input
            .lineas
            .iter()
            .map(|l| (l.insumo_id, l.cantidad.round_dp(3), l.costo_unitario.round_dp(2)))
            .collect();
        let purchase = compra::ActiveModel {
            proveedor_id: Set(input.proveedor_id),
            fecha: Set(input.fecha.unwrap_or_else(Utc::now)),
            total: Set(purchase_total(lines.iter().map(|(_, c, p)| (*c, *p)))),
            recepcionada: Set(false),
            fecha_recepcion: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        compra_detalle::Entity::insert_many(lines.iter().map(|(insumo_id, cantidad, costo)| {
            compra_detalle::ActiveModel {
                compra_id: Set(purchase.id),
                insumo_id: Set(*insumo_id),
                cantidad: Set(*cantidad),
                costo_unitario: Set(*costo),
                ..Default::default()
            }
        }))
        .exec_without_returning(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(compra_id = purchase.id, total = %purchase.total, "purchase created");
        self.audit
            .record(ctx, AuditEntry::new("Compra", purchase.id, AuditAction::Crear))
            .await;
        self.get_purchase(purchase.id).await
    }

    /// Books every line into the ledger. Works once.
    #[instrument(skip(self, ctx))]
    pub async fn receive_purchase(&self, id: i32, ctx: &AuditContext) -> Result<PurchaseView, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let purchase = compra::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Compra {id}")))?;
        if purchase.recepcionada {
            return Err(ServiceError::Conflict(format!("La compra {id} ya fue recepcionada")));
        }

        let lines = compra_detalle::Entity::find()
            .filter(compra_detalle::Column::CompraId.eq(id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let observacion = format!("COMPRA #{id}");
        for line in &lines {
            let ingredient = load_ingredient(&txn, line.insumo_id).await?;
            append_movement(
                &txn,
                ingredient,
                MovementType::Entrada,
                MovementReason::Compra,
                line.cantidad,
                Some(observacion.clone()),
            )
            .await?;
        }

        let mut active = purchase.into_active_model();
        active.recepcionada = Set(true);
        active.fecha_recepcion = Set(Some(Utc::now()));
        active.update(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(compra_id = id, lines = lines.len(), "purchase received");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Compra", id, AuditAction::Actualizar).detail("RECEPCIONADA"),
            )
            .await;
        self.get_purchase(id).await
    }

    #[instrument(skip(self))]
    pub async fn list_purchases(&self, query: PurchaseQuery) -> Result<Vec<PurchaseSummary>, ServiceError> {
        let mut select = compra::Entity::find();
        if let Some(proveedor_id) = query.proveedor_id {
            select = select.filter(compra::Column::ProveedorId.eq(proveedor_id));
        }
        if let Some(recepcionada) = query.recepcionada {
            select = select.filter(compra::Column::Recepcionada.eq(recepcionada));
        }
        let rows = select
            .find_also_related(proveedor::Entity)
            .order_by_desc(compra::Column::Fecha)
            .order_by_desc(compra::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(rows
            .into_iter()
            .map(|(c, p)| PurchaseSummary {
                id: c.id,
                proveedor_id: c.proveedor_id,
                proveedor_nombre: p.map(|p| p.nombre).unwrap_or_default(),
                fecha: c.fecha,
                total: c.total,
                recepcionada: c.recepcionada,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_purchase(&self, id: i32) -> Result<PurchaseView, ServiceError> {
        let db = &*self.db_pool;
        let (purchase, supplier) = compra::Entity::find_by_id(id)
            .find_also_related(proveedor::Entity)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Compra {id}")))?;

        let rows = compra_detalle::Entity::find()
            .filter(compra_detalle::Column::CompraId.eq(id))
            .order_by_asc(compra_detalle::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let names: HashMap<i32, String> = insumo::Entity::find()
            .filter(insumo::Column::Id.is_in(rows.iter().map(|r| r.insumo_id)))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|i| (i.id, i.nombre))
            .collect();

        let lineas = rows
            .into_iter()
            .map(|r| PurchaseLineView {
                id: r.id,
                insumo_id: r.insumo_id,
                insumo_nombre: names.get(&r.insumo_id).cloned().unwrap_or_default(),
                subtotal: (r.cantidad * r.costo_unitario).round_dp(2),
                cantidad: r.cantidad,
                costo_unitario: r.costo_unitario,
            })
            .collect();
        Ok(PurchaseView {
            compra: purchase,
            proveedor_nombre: supplier.map(|s| s.nombre).unwrap_or_default(),
            lineas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(insumo_id: i32, cantidad: Decimal, costo: Decimal) -> PurchaseLineInput {
        PurchaseLineInput {
            insumo_id,
            cantidad,
            costo_unitario: costo,
        }
    }

    #[test]
    fn total_is_rounded_to_cents() {
        let total = purchase_total([(dec!(2.5), dec!(12.34)), (dec!(0.333), dec!(10.01))]);
        assert_eq!(total, dec!(34.18));
    }

    #[test]
    fn lines_are_checked() {
        assert!(validate_lines(&[line(1, dec!(1), dec!(0))]).is_ok());
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(1, dec!(0), dec!(1))]).is_err());
        assert!(validate_lines(&[line(1, dec!(0.0001), dec!(1))]).is_err());
        assert!(validate_lines(&[line(1, dec!(0.001), dec!(-0.001))]).is_ok());
        assert!(validate_lines(&[line(1, dec!(1), dec!(-0.01))]).is_err());
        assert!(validate_lines(&[line(1, dec!(1), dec!(1)), line(1, dec!(2), dec!(1))]).is_err());
    }
}
