use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{insumo, producto, receta},
    errors::ServiceError,
    models::AuditAction,
    services::audit::{AuditContext, AuditEntry, AuditService},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeLineInput {
    pub insumo_id: i32,
    /// Per unit of product
    pub cantidad: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeLineView {
    pub insumo_id: i32,
    pub insumo_nombre: String,
    pub unidad_medida: String,
    pub cantidad: Decimal,
}

fn validate_lines(lines: &[RecipeLineInput]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for line in lines {
        if line.cantidad.round_dp(3) <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "La cantidad de cada insumo debe ser mayor a cero".to_string(),
            ));
        }
        if !seen.insert(line.insumo_id) {
            return Err(ServiceError::ValidationError(format!(
                "Insumo {} repetido en la receta",
                line.insumo_id
            )));
        }
    }
    Ok(())
}

/// Bills of materials per product
#[derive(Clone)]
pub struct RecipeService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl RecipeService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    #[instrument(skip(self))]
    pub async fn get_recipe(&self, producto_id: i32) -> Result<Vec<RecipeLineView>, ServiceError> {
        let db = &*self.db_pool;
        producto::Entity::find_by_id(producto_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Producto {producto_id}")))?;

        let rows = receta::Entity::find()
            .filter(receta::Column::ProductoId.eq(producto_id))
            .find_also_related(insumo::Entity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut lines: Vec<RecipeLineView> = rows
            .into_iter()
            .filter_map(|(r, i)| {
                i.map(|i| RecipeLineView {
                    insumo_id: r.insumo_id,
                    insumo_nombre: i.nombre,
                    unidad_medida: i.unidad_medida,
                    cantidad: r.cantidad,
                })
            })
            .collect();
        lines.sort_by(|a, b| a.insumo_nombre.cmp(&b.insumo_nombre));
        Ok(lines)
    }

    /// Replaces every recipe row of the product
    #[instrument(skip(self, lines, ctx))]
    pub async fn set_recipe(
        &self,
        producto_id: i32,
        lines: Vec<RecipeLineInput>,
        ctx: &AuditContext,
    ) -> Result<Vec<RecipeLineView>, ServiceError> {
        validate_lines(&lines)?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        producto::Entity::find_by_id(producto_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Producto {producto_id}")))?;

        let wanted: HashMap<i32, Decimal> = lines
            .iter()
            .map(|l| (l.insumo_id, l.cantidad.round_dp(3)))
            .collect();
        let known = insumo::Entity::find()
            .filter(insumo::Column::Id.is_in(wanted.keys().copied()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if known as usize != wanted.len() {
            return Err(ServiceError::ValidationError(
                "La receta referencia insumos inexistentes".to_string(),
            ));
        }

        receta::Entity::delete_many()
            .filter(receta::Column::ProductoId.eq(producto_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if !wanted.is_empty() {
            receta::Entity::insert_many(wanted.iter().map(|(insumo_id, cantidad)| receta::ActiveModel {
                producto_id: Set(producto_id),
                insumo_id: Set(*insumo_id),
                cantidad: Set(*cantidad),
            }))
            .exec_without_returning(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(producto_id, insumos = wanted.len(), "recipe replaced");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Receta", producto_id, AuditAction::Actualizar),
            )
            .await;
        self.get_recipe(producto_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn recipe_lines_need_positive_unique_ingredients() {
        let line = |insumo_id, cantidad| RecipeLineInput { insumo_id, cantidad };
        assert!(validate_lines(&[line(1, dec!(0.25)), line(2, dec!(1))]).is_ok());
        assert!(validate_lines(&[line(1, dec!(0))]).is_err());
        assert!(validate_lines(&[line(1, dec!(0.0004))]).is_err());
        assert!(validate_lines(&[line(1, dec!(0.0006))]).is_ok());
        assert!(validate_lines(&[line(1, dec!(0.5)), line(1, dec!(0.5))]).is_err());
        assert!(validate_lines(&[]).is_ok());
    }
}
