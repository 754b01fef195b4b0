use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::Viewer,
    db::DbPool,
    entities::calificacion,
    errors::ServiceError,
    models::{AuditAction, OrderStatus},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        orders::{load_order, order_owner},
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RateOrderInput {
    #[validate(range(min = 1, max = 5))]
    pub puntaje: i32,
    #[validate(length(max = 500))]
    pub comentario: Option<String>,
}

#[derive(Clone)]
pub struct RatingService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl RatingService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    /// One rating per delivered order, by its owner
    #[instrument(skip(self, input, ctx))]
    pub async fn rate_order(
        &self,
        pedido_id: i32,
        viewer: Viewer,
        input: RateOrderInput,
        ctx: &AuditContext,
    ) -> Result<calificacion::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, pedido_id).await?;
        if order_owner(&txn, &order).await? != Some(viewer.usuario_id) {
            return Err(ServiceError::NotFound(format!("Pedido {pedido_id}")));
        }
        if order.status() != Some(OrderStatus::Entregado) {
            return Err(ServiceError::InvalidStatus(
                "Solo se pueden calificar pedidos entregados".to_string(),
            ));
        }
        let rated = calificacion::Entity::find()
            .filter(calificacion::Column::PedidoId.eq(pedido_id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if rated > 0 {
            return Err(ServiceError::Conflict(format!(
                "Pedido {pedido_id} ya fue calificado"
            )));
        }

        let rating = calificacion::ActiveModel {
            pedido_id: Set(pedido_id),
            puntaje: Set(input.puntaje),
            comentario: Set(input.comentario.filter(|c| !c.trim().is_empty())),
            fecha: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, puntaje = rating.puntaje, "order rated");
        self.audit
            .record(ctx, AuditEntry::new("Calificacion", rating.id, AuditAction::Crear))
            .await;
        Ok(rating)
    }

    #[instrument(skip(self))]
    pub async fn get_rating(&self, pedido_id: i32) -> Result<Option<calificacion::Model>, ServiceError> {
        calificacion::Entity::find()
            .filter(calificacion::Column::PedidoId.eq(pedido_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_must_be_between_one_and_five() {
        let ok = RateOrderInput { puntaje: 5, comentario: None };
        assert!(ok.validate().is_ok());
        let low = RateOrderInput { puntaje: 0, comentario: None };
        assert!(low.validate().is_err());
        let high = RateOrderInput { puntaje: 6, comentario: Some("Excelente".into()) };
        assert!(high.validate().is_err());
    }
}
