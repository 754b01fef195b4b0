use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::envio,
    errors::ServiceError,
    models::{AuditAction, EnvioStatus, OrderStatus, ShippingMethod},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        orders::{apply_transition, load_order},
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AssignDeliveryInput {
    #[validate(length(min = 1, max = 100))]
    pub nombre_repartidor: String,
    #[validate(length(max = 30))]
    pub telefono_repartidor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliveryStatusInput {
    pub estado: EnvioStatus,
}

#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    /// Hands a ready delivery order to a courier
    #[instrument(skip(self, input, ctx))]
    pub async fn assign_delivery(
        &self,
        pedido_id: i32,
        input: AssignDeliveryInput,
        ctx: &AuditContext,
    ) -> Result<envio::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, pedido_id).await?;
        if order.metodo_envio.parse::<ShippingMethod>().ok() != Some(ShippingMethod::Delivery) {
            return Err(ServiceError::ValidationError(format!(
                "Pedido {pedido_id} no es para delivery"
            )));
        }
        if order.status() != Some(OrderStatus::ListoEntrega) {
            return Err(ServiceError::InvalidStatus(format!(
                "Pedido {pedido_id} no está listo para entrega"
            )));
        }
        let existing = envio::Entity::find()
            .filter(envio::Column::PedidoId.eq(pedido_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Pedido {pedido_id} ya tiene envío asignado"
            )));
        }

        let delivery = envio::ActiveModel {
            pedido_id: Set(pedido_id),
            estado: Set(EnvioStatus::Pendiente.to_string()),
            nombre_repartidor: Set(Some(input.nombre_repartidor.trim().to_string())),
            telefono_repartidor: Set(input.telefono_repartidor),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, envio_id = delivery.id, "delivery assigned");
        self.audit
            .record(ctx, AuditEntry::new("Envio", delivery.id, AuditAction::Crear))
            .await;
        Ok(delivery)
    }

    /// Moves the delivery forward; ENTREGADO also closes the order
    #[instrument(skip(self, ctx))]
    pub async fn update_delivery_status(
        &self,
        pedido_id: i32,
        next: EnvioStatus,
        ctx: &AuditContext,
    ) -> Result<envio::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let delivery = envio::Entity::find()
            .filter(envio::Column::PedidoId.eq(pedido_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Envío del pedido {pedido_id}")))?;
        let current: EnvioStatus = delivery.estado.parse().map_err(|_| {
            ServiceError::InternalError(format!("Envío {} con estado {}", delivery.id, delivery.estado))
        })?;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Envío no puede pasar de {current} a {next}"
            )));
        }

        let mut active = delivery.into_active_model();
        active.estado = Set(next.to_string());
        let delivery = active.update(&txn).await.map_err(ServiceError::db_error)?;

        if next == EnvioStatus::Entregado {
            let order = load_order(&txn, pedido_id).await?;
            apply_transition(&txn, order, OrderStatus::Entregado).await?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, from = %current, to = %next, "delivery status changed");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Envio", delivery.id, AuditAction::Actualizar).detail(next.to_string()),
            )
            .await;
        Ok(delivery)
    }

    #[instrument(skip(self))]
    pub async fn get_delivery(&self, pedido_id: i32) -> Result<envio::Model, ServiceError> {
        envio::Entity::find()
            .filter(envio::Column::PedidoId.eq(pedido_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Envío del pedido {pedido_id}")))
    }
}
