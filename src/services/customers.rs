use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{cliente, pedido, usuario},
    errors::ServiceError,
    models::OrderStatus,
};

pub const DEFAULT_ADDRESS: &str = "Dirección por defecto";

/// A customer's own orders with the amount still pending
#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerProfile {
    #[schema(value_type = Object)]
    pub cliente: cliente::Model,
    #[schema(value_type = Vec<Object>)]
    pub pedidos: Vec<pedido::Model>,
    /// Σ total over PENDIENTE orders
    pub gran_total: Decimal,
}

/// Cliente row of `usuario_id`, created from the account data on first use.
pub(crate) async fn get_or_create_cliente<C>(
    conn: &C,
    usuario_id: i32,
) -> Result<cliente::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(existing) = cliente::Entity::find()
        .filter(cliente::Column::UsuarioId.eq(usuario_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    {
        return Ok(existing);
    }

    let user = usuario::Entity::find_by_id(usuario_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Usuario {usuario_id}")))?;

    let created = cliente::ActiveModel {
        usuario_id: Set(user.id),
        nombre: Set(user.nombre.clone()),
        telefono: Set(user.telefono.clone()),
        direccion: Set(DEFAULT_ADDRESS.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    info!(usuario_id, cliente_id = created.id, "customer record created");
    Ok(created)
}

#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn current_customer(&self, usuario_id: i32) -> Result<cliente::Model, ServiceError> {
        get_or_create_cliente(&*self.db_pool, usuario_id).await
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, usuario_id: i32) -> Result<CustomerProfile, ServiceError> {
        let cliente = self.current_customer(usuario_id).await?;
        let pedidos = pedido::Entity::find()
            .filter(pedido::Column::ClienteId.eq(cliente.id))
            .order_by_desc(pedido::Column::CreatedAt)
            .order_by_desc(pedido::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let gran_total = pending_total(&pedidos);
        Ok(CustomerProfile {
            cliente,
            pedidos,
            gran_total,
        })
    }
}

fn pending_total(pedidos: &[pedido::Model]) -> Decimal {
    pedidos
        .iter()
        .filter(|p| p.status() == Some(OrderStatus::Pendiente))
        .map(|p| p.total)
        .sum()
}
