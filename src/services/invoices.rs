use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::factura,
    errors::ServiceError,
    models::{calendar::business_date, AuditAction, OrderStatus},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        orders::{load_order, status_of},
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IssueInvoiceInput {
    #[validate(length(min = 1, max = 20))]
    pub nit_cliente: String,
    #[validate(length(min = 1, max = 150))]
    pub razon_social: String,
}

/// `F-{yyyymmdd}-{pedido_id:06}` using the business-local date
pub fn invoice_number(fecha: DateTime<Utc>, pedido_id: i32) -> String {
    format!("F-{}-{:06}", business_date(fecha).format("%Y%m%d"), pedido_id)
}

#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn issue_invoice(
        &self,
        pedido_id: i32,
        input: IssueInvoiceInput,
        ctx: &AuditContext,
    ) -> Result<factura::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, pedido_id).await?;
        let estado = status_of(&order)?;
        if !OrderStatus::CONFIRMED_STATES.contains(&estado) {
            return Err(ServiceError::InvalidStatus(format!(
                "Pedido {pedido_id} en estado {estado} no se puede facturar"
            )));
        }
        let existing = factura::Entity::find()
            .filter(factura::Column::PedidoId.eq(pedido_id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Pedido {pedido_id} ya tiene factura"
            )));
        }

        let fecha = Utc::now();
        let invoice = factura::ActiveModel {
            pedido_id: Set(pedido_id),
            nro: Set(invoice_number(fecha, pedido_id)),
            fecha: Set(fecha),
            nit_cliente: Set(input.nit_cliente.trim().to_string()),
            razon_social: Set(input.razon_social.trim().to_string()),
            total: Set(order.total),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, nro = %invoice.nro, "invoice issued");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Factura", invoice.id, AuditAction::Crear).detail(invoice.nro.clone()),
            )
            .await;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, pedido_id: i32) -> Result<factura::Model, ServiceError> {
        factura::Entity::find()
            .filter(factura::Column::PedidoId.eq(pedido_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Factura del pedido {pedido_id}")))
    }
}
