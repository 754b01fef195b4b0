use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::Viewer,
    db::DbPool,
    entities::pago,
    errors::ServiceError,
    models::{AuditAction, OrderStatus, PaymentMethod, PaymentSummary},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        orders::{load_order, order_owner, payments_of},
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterPaymentInput {
    pub metodo: PaymentMethod,
    pub monto: Decimal,
    pub referencia: Option<String>,
}

/// Outcome of a registered payment
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReceipt {
    #[schema(value_type = Object)]
    pub pago: pago::Model,
    pub resumen: PaymentSummary,
    pub pagado_completo: bool,
    pub mensaje: String,
}

impl PaymentReceipt {
    fn new(pago: pago::Model, resumen: PaymentSummary) -> Self {
        let pagado_completo = resumen.is_fully_paid();
        let mensaje = if pagado_completo {
            "Pedido pagado por completo".to_string()
        } else {
            format!("Pago registrado. Saldo pendiente: Bs {}", resumen.saldo)
        };
        Self {
            pago,
            resumen,
            pagado_completo,
            mensaje,
        }
    }
}

/// Stores a payment row without any access checks
pub(crate) async fn insert_payment<C>(
    conn: &C,
    pedido_id: i32,
    metodo: PaymentMethod,
    monto: Decimal,
    referencia: Option<String>,
    registrado_por_id: Option<i32>,
) -> Result<pago::Model, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    // Amounts below one cent round to zero and are rejected
    let monto = monto.round_dp(2);
    if monto <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "El monto debe ser mayor a cero".to_string(),
        ));
    }
    let pago = pago::ActiveModel {
        pedido_id: Set(pedido_id),
        metodo: Set(metodo.to_string()),
        monto: Set(monto),
        referencia: Set(referencia),
        registrado_por_id: Set(registrado_por_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;
    counter!("dulce_bocatto.payments.recorded", 1);
    Ok(pago)
}

/// Manual payment collection and balances
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    /// Records a payment made by the owner or taken by staff
    #[instrument(skip(self, input, ctx), fields(metodo = %input.metodo))]
    pub async fn register_payment(
        &self,
        pedido_id: i32,
        viewer: Viewer,
        can_manage: bool,
        input: RegisterPaymentInput,
        ctx: &AuditContext,
    ) -> Result<PaymentReceipt, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, pedido_id).await?;
        let owner = order_owner(&txn, &order).await?;
        if owner != Some(viewer.usuario_id) && !viewer.is_staff && !can_manage {
            return Err(ServiceError::NotFound(format!("Pedido {pedido_id}")));
        }
        if order.status() == Some(OrderStatus::Cancelado) {
            return Err(ServiceError::InvalidStatus(
                "No se puede pagar un pedido cancelado".to_string(),
            ));
        }

        let referencia = input
            .referencia
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let pago = insert_payment(
            &txn,
            pedido_id,
            input.metodo,
            input.monto,
            referencia,
            Some(viewer.usuario_id),
        )
        .await?;
        let (_, resumen) = payments_of(&txn, &order).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, pago_id = pago.id, monto = %pago.monto, saldo = %resumen.saldo, "payment registered");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Pago", pago.id, AuditAction::Crear)
                    .detail(format!("Pedido #{pedido_id} {} {}", pago.metodo, pago.monto)),
            )
            .await;
        Ok(PaymentReceipt::new(pago, resumen))
    }

    #[instrument(skip(self))]
    pub async fn payment_summary(&self, pedido_id: i32) -> Result<PaymentSummary, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, pedido_id).await?;
        let (_, resumen) = payments_of(db, &order).await?;
        Ok(resumen)
    }

    /// Payments of an order, visible to the owner and to order readers
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        pedido_id: i32,
        viewer: Viewer,
        can_read_all: bool,
    ) -> Result<Vec<pago::Model>, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, pedido_id).await?;
        if !can_read_all && !viewer.is_staff {
            let owner = order_owner(db, &order).await?;
            if owner != Some(viewer.usuario_id) {
                return Err(ServiceError::NotFound(format!("Pedido {pedido_id}")));
            }
        }
        let (pagos, _) = payments_of(db, &order).await?;
        Ok(pagos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pago(monto: Decimal) -> pago::Model {
        pago::Model {
            id: 1,
            pedido_id: 1,
            metodo: "EFECTIVO".into(),
            monto,
            referencia: None,
            registrado_por_id: Some(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn receipt_reports_remaining_balance() {
        let receipt = PaymentReceipt::new(
            pago(dec!(20.00)),
            PaymentSummary::new(dec!(35.00), [dec!(20.00)]),
        );
        assert!(!receipt.pagado_completo);
        assert_eq!(receipt.resumen.saldo, dec!(15.00));
        assert!(receipt.mensaje.contains("15.00"));
    }

    #[test]
    fn receipt_reports_full_payment() {
        let receipt = PaymentReceipt::new(
            pago(dec!(35.00)),
            PaymentSummary::new(dec!(35.00), [dec!(35.00)]),
        );
        assert!(receipt.pagado_completo);
        assert_eq!(receipt.mensaje, "Pedido pagado por completo");
    }
}
