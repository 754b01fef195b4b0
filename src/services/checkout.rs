//! Card checkout through a hosted payment page.
//!
//! The provider is reached through [`CheckoutGateway`] so tests can stub the HTTP API.
//! A successful session is recorded as a STRIPE payment whose `referencia` is the
//! session id, which makes confirmation safe to repeat.

use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::Viewer,
    config::AppConfig,
    db::DbPool,
    entities::pago,
    errors::ServiceError,
    models::{from_cents, to_cents, AuditAction, OrderStatus, PaymentMethod, PaymentSummary},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        orders::{load_order, order_owner, payments_of},
        payments::insert_payment,
    },
};

/// Tolerance before an overpaying session is logged
const OVERPAYMENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub pedido_id: i32,
    pub usuario_id: i32,
    pub descripcion: String,
    pub amount_cents: i64,
    pub currency: String,
    pub saldo: Decimal,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, ServiceError>;
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, ServiceError>;
}

/// Talks to the Stripe Checkout Sessions API
pub struct StripeCheckoutClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeCheckoutClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    /// Built only when a secret key is configured
    pub fn from_config(cfg: &AppConfig) -> Result<Option<Self>, ServiceError> {
        match cfg.stripe_secret_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Self::new(&cfg.stripe_api_base, key).map(Some),
            _ => Ok(None),
        }
    }

    async fn read_session(response: reqwest::Response) -> Result<CheckoutSession, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "checkout provider rejected request");
            return Err(ServiceError::ExternalServiceError(format!(
                "Proveedor de pagos respondió {status}"
            )));
        }
        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Respuesta inválida: {e}")))
    }
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutClient {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, ServiceError> {
        let form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.amount_cents.to_string()),
            ("line_items[0][price_data][product_data][name]", request.descripcion.clone()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[pedido_id]", request.pedido_id.to_string()),
            ("metadata[saldo]", request.saldo.to_string()),
            ("metadata[user_id]", request.usuario_id.to_string()),
        ];
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Proveedor de pagos: {e}")))?;
        Self::read_session(response).await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, ServiceError> {
        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Proveedor de pagos: {e}")))?;
        Self::read_session(response).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutStart {
    pub session_id: String,
    pub url: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "resultado", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutOutcome {
    Recorded { pago_id: i32, monto: Decimal },
    AlreadyRecorded { pago_id: i32 },
    NotPaid { payment_status: String },
}

async fn payment_by_reference<C>(conn: &C, session_id: &str) -> Result<Option<pago::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    pago::Entity::find()
        .filter(pago::Column::Referencia.eq(session_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

#[derive(Clone)]
pub struct CheckoutService {
    db_pool: Arc<DbPool>,
    gateway: Option<Arc<dyn CheckoutGateway>>,
    site_url: String,
    currency: String,
    audit: Arc<AuditService>,
}

impl CheckoutService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Option<Arc<dyn CheckoutGateway>>,
        site_url: impl Into<String>,
        currency: impl Into<String>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            site_url: site_url.into().trim_end_matches('/').to_string(),
            currency: currency.into(),
            audit,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn CheckoutGateway>, ServiceError> {
        self.gateway.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("Pago con tarjeta no disponible".to_string())
        })
    }

    fn success_url(&self, pedido_id: i32) -> String {
        format!(
            "{}/pagos/stripe/success/{}?session_id={{CHECKOUT_SESSION_ID}}",
            self.site_url, pedido_id
        )
    }

    fn cancel_url(&self, pedido_id: i32) -> String {
        format!("{}/pagos/stripe/cancel/{}", self.site_url, pedido_id)
    }

    /// Opens a hosted checkout for the pending balance
    #[instrument(skip(self))]
    pub async fn start_checkout(&self, pedido_id: i32, viewer: Viewer) -> Result<CheckoutStart, ServiceError> {
        let gateway = self.gateway()?;
        let db = &*self.db_pool;
        let order = load_order(db, pedido_id).await?;
        let owner = order_owner(db, &order).await?;
        if owner != Some(viewer.usuario_id) && !viewer.is_staff {
            return Err(ServiceError::NotFound(format!("Pedido {pedido_id}")));
        }
        if order.status() == Some(OrderStatus::Cancelado) {
            return Err(ServiceError::InvalidStatus(
                "No se puede pagar un pedido cancelado".to_string(),
            ));
        }

        let (_, resumen) = payments_of(db, &order).await?;
        if resumen.saldo <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "El pedido no tiene saldo pendiente".to_string(),
            ));
        }

        let request = CheckoutRequest {
            pedido_id,
            usuario_id: viewer.usuario_id,
            descripcion: format!("Pedido #{pedido_id} Dulce Bocatto"),
            amount_cents: to_cents(resumen.saldo),
            currency: self.currency.clone(),
            saldo: resumen.saldo,
            success_url: self.success_url(pedido_id),
            cancel_url: self.cancel_url(pedido_id),
        };
        let session = gateway.create_session(&request).await?;

        counter!("dulce_bocatto.checkout.sessions", 1);
        info!(pedido_id, session_id = %session.id, amount_cents = request.amount_cents, "checkout session created");
        Ok(CheckoutStart {
            session_id: session.id,
            url: session.url,
            amount_cents: request.amount_cents,
            currency: request.currency,
        })
    }

    /// Records the card payment once the provider reports it paid
    #[instrument(skip(self, ctx))]
    pub async fn confirm_checkout(
        &self,
        pedido_id: i32,
        session_id: &str,
        ctx: &AuditContext,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let db = &*self.db_pool;
        if let Some(existing) = payment_by_reference(db, session_id).await? {
            return Ok(CheckoutOutcome::AlreadyRecorded { pago_id: existing.id });
        }

        let session = self.gateway()?.retrieve_session(session_id).await?;
        if let Some(meta_id) = session.metadata.get("pedido_id") {
            if meta_id.parse::<i32>().ok() != Some(pedido_id) {
                return Err(ServiceError::ValidationError(
                    "La sesión de pago no corresponde al pedido".to_string(),
                ));
            }
        }
        if session.payment_status != "paid" {
            info!(pedido_id, session_id, status = %session.payment_status, "checkout not paid");
            return Ok(CheckoutOutcome::NotPaid {
                payment_status: session.payment_status,
            });
        }

        let monto = from_cents(session.amount_total.unwrap_or_default());
        let pagador = session
            .metadata
            .get("user_id")
            .and_then(|id| id.parse::<i32>().ok())
            .or(ctx.usuario_id);

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        if let Some(existing) = payment_by_reference(&txn, session_id).await? {
            return Ok(CheckoutOutcome::AlreadyRecorded { pago_id: existing.id });
        }
        let order = load_order(&txn, pedido_id).await?;
        let (_, resumen) = payments_of(&txn, &order).await?;
        if monto > resumen.saldo + OVERPAYMENT_TOLERANCE {
            warn!(pedido_id, %monto, saldo = %resumen.saldo, "checkout amount exceeds balance");
        }
        let inserted = insert_payment(
            &txn,
            pedido_id,
            PaymentMethod::Stripe,
            monto,
            Some(session_id.to_string()),
            pagador,
        )
        .await;
        let pago = match inserted {
            Ok(pago) => pago,
            Err(ServiceError::DatabaseError(err))
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                // A concurrent confirmation stored the same session first
                txn.rollback().await.map_err(ServiceError::db_error)?;
                return match payment_by_reference(db, session_id).await? {
                    Some(existing) => Ok(CheckoutOutcome::AlreadyRecorded { pago_id: existing.id }),
                    None => Err(ServiceError::DatabaseError(err)),
                };
            }
            Err(err) => return Err(err),
        };
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id, pago_id = pago.id, %monto, "checkout payment recorded");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Pago", pago.id, AuditAction::Crear)
                    .detail(format!("Pedido #{pedido_id} STRIPE {monto}")),
            )
            .await;
        Ok(CheckoutOutcome::Recorded {
            pago_id: pago.id,
            monto,
        })
    }

    /// The customer left the hosted page; nothing changes
    #[instrument(skip(self))]
    pub async fn cancel_checkout(&self, pedido_id: i32) -> Result<PaymentSummary, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, pedido_id).await?;
        let (_, resumen) = payments_of(db, &order).await?;
        info!(pedido_id, "checkout cancelled by customer");
        Ok(resumen)
    }
}
