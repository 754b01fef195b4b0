use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::DbPool, entities::bitacora, errors::ServiceError, models::AuditAction, PaginatedResponse,
};

/// Who triggered a change and from where
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub usuario_id: Option<i32>,
    pub ip: Option<String>,
}

impl AuditContext {
    pub fn new(usuario_id: Option<i32>, ip: Option<String>) -> Self {
        Self { usuario_id, ip }
    }

    /// Context for changes made outside any request (CLI, background jobs)
    pub fn system() -> Self {
        Self::default()
    }
}

/// One bitacora row to be written
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub entidad: &'static str,
    pub entidad_id: i32,
    pub accion: AuditAction,
    pub detalle: Option<String>,
}

impl AuditEntry {
    pub fn new(entidad: &'static str, entidad_id: i32, accion: AuditAction) -> Self {
        Self {
            entidad,
            entidad_id,
            accion,
            detalle: None,
        }
    }

    pub fn detail(mut self, detalle: impl Into<String>) -> Self {
        self.detalle = Some(detalle.into());
        self
    }
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct AuditFilter {
    pub entidad: Option<String>,
    pub usuario_id: Option<i32>,
}

/// Writes and reads the audit trail
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Best effort: a failed write is logged and counted, never returned.
    #[instrument(skip(self, ctx), fields(entidad = entry.entidad, entidad_id = entry.entidad_id))]
    pub async fn record(&self, ctx: &AuditContext, entry: AuditEntry) {
        let row = bitacora::ActiveModel {
            usuario_id: Set(ctx.usuario_id),
            entidad: Set(entry.entidad.to_string()),
            entidad_id: Set(entry.entidad_id),
            accion: Set(entry.accion.to_string()),
            ip: Set(ctx.ip.clone()),
            detalle: Set(entry.detalle),
            fecha: Set(Utc::now()),
            ..Default::default()
        };

        if let Err(e) = row.insert(&*self.db_pool).await {
            counter!("dulce_bocatto.audit.write_failures", 1);
            warn!(error = %e, accion = %entry.accion, "audit write failed");
        }
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditFilter,
        page: u64,
        per_page: u64,
    ) -> Result<PaginatedResponse<bitacora::Model>, ServiceError> {
        let mut query = bitacora::Entity::find();
        if let Some(entidad) = filter.entidad.filter(|e| !e.trim().is_empty()) {
            query = query.filter(bitacora::Column::Entidad.eq(entidad.trim().to_string()));
        }
        if let Some(usuario_id) = filter.usuario_id {
            query = query.filter(bitacora::Column::UsuarioId.eq(usuario_id));
        }

        let paginator = query
            .order_by_desc(bitacora::Column::Fecha)
            .order_by_desc(bitacora::Column::Id)
            .paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok(PaginatedResponse::new(items, total, page, per_page))
    }
}
