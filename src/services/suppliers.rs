use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{compra, proveedor},
    errors::ServiceError,
    models::AuditAction,
    services::audit::{AuditContext, AuditEntry, AuditService},
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 150))]
    pub nombre: String,
    #[validate(length(max = 30))]
    pub telefono: Option<String>,
    #[validate(length(max = 200))]
    pub direccion: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct SupplierQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
    page_size: u64,
    audit: Arc<AuditService>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>, page_size: u64, audit: Arc<AuditService>) -> Self {
        Self {
            db_pool,
            page_size: page_size.max(1),
            audit,
        }
    }

    /// Name-filtered, alphabetical, paginated
    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        query: SupplierQuery,
    ) -> Result<PaginatedResponse<proveedor::Model>, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let mut select = proveedor::Entity::find();
        if let Some(q) = optional(query.q) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(proveedor::Column::Nombre)))
                    .like(format!("%{}%", q.to_lowercase())),
            );
        }
        let paginator = select
            .order_by_asc(proveedor::Column::Nombre)
            .order_by_asc(proveedor::Column::Id)
            .paginate(&*self.db_pool, self.page_size);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(PaginatedResponse::new(items, total, page, self.page_size))
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, id: i32) -> Result<proveedor::Model, ServiceError> {
        proveedor::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Proveedor {id}")))
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn create_supplier(
        &self,
        input: SupplierInput,
        ctx: &AuditContext,
    ) -> Result<proveedor::Model, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        if nombre.is_empty() {
            return Err(ServiceError::ValidationError("El nombre es obligatorio".to_string()));
        }
        let supplier = proveedor::ActiveModel {
            nombre: Set(nombre),
            telefono: Set(optional(input.telefono)),
            direccion: Set(optional(input.direccion)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;

        info!(proveedor_id = supplier.id, "supplier created");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Proveedor", supplier.id, AuditAction::Crear).detail(supplier.nombre.clone()),
            )
            .await;
        Ok(supplier)
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn update_supplier(
        &self,
        id: i32,
        input: SupplierInput,
        ctx: &AuditContext,
    ) -> Result<proveedor::Model, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        if nombre.is_empty() {
            return Err(ServiceError::ValidationError("El nombre es obligatorio".to_string()));
        }
        let mut active = self.get_supplier(id).await?.into_active_model();
        active.nombre = Set(nombre);
        active.telefono = Set(optional(input.telefono));
        active.direccion = Set(optional(input.direccion));
        let supplier = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(ctx, AuditEntry::new("Proveedor", id, AuditAction::Actualizar))
            .await;
        Ok(supplier)
    }

    /// Rejected while any purchase points at the supplier
    #[instrument(skip(self, ctx))]
    pub async fn delete_supplier(&self, id: i32, ctx: &AuditContext) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let supplier = proveedor::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Proveedor {id}")))?;
        let purchases = compra::Entity::find()
            .filter(compra::Column::ProveedorId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if purchases > 0 {
            return Err(ServiceError::Conflict(format!(
                "El proveedor {} tiene {} compras registradas",
                supplier.nombre, purchases
            )));
        }
        proveedor::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(proveedor_id = id, "supplier deleted");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Proveedor", id, AuditAction::Borrar).detail(supplier.nombre),
            )
            .await;
        Ok(())
    }
}
