use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{producto, producto_sabor, sabor},
    errors::ServiceError,
};

/// Name of the product every cookie order is booked against
pub const BASE_PRODUCT_NAME: &str = "Galleta";

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 120))]
    pub nombre: String,
    #[validate(custom = "validate_non_negative")]
    pub precio_unitario: Decimal,
    #[serde(default = "default_true")]
    pub activo: bool,
    pub descripcion: Option<String>,
    pub imagen_url: Option<String>,
    /// Replaces the product's flavor set when present
    pub sabor_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct FlavorInput {
    #[validate(length(min = 1, max = 100))]
    pub nombre: String,
    #[serde(default = "default_true")]
    pub activo: bool,
    pub imagen: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductView {
    pub id: i32,
    pub nombre: String,
    pub precio_unitario: Decimal,
    pub activo: bool,
    pub descripcion: Option<String>,
    pub imagen_url: Option<String>,
    pub sabor_ids: Vec<i32>,
}

impl ProductView {
    fn from_parts(p: producto::Model, sabor_ids: Vec<i32>) -> Self {
        Self {
            id: p.id,
            nombre: p.nombre,
            precio_unitario: p.precio_unitario,
            activo: p.activo,
            descripcion: p.descripcion,
            imagen_url: p.imagen_url,
            sabor_ids,
        }
    }
}

/// What a visitor sees before ordering
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogView {
    #[schema(value_type = Vec<Object>)]
    pub sabores: Vec<sabor::Model>,
    pub precio_unitario: Decimal,
}

/// The product orders are booked against: "Galleta" if present, else the lowest id.
pub(crate) async fn base_product<C>(conn: &C) -> Result<producto::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let by_name = producto::Entity::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(producto::Column::Nombre)))
                .eq(BASE_PRODUCT_NAME.to_lowercase()),
        )
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if let Some(product) = by_name {
        return Ok(product);
    }

    producto::Entity::find()
        .order_by_asc(producto::Column::Id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::ValidationError("No hay productos configurados".to_string())
        })
}

/// Products and flavors
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    cookie_unit_price: Decimal,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, cookie_unit_price: Decimal) -> Self {
        Self {
            db_pool,
            cookie_unit_price,
        }
    }

    /// Active flavors by name, with the configured unit price
    #[instrument(skip(self))]
    pub async fn catalog(&self) -> Result<CatalogView, ServiceError> {
        let sabores = self.list_flavors(true).await?;
        Ok(CatalogView {
            sabores,
            precio_unitario: self.cookie_unit_price,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_flavors(&self, active_only: bool) -> Result<Vec<sabor::Model>, ServiceError> {
        let mut query = sabor::Entity::find();
        if active_only {
            query = query.filter(sabor::Column::Activo.eq(true));
        }
        query
            .order_by_asc(sabor::Column::Nombre)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, active_only: bool) -> Result<Vec<ProductView>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = producto::Entity::find();
        if active_only {
            query = query.filter(producto::Column::Activo.eq(true));
        }
        let products = query
            .order_by_asc(producto::Column::Nombre)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut flavors: HashMap<i32, Vec<i32>> = HashMap::new();
        for link in producto_sabor::Entity::find()
            .order_by_asc(producto_sabor::Column::SaborId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            flavors.entry(link.producto_id).or_default().push(link.sabor_id);
        }

        Ok(products
            .into_iter()
            .map(|p| {
                let ids = flavors.remove(&p.id).unwrap_or_default();
                ProductView::from_parts(p, ids)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<ProductView, ServiceError> {
        let db = &*self.db_pool;
        let product = producto::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Producto {id}")))?;
        let ids = flavor_ids(db, id).await?;
        Ok(ProductView::from_parts(product, ids))
    }

    #[instrument(skip(self, input), fields(nombre = %input.nombre))]
    pub async fn create_product(&self, input: ProductInput) -> Result<ProductView, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        ensure_unique_product_name(&txn, &input.nombre, None).await?;

        let product = producto::ActiveModel {
            nombre: Set(input.nombre.trim().to_string()),
            precio_unitario: Set(input.precio_unitario.round_dp(2)),
            activo: Set(input.activo),
            descripcion: Set(input.descripcion.clone()),
            imagen_url: Set(input.imagen_url.clone()),
            creado_en: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        if let Some(ids) = &input.sabor_ids {
            replace_flavors(&txn, product.id, ids).await?;
        }
        let ids = flavor_ids(&txn, product.id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(producto_id = product.id, "product created");
        Ok(ProductView::from_parts(product, ids))
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: i32,
        input: ProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let existing = producto::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Producto {id}")))?;
        ensure_unique_product_name(&txn, &input.nombre, Some(id)).await?;

        let mut active = existing.into_active_model();
        active.nombre = Set(input.nombre.trim().to_string());
        active.precio_unitario = Set(input.precio_unitario.round_dp(2));
        active.activo = Set(input.activo);
        active.descripcion = Set(input.descripcion.clone());
        active.imagen_url = Set(input.imagen_url.clone());
        let product = active.update(&txn).await.map_err(ServiceError::db_error)?;

        if let Some(ids) = &input.sabor_ids {
            replace_flavors(&txn, id, ids).await?;
        }
        let ids = flavor_ids(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(producto_id = id, "product updated");
        Ok(ProductView::from_parts(product, ids))
    }

    #[instrument(skip(self, input), fields(nombre = %input.nombre))]
    pub async fn create_flavor(&self, input: FlavorInput) -> Result<sabor::Model, ServiceError> {
        input.validate()?;
        let flavor = sabor::ActiveModel {
            nombre: Set(input.nombre.trim().to_string()),
            activo: Set(input.activo),
            imagen: Set(input.imagen),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;
        info!(sabor_id = flavor.id, "flavor created");
        Ok(flavor)
    }

    #[instrument(skip(self, input))]
    pub async fn update_flavor(
        &self,
        id: i32,
        input: FlavorInput,
    ) -> Result<sabor::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let existing = sabor::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sabor {id}")))?;

        let mut active = existing.into_active_model();
        active.nombre = Set(input.nombre.trim().to_string());
        active.activo = Set(input.activo);
        active.imagen = Set(input.imagen);
        active.update(db).await.map_err(ServiceError::db_error)
    }
}

async fn ensure_unique_product_name<C>(
    conn: &C,
    nombre: &str,
    except_id: Option<i32>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let mut query = producto::Entity::find().filter(
        Expr::expr(Func::lower(Expr::col(producto::Column::Nombre)))
            .eq(nombre.trim().to_lowercase()),
    );
    if let Some(id) = except_id {
        query = query.filter(producto::Column::Id.ne(id));
    }
    let clash = query.one(conn).await.map_err(ServiceError::db_error)?;
    if clash.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Ya existe un producto llamado {}",
            nombre.trim()
        )));
    }
    Ok(())
}

async fn replace_flavors<C>(conn: &C, producto_id: i32, ids: &[i32]) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    if !wanted.is_empty() {
        let found = sabor::Entity::find()
            .filter(sabor::Column::Id.is_in(wanted.iter().copied()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if found.len() != wanted.len() {
            return Err(ServiceError::ValidationError(
                "Alguno de los sabores no existe".to_string(),
            ));
        }
    }

    producto_sabor::Entity::delete_many()
        .filter(producto_sabor::Column::ProductoId.eq(producto_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if wanted.is_empty() {
        return Ok(());
    }
    producto_sabor::Entity::insert_many(wanted.into_iter().map(|sabor_id| {
        producto_sabor::ActiveModel {
            producto_id: Set(producto_id),
            sabor_id: Set(sabor_id),
        }
    }))
    .exec_without_returning(conn)
    .await
    .map_err(ServiceError::db_error)?;
    Ok(())
}

async fn flavor_ids<C>(conn: &C, producto_id: i32) -> Result<Vec<i32>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(producto_sabor::Entity::find()
        .filter(producto_sabor::Column::ProductoId.eq(producto_id))
        .order_by_asc(producto_sabor::Column::SaborId)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|link| link.sabor_id)
        .collect())
}
