use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{compra_detalle, insumo, kardex, receta},
    errors::ServiceError,
    models::{ledger_balance, AuditAction, MovementReason, MovementType, Unit},
    services::audit::{AuditContext, AuditEntry, AuditService},
};

const DEFAULT_KARDEX_LIMIT: u64 = 200;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IngredientInput {
    #[validate(length(min = 1, max = 100))]
    pub nombre: String,
    pub unidad_medida: Unit,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MovementInput {
    pub tipo: MovementType,
    pub motivo: MovementReason,
    pub cantidad: Decimal,
    #[validate(length(max = 200))]
    pub observacion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockLevel {
    pub insumo_id: i32,
    pub nombre: String,
    pub unidad_medida: String,
    /// Σ ENTRADA − Σ SALIDA over the ledger
    pub stock: Decimal,
    pub cantidad_disponible: Decimal,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct KardexQuery {
    pub insumo_id: Option<i32>,
    pub limit: Option<u64>,
}

pub(crate) async fn load_ingredient<C>(conn: &C, id: i32) -> Result<insumo::Model, ServiceError>
where
    C: ConnectionTrait,
{
    insumo::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Insumo {id}")))
}

/// Current stock computed from the ledger
pub(crate) async fn ledger_stock<C>(conn: &C, insumo_id: i32) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = kardex::Entity::find()
        .filter(kardex::Column::InsumoId.eq(insumo_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(ledger_balance(rows.iter().map(|r| (r.tipo.as_str(), r.cantidad))).round_dp(3))
}

/// Appends a ledger row and refreshes the cached stock on the ingredient.
///
/// Must run inside the caller's transaction.
pub(crate) async fn append_movement<C>(
    conn: &C,
    ingredient: insumo::Model,
    tipo: MovementType,
    motivo: MovementReason,
    cantidad: Decimal,
    observacion: Option<String>,
) -> Result<(kardex::Model, insumo::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let cantidad = cantidad.round_dp(3);
    if cantidad <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "La cantidad debe ser mayor a cero".to_string(),
        ));
    }
    let current = ledger_stock(conn, ingredient.id).await?;
    if tipo == MovementType::Salida && cantidad > current {
        return Err(ServiceError::InsufficientStock(format!(
            "{}: disponible {} {}, requerido {}",
            ingredient.nombre, current, ingredient.unidad_medida, cantidad
        )));
    }

    let row = kardex::ActiveModel {
        insumo_id: Set(ingredient.id),
        fecha: Set(Utc::now()),
        tipo: Set(tipo.to_string()),
        motivo: Set(motivo.to_string()),
        cantidad: Set(cantidad),
        observacion: Set(observacion),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    let mut active = ingredient.into_active_model();
    active.cantidad_disponible = Set((current + tipo.signed(cantidad)).round_dp(3));
    let ingredient = active.update(conn).await.map_err(ServiceError::db_error)?;
    Ok((row, ingredient))
}

/// Ingredient catalogue and its stock ledger
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    #[instrument(skip(self))]
    pub async fn list_ingredients(&self) -> Result<Vec<insumo::Model>, ServiceError> {
        insumo::Entity::find()
            .order_by_asc(insumo::Column::Nombre)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_ingredient(&self, id: i32) -> Result<insumo::Model, ServiceError> {
        load_ingredient(&*self.db_pool, id).await
    }

    async fn ensure_unique_name<C>(conn: &C, nombre: &str, except: Option<i32>) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut query = insumo::Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(insumo::Column::Nombre))).eq(nombre.to_lowercase()),
        );
        if let Some(id) = except {
            query = query.filter(insumo::Column::Id.ne(id));
        }
        let clashes = query.count(conn).await.map_err(ServiceError::db_error)?;
        if clashes > 0 {
            return Err(ServiceError::Conflict(format!("Ya existe el insumo {nombre}")));
        }
        Ok(())
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn create_ingredient(
        &self,
        input: IngredientInput,
        ctx: &AuditContext,
    ) -> Result<insumo::Model, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        Self::ensure_unique_name(&txn, &nombre, None).await?;

        let ingredient = insumo::ActiveModel {
            nombre: Set(nombre),
            unidad_medida: Set(input.unidad_medida.to_string()),
            cantidad_disponible: Set(Decimal::ZERO),
            fecha_actualizacion: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(insumo_id = ingredient.id, nombre = %ingredient.nombre, "ingredient created");
        self.audit
            .record(ctx, AuditEntry::new("Insumo", ingredient.id, AuditAction::Crear))
            .await;
        Ok(ingredient)
    }

    /// Renames or changes the unit; stock only moves through the ledger
    #[instrument(skip(self, input, ctx))]
    pub async fn update_ingredient(
        &self,
        id: i32,
        input: IngredientInput,
        ctx: &AuditContext,
    ) -> Result<insumo::Model, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let ingredient = load_ingredient(&txn, id).await?;
        Self::ensure_unique_name(&txn, &nombre, Some(id)).await?;

        let mut active = ingredient.into_active_model();
        active.nombre = Set(nombre);
        active.unidad_medida = Set(input.unidad_medida.to_string());
        let ingredient = active.update(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(ctx, AuditEntry::new("Insumo", id, AuditAction::Actualizar))
            .await;
        Ok(ingredient)
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_ingredient(&self, id: i32, ctx: &AuditContext) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let ingredient = load_ingredient(&txn, id).await?;

        let movements = kardex::Entity::find()
            .filter(kardex::Column::InsumoId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let recipes = receta::Entity::find()
            .filter(receta::Column::InsumoId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let purchases = compra_detalle::Entity::find()
            .filter(compra_detalle::Column::InsumoId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if movements + recipes + purchases > 0 {
            return Err(ServiceError::Conflict(format!(
                "El insumo {} tiene movimientos, recetas o compras asociadas",
                ingredient.nombre
            )));
        }

        insumo::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(insumo_id = id, "ingredient deleted");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Insumo", id, AuditAction::Borrar).detail(ingredient.nombre),
            )
            .await;
        Ok(())
    }

    /// Manual ledger entry (adjustments, waste, ad hoc purchases)
    #[instrument(skip(self, input, ctx), fields(tipo = %input.tipo, motivo = %input.motivo))]
    pub async fn record_movement(
        &self,
        insumo_id: i32,
        input: MovementInput,
        ctx: &AuditContext,
    ) -> Result<kardex::Model, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let ingredient = load_ingredient(&txn, insumo_id).await?;
        let (row, ingredient) = append_movement(
            &txn,
            ingredient,
            input.tipo,
            input.motivo,
            input.cantidad,
            input.observacion.filter(|o| !o.trim().is_empty()),
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            insumo_id,
            tipo = %row.tipo,
            cantidad = %row.cantidad,
            stock = %ingredient.cantidad_disponible,
            "stock movement recorded"
        );
        self.audit
            .record(
                ctx,
                AuditEntry::new("Kardex", row.id, AuditAction::Crear)
                    .detail(format!("{} {} {}", row.tipo, row.motivo, row.cantidad)),
            )
            .await;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn stock_level(&self, insumo_id: i32) -> Result<StockLevel, ServiceError> {
        let db = &*self.db_pool;
        let ingredient = load_ingredient(db, insumo_id).await?;
        let stock = ledger_stock(db, insumo_id).await?;
        Ok(StockLevel {
            insumo_id,
            nombre: ingredient.nombre,
            unidad_medida: ingredient.unidad_medida,
            stock,
            cantidad_disponible: ingredient.cantidad_disponible,
        })
    }

    /// Ledger rows, newest first
    #[instrument(skip(self))]
    pub async fn kardex(&self, query: KardexQuery) -> Result<Vec<kardex::Model>, ServiceError> {
        let mut select = kardex::Entity::find();
        if let Some(insumo_id) = query.insumo_id {
            select = select.filter(kardex::Column::InsumoId.eq(insumo_id));
        }
        select
            .order_by_desc(kardex::Column::Fecha)
            .order_by_desc(kardex::Column::Id)
            .limit(query.limit.unwrap_or(DEFAULT_KARDEX_LIMIT))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
