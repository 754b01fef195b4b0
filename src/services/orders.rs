use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::Viewer,
    config::AppConfig,
    db::DbPool,
    entities::{cliente, detalle_pedido, pago, pedido, producto, sabor},
    errors::ServiceError,
    models::{order_total, AuditAction, OrderStatus, PaymentSummary, ShippingMethod},
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        catalog::base_product,
        customers::get_or_create_cliente,
    },
    PaginatedResponse,
};

/// Prices and limits applied when orders are placed
#[derive(Debug, Clone)]
pub struct OrderPricing {
    pub cookie_unit_price: Decimal,
    pub delivery_shipping_cost: Decimal,
    pub max_line_quantity: i32,
    pub confirmed_page_size: u64,
}

impl From<&AppConfig> for OrderPricing {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            cookie_unit_price: cfg.cookie_unit_price,
            delivery_shipping_cost: cfg.delivery_shipping_cost,
            max_line_quantity: cfg.max_line_quantity,
            confirmed_page_size: cfg.confirmed_page_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub sabor_id: i32,
    /// Clamped into the allowed range rather than rejected
    pub cantidad: i32,
    pub metodo_envio: ShippingMethod,
    #[validate(length(max = 200))]
    pub direccion_entrega: Option<String>,
    pub fecha_entrega_programada: Option<DateTime<Utc>>,
    #[validate(length(max = 300))]
    pub observaciones: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LineItemInput {
    pub producto_id: i32,
    pub sabor_id: i32,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineView {
    pub producto_id: i32,
    pub producto_nombre: String,
    pub sabor_id: i32,
    pub sabor_nombre: String,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
    pub producido: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: i32,
    pub cliente_id: i32,
    pub cliente_nombre: String,
    pub estado: String,
    pub metodo_envio: String,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub fecha_entrega_programada: Option<DateTime<Utc>>,
}

impl OrderSummary {
    pub(crate) fn from_parts(p: pedido::Model, c: Option<cliente::Model>) -> Self {
        Self {
            id: p.id,
            cliente_id: p.cliente_id,
            cliente_nombre: c.map(|c| c.nombre).unwrap_or_default(),
            estado: p.estado,
            metodo_envio: p.metodo_envio,
            total: p.total,
            created_at: p.created_at,
            fecha_entrega_programada: p.fecha_entrega_programada,
        }
    }
}

/// Everything a customer or clerk needs on the order page
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[schema(value_type = Object)]
    pub pedido: pedido::Model,
    pub cliente_nombre: String,
    pub lineas: Vec<OrderLineView>,
    #[schema(value_type = Vec<Object>)]
    pub pagos: Vec<pago::Model>,
    pub total_pagado: Decimal,
    pub saldo: Decimal,
    pub es_duenio: bool,
    pub puede_editar: bool,
}

pub(crate) async fn load_order<C>(conn: &C, id: i32) -> Result<pedido::Model, ServiceError>
where
    C: ConnectionTrait,
{
    pedido::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Pedido {id}")))
}

pub(crate) fn status_of(order: &pedido::Model) -> Result<OrderStatus, ServiceError> {
    order.status().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Pedido {} has unknown status {}",
            order.id, order.estado
        ))
    })
}

/// Usuario id of the customer who placed the order
pub(crate) async fn order_owner<C>(conn: &C, order: &pedido::Model) -> Result<Option<i32>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(cliente::Entity::find_by_id(order.cliente_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|c| c.usuario_id))
}

/// Validates and stores a status change
pub(crate) async fn apply_transition<C>(
    conn: &C,
    order: pedido::Model,
    next: OrderStatus,
) -> Result<pedido::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let current = status_of(&order)?;
    if !current.can_transition_to(next) {
        return Err(ServiceError::InvalidStatus(format!(
            "Pedido {} no puede pasar de {} a {}",
            order.id, current, next
        )));
    }
    let mut active = order.into_active_model();
    active.estado = Set(next.to_string());
    let updated = active.update(conn).await.map_err(ServiceError::db_error)?;
    info!(pedido_id = updated.id, from = %current, to = %next, "order status changed");
    Ok(updated)
}

/// Stores Σ cantidad × precio_unitario + costo_envio as the order total
pub(crate) async fn recompute_total<C>(
    conn: &C,
    order: pedido::Model,
) -> Result<pedido::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let lines = detalle_pedido::Entity::find()
        .filter(detalle_pedido::Column::PedidoId.eq(order.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    let total = order_total(
        lines.iter().map(|l| (l.cantidad, l.precio_unitario)),
        order.costo_envio,
    );

    let mut active = order.into_active_model();
    active.total = Set(total);
    active.update(conn).await.map_err(ServiceError::db_error)
}

/// Line items with product and flavor names, sorted by product then flavor name
pub(crate) async fn order_lines<C>(conn: &C, pedido_id: i32) -> Result<Vec<OrderLineView>, ServiceError>
where
    C: ConnectionTrait,
{
    let lines = detalle_pedido::Entity::find()
        .filter(detalle_pedido::Column::PedidoId.eq(pedido_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let product_names: HashMap<i32, String> = producto::Entity::find()
        .filter(producto::Column::Id.is_in(lines.iter().map(|l| l.producto_id)))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|p| (p.id, p.nombre))
        .collect();
    let flavor_names: HashMap<i32, String> = sabor::Entity::find()
        .filter(sabor::Column::Id.is_in(lines.iter().map(|l| l.sabor_id)))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|s| (s.id, s.nombre))
        .collect();

    let mut views: Vec<OrderLineView> = lines
        .into_iter()
        .map(|l| OrderLineView {
            producto_nombre: product_names.get(&l.producto_id).cloned().unwrap_or_default(),
            sabor_nombre: flavor_names.get(&l.sabor_id).cloned().unwrap_or_default(),
            subtotal: l.subtotal(),
            producto_id: l.producto_id,
            sabor_id: l.sabor_id,
            cantidad: l.cantidad,
            precio_unitario: l.precio_unitario,
            producido: l.producido,
        })
        .collect();
    views.sort_by(|a, b| {
        a.producto_nombre
            .cmp(&b.producto_nombre)
            .then_with(|| a.sabor_nombre.cmp(&b.sabor_nombre))
    });
    Ok(views)
}

/// Payments of an order, oldest first, with the running balance
pub(crate) async fn payments_of<C>(
    conn: &C,
    order: &pedido::Model,
) -> Result<(Vec<pago::Model>, PaymentSummary), ServiceError>
where
    C: ConnectionTrait,
{
    let pagos = pago::Entity::find()
        .filter(pago::Column::PedidoId.eq(order.id))
        .order_by_asc(pago::Column::CreatedAt)
        .order_by_asc(pago::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    let summary = PaymentSummary::new(order.total, pagos.iter().map(|p| p.monto));
    Ok((pagos, summary))
}

fn validate_items(items: &[LineItemInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "El pedido debe tener al menos un item".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for item in items {
        if item.cantidad <= 0 {
            return Err(ServiceError::ValidationError(
                "La cantidad debe ser mayor a cero".to_string(),
            ));
        }
        if item.precio_unitario.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "El precio unitario no puede ser negativo".to_string(),
            ));
        }
        if !seen.insert((item.producto_id, item.sabor_id)) {
            return Err(ServiceError::ValidationError(format!(
                "Item repetido: producto {} sabor {}",
                item.producto_id, item.sabor_id
            )));
        }
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Order placement, editing and lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    pricing: OrderPricing,
    audit: Arc<AuditService>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, pricing: OrderPricing, audit: Arc<AuditService>) -> Self {
        Self {
            db_pool,
            pricing,
            audit,
        }
    }

    /// Places a single-line cookie order for the caller
    #[instrument(skip(self, input, ctx))]
    pub async fn create_order(
        &self,
        usuario_id: i32,
        input: CreateOrderInput,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        input.validate()?;
        let cantidad = input.cantidad.clamp(1, self.pricing.max_line_quantity.max(1));

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let cliente = get_or_create_cliente(&txn, usuario_id).await?;
        let flavor = sabor::Entity::find_by_id(input.sabor_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .filter(|s| s.activo)
            .ok_or_else(|| ServiceError::ValidationError("Sabor no disponible".to_string()))?;
        let product = base_product(&txn).await?;

        let precio = self.pricing.cookie_unit_price.round_dp(2);
        let costo_envio = input
            .metodo_envio
            .shipping_cost(self.pricing.delivery_shipping_cost);
        let direccion_entrega = match input.metodo_envio {
            ShippingMethod::Local => None,
            ShippingMethod::Delivery => {
                non_blank(input.direccion_entrega).or_else(|| Some(cliente.direccion.clone()))
            }
        };

        let order = pedido::ActiveModel {
            cliente_id: Set(cliente.id),
            estado: Set(OrderStatus::Pendiente.to_string()),
            metodo_envio: Set(input.metodo_envio.to_string()),
            costo_envio: Set(costo_envio),
            direccion_entrega: Set(direccion_entrega),
            total: Set(order_total([(cantidad, precio)], costo_envio)),
            observaciones: Set(non_blank(input.observaciones)),
            created_at: Set(Utc::now()),
            fecha_entrega_programada: Set(input.fecha_entrega_programada),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        detalle_pedido::Entity::insert(detalle_pedido::ActiveModel {
            pedido_id: Set(order.id),
            producto_id: Set(product.id),
            sabor_id: Set(flavor.id),
            cantidad: Set(cantidad),
            precio_unitario: Set(precio),
            producido: Set(false),
        })
        .exec_without_returning(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("dulce_bocatto.orders.created", 1);
        info!(pedido_id = order.id, cantidad, total = %order.total, "order created");
        self.audit
            .record(ctx, AuditEntry::new("Pedido", order.id, AuditAction::Crear))
            .await;
        Ok(order)
    }

    /// Visible to the owner and to viewers allowed to read every order
    #[instrument(skip(self))]
    pub async fn order_detail(
        &self,
        id: i32,
        viewer: Viewer,
        can_read_all: bool,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, id).await?;
        let cliente = cliente::Entity::find_by_id(order.cliente_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let es_duenio = cliente
            .as_ref()
            .is_some_and(|c| c.usuario_id == viewer.usuario_id);
        if !es_duenio && !can_read_all && !viewer.is_staff {
            return Err(ServiceError::NotFound(format!("Pedido {id}")));
        }

        let lineas = order_lines(db, id).await?;
        let (pagos, summary) = payments_of(db, &order).await?;
        let estado = status_of(&order)?;
        let puede_editar = es_duenio && summary.saldo > Decimal::ZERO && !estado.is_terminal();

        Ok(OrderDetail {
            cliente_nombre: cliente.map(|c| c.nombre).unwrap_or_default(),
            pedido: order,
            lineas,
            pagos,
            total_pagado: summary.total_pagado,
            saldo: summary.saldo,
            es_duenio,
            puede_editar,
        })
    }

    /// Replaces the line set and recomputes the total in one transaction
    #[instrument(skip(self, items, ctx))]
    pub async fn update_items(
        &self,
        id: i32,
        viewer: Viewer,
        items: Vec<LineItemInput>,
        ctx: &AuditContext,
    ) -> Result<OrderDetail, ServiceError> {
        validate_items(&items)?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, id).await?;
        let owner = order_owner(&txn, &order).await?;
        if owner != Some(viewer.usuario_id) && !viewer.is_staff {
            return Err(ServiceError::Forbidden(
                "Solo el cliente o el personal pueden editar el pedido".to_string(),
            ));
        }
        if status_of(&order)?.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Pedido {} está {} y no admite cambios",
                order.id, order.estado
            )));
        }

        let product_ids: HashSet<i32> = items.iter().map(|i| i.producto_id).collect();
        let flavor_ids: HashSet<i32> = items.iter().map(|i| i.sabor_id).collect();
        let known_products = producto::Entity::find()
            .filter(producto::Column::Id.is_in(product_ids.iter().copied()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let known_flavors = sabor::Entity::find()
            .filter(sabor::Column::Id.is_in(flavor_ids.iter().copied()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if known_products as usize != product_ids.len() || known_flavors as usize != flavor_ids.len() {
            return Err(ServiceError::ValidationError(
                "Producto o sabor inexistente".to_string(),
            ));
        }

        let existing: HashMap<(i32, i32), detalle_pedido::Model> = detalle_pedido::Entity::find()
            .filter(detalle_pedido::Column::PedidoId.eq(id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|l| ((l.producto_id, l.sabor_id), l))
            .collect();
        let wanted: HashSet<(i32, i32)> =
            items.iter().map(|i| (i.producto_id, i.sabor_id)).collect();

        for (key, line) in &existing {
            if !wanted.contains(key) {
                detalle_pedido::Entity::delete(line.clone().into_active_model())
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
            }
        }

        for item in &items {
            let precio = item.precio_unitario.round_dp(2);
            match existing.get(&(item.producto_id, item.sabor_id)) {
                Some(line) => {
                    let mut active = line.clone().into_active_model();
                    active.cantidad = Set(item.cantidad);
                    active.precio_unitario = Set(precio);
                    active.update(&txn).await.map_err(ServiceError::db_error)?;
                }
                None => {
                    detalle_pedido::Entity::insert(detalle_pedido::ActiveModel {
                        pedido_id: Set(id),
                        producto_id: Set(item.producto_id),
                        sabor_id: Set(item.sabor_id),
                        cantidad: Set(item.cantidad),
                        precio_unitario: Set(precio),
                        producido: Set(false),
                    })
                    .exec_without_returning(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                }
            }
        }

        let order = recompute_total(&txn, order).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(pedido_id = id, total = %order.total, lines = items.len(), "order items replaced");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", id, AuditAction::Actualizar).detail("items"),
            )
            .await;
        self.order_detail(id, viewer, true).await
    }

    /// Owner-only PENDIENTE → CONFIRMADO
    #[instrument(skip(self, ctx))]
    pub async fn confirm(
        &self,
        id: i32,
        viewer: Viewer,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        self.owner_transition(id, viewer, OrderStatus::Confirmado, ctx)
            .await
    }

    /// Owner-only PENDIENTE → CANCELADO
    #[instrument(skip(self, ctx))]
    pub async fn cancel(
        &self,
        id: i32,
        viewer: Viewer,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        self.owner_transition(id, viewer, OrderStatus::Cancelado, ctx)
            .await
    }

    async fn owner_transition(
        &self,
        id: i32,
        viewer: Viewer,
        next: OrderStatus,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = load_order(&txn, id).await?;
        let owner = order_owner(&txn, &order).await?;
        // Foreign or already-processed orders look the same from outside
        if owner != Some(viewer.usuario_id) || order.status() != Some(OrderStatus::Pendiente) {
            return Err(ServiceError::NotFound(format!("Pedido {id}")));
        }

        let updated = apply_transition(&txn, order, next).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", id, AuditAction::Actualizar).detail(next.to_string()),
            )
            .await;
        Ok(updated)
    }

    /// Staff status write, checked against the transition table
    #[instrument(skip(self, ctx))]
    pub async fn set_status(
        &self,
        id: i32,
        next: OrderStatus,
        ctx: &AuditContext,
    ) -> Result<pedido::Model, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let order = load_order(&txn, id).await?;
        let updated = apply_transition(&txn, order, next).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(
                ctx,
                AuditEntry::new("Pedido", id, AuditAction::Actualizar).detail(next.to_string()),
            )
            .await;
        Ok(updated)
    }

    /// PENDIENTE orders, newest first
    #[instrument(skip(self))]
    pub async fn pending_orders(&self) -> Result<Vec<OrderSummary>, ServiceError> {
        let rows = pedido::Entity::find()
            .filter(pedido::Column::Estado.eq(OrderStatus::Pendiente.to_string()))
            .find_also_related(cliente::Entity)
            .order_by_desc(pedido::Column::CreatedAt)
            .order_by_desc(pedido::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(rows
            .into_iter()
            .map(|(p, c)| OrderSummary::from_parts(p, c))
            .collect())
    }

    /// Confirmed-or-later orders. Customers only see their own.
    #[instrument(skip(self))]
    pub async fn confirmed_orders(
        &self,
        viewer: Viewer,
        q: Option<String>,
        page: u64,
    ) -> Result<PaginatedResponse<OrderSummary>, ServiceError> {
        let db = &*self.db_pool;
        let per_page = self.pricing.confirmed_page_size.max(1);
        let page = page.max(1);

        let mut query = pedido::Entity::find()
            .filter(pedido::Column::Estado.is_in(OrderStatus::confirmed_codes()));
        if !viewer.is_staff {
            let own = cliente::Entity::find()
                .filter(cliente::Column::UsuarioId.eq(viewer.usuario_id))
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            match own {
                Some(c) => query = query.filter(pedido::Column::ClienteId.eq(c.id)),
                None => return Ok(PaginatedResponse::new(Vec::new(), 0, page, per_page)),
            }
        }

        let needle = non_blank(q);
        let name_search = match needle.as_deref().map(str::parse::<i32>) {
            Some(Ok(id)) => {
                query = query.filter(pedido::Column::Id.eq(id));
                None
            }
            Some(Err(_)) => needle.map(|n| n.to_lowercase()),
            None => None,
        };

        let query = query
            .find_also_related(cliente::Entity)
            .order_by_desc(pedido::Column::CreatedAt)
            .order_by_desc(pedido::Column::Id);

        if let Some(needle) = name_search {
            let matching: Vec<OrderSummary> = query
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .filter(|(_, c)| {
                    c.as_ref()
                        .is_some_and(|c| c.nombre.to_lowercase().contains(&needle))
                })
                .map(|(p, c)| OrderSummary::from_parts(p, c))
                .collect();
            let total = matching.len() as u64;
            let items = matching
                .into_iter()
                .skip(((page - 1) * per_page) as usize)
                .take(per_page as usize)
                .collect();
            return Ok(PaginatedResponse::new(items, total, page, per_page));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|(p, c)| OrderSummary::from_parts(p, c))
            .collect();
        Ok(PaginatedResponse::new(items, total, page, per_page))
    }

    /// Stored total against a fresh recomputation; used by integrity checks
    #[instrument(skip(self))]
    pub async fn verify_total(&self, id: i32) -> Result<bool, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, id).await?;
        let lines = detalle_pedido::Entity::find()
            .filter(detalle_pedido::Column::PedidoId.eq(id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let expected = order_total(
            lines.iter().map(|l| (l.cantidad, l.precio_unitario)),
            order.costo_envio,
        );
        if expected != order.total {
            warn!(pedido_id = id, stored = %order.total, %expected, "order total drifted");
        }
        Ok(expected == order.total)
    }
}
