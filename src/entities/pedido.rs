use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::OrderStatus;

/// Customer order. `estado` holds an [`OrderStatus`] code.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pedido")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub cliente_id: i32,
    pub estado: String,
    pub metodo_envio: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub costo_envio: Decimal,
    pub direccion_entrega: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total: Decimal,
    pub observaciones: Option<String>,
    pub created_at: DateTime<Utc>,
    pub fecha_entrega_programada: Option<DateTime<Utc>>,
}

impl Model {
    /// Parsed status; unknown codes surface as `None`.
    pub fn status(&self) -> Option<OrderStatus> {
        self.estado.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cliente::Entity",
        from = "Column::ClienteId",
        to = "super::cliente::Column::Id"
    )]
    Cliente,
    #[sea_orm(has_many = "super::detalle_pedido::Entity")]
    DetallePedido,
    #[sea_orm(has_many = "super::pago::Entity")]
    Pago,
    #[sea_orm(has_one = "super::factura::Entity")]
    Factura,
    #[sea_orm(has_one = "super::envio::Entity")]
    Envio,
}

impl Related<super::cliente::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cliente.def()
    }
}

impl Related<super::detalle_pedido::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DetallePedido.def()
    }
}

impl Related<super::pago::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pago.def()
    }
}

impl Related<super::factura::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Factura.def()
    }
}

impl Related<super::envio::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Envio.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
