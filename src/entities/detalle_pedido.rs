use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line keyed by (pedido, producto, sabor)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "detalle_pedido")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub pedido_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub producto_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sabor_id: i32,
    pub cantidad: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub precio_unitario: Decimal,
    pub producido: bool,
}

impl Model {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.cantidad) * self.precio_unitario
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pedido::Entity",
        from = "Column::PedidoId",
        to = "super::pedido::Column::Id",
        on_delete = "Cascade"
    )]
    Pedido,
    #[sea_orm(
        belongs_to = "super::producto::Entity",
        from = "Column::ProductoId",
        to = "super::producto::Column::Id"
    )]
    Producto,
    #[sea_orm(
        belongs_to = "super::sabor::Entity",
        from = "Column::SaborId",
        to = "super::sabor::Column::Id"
    )]
    Sabor,
}

impl Related<super::pedido::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pedido.def()
    }
}

impl Related<super::producto::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Producto.def()
    }
}

impl Related<super::sabor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sabor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
