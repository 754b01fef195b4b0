use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compra_detalle")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub compra_id: i32,
    pub insumo_id: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub cantidad: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub costo_unitario: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::compra::Entity",
        from = "Column::CompraId",
        to = "super::compra::Column::Id",
        on_delete = "Cascade"
    )]
    Compra,
    #[sea_orm(
        belongs_to = "super::insumo::Entity",
        from = "Column::InsumoId",
        to = "super::insumo::Column::Id"
    )]
    Insumo,
}

impl Related<super::compra::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Compra.def()
    }
}

impl Related<super::insumo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Insumo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
