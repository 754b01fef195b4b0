use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "producto_sabor")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub producto_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sabor_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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
