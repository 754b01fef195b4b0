use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sabor")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nombre: String,
    pub activo: bool,
    pub imagen: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::producto_sabor::Entity")]
    ProductoSabor,
}

impl Related<super::producto_sabor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductoSabor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
