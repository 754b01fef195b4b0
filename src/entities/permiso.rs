use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permiso")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub codigo: String,
    pub descripcion: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rol_permiso::Entity")]
    RolPermiso,
}

impl Related<super::rol_permiso::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolPermiso.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
