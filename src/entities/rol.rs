use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rol")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub nombre: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rol_permiso::Entity")]
    RolPermiso,
    #[sea_orm(has_many = "super::usuario_rol::Entity")]
    UsuarioRol,
}

impl Related<super::rol_permiso::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolPermiso.def()
    }
}

impl Related<super::usuario_rol::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsuarioRol.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
