use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rol_permiso")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub rol_id: i32,
    pub permiso_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rol::Entity",
        from = "Column::RolId",
        to = "super::rol::Column::Id"
    )]
    Rol,
    #[sea_orm(
        belongs_to = "super::permiso::Entity",
        from = "Column::PermisoId",
        to = "super::permiso::Column::Id"
    )]
    Permiso,
}

impl Related<super::rol::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rol.def()
    }
}

impl Related<super::permiso::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Permiso.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
