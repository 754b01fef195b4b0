use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usuario_rol")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub usuario_id: i32,
    pub rol_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::usuario::Entity",
        from = "Column::UsuarioId",
        to = "super::usuario::Column::Id"
    )]
    Usuario,
    #[sea_orm(
        belongs_to = "super::rol::Entity",
        from = "Column::RolId",
        to = "super::rol::Column::Id"
    )]
    Rol,
}

impl Related<super::usuario::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usuario.def()
    }
}

impl Related<super::rol::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rol.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
