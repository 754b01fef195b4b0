use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Login account. Customers and staff share this table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usuario")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nombre: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub hash_password: String,
    pub telefono: Option<String>,
    pub activo: bool,
    pub es_staff: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::cliente::Entity")]
    Cliente,
    #[sea_orm(has_many = "super::usuario_rol::Entity")]
    UsuarioRol,
}

impl Related<super::cliente::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cliente.def()
    }
}

impl Related<super::usuario_rol::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsuarioRol.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
