use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit trail row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bitacora")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub usuario_id: Option<i32>,
    pub entidad: String,
    pub entidad_id: i32,
    pub accion: String,
    pub ip: Option<String>,
    pub detalle: Option<String>,
    pub fecha: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
