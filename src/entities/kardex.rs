use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only ingredient ledger row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kardex")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub insumo_id: i32,
    pub fecha: DateTime<Utc>,
    pub tipo: String,
    pub motivo: String,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub cantidad: Decimal,
    pub observacion: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::insumo::Entity",
        from = "Column::InsumoId",
        to = "super::insumo::Column::Id"
    )]
    Insumo,
}

impl Related<super::insumo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Insumo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
