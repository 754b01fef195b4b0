use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compra")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub proveedor_id: i32,
    pub fecha: DateTime<Utc>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total: Decimal,
    pub recepcionada: bool,
    pub fecha_recepcion: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::proveedor::Entity",
        from = "Column::ProveedorId",
        to = "super::proveedor::Column::Id"
    )]
    Proveedor,
    #[sea_orm(has_many = "super::compra_detalle::Entity")]
    CompraDetalle,
}

impl Related<super::proveedor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proveedor.def()
    }
}

impl Related<super::compra_detalle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompraDetalle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
