use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Raw ingredient. `cantidad_disponible` mirrors the kardex balance.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "insumo")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub nombre: String,
    pub unidad_medida: String,
    #[sea_orm(column_type = "Decimal(Some((12, 3)))")]
    pub cantidad_disponible: Decimal,
    pub fecha_actualizacion: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::kardex::Entity")]
    Kardex,
    #[sea_orm(has_many = "super::receta::Entity")]
    Receta,
    #[sea_orm(has_many = "super::compra_detalle::Entity")]
    CompraDetalle,
}

impl Related<super::kardex::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kardex.def()
    }
}

impl Related<super::receta::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receta.def()
    }
}

impl Related<super::compra_detalle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompraDetalle.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.fecha_actualizacion = Set(Utc::now());
        Ok(self)
    }
}
