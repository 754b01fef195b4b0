use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "producto")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub nombre: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub precio_unitario: Decimal,
    pub activo: bool,
    pub descripcion: Option<String>,
    pub imagen_url: Option<String>,
    pub creado_en: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::producto_sabor::Entity")]
    ProductoSabor,
    #[sea_orm(has_many = "super::receta::Entity")]
    Receta,
}

impl Related<super::producto_sabor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductoSabor.def()
    }
}

impl Related<super::receta::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receta.def()
    }
}

/// Flavors reachable through `producto_sabor`
impl Related<super::sabor::Entity> for Entity {
    fn to() -> RelationDef {
        super::producto_sabor::Relation::Sabor.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::producto_sabor::Relation::Producto.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
