use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pago")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub pedido_id: i32,
    pub metodo: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub monto: Decimal,
    /// Provider session id for card payments, free text otherwise
    pub referencia: Option<String>,
    pub registrado_por_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pedido::Entity",
        from = "Column::PedidoId",
        to = "super::pedido::Column::Id"
    )]
    Pedido,
    #[sea_orm(
        belongs_to = "super::usuario::Entity",
        from = "Column::RegistradoPorId",
        to = "super::usuario::Column::Id"
    )]
    RegistradoPor,
}

impl Related<super::pedido::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pedido.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
