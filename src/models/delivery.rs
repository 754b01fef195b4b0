use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvioStatus {
    Pendiente,
    EnCamino,
    Entregado,
}

impl EnvioStatus {
    /// Deliveries only move forward.
    pub fn can_transition_to(self, next: EnvioStatus) -> bool {
        next > self
    }
}
