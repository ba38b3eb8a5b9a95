//! Alert document schema

use bson::oid::ObjectId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Collection name for alerts
pub const ALERT_COLLECTION: &str = "alertas";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AlertDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub tipo_alerta: String,
    pub descripcion: String,
    pub fecha_generada: NaiveDate,
    pub estado_alerta: String,
}
