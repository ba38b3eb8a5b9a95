//! Soil history document schema

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for soil measurements
pub const SOIL_COLLECTION: &str = "historial_suelo";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Nutrient {
    pub nombre: String,
    pub valor: f64,
    pub unidad: String,
}

/// One soil measurement taken on a crop
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SoilRecordDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub fecha_medicion: NaiveDate,
    #[serde(rename = "pH")]
    pub ph: f64,
    #[serde(default)]
    pub nutrientes: Vec<Nutrient>,
    #[serde(default)]
    pub observaciones: Vec<String>,
    pub id_cultivo: ObjectId,
    pub id_usuario: ObjectId,
    /// Soft-delete marker
    #[serde(default)]
    pub eliminado: bool,
}

impl IntoIndexes for SoilRecordDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "idCultivo": 1, "fechaMedicion": -1 },
            Some(IndexOptions::builder().name("cultivo_fecha_index".to_string()).build()),
        )]
    }
}
