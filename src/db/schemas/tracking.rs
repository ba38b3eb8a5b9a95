//! Tracking (seguimiento) document schema
//!
//! Unlike the other crop sub-resources, tracking entries live in their own
//! collection and point back at the crop through `idCultivo`.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for tracking entries
pub const TRACKING_COLLECTION: &str = "seguimientos";

labelled_enum!(
    /// Crop health observed during a review
    HealthState {
        Optimal => "Óptimo",
        Good => "Bueno",
        Fair => "Regular",
        Poor => "Deficiente",
        Critical => "Crítico",
    }
);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub fecha_revision: NaiveDate,
    pub estado_cultivo: HealthState,
    #[serde(default)]
    pub observaciones: Vec<String>,
    #[serde(default)]
    pub recomendaciones: Vec<String>,
    pub id_cultivo: ObjectId,
    /// Reviewing user
    pub id_usuario: ObjectId,
}

impl IntoIndexes for TrackingDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "idCultivo": 1 },
            Some(IndexOptions::builder().name("cultivo_index".to_string()).build()),
        )]
    }
}
