//! User activity document schema

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for user activities
pub const ACTIVITY_COLLECTION: &str = "actividades_usuarios";

labelled_enum!(
    ActivityStatus {
        Pending => "Pendiente",
        Completed => "Completada",
        Cancelled => "Cancelada",
    }
);

impl Default for ActivityStatus {
    fn default() -> Self {
        ActivityStatus::Pending
    }
}

/// A task assigned to a user on a crop
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub actividad: String,
    pub fecha_actividad: NaiveDate,
    #[serde(default)]
    pub estatus: ActivityStatus,
    pub id_cultivo: ObjectId,
    pub id_usuario: ObjectId,
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "idUsuario": 1 },
            Some(IndexOptions::builder().name("usuario_index".to_string()).build()),
        )]
    }
}
