//! Supply (insumo) document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for supplies
pub const SUPPLY_COLLECTION: &str = "insumos";

labelled_enum!(
    SupplyType {
        Insecticide => "Insecticidas",
        Fertilizer => "Fertilizantes",
        Herbicide => "Herbicidas",
        Pesticide => "Pesticidas",
        Seed => "Semillas",
    }
);

labelled_enum!(
    /// Soft-delete state of a supply
    SupplyStatus {
        Active => "Activo",
        Inactive => "Inactivo",
    }
);

impl Default for SupplyStatus {
    fn default() -> Self {
        SupplyStatus::Active
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SupplyDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub nombre_insumo: String,
    pub tipo_insumo: SupplyType,
    pub cant_disponible: f64,
    pub unidad_medida: String,
    #[serde(default)]
    pub estatus: SupplyStatus,
}

impl IntoIndexes for SupplyDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "nombreInsumo": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("nombre_insumo_unique".to_string())
                    .build(),
            ),
        )]
    }
}
