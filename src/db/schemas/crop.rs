//! Crop document schema
//!
//! The crop is the aggregate root: the location is embedded as a single
//! object, applied inputs and irrigation events as arrays of sub-documents
//! that carry their own `_id`.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for crops
pub const CROP_COLLECTION: &str = "cultivos";

labelled_enum!(
    /// Growth stage of a crop
    CropState {
        Planted => "Sembrado",
        Growing => "En Crecimiento",
        ReadyToHarvest => "Listo para Cosecha",
        Harvested => "Cosechado",
    }
);

impl Default for CropState {
    fn default() -> Self {
        CropState::Planted
    }
}

labelled_enum!(
    /// Lifecycle of a scheduled irrigation
    IrrigationStatus {
        Pending => "Pendiente",
        Applied => "Aplicado",
        Cancelled => "Cancelado",
    }
);

impl Default for IrrigationStatus {
    fn default() -> Self {
        IrrigationStatus::Pending
    }
}

/// Crop document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CropDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub nom_cultivo: String,

    pub fecha_siembra: NaiveDate,

    pub fecha_cosecha_est: NaiveDate,

    #[serde(default)]
    pub fecha_cosecha_real: Option<NaiveDate>,

    pub area_cultivo: f64,

    #[serde(default)]
    pub estado_actual: CropState,

    /// Owning user
    pub id_usuario: ObjectId,

    /// Soft-delete marker; inactive crops are invisible to every query
    #[serde(default = "super::default_true")]
    pub registro_activo: bool,

    /// Null until a location is registered
    #[serde(default)]
    pub ubicacion: Option<LocationDoc>,

    /// Kept raw so one malformed entry cannot hide the whole crop
    #[serde(default)]
    pub aplicaciones_insumos: Vec<Document>,

    #[serde(default)]
    pub riegos: Vec<Document>,
}

impl CropDoc {
    /// A freshly planted, active crop with no sub-resources
    pub fn new(
        nom_cultivo: String,
        fecha_siembra: NaiveDate,
        fecha_cosecha_est: NaiveDate,
        fecha_cosecha_real: Option<NaiveDate>,
        area_cultivo: f64,
        id_usuario: ObjectId,
    ) -> Self {
        Self {
            _id: None,
            nom_cultivo,
            fecha_siembra,
            fecha_cosecha_est,
            fecha_cosecha_real,
            area_cultivo,
            estado_actual: CropState::default(),
            id_usuario,
            registro_activo: true,
            ubicacion: None,
            aplicaciones_insumos: Vec::new(),
            riegos: Vec::new(),
        }
    }
}

impl IntoIndexes for CropDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "idUsuario": 1 },
                Some(IndexOptions::builder().name("usuario_index".to_string()).build()),
            ),
            (
                doc! { "registroActivo": 1 },
                Some(IndexOptions::builder().name("activo_index".to_string()).build()),
            ),
        ]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitud: f64,
    pub longitud: f64,
}

/// Where a crop is planted
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationDoc {
    pub nombre_ubicacion: String,
    pub coordenadas: Coordinates,
    /// Must cover at least the crop's area
    pub superficie: f64,
    pub tipo_suelo: String,
    pub acceso_agua: bool,
    pub estado: String,
    pub municipio: String,
    pub localidad: String,
    /// Five-digit postal code
    pub cp: String,
    #[serde(default)]
    pub detalles: Option<String>,
}

/// One application of a supply to a crop
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputApplicationDoc {
    #[serde(rename = "_id")]
    pub _id: ObjectId,
    pub cantidad_aplicada: f64,
    pub fecha_aplicacion: NaiveDate,
    pub metodo_aplicacion: String,
    #[serde(default)]
    pub observaciones: Option<String>,
    pub id_usuario: ObjectId,
    pub id_insumo: ObjectId,
}

/// One scheduled or performed irrigation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationDoc {
    #[serde(rename = "_id")]
    pub _id: ObjectId,
    pub fecha_esperada: NaiveDate,
    #[serde(default)]
    pub fecha_aplicada: Option<NaiveDate>,
    /// Litres of water
    pub cant_agua: f64,
    pub metodo_riego: String,
    /// Minutes
    pub duracion_riego: f64,
    pub id_usuario: ObjectId,
    #[serde(default)]
    pub status: IrrigationStatus,
}
