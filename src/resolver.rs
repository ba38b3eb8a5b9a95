//! Reference resolution
//!
//! Documents store foreign keys as ObjectIds. Reads swap them for display
//! names; a dangling or unreadable reference degrades to a sentinel
//! instead of failing the request. Writes use the `require_*` methods,
//! which turn a dangling reference into [`AgroError::NotFound`].

use bson::{doc, oid::ObjectId, Document};
use std::sync::Arc;
use tracing::warn;

use crate::db::schemas::{
    CropDoc, SupplyDoc, SupplyStatus, CROP_COLLECTION, SUPPLY_COLLECTION,
    USER_COLLECTION,
};
use crate::db::{Collection, DocumentStore};
use crate::types::{AgroError, Result};

pub const UNKNOWN_USER: &str = "Usuario Desconocido";
pub const UNKNOWN_SUPPLY: &str = "Insumo Desconocido";
pub const UNKNOWN_SUPPLY_TYPE: &str = "Tipo Desconocido";
pub const UNKNOWN_UNIT: &str = "Unidad Desconocida";
/// Generic sentinel used by the soil and activity views
pub const UNKNOWN: &str = "Desconocido";

/// Display fields of a supply, each falling back to its own sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyLabel {
    pub nombre_insumo: String,
    pub tipo_insumo: String,
    pub unidad_medida: String,
}

impl Default for SupplyLabel {
    fn default() -> Self {
        Self {
            nombre_insumo: UNKNOWN_SUPPLY.to_string(),
            tipo_insumo: UNKNOWN_SUPPLY_TYPE.to_string(),
            unidad_medida: UNKNOWN_UNIT.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch the referenced document, `Ok(None)` when it does not exist
    pub async fn try_lookup(&self, collection: &str, id: ObjectId) -> Result<Option<Document>> {
        self.store.find_one(collection, doc! { "_id": id }).await
    }

    /// Read one string field of the referenced document, or `sentinel`
    pub async fn display_field(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        sentinel: &str,
    ) -> String {
        match self.try_lookup(collection, id).await {
            Ok(Some(doc)) => match doc.get_str(field) {
                Ok(value) if !value.trim().is_empty() => value.to_string(),
                _ => sentinel.to_string(),
            },
            Ok(None) => sentinel.to_string(),
            Err(e) => {
                warn!("Could not resolve {} {} in '{}': {}", field, id, collection, e);
                sentinel.to_string()
            }
        }
    }

    pub async fn user_name(&self, id: ObjectId) -> String {
        self.display_field(USER_COLLECTION, id, "nombre", UNKNOWN_USER)
            .await
    }

    pub async fn crop_name(&self, id: ObjectId, sentinel: &str) -> String {
        self.display_field(CROP_COLLECTION, id, "nomCultivo", sentinel)
            .await
    }

    pub async fn supply_label(&self, id: ObjectId) -> SupplyLabel {
        let doc = match self.try_lookup(SUPPLY_COLLECTION, id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return SupplyLabel::default(),
            Err(e) => {
                warn!("Could not resolve supply {}: {}", id, e);
                return SupplyLabel::default();
            }
        };

        let fallback = SupplyLabel::default();
        let field = |name: &str, sentinel: String| {
            doc.get_str(name)
                .map(str::to_string)
                .unwrap_or(sentinel)
        };
        SupplyLabel {
            nombre_insumo: field("nombreInsumo", fallback.nombre_insumo),
            tipo_insumo: field("tipoInsumo", fallback.tipo_insumo),
            unidad_medida: field("unidadMedida", fallback.unidad_medida),
        }
    }

    /// Strict user lookup: `Ok(None)` for a dangling reference, `Err` only
    /// when the store itself failed
    pub async fn strict_user_name(&self, id: ObjectId) -> Result<Option<String>> {
        Ok(self
            .try_lookup(USER_COLLECTION, id)
            .await?
            .and_then(|doc| doc.get_str("nombre").ok().map(str::to_string)))
    }

    // =========================================================================
    // Write-time existence checks
    // =========================================================================

    /// The user must exist; returns the raw user document
    pub async fn require_user(&self, id: ObjectId) -> Result<Document> {
        self.try_lookup(USER_COLLECTION, id).await?.ok_or_else(|| {
            AgroError::NotFound(format!("No se encontró un usuario con el ID: {}.", id))
        })
    }

    /// The supply must exist and still be active
    pub async fn require_active_supply(&self, id: ObjectId) -> Result<SupplyDoc> {
        let supply = Collection::<SupplyDoc>::new(Arc::clone(&self.store), SUPPLY_COLLECTION)
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| {
                AgroError::NotFound(format!("No se encontró un insumo con el ID: {}.", id))
            })?;
        if supply.estatus != SupplyStatus::Active {
            return Err(AgroError::Validation(format!(
                "El insumo '{}' está inactivo y no puede aplicarse.",
                supply.nombre_insumo
            )));
        }
        Ok(supply)
    }

    /// Any crop, active or not
    pub async fn require_crop(&self, id: ObjectId, raw: &str) -> Result<CropDoc> {
        Collection::<CropDoc>::new(Arc::clone(&self.store), CROP_COLLECTION)
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| {
                AgroError::NotFound(format!("No se encontró un cultivo con el ID: {}.", raw))
            })
    }

    /// A crop that has not been soft-deleted
    pub async fn require_active_crop(&self, id: ObjectId, raw: &str) -> Result<CropDoc> {
        Collection::<CropDoc>::new(Arc::clone(&self.store), CROP_COLLECTION)
            .find_one(doc! { "_id": id, "registroActivo": true })
            .await?
            .ok_or_else(|| {
                AgroError::NotFound(format!(
                    "No se encontró un cultivo activo con el ID: {}.",
                    raw
                ))
            })
    }
}
