//! Supply (insumo) catalogue

use bson::doc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{SupplyDoc, SupplyStatus, SupplyType, SUPPLY_COLLECTION};
use crate::db::{nothing_to_update, settle_update, Collection, DocumentStore, SetBuilder};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{parse_label, parse_object_id, require_non_negative, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupply {
    pub nombre_insumo: String,
    pub tipo_insumo: String,
    pub cant_disponible: f64,
    pub unidad_medida: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyPatch {
    pub nombre_insumo: Option<String>,
    pub tipo_insumo: Option<String>,
    pub cant_disponible: Option<f64>,
    pub unidad_medida: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyView {
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre_insumo: String,
    pub tipo_insumo: SupplyType,
    pub cant_disponible: f64,
    pub unidad_medida: String,
    pub estatus: SupplyStatus,
}

impl TryFrom<SupplyDoc> for SupplyView {
    type Error = AgroError;

    fn try_from(doc: SupplyDoc) -> Result<Self> {
        let id = doc
            ._id
            .ok_or_else(|| AgroError::Internal("Supply without _id".into()))?;
        Ok(Self {
            id: id.to_hex(),
            nombre_insumo: doc.nombre_insumo,
            tipo_insumo: doc.tipo_insumo,
            cant_disponible: doc.cant_disponible,
            unidad_medida: doc.unidad_medida,
            estatus: doc.estatus,
        })
    }
}

#[derive(Clone)]
pub struct SupplyService {
    supplies: Collection<SupplyDoc>,
}

impl SupplyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            supplies: Collection::new(store, SUPPLY_COLLECTION),
        }
    }

    pub async fn create(&self, input: NewSupply) -> Outcome<()> {
        Outcome::settle(self.try_create(input).await)
    }

    pub async fn update(&self, raw_id: &str, patch: SupplyPatch) -> Outcome<()> {
        Outcome::settle(self.try_update(raw_id, patch).await)
    }

    pub async fn delete(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete(raw_id).await)
    }

    pub async fn get(&self, raw_id: &str) -> Outcome<SupplyView> {
        Outcome::settle(self.try_get(raw_id).await)
    }

    pub async fn list(&self) -> Outcome<Vec<SupplyView>> {
        Outcome::settle(self.try_list().await)
    }

    async fn try_create(&self, input: NewSupply) -> Result<Outcome<()>> {
        let name = require_text(&input.nombre_insumo, "nombreInsumo")?;
        let kind = parse_label::<SupplyType>(input.tipo_insumo.trim(), "tipoInsumo")?;
        require_non_negative(input.cant_disponible, "cantDisponible")?;
        let unit = require_text(&input.unidad_medida, "unidadMedida")?;

        if self.supplies.exists(doc! { "nombreInsumo": name.as_str() }).await? {
            return Err(AgroError::Conflict(
                "Ya existe un insumo con el mismo nombre.".into(),
            ));
        }

        let supply = SupplyDoc {
            _id: None,
            nombre_insumo: name,
            tipo_insumo: kind,
            cant_disponible: input.cant_disponible,
            unidad_medida: unit,
            estatus: SupplyStatus::Active,
        };
        let id = self.supplies.insert_one(&supply).await?;
        debug!("Supply {} registered", id);

        Ok(Outcome::created(format!(
            "Insumo registrado con éxito con id: {}",
            id
        )))
    }

    async fn try_update(&self, raw_id: &str, patch: SupplyPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del insumo")?;
        if !self.supplies.exists(doc! { "_id": id }).await? {
            return Err(not_found(raw_id));
        }

        let mut set = SetBuilder::new("");
        if let Some(raw_name) = &patch.nombre_insumo {
            let name = require_text(raw_name, "nombreInsumo")?;
            let taken = self
                .supplies
                .exists(doc! { "nombreInsumo": name.as_str(), "_id": { "$ne": id } })
                .await?;
            if taken {
                return Err(AgroError::Conflict(
                    "Ya existe otro insumo con el mismo nombre.".into(),
                ));
            }
            set.set("nombreInsumo", name);
        }
        if let Some(raw_kind) = &patch.tipo_insumo {
            let kind = parse_label::<SupplyType>(raw_kind.trim(), "tipoInsumo")?;
            set.set_serialized("tipoInsumo", &kind)?;
        }
        if let Some(quantity) = patch.cant_disponible {
            require_non_negative(quantity, "cantDisponible")?;
            set.set("cantDisponible", quantity);
        }
        if let Some(unit) = &patch.unidad_medida {
            set.set("unidadMedida", require_text(unit, "unidadMedida")?);
        }

        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self
            .supplies
            .update_one(doc! { "_id": id }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;

        Ok(Outcome::ok(format!("Insumo {} actualizado con éxito.", raw_id)))
    }

    async fn try_delete(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del insumo")?;
        let supply = self
            .supplies
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| not_found(raw_id))?;
        if supply.estatus == SupplyStatus::Inactive {
            return Err(AgroError::Conflict(
                "El insumo ya ha sido eliminado previamente.".into(),
            ));
        }

        // Guarded on the active status so a concurrent delete cannot succeed twice
        let counts = self
            .supplies
            .update_one(
                doc! { "_id": id, "estatus": "Activo" },
                doc! { "$set": { "estatus": "Inactivo" } },
            )
            .await?;
        if counts.modified == 0 {
            return Err(AgroError::Conflict(
                "El insumo ya ha sido eliminado previamente.".into(),
            ));
        }
        debug!("Supply {} deactivated", id);

        Ok(Outcome::ok("Insumo eliminado (lógicamente) con éxito."))
    }

    async fn try_get(&self, raw_id: &str) -> Result<Outcome<SupplyView>> {
        let id = parse_object_id(raw_id, "del insumo")?;
        let supply = self
            .supplies
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        Ok(Outcome::ok_with(
            "Insumo encontrado exitosamente.",
            SupplyView::try_from(supply)?,
        ))
    }

    async fn try_list(&self) -> Result<Outcome<Vec<SupplyView>>> {
        let supplies = self
            .supplies
            .find_many(doc! {})
            .await?
            .into_iter()
            .map(SupplyView::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Outcome::ok_with("Listado de insumos", supplies))
    }
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("No se encontró un insumo con ID: {}", raw_id))
}
