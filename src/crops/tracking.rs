//! Tracking entries (`seguimientos`)
//!
//! Stored in their own collection. Every query on a single entry is scoped by
//! both its id and its `idCultivo`, so one crop can never reach another
//! crop's entries.

use bson::{doc, oid::ObjectId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{skipped_note, CropManager};
use crate::db::{nothing_to_update, settle_update, SetBuilder};
use crate::db::schemas::{HealthState, TrackingDoc};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{parse_label, parse_object_id};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTracking {
    pub fecha_revision: NaiveDate,
    pub estado_cultivo: String,
    #[serde(default)]
    pub observaciones: Option<Vec<String>>,
    #[serde(default)]
    pub recomendaciones: Option<Vec<String>>,
    pub id_usuario: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPatch {
    pub fecha_revision: Option<NaiveDate>,
    pub estado_cultivo: Option<String>,
    pub observaciones: Option<Vec<String>>,
    pub recomendaciones: Option<Vec<String>>,
    pub id_usuario: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    #[serde(rename = "_id")]
    pub id: String,
    pub fecha_revision: NaiveDate,
    pub estado_cultivo: HealthState,
    pub observaciones: Vec<String>,
    pub recomendaciones: Vec<String>,
    pub id_cultivo: String,
    pub id_usuario: String,
    pub nombre_usuario: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingList {
    pub nombre_cultivo: String,
    pub seguimientos: Vec<TrackingView>,
    pub omitidos: usize,
}

impl CropManager {
    pub async fn add_tracking(&self, raw_crop: &str, input: NewTracking) -> Outcome<()> {
        Outcome::settle(self.try_add_tracking(raw_crop, input).await)
    }

    pub async fn update_tracking(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: TrackingPatch,
    ) -> Outcome<()> {
        Outcome::settle(self.try_update_tracking(raw_crop, raw_entry, patch).await)
    }

    pub async fn delete_tracking(&self, raw_crop: &str, raw_entry: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete_tracking(raw_crop, raw_entry).await)
    }

    pub async fn get_tracking(&self, raw_crop: &str, raw_entry: &str) -> Outcome<TrackingView> {
        Outcome::settle(self.try_get_tracking(raw_crop, raw_entry).await)
    }

    pub async fn list_tracking(&self, raw_crop: &str) -> Outcome<TrackingList> {
        Outcome::settle(self.try_list_tracking(raw_crop).await)
    }

    async fn try_add_tracking(&self, raw_crop: &str, input: NewTracking) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let health = parse_label::<HealthState>(&input.estado_cultivo, "estadoCultivo")?;
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;

        self.resolver.require_active_crop(crop_id, raw_crop).await?;
        self.resolver.require_user(user_id).await?;

        let entry = TrackingDoc {
            _id: None,
            fecha_revision: input.fecha_revision,
            estado_cultivo: health,
            observaciones: input.observaciones.unwrap_or_default(),
            recomendaciones: input.recomendaciones.unwrap_or_default(),
            id_cultivo: crop_id,
            id_usuario: user_id,
        };
        let id = self.tracking.insert_one(&entry).await?;
        debug!("Tracking {} recorded for crop {}", id, crop_id);

        Ok(Outcome::created(format!(
            "Seguimiento registrado con éxito con id: {}",
            id
        )))
    }

    async fn try_update_tracking(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: TrackingPatch,
    ) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del seguimiento")?;

        self.resolver.require_active_crop(crop_id, raw_crop).await?;
        let scope = doc! { "_id": entry_id, "idCultivo": crop_id };
        if !self.tracking.exists(scope.clone()).await? {
            return Err(entry_not_found(raw_crop, raw_entry));
        }

        let mut set = SetBuilder::new("");
        if let Some(date) = patch.fecha_revision {
            set.set_serialized("fechaRevision", &date)?;
        }
        if let Some(raw) = &patch.estado_cultivo {
            let health = parse_label::<HealthState>(raw, "estadoCultivo")?;
            set.set_serialized("estadoCultivo", &health)?;
        }
        if let Some(notes) = &patch.observaciones {
            set.set_serialized("observaciones", notes)?;
        }
        if let Some(advice) = &patch.recomendaciones {
            set.set_serialized("recomendaciones", advice)?;
        }
        if let Some(raw_user) = &patch.id_usuario {
            let user_id = parse_object_id(raw_user, "del usuario")?;
            self.resolver.require_user(user_id).await?;
            set.set("idUsuario", user_id);
        }

        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self.tracking.update_one(scope, set.into_update()).await?;
        settle_update(counts, || entry_not_found(raw_crop, raw_entry))?;

        Ok(Outcome::ok("Seguimiento actualizado con éxito."))
    }

    async fn try_delete_tracking(&self, raw_crop: &str, raw_entry: &str) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del seguimiento")?;

        let deleted = self
            .tracking
            .delete_one(doc! { "_id": entry_id, "idCultivo": crop_id })
            .await?;
        if deleted == 0 {
            return Err(entry_not_found(raw_crop, raw_entry));
        }
        debug!("Tracking {} deleted from crop {}", entry_id, crop_id);

        Ok(Outcome::ok("Seguimiento eliminado con éxito."))
    }

    async fn try_get_tracking(&self, raw_crop: &str, raw_entry: &str) -> Result<Outcome<TrackingView>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del seguimiento")?;

        self.resolver.require_active_crop(crop_id, raw_crop).await?;
        let entry = self
            .tracking
            .find_one(doc! { "_id": entry_id, "idCultivo": crop_id })
            .await?
            .ok_or_else(|| entry_not_found(raw_crop, raw_entry))?;

        let nombre_usuario = self.resolver.user_name(entry.id_usuario).await;
        let view = tracking_view(entry, nombre_usuario)?;
        Ok(Outcome::ok_with("Seguimiento encontrado.", view))
    }

    async fn try_list_tracking(&self, raw_crop: &str) -> Result<Outcome<TrackingList>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;

        let raw_entries = self.tracking.find_many_raw(doc! { "idCultivo": crop_id }).await?;
        let mut seguimientos = Vec::with_capacity(raw_entries.len());
        let mut omitidos = 0;
        for raw in raw_entries {
            match self.list_item(raw).await {
                Ok(view) => seguimientos.push(view),
                Err(e) => {
                    warn!("Skipping tracking entry of crop {}: {}", crop_id, e);
                    omitidos += 1;
                }
            }
        }

        let message = if seguimientos.is_empty() && omitidos == 0 {
            format!("El cultivo '{}' no tiene seguimientos registrados.", crop.nom_cultivo)
        } else {
            format!(
                "Se encontraron {} seguimientos para el cultivo '{}'.{}",
                seguimientos.len(),
                crop.nom_cultivo,
                skipped_note(omitidos)
            )
        };
        Ok(Outcome::ok_with(
            message,
            TrackingList {
                nombre_cultivo: crop.nom_cultivo,
                seguimientos,
                omitidos,
            },
        ))
    }

    /// One list entry; unlike the point query, an unresolved user drops it
    async fn list_item(&self, raw: bson::Document) -> Result<TrackingView> {
        let entry: TrackingDoc = bson::from_document(raw)?;
        let name = self
            .resolver
            .strict_user_name(entry.id_usuario)
            .await?
            .ok_or_else(|| {
                AgroError::NotFound(format!("Usuario {} no encontrado", entry.id_usuario))
            })?;
        tracking_view(entry, name)
    }
}

fn tracking_view(entry: TrackingDoc, nombre_usuario: String) -> Result<TrackingView> {
    let id = entry
        ._id
        .ok_or_else(|| AgroError::Internal("Tracking entry without _id".into()))?;
    Ok(TrackingView {
        id: id.to_hex(),
        fecha_revision: entry.fecha_revision,
        estado_cultivo: entry.estado_cultivo,
        observaciones: entry.observaciones,
        recomendaciones: entry.recomendaciones,
        id_cultivo: entry.id_cultivo.to_hex(),
        id_usuario: entry.id_usuario.to_hex(),
        nombre_usuario,
    })
}

fn entry_not_found(raw_crop: &str, raw_entry: &str) -> AgroError {
    AgroError::NotFound(format!(
        "No se encontró el seguimiento con ID '{}' para el cultivo con ID '{}'.",
        raw_entry, raw_crop
    ))
}
