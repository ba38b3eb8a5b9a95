//! Crop create/update/delete/query

use bson::doc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CropManager;
use crate::db::{nothing_to_update, settle_update, SetBuilder};
use crate::db::schemas::{CropDoc, CropState};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{
    check_harvest_dates, check_surface_covers_area, parse_label, parse_object_id,
    require_positive, require_text,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrop {
    pub nom_cultivo: String,
    pub fecha_siembra: NaiveDate,
    pub fecha_cosecha_est: NaiveDate,
    #[serde(default)]
    pub fecha_cosecha_real: Option<NaiveDate>,
    pub area_cultivo: f64,
    pub id_usuario: String,
}

/// Sparse crop update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropPatch {
    pub nom_cultivo: Option<String>,
    pub fecha_siembra: Option<NaiveDate>,
    pub fecha_cosecha_est: Option<NaiveDate>,
    pub fecha_cosecha_real: Option<NaiveDate>,
    pub area_cultivo: Option<f64>,
    pub estado_actual: Option<String>,
    pub id_usuario: Option<String>,
}

/// Crop as returned to callers, without the embedded logs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropView {
    #[serde(rename = "_id")]
    pub id: String,
    pub nom_cultivo: String,
    pub fecha_siembra: NaiveDate,
    pub fecha_cosecha_est: NaiveDate,
    pub fecha_cosecha_real: Option<NaiveDate>,
    pub area_cultivo: f64,
    pub estado_actual: CropState,
    pub id_usuario: String,
    pub nombre_usuario: String,
}

impl CropManager {
    pub async fn create_crop(&self, input: NewCrop) -> Outcome<()> {
        Outcome::settle(self.try_create_crop(input).await)
    }

    pub async fn update_crop(&self, raw_id: &str, patch: CropPatch) -> Outcome<()> {
        Outcome::settle(self.try_update_crop(raw_id, patch).await)
    }

    pub async fn delete_crop(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete_crop(raw_id).await)
    }

    pub async fn get_crop(&self, raw_id: &str) -> Outcome<CropView> {
        Outcome::settle(self.try_get_crop(raw_id).await)
    }

    pub async fn list_crops(&self) -> Outcome<Vec<CropView>> {
        Outcome::settle(self.try_list_crops().await)
    }

    async fn try_create_crop(&self, input: NewCrop) -> Result<Outcome<()>> {
        let name = require_text(&input.nom_cultivo, "nomCultivo")?;
        require_positive(input.area_cultivo, "areaCultivo")?;
        check_harvest_dates(
            input.fecha_siembra,
            input.fecha_cosecha_est,
            input.fecha_cosecha_real,
        )?;
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;
        self.resolver.require_user(user_id).await?;

        let crop = CropDoc::new(
            name.clone(),
            input.fecha_siembra,
            input.fecha_cosecha_est,
            input.fecha_cosecha_real,
            input.area_cultivo,
            user_id,
        );
        let id = self.crops.insert_one(&crop).await?;
        debug!("Crop {} created", id);

        Ok(Outcome::created(format!(
            "Cultivo '{}' agregado con éxito con id: {}",
            name, id
        )))
    }

    async fn try_update_crop(&self, raw_id: &str, patch: CropPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del cultivo")?;
        let current = self.resolver.require_crop(id, raw_id).await?;

        let mut set = SetBuilder::new("");

        if let Some(name) = &patch.nom_cultivo {
            set.set("nomCultivo", require_text(name, "nomCultivo")?);
        }
        if let Some(area) = patch.area_cultivo {
            require_positive(area, "areaCultivo")?;
            if let Some(location) = &current.ubicacion {
                check_surface_covers_area(location.superficie, area)?;
            }
            set.set("areaCultivo", area);
        }
        if let Some(raw_state) = &patch.estado_actual {
            let state: CropState = parse_label(raw_state, "estadoActual")?;
            set.set_serialized("estadoActual", &state)?;
        }

        // Date ordering is judged on the crop as it would look after the merge
        if patch.fecha_siembra.is_some()
            || patch.fecha_cosecha_est.is_some()
            || patch.fecha_cosecha_real.is_some()
        {
            let planting = patch.fecha_siembra.unwrap_or(current.fecha_siembra);
            let estimated = patch.fecha_cosecha_est.unwrap_or(current.fecha_cosecha_est);
            let actual = patch.fecha_cosecha_real.or(current.fecha_cosecha_real);
            check_harvest_dates(planting, estimated, actual)?;

            if let Some(d) = patch.fecha_siembra {
                set.set_serialized("fechaSiembra", &d)?;
            }
            if let Some(d) = patch.fecha_cosecha_est {
                set.set_serialized("fechaCosechaEst", &d)?;
            }
            if let Some(d) = patch.fecha_cosecha_real {
                set.set_serialized("fechaCosechaReal", &d)?;
            }
        }

        if let Some(raw_user) = &patch.id_usuario {
            let user_id = parse_object_id(raw_user, "del usuario")?;
            self.resolver.require_user(user_id).await?;
            set.set("idUsuario", user_id);
        }

        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self
            .crops
            .update_one(doc! { "_id": id }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;
        debug!("Crop {} updated", id);

        Ok(Outcome::ok(format!(
            "Cultivo con id {} actualizado con éxito.",
            raw_id
        )))
    }

    /// Soft delete. A crop that is already inactive yields INFO and is
    /// never reactivated.
    async fn try_delete_crop(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del cultivo")?;

        let counts = self
            .crops
            .update_one(
                doc! { "_id": id, "registroActivo": true },
                doc! { "$set": { "registroActivo": false } },
            )
            .await?;

        if counts.matched == 0 {
            return if self.crops.exists(doc! { "_id": id }).await? {
                Ok(Outcome::info(format!(
                    "El cultivo con id {} ya se encontraba inactivo.",
                    raw_id
                )))
            } else {
                Err(not_found(raw_id))
            };
        }
        debug!("Crop {} deactivated", id);

        Ok(Outcome::ok(format!(
            "Cultivo con id {} eliminado con éxito.",
            raw_id
        )))
    }

    async fn try_get_crop(&self, raw_id: &str) -> Result<Outcome<CropView>> {
        let id = parse_object_id(raw_id, "del cultivo")?;
        let crop = self
            .crops
            .find_one(doc! { "_id": id, "registroActivo": true })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        let view = self.crop_view(crop).await?;
        Ok(Outcome::ok_with("Cultivo encontrado.", view))
    }

    async fn try_list_crops(&self) -> Result<Outcome<Vec<CropView>>> {
        let crops = self.crops.find_many(doc! { "registroActivo": true }).await?;

        let mut views = Vec::with_capacity(crops.len());
        for crop in crops {
            views.push(self.crop_view(crop).await?);
        }

        let message = if views.is_empty() {
            "No hay cultivos activos registrados.".to_string()
        } else {
            format!("Se encontraron {} cultivos activos.", views.len())
        };
        Ok(Outcome::ok_with(message, views))
    }

    async fn crop_view(&self, crop: CropDoc) -> Result<CropView> {
        let id = crop
            ._id
            .ok_or_else(|| AgroError::Internal("Stored crop without _id".into()))?;
        let nombre_usuario = self.resolver.user_name(crop.id_usuario).await;

        Ok(CropView {
            id: id.to_hex(),
            nom_cultivo: crop.nom_cultivo,
            fecha_siembra: crop.fecha_siembra,
            fecha_cosecha_est: crop.fecha_cosecha_est,
            fecha_cosecha_real: crop.fecha_cosecha_real,
            area_cultivo: crop.area_cultivo,
            estado_actual: crop.estado_actual,
            id_usuario: crop.id_usuario.to_hex(),
            nombre_usuario,
        })
    }
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("No se encontró un cultivo con el ID: {}.", raw_id))
}
