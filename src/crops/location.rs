//! Crop location: a single embedded object, created once

use bson::{doc, Bson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CropManager;
use crate::db::{nothing_to_update, settle_update, SetBuilder};
use crate::db::schemas::{Coordinates, LocationDoc};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{
    check_coordinates, check_postal_code, check_surface_covers_area, parse_object_id,
    require_text,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub nombre_ubicacion: String,
    pub coordenadas: Coordinates,
    pub superficie: f64,
    pub tipo_suelo: String,
    pub acceso_agua: bool,
    pub estado: String,
    pub municipio: String,
    pub localidad: String,
    pub cp: String,
    #[serde(default)]
    pub detalles: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    pub nombre_ubicacion: Option<String>,
    pub coordenadas: Option<Coordinates>,
    pub superficie: Option<f64>,
    pub tipo_suelo: Option<String>,
    pub acceso_agua: Option<bool>,
    pub estado: Option<String>,
    pub municipio: Option<String>,
    pub localidad: Option<String>,
    pub cp: Option<String>,
    pub detalles: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationView {
    #[serde(flatten)]
    pub ubicacion: LocationDoc,
    pub nombre_cultivo: String,
}

impl CropManager {
    pub async fn create_location(&self, raw_crop: &str, input: NewLocation) -> Outcome<()> {
        Outcome::settle(self.try_create_location(raw_crop, input).await)
    }

    pub async fn update_location(&self, raw_crop: &str, patch: LocationPatch) -> Outcome<()> {
        Outcome::settle(self.try_update_location(raw_crop, patch).await)
    }

    pub async fn delete_location(&self, raw_crop: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete_location(raw_crop).await)
    }

    pub async fn get_location(&self, raw_crop: &str) -> Outcome<LocationView> {
        Outcome::settle(self.try_get_location(raw_crop).await)
    }

    async fn try_create_location(&self, raw_crop: &str, input: NewLocation) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;

        let location = LocationDoc {
            nombre_ubicacion: require_text(&input.nombre_ubicacion, "nombreUbicacion")?,
            coordenadas: input.coordenadas,
            superficie: input.superficie,
            tipo_suelo: input.tipo_suelo.trim().to_string(),
            acceso_agua: input.acceso_agua,
            estado: require_text(&input.estado, "estado")?,
            municipio: require_text(&input.municipio, "municipio")?,
            localidad: require_text(&input.localidad, "localidad")?,
            cp: input.cp.trim().to_string(),
            detalles: input.detalles,
        };
        check_postal_code(&location.cp)?;
        check_coordinates(&location.coordenadas)?;

        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        check_surface_covers_area(location.superficie, crop.area_cultivo)?;
        if crop.ubicacion.is_some() {
            return Err(already_located(raw_crop));
        }

        // The null guard keeps a concurrent create from overwriting ours
        let counts = self
            .crops
            .update_one(
                doc! { "_id": crop_id, "registroActivo": true, "ubicacion": Bson::Null },
                doc! { "$set": { "ubicacion": bson::to_bson(&location)? } },
            )
            .await?;
        if counts.matched == 0 {
            return Err(already_located(raw_crop));
        }
        debug!("Location registered for crop {}", crop_id);

        Ok(Outcome::created(format!(
            "Ubicación '{}' agregada con éxito al cultivo con id {}.",
            location.nombre_ubicacion, raw_crop
        )))
    }

    async fn try_update_location(&self, raw_crop: &str, patch: LocationPatch) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        if crop.ubicacion.is_none() {
            return Err(no_location(raw_crop));
        }

        let mut set = SetBuilder::new("ubicacion.");
        if let Some(name) = &patch.nombre_ubicacion {
            set.set("nombreUbicacion", require_text(name, "nombreUbicacion")?);
        }
        if let Some(coords) = &patch.coordenadas {
            check_coordinates(coords)?;
            set.set_serialized("coordenadas", coords)?;
        }
        if let Some(superficie) = patch.superficie {
            check_surface_covers_area(superficie, crop.area_cultivo)?;
            set.set("superficie", superficie);
        }
        if let Some(soil) = &patch.tipo_suelo {
            set.set("tipoSuelo", soil.trim());
        }
        if let Some(water) = patch.acceso_agua {
            set.set("accesoAgua", water);
        }
        if let Some(estado) = &patch.estado {
            set.set("estado", require_text(estado, "estado")?);
        }
        if let Some(municipio) = &patch.municipio {
            set.set("municipio", require_text(municipio, "municipio")?);
        }
        if let Some(localidad) = &patch.localidad {
            set.set("localidad", require_text(localidad, "localidad")?);
        }
        if let Some(cp) = &patch.cp {
            check_postal_code(cp)?;
            set.set("cp", cp.trim());
        }
        if let Some(detalles) = &patch.detalles {
            set.set("detalles", detalles.as_str());
        }

        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self
            .crops
            .update_one(
                doc! {
                    "_id": crop_id,
                    "registroActivo": true,
                    "ubicacion": { "$ne": Bson::Null },
                },
                set.into_update(),
            )
            .await?;
        settle_update(counts, || no_location(raw_crop))?;

        Ok(Outcome::ok(format!(
            "Ubicación del cultivo con id {} actualizada con éxito.",
            raw_crop
        )))
    }

    /// Reset the location to absent so a new one can be registered
    async fn try_delete_location(&self, raw_crop: &str) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;

        let counts = self
            .crops
            .update_one(
                doc! {
                    "_id": crop_id,
                    "registroActivo": true,
                    "ubicacion": { "$ne": Bson::Null },
                },
                doc! { "$set": { "ubicacion": Bson::Null } },
            )
            .await?;

        if counts.matched == 0 {
            // Tell a missing crop apart from a crop without location
            self.resolver.require_active_crop(crop_id, raw_crop).await?;
            return Err(no_location(raw_crop));
        }

        Ok(Outcome::ok(format!(
            "Ubicación del cultivo con id {} eliminada con éxito.",
            raw_crop
        )))
    }

    async fn try_get_location(&self, raw_crop: &str) -> Result<Outcome<LocationView>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        let ubicacion = crop.ubicacion.ok_or_else(|| no_location(raw_crop))?;

        Ok(Outcome::ok_with(
            "Ubicación encontrada.",
            LocationView {
                ubicacion,
                nombre_cultivo: crop.nom_cultivo,
            },
        ))
    }
}

fn no_location(raw_crop: &str) -> AgroError {
    AgroError::NotFound(format!(
        "El cultivo con id {} no tiene una ubicación registrada.",
        raw_crop
    ))
}

fn already_located(raw_crop: &str) -> AgroError {
    AgroError::Conflict(format!(
        "El cultivo con id {} ya tiene una ubicación registrada.",
        raw_crop
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::crops::CropPatch;
    use crate::outcome::{OutcomeKind, Status};

    fn new_location(superficie: f64) -> NewLocation {
        NewLocation {
            nombre_ubicacion: "Parcela norte".into(),
            coordenadas: Coordinates {
                latitud: 19.70,
                longitud: -101.19,
            },
            superficie,
            tipo_suelo: "Franco arcilloso".into(),
            acceso_agua: true,
            estado: "Michoacán".into(),
            municipio: "Morelia".into(),
            localidad: "Tarímbaro".into(),
            cp: "58880".into(),
            detalles: None,
        }
    }

    #[tokio::test]
    async fn test_surface_smaller_than_area_is_rejected_equal_is_accepted() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;

        let smaller = fx.manager.create_location(&id, new_location(4.99)).await;
        assert_eq!(smaller.kind(), OutcomeKind::Validation);
        assert!(crop_doc(&fx, &id).await.is_null("ubicacion"));

        let equal = fx.manager.create_location(&id, new_location(5.0)).await;
        assert_eq!(equal.status, Status::Ok, "{}", equal.message);
    }

    #[tokio::test]
    async fn test_crop_area_cannot_outgrow_registered_surface() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 2.0).await;
        assert!(fx.manager.create_location(&id, new_location(3.0)).await.is_ok());

        let grown = CropPatch {
            area_cultivo: Some(50.0),
            ..Default::default()
        };
        assert_eq!(
            fx.manager.update_crop(&id, grown).await.kind(),
            OutcomeKind::Validation
        );
        assert_eq!(crop_doc(&fx, &id).await.get_f64("areaCultivo").unwrap(), 2.0);

        let filled = CropPatch {
            area_cultivo: Some(3.0),
            ..Default::default()
        };
        let outcome = fx.manager.update_crop(&id, filled).await;
        assert_eq!(outcome.status, Status::Ok, "{}", outcome.message);
        assert_eq!(crop_doc(&fx, &id).await.get_f64("areaCultivo").unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_location_is_one_shot() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;
        assert!(fx.manager.create_location(&id, new_location(6.0)).await.is_ok());

        let second = fx.manager.create_location(&id, new_location(7.0)).await;
        assert!(second.is_error());
        let stored = crop_doc(&fx, &id).await;
        assert_eq!(
            stored.get_document("ubicacion").unwrap().get_f64("superficie").unwrap(),
            6.0
        );
    }

    #[tokio::test]
    async fn test_edit_before_create_is_not_found_regardless_of_payload() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;

        let invalid = LocationPatch {
            cp: Some("12".into()),
            ..Default::default()
        };
        let outcome = fx.manager.update_location(&id, invalid).await;
        assert_eq!(outcome.kind(), OutcomeKind::NotFound);

        let valid = LocationPatch {
            superficie: Some(10.0),
            ..Default::default()
        };
        let outcome = fx.manager.update_location(&id, valid).await;
        assert_eq!(outcome.kind(), OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn test_edit_merges_sparse_fields() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;
        fx.manager.create_location(&id, new_location(6.0)).await;

        let too_small = LocationPatch {
            superficie: Some(4.0),
            ..Default::default()
        };
        assert!(fx.manager.update_location(&id, too_small).await.is_error());

        let patch = LocationPatch {
            superficie: Some(8.0),
            detalles: Some("Junto al canal".into()),
            ..Default::default()
        };
        assert_eq!(fx.manager.update_location(&id, patch).await.status, Status::Ok);

        let view = fx.manager.get_location(&id).await.data.unwrap();
        assert_eq!(view.ubicacion.superficie, 8.0);
        assert_eq!(view.ubicacion.municipio, "Morelia");
        assert_eq!(view.ubicacion.detalles.as_deref(), Some("Junto al canal"));
        assert_eq!(view.nombre_cultivo, "Maíz criollo");

        let empty = fx.manager.update_location(&id, LocationPatch::default()).await;
        assert_eq!(empty.status, Status::Info);
    }

    #[tokio::test]
    async fn test_delete_allows_new_location() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;
        fx.manager.create_location(&id, new_location(6.0)).await;

        assert!(fx.manager.delete_location(&id).await.is_ok());
        assert_eq!(fx.manager.delete_location(&id).await.kind(), OutcomeKind::NotFound);
        assert!(fx.manager.create_location(&id, new_location(9.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_location_requires_active_crop() {
        let fx = fixture().await;
        let id = seeded_crop(&fx, 5.0).await;
        fx.manager.delete_crop(&id).await;

        let outcome = fx.manager.create_location(&id, new_location(6.0)).await;
        assert_eq!(outcome.kind(), OutcomeKind::NotFound);
    }
}
