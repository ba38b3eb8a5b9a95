//! Applied-input log (`aplicacionesInsumos`)
//!
//! Each entry records one application of a supply, with its own `_id`.
//! Edits target the entry through the positional operator; deletes pull it
//! out of the array.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{find_entry, skipped_note, CropManager};
use crate::db::{nothing_to_update, settle_update, SetBuilder};
use crate::db::schemas::InputApplicationDoc;
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{parse_object_id, require_positive, require_text};

const FIELD: &str = "aplicacionesInsumos";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInputApplication {
    pub cantidad_aplicada: f64,
    pub fecha_aplicacion: NaiveDate,
    pub metodo_aplicacion: String,
    #[serde(default)]
    pub observaciones: Option<String>,
    pub id_usuario: String,
    pub id_insumo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputApplicationPatch {
    pub cantidad_aplicada: Option<f64>,
    pub fecha_aplicacion: Option<NaiveDate>,
    pub metodo_aplicacion: Option<String>,
    pub observaciones: Option<String>,
    pub id_usuario: Option<String>,
    pub id_insumo: Option<String>,
}

/// One application flattened together with its resolved references
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputApplicationView {
    #[serde(rename = "_id")]
    pub id: String,
    pub cantidad_aplicada: f64,
    pub fecha_aplicacion: NaiveDate,
    pub metodo_aplicacion: String,
    pub observaciones: Option<String>,
    pub id_usuario: String,
    pub nombre_usuario: String,
    pub id_insumo: String,
    pub nombre_insumo: String,
    pub tipo_insumo: String,
    pub unidad_medida: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputApplicationList {
    pub nombre_cultivo: String,
    pub aplicaciones: Vec<InputApplicationView>,
    /// Entries whose stored shape could not be read
    pub registros_omitidos: usize,
}

impl CropManager {
    pub async fn add_input_application(
        &self,
        raw_crop: &str,
        input: NewInputApplication,
    ) -> Outcome<()> {
        Outcome::settle(self.try_add_input(raw_crop, input).await)
    }

    pub async fn update_input_application(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: InputApplicationPatch,
    ) -> Outcome<()> {
        Outcome::settle(self.try_update_input(raw_crop, raw_entry, patch).await)
    }

    pub async fn delete_input_application(&self, raw_crop: &str, raw_entry: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete_input(raw_crop, raw_entry).await)
    }

    pub async fn get_input_application(
        &self,
        raw_crop: &str,
        raw_entry: &str,
    ) -> Outcome<InputApplicationView> {
        Outcome::settle(self.try_get_input(raw_crop, raw_entry).await)
    }

    pub async fn list_input_applications(&self, raw_crop: &str) -> Outcome<InputApplicationList> {
        Outcome::settle(self.try_list_inputs(raw_crop).await)
    }

    async fn try_add_input(&self, raw_crop: &str, input: NewInputApplication) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        require_positive(input.cantidad_aplicada, "cantidadAplicada")?;
        let method = require_text(&input.metodo_aplicacion, "metodoAplicacion")?;
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;
        let supply_id = parse_object_id(&input.id_insumo, "del insumo")?;

        self.resolver.require_active_crop(crop_id, raw_crop).await?;
        self.resolver.require_user(user_id).await?;
        self.resolver.require_active_supply(supply_id).await?;

        let entry = InputApplicationDoc {
            _id: ObjectId::new(),
            cantidad_aplicada: input.cantidad_aplicada,
            fecha_aplicacion: input.fecha_aplicacion,
            metodo_aplicacion: method,
            observaciones: input.observaciones,
            id_usuario: user_id,
            id_insumo: supply_id,
        };

        let counts = self
            .crops
            .update_one(
                doc! { "_id": crop_id, "registroActivo": true },
                doc! { "$push": { FIELD: bson::to_bson(&entry)? } },
            )
            .await?;
        if counts.matched == 0 {
            return Err(crop_not_found(raw_crop));
        }
        debug!("Input application {} added to crop {}", entry._id, crop_id);

        Ok(Outcome::created(format!(
            "Aplicación de insumo registrada con éxito con id: {}",
            entry._id
        )))
    }

    async fn try_update_input(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: InputApplicationPatch,
    ) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "de la aplicación de insumo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        if find_entry(&crop.aplicaciones_insumos, entry_id).is_none() {
            return Err(entry_not_found(raw_crop, raw_entry));
        }

        let mut set = SetBuilder::new("aplicacionesInsumos.$.");
        if let Some(quantity) = patch.cantidad_aplicada {
            require_positive(quantity, "cantidadAplicada")?;
            set.set("cantidadAplicada", quantity);
        }
        if let Some(date) = patch.fecha_aplicacion {
            set.set_serialized("fechaAplicacion", &date)?;
        }
        if let Some(method) = &patch.metodo_aplicacion {
            set.set("metodoAplicacion", require_text(method, "metodoAplicacion")?);
        }
        if let Some(notes) = &patch.observaciones {
            set.set("observaciones", notes.as_str());
        }
        if let Some(raw_user) = &patch.id_usuario {
            let user_id = parse_object_id(raw_user, "del usuario")?;
            self.resolver.require_user(user_id).await?;
            set.set("idUsuario", user_id);
        }
        if let Some(raw_supply) = &patch.id_insumo {
            let supply_id = parse_object_id(raw_supply, "del insumo")?;
            self.resolver.require_active_supply(supply_id).await?;
            set.set("idInsumo", supply_id);
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
                    "aplicacionesInsumos._id": entry_id,
                },
                set.into_update(),
            )
            .await?;
        settle_update(counts, || entry_not_found(raw_crop, raw_entry))?;

        Ok(Outcome::ok("Aplicación del insumo actualizada con éxito."))
    }

    async fn try_delete_input(&self, raw_crop: &str, raw_entry: &str) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "de la aplicación de insumo")?;

        let counts = self
            .crops
            .update_one(
                doc! {
                    "_id": crop_id,
                    "registroActivo": true,
                    "aplicacionesInsumos._id": entry_id,
                },
                doc! { "$pull": { FIELD: { "_id": entry_id } } },
            )
            .await?;

        if counts.matched == 0 {
            self.resolver.require_active_crop(crop_id, raw_crop).await?;
            return Err(entry_not_found(raw_crop, raw_entry));
        }
        debug!("Input application {} removed from crop {}", entry_id, crop_id);

        Ok(Outcome::ok("La aplicación del insumo fue eliminada con éxito."))
    }

    async fn try_get_input(
        &self,
        raw_crop: &str,
        raw_entry: &str,
    ) -> Result<Outcome<InputApplicationView>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "de la aplicación de insumo")?;

        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        let raw = find_entry(&crop.aplicaciones_insumos, entry_id)
            .ok_or_else(|| entry_not_found(raw_crop, raw_entry))?;
        let entry: InputApplicationDoc = bson::from_document(raw.clone()).map_err(|e| {
            AgroError::Internal(format!("Malformed input application {}: {}", entry_id, e))
        })?;

        let view = self.input_view(entry).await;
        Ok(Outcome::ok_with("Registro de aplicación de insumo encontrado.", view))
    }

    async fn try_list_inputs(&self, raw_crop: &str) -> Result<Outcome<InputApplicationList>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;

        if crop.aplicaciones_insumos.is_empty() {
            return Ok(Outcome::ok_with(
                format!(
                    "El cultivo '{}' no tiene aplicaciones de insumos registradas.",
                    crop.nom_cultivo
                ),
                InputApplicationList {
                    nombre_cultivo: crop.nom_cultivo,
                    aplicaciones: Vec::new(),
                    registros_omitidos: 0,
                },
            ));
        }

        let (entries, skipped) = decode_entries(&crop.aplicaciones_insumos);
        let mut aplicaciones = Vec::with_capacity(entries.len());
        for entry in entries {
            aplicaciones.push(self.input_view(entry).await);
        }

        let message = format!(
            "Se encontraron {} aplicaciones de insumo para el cultivo '{}'.{}",
            aplicaciones.len(),
            crop.nom_cultivo,
            skipped_note(skipped)
        );
        Ok(Outcome::ok_with(
            message,
            InputApplicationList {
                nombre_cultivo: crop.nom_cultivo,
                aplicaciones,
                registros_omitidos: skipped,
            },
        ))
    }

    async fn input_view(&self, entry: InputApplicationDoc) -> InputApplicationView {
        let nombre_usuario = self.resolver.user_name(entry.id_usuario).await;
        let supply = self.resolver.supply_label(entry.id_insumo).await;

        InputApplicationView {
            id: entry._id.to_hex(),
            cantidad_aplicada: entry.cantidad_aplicada,
            fecha_aplicacion: entry.fecha_aplicacion,
            metodo_aplicacion: entry.metodo_aplicacion,
            observaciones: entry.observaciones,
            id_usuario: entry.id_usuario.to_hex(),
            nombre_usuario,
            id_insumo: entry.id_insumo.to_hex(),
            nombre_insumo: supply.nombre_insumo,
            tipo_insumo: supply.tipo_insumo,
            unidad_medida: supply.unidad_medida,
        }
    }
}

/// Decode array entries, counting the ones that do not fit the schema
fn decode_entries(raw: &[Document]) -> (Vec<InputApplicationDoc>, usize) {
    let mut skipped = 0;
    let entries = raw
        .iter()
        .filter_map(|doc| match bson::from_document(doc.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed input application: {}", e);
                skipped += 1;
                None
            }
        })
        .collect();
    (entries, skipped)
}

fn crop_not_found(raw_crop: &str) -> AgroError {
    AgroError::NotFound(format!(
        "No se encontró un cultivo activo con el ID: {}.",
        raw_crop
    ))
}

fn entry_not_found(raw_crop: &str, raw_entry: &str) -> AgroError {
    AgroError::NotFound(format!(
        "No se encontró la aplicación de insumo con ID '{}' en el cultivo con ID '{}'.",
        raw_entry, raw_crop
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::db::schemas::{CROP_COLLECTION, SUPPLY_COLLECTION};
    use crate::outcome::{OutcomeKind, Status};
    use crate::resolver::UNKNOWN_SUPPLY;

    fn application(fx: &Fixture, quantity: f64) -> NewInputApplication {
        NewInputApplication {
            cantidad_aplicada: quantity,
            fecha_aplicacion: date("2024-04-10"),
            metodo_aplicacion: "Aspersión".into(),
            observaciones: None,
            id_usuario: fx.user_id.to_hex(),
            id_insumo: fx.supply_id.to_hex(),
        }
    }

    fn entry_ids(crop: &Document) -> Vec<ObjectId> {
        crop.get_array(FIELD)
            .unwrap()
            .iter()
            .map(|e| e.as_document().unwrap().get_object_id("_id").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_list_is_ok_with_message() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;

        let outcome = fx.manager.list_input_applications(&crop).await;
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.message.contains("no tiene aplicaciones"));
        let list = outcome.data.unwrap();
        assert!(list.aplicaciones.is_empty());
        assert_eq!(list.registros_omitidos, 0);
    }

    #[tokio::test]
    async fn test_add_validates_quantity_and_references() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;

        let zero = fx.manager.add_input_application(&crop, application(&fx, 0.0)).await;
        assert_eq!(zero.kind(), OutcomeKind::Validation);

        let mut unknown_supply = application(&fx, 3.0);
        unknown_supply.id_insumo = ObjectId::new().to_hex();
        let outcome = fx.manager.add_input_application(&crop, unknown_supply).await;
        assert_eq!(outcome.kind(), OutcomeKind::NotFound);

        assert!(entry_ids(&crop_doc(&fx, &crop).await).is_empty());
    }

    #[tokio::test]
    async fn test_inactive_supply_cannot_be_applied() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;
        fx.store
            .update_one(
                SUPPLY_COLLECTION,
                doc! { "_id": fx.supply_id },
                doc! { "$set": { "estatus": "Inactivo" } },
            )
            .await
            .unwrap();

        let outcome = fx.manager.add_input_application(&crop, application(&fx, 3.0)).await;
        assert!(outcome.is_error());
    }

    #[tokio::test]
    async fn test_add_get_edit_delete_cycle() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;

        assert!(fx.manager.add_input_application(&crop, application(&fx, 3.0)).await.is_ok());
        assert!(fx.manager.add_input_application(&crop, application(&fx, 4.0)).await.is_ok());
        let ids = entry_ids(&crop_doc(&fx, &crop).await);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0].to_hex(), crop);

        let view = fx
            .manager
            .get_input_application(&crop, &ids[1].to_hex())
            .await
            .data
            .unwrap();
        assert_eq!(view.cantidad_aplicada, 4.0);
        assert_eq!(view.nombre_usuario, "Ana Torres");
        assert_eq!(view.nombre_insumo, "Urea");
        assert_eq!(view.unidad_medida, "kg");

        let patch = InputApplicationPatch {
            cantidad_aplicada: Some(5.5),
            ..Default::default()
        };
        let edited = fx
            .manager
            .update_input_application(&crop, &ids[1].to_hex(), patch.clone())
            .await;
        assert_eq!(edited.status, Status::Ok);
        let repeat = fx
            .manager
            .update_input_application(&crop, &ids[1].to_hex(), patch)
            .await;
        assert_eq!(repeat.status, Status::Info);

        let first = fx
            .manager
            .get_input_application(&crop, &ids[0].to_hex())
            .await
            .data
            .unwrap();
        assert_eq!(first.cantidad_aplicada, 3.0);

        assert!(fx
            .manager
            .delete_input_application(&crop, &ids[0].to_hex())
            .await
            .is_ok());
        assert_eq!(entry_ids(&crop_doc(&fx, &crop).await), vec![ids[1]]);

        let gone = fx.manager.delete_input_application(&crop, &ids[0].to_hex()).await;
        assert_eq!(gone.kind(), OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn test_empty_patch_needs_an_existing_target() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;

        let missing_entry = fx
            .manager
            .update_input_application(
                &crop,
                &ObjectId::new().to_hex(),
                InputApplicationPatch::default(),
            )
            .await;
        assert_eq!(missing_entry.kind(), OutcomeKind::NotFound);

        let missing_crop = fx
            .manager
            .update_input_application(
                &ObjectId::new().to_hex(),
                &ObjectId::new().to_hex(),
                InputApplicationPatch::default(),
            )
            .await;
        assert_eq!(missing_crop.kind(), OutcomeKind::NotFound);

        assert!(fx.manager.add_input_application(&crop, application(&fx, 3.0)).await.is_ok());
        let id = entry_ids(&crop_doc(&fx, &crop).await)[0].to_hex();
        let outcome = fx
            .manager
            .update_input_application(&crop, &id, InputApplicationPatch::default())
            .await;
        assert_eq!(outcome.status, Status::Info);
    }

    #[tokio::test]
    async fn test_entry_ids_survive_storage() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;
        assert!(fx.manager.add_input_application(&crop, application(&fx, 3.0)).await.is_ok());
        assert!(fx.manager.add_input_application(&crop, application(&fx, 5.0)).await.is_ok());

        let ids = entry_ids(&crop_doc(&fx, &crop).await);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let read = fx.manager.get_input_application(&crop, &ids[1].to_hex()).await;
        assert_eq!(read.status, Status::Ok, "{}", read.message);
        assert_eq!(read.data.unwrap().cantidad_aplicada, 5.0);

        let patch = InputApplicationPatch {
            cantidad_aplicada: Some(7.5),
            ..Default::default()
        };
        let edited = fx
            .manager
            .update_input_application(&crop, &ids[0].to_hex(), patch)
            .await;
        assert_eq!(edited.status, Status::Ok, "{}", edited.message);

        let deleted = fx.manager.delete_input_application(&crop, &ids[1].to_hex()).await;
        assert_eq!(deleted.status, Status::Ok, "{}", deleted.message);
        assert_eq!(entry_ids(&crop_doc(&fx, &crop).await), vec![ids[0]]);
    }

    #[tokio::test]
    async fn test_list_counts_malformed_entries_and_uses_sentinels() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 2.0).await;
        fx.manager.add_input_application(&crop, application(&fx, 3.0)).await;

        let crop_id = ObjectId::parse_str(&crop).unwrap();
        fx.store
            .update_one(
                CROP_COLLECTION,
                doc! { "_id": crop_id },
                doc! { "$push": { FIELD: { "_id": ObjectId::new(), "cantidadAplicada": "mucho" } } },
            )
            .await
            .unwrap();
        fx.store
            .delete_one(SUPPLY_COLLECTION, doc! { "_id": fx.supply_id })
            .await
            .unwrap();

        let outcome = fx.manager.list_input_applications(&crop).await;
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.message.contains("omitidos"));
        let list = outcome.data.unwrap();
        assert_eq!(list.aplicaciones.len(), 1);
        assert_eq!(list.registros_omitidos, 1);
        assert_eq!(list.aplicaciones[0].nombre_insumo, UNKNOWN_SUPPLY);
    }
}
