//! Irrigation log (`riegos`)

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{find_entry, CropManager};
use crate::db::{nothing_to_update, settle_update, SetBuilder};
use crate::db::schemas::{IrrigationDoc, IrrigationStatus};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{check_not_before, parse_label, parse_object_id, require_positive, require_text};

const FIELD: &str = "riegos";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIrrigation {
    pub fecha_esperada: NaiveDate,
    #[serde(default)]
    pub fecha_aplicada: Option<NaiveDate>,
    pub cant_agua: f64,
    pub metodo_riego: String,
    pub duracion_riego: f64,
    pub id_usuario: String,
    /// Defaults to `Pendiente`
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationPatch {
    pub fecha_esperada: Option<NaiveDate>,
    pub fecha_aplicada: Option<NaiveDate>,
    pub cant_agua: Option<f64>,
    pub metodo_riego: Option<String>,
    pub duracion_riego: Option<f64>,
    pub id_usuario: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationView {
    #[serde(rename = "_id")]
    pub id: String,
    pub fecha_esperada: NaiveDate,
    pub fecha_aplicada: Option<NaiveDate>,
    pub cant_agua: f64,
    pub metodo_riego: String,
    pub duracion_riego: f64,
    pub status: IrrigationStatus,
    pub id_usuario: String,
    pub nombre_usuario: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationList {
    pub nombre_cultivo: String,
    pub riegos: Vec<IrrigationView>,
}

impl CropManager {
    pub async fn add_irrigation(&self, raw_crop: &str, input: NewIrrigation) -> Outcome<()> {
        Outcome::settle(self.try_add_irrigation(raw_crop, input).await)
    }

    pub async fn update_irrigation(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: IrrigationPatch,
    ) -> Outcome<()> {
        Outcome::settle(self.try_update_irrigation(raw_crop, raw_entry, patch).await)
    }

    pub async fn delete_irrigation(&self, raw_crop: &str, raw_entry: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete_irrigation(raw_crop, raw_entry).await)
    }

    pub async fn get_irrigation(&self, raw_crop: &str, raw_entry: &str) -> Outcome<IrrigationView> {
        Outcome::settle(self.try_get_irrigation(raw_crop, raw_entry).await)
    }

    pub async fn list_irrigations(&self, raw_crop: &str) -> Outcome<IrrigationList> {
        Outcome::settle(self.try_list_irrigations(raw_crop).await)
    }

    async fn try_add_irrigation(&self, raw_crop: &str, input: NewIrrigation) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        require_positive(input.cant_agua, "cantAgua")?;
        require_positive(input.duracion_riego, "duracionRiego")?;
        let method = require_text(&input.metodo_riego, "metodoRiego")?;
        if let Some(applied) = input.fecha_aplicada {
            check_not_before(applied, input.fecha_esperada, "fechaAplicada", "fechaEsperada")?;
        }
        let status = match &input.status {
            Some(raw) => parse_label::<IrrigationStatus>(raw, "status")?,
            None => IrrigationStatus::default(),
        };
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;

        self.resolver.require_active_crop(crop_id, raw_crop).await?;
        self.resolver.require_user(user_id).await?;

        let entry = IrrigationDoc {
            _id: ObjectId::new(),
            fecha_esperada: input.fecha_esperada,
            fecha_aplicada: input.fecha_aplicada,
            cant_agua: input.cant_agua,
            metodo_riego: method,
            duracion_riego: input.duracion_riego,
            id_usuario: user_id,
            status,
        };

        let counts = self
            .crops
            .update_one(
                doc! { "_id": crop_id, "registroActivo": true },
                doc! { "$push": { FIELD: bson::to_bson(&entry)? } },
            )
            .await?;
        if counts.matched == 0 {
            return Err(AgroError::NotFound(format!(
                "No se encontró un cultivo activo con el ID: {}.",
                raw_crop
            )));
        }
        debug!("Irrigation {} scheduled on crop {}", entry._id, crop_id);

        Ok(Outcome::created(format!(
            "Riego registrado con éxito con id: {}",
            entry._id
        )))
    }

    async fn try_update_irrigation(
        &self,
        raw_crop: &str,
        raw_entry: &str,
        patch: IrrigationPatch,
    ) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del riego")?;
        let current = self.load_irrigation(crop_id, raw_crop, entry_id, raw_entry).await?;

        let mut set = SetBuilder::new("riegos.$.");
        if let Some(water) = patch.cant_agua {
            require_positive(water, "cantAgua")?;
            set.set("cantAgua", water);
        }
        if let Some(duration) = patch.duracion_riego {
            require_positive(duration, "duracionRiego")?;
            set.set("duracionRiego", duration);
        }
        if let Some(method) = &patch.metodo_riego {
            set.set("metodoRiego", require_text(method, "metodoRiego")?);
        }
        if let Some(raw) = &patch.status {
            let status = parse_label::<IrrigationStatus>(raw, "status")?;
            set.set_serialized("status", &status)?;
        }
        if patch.fecha_esperada.is_some() || patch.fecha_aplicada.is_some() {
            // The ordering rule spans both dates, so compare against the stored entry
            let expected = patch.fecha_esperada.unwrap_or(current.fecha_esperada);
            if let Some(applied) = patch.fecha_aplicada.or(current.fecha_aplicada) {
                check_not_before(applied, expected, "fechaAplicada", "fechaEsperada")?;
            }
            if let Some(date) = patch.fecha_esperada {
                set.set_serialized("fechaEsperada", &date)?;
            }
            if let Some(date) = patch.fecha_aplicada {
                set.set_serialized("fechaAplicada", &date)?;
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
            .update_one(
                doc! {
                    "_id": crop_id,
                    "registroActivo": true,
                    "riegos._id": entry_id,
                },
                set.into_update(),
            )
            .await?;
        settle_update(counts, || entry_not_found(raw_crop, raw_entry))?;

        Ok(Outcome::ok("Riego actualizado con éxito."))
    }

    async fn try_delete_irrigation(&self, raw_crop: &str, raw_entry: &str) -> Result<Outcome<()>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del riego")?;

        let counts = self
            .crops
            .update_one(
                doc! {
                    "_id": crop_id,
                    "registroActivo": true,
                    "riegos._id": entry_id,
                },
                doc! { "$pull": { FIELD: { "_id": entry_id } } },
            )
            .await?;
        if counts.matched == 0 {
            self.resolver.require_active_crop(crop_id, raw_crop).await?;
            return Err(entry_not_found(raw_crop, raw_entry));
        }
        debug!("Irrigation {} removed from crop {}", entry_id, crop_id);

        Ok(Outcome::ok("Riego eliminado con éxito."))
    }

    async fn try_get_irrigation(&self, raw_crop: &str, raw_entry: &str) -> Result<Outcome<IrrigationView>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let entry_id = parse_object_id(raw_entry, "del riego")?;

        let entry = self.load_irrigation(crop_id, raw_crop, entry_id, raw_entry).await?;
        let view = self.irrigation_view(entry).await;
        Ok(Outcome::ok_with("Riego encontrado.", view))
    }

    async fn try_list_irrigations(&self, raw_crop: &str) -> Result<Outcome<IrrigationList>> {
        let crop_id = parse_object_id(raw_crop, "del cultivo")?;
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;

        let mut riegos = Vec::with_capacity(crop.riegos.len());
        for raw in &crop.riegos {
            match bson::from_document::<IrrigationDoc>(raw.clone()) {
                Ok(entry) => riegos.push(self.irrigation_view(entry).await),
                Err(e) => warn!("Skipping malformed irrigation on crop {}: {}", crop_id, e),
            }
        }

        let message = if riegos.is_empty() {
            format!("El cultivo '{}' no tiene riegos registrados.", crop.nom_cultivo)
        } else {
            format!(
                "Se encontraron {} riegos para el cultivo '{}'.",
                riegos.len(),
                crop.nom_cultivo
            )
        };
        Ok(Outcome::ok_with(
            message,
            IrrigationList {
                nombre_cultivo: crop.nom_cultivo,
                riegos,
            },
        ))
    }

    async fn load_irrigation(
        &self,
        crop_id: ObjectId,
        raw_crop: &str,
        entry_id: ObjectId,
        raw_entry: &str,
    ) -> Result<IrrigationDoc> {
        let crop = self.resolver.require_active_crop(crop_id, raw_crop).await?;
        let raw: &Document = find_entry(&crop.riegos, entry_id)
            .ok_or_else(|| entry_not_found(raw_crop, raw_entry))?;
        bson::from_document(raw.clone())
            .map_err(|e| AgroError::Internal(format!("Malformed irrigation {}: {}", entry_id, e)))
    }

    async fn irrigation_view(&self, entry: IrrigationDoc) -> IrrigationView {
        IrrigationView {
            id: entry._id.to_hex(),
            fecha_esperada: entry.fecha_esperada,
            fecha_aplicada: entry.fecha_aplicada,
            cant_agua: entry.cant_agua,
            metodo_riego: entry.metodo_riego,
            duracion_riego: entry.duracion_riego,
            status: entry.status,
            id_usuario: entry.id_usuario.to_hex(),
            nombre_usuario: self.resolver.user_name(entry.id_usuario).await,
        }
    }
}

fn entry_not_found(raw_crop: &str, raw_entry: &str) -> AgroError {
    AgroError::NotFound(format!(
        "No se encontró el riego con ID '{}' en el cultivo con ID '{}'.",
        raw_entry, raw_crop
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::db::schemas::USER_COLLECTION;
    use crate::outcome::{OutcomeKind, Status};
    use crate::resolver::UNKNOWN_USER;

    fn irrigation(fx: &Fixture, litres: f64) -> NewIrrigation {
        NewIrrigation {
            fecha_esperada: date("2024-04-01"),
            fecha_aplicada: None,
            cant_agua: litres,
            metodo_riego: "Goteo".into(),
            duracion_riego: 45.0,
            id_usuario: fx.user_id.to_hex(),
            status: None,
        }
    }

    fn stored(crop: &Document) -> Vec<Document> {
        crop.get_array(FIELD)
            .unwrap()
            .iter()
            .map(|e| e.as_document().unwrap().clone())
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_user_leaves_array_untouched() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;

        let mut input = irrigation(&fx, 120.0);
        input.id_usuario = ObjectId::new().to_hex();
        let outcome = fx.manager.add_irrigation(&crop, input).await;

        assert!(outcome.is_error());
        assert!(stored(&crop_doc(&fx, &crop).await).is_empty());
    }

    #[tokio::test]
    async fn test_add_defaults_to_pending() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;
        let outcome = fx.manager.add_irrigation(&crop, irrigation(&fx, 120.0)).await;
        assert_eq!(outcome.kind(), OutcomeKind::Created);

        let entries = stored(&crop_doc(&fx, &crop).await);
        assert_eq!(entries[0].get_str("status").unwrap(), "Pendiente");
        assert!(entries[0].get_object_id("_id").is_ok());
    }

    #[tokio::test]
    async fn test_rejects_invalid_values() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;

        let mut early = irrigation(&fx, 120.0);
        early.fecha_aplicada = Some(date("2024-03-20"));
        assert_eq!(
            fx.manager.add_irrigation(&crop, early).await.kind(),
            OutcomeKind::Validation
        );

        let mut bad_status = irrigation(&fx, 120.0);
        bad_status.status = Some("Terminado".into());
        assert_eq!(
            fx.manager.add_irrigation(&crop, bad_status).await.kind(),
            OutcomeKind::Validation
        );

        let dry = irrigation(&fx, 0.0);
        assert!(fx.manager.add_irrigation(&crop, dry).await.is_error());
    }

    #[tokio::test]
    async fn test_delete_middle_entry_keeps_siblings() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;
        for litres in [100.0, 200.0, 300.0] {
            assert!(fx.manager.add_irrigation(&crop, irrigation(&fx, litres)).await.is_ok());
        }
        let before = stored(&crop_doc(&fx, &crop).await);
        let middle = before[1].get_object_id("_id").unwrap();

        let outcome = fx.manager.delete_irrigation(&crop, &middle.to_hex()).await;
        assert_eq!(outcome.status, Status::Ok);

        let after = stored(&crop_doc(&fx, &crop).await);
        assert_eq!(after, vec![before[0].clone(), before[2].clone()]);
    }

    #[tokio::test]
    async fn test_edit_checks_merged_dates() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;
        fx.manager.add_irrigation(&crop, irrigation(&fx, 100.0)).await;
        let id = stored(&crop_doc(&fx, &crop).await)[0]
            .get_object_id("_id")
            .unwrap()
            .to_hex();

        let early = IrrigationPatch {
            fecha_aplicada: Some(date("2024-03-15")),
            ..Default::default()
        };
        assert_eq!(
            fx.manager.update_irrigation(&crop, &id, early).await.kind(),
            OutcomeKind::Validation
        );

        let applied = IrrigationPatch {
            fecha_aplicada: Some(date("2024-04-02")),
            status: Some("Aplicado".into()),
            ..Default::default()
        };
        assert!(fx.manager.update_irrigation(&crop, &id, applied).await.is_ok());

        let view = fx.manager.get_irrigation(&crop, &id).await.data.unwrap();
        assert_eq!(view.status, IrrigationStatus::Applied);
        assert_eq!(view.fecha_aplicada, Some(date("2024-04-02")));
        assert_eq!(view.cant_agua, 100.0);
    }

    #[tokio::test]
    async fn test_empty_patch_needs_an_existing_target() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;

        let missing = fx
            .manager
            .update_irrigation(&crop, &ObjectId::new().to_hex(), IrrigationPatch::default())
            .await;
        assert_eq!(missing.kind(), OutcomeKind::NotFound);

        fx.manager.add_irrigation(&crop, irrigation(&fx, 100.0)).await;
        let id = stored(&crop_doc(&fx, &crop).await)[0]
            .get_object_id("_id")
            .unwrap()
            .to_hex();
        let outcome = fx
            .manager
            .update_irrigation(&crop, &id, IrrigationPatch::default())
            .await;
        assert_eq!(outcome.status, Status::Info);
    }

    #[tokio::test]
    async fn test_get_missing_entry_is_error() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;
        let outcome = fx.manager.get_irrigation(&crop, &ObjectId::new().to_hex()).await;
        assert_eq!(outcome.kind(), OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_never_fails_on_entries() {
        let fx = fixture().await;
        let crop = seeded_crop(&fx, 3.0).await;

        let empty = fx.manager.list_irrigations(&crop).await;
        assert_eq!(empty.status, Status::Ok);
        assert!(empty.data.unwrap().riegos.is_empty());

        fx.manager.add_irrigation(&crop, irrigation(&fx, 100.0)).await;
        fx.store
            .delete_one(USER_COLLECTION, doc! { "_id": fx.user_id })
            .await
            .unwrap();

        let list = fx.manager.list_irrigations(&crop).await.data.unwrap();
        assert_eq!(list.nombre_cultivo, "Maíz criollo");
        assert_eq!(list.riegos.len(), 1);
        assert_eq!(list.riegos[0].nombre_usuario, UNKNOWN_USER);
    }
}
