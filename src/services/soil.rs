//! Soil history: pH and nutrient measurements taken on a crop

use bson::doc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{Nutrient, SoilRecordDoc, SOIL_COLLECTION, USER_COLLECTION};
use crate::db::{nothing_to_update, settle_update, Collection, DocumentStore, SetBuilder};
use crate::outcome::Outcome;
use crate::resolver::{ReferenceResolver, UNKNOWN};
use crate::types::{AgroError, Result};
use crate::validation::{check_ph, parse_object_id, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSoilRecord {
    pub fecha_medicion: NaiveDate,
    #[serde(rename = "pH")]
    pub ph: f64,
    #[serde(default)]
    pub nutrientes: Vec<Nutrient>,
    #[serde(default)]
    pub observaciones: Vec<String>,
    pub id_cultivo: String,
    pub id_usuario: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilRecordPatch {
    pub fecha_medicion: Option<NaiveDate>,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub nutrientes: Option<Vec<Nutrient>>,
    pub observaciones: Option<Vec<String>>,
    pub id_cultivo: Option<String>,
    pub id_usuario: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilRecordView {
    #[serde(rename = "_id")]
    pub id: String,
    pub fecha_medicion: NaiveDate,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub nutrientes: Vec<Nutrient>,
    pub observaciones: Vec<String>,
    pub id_cultivo: String,
    pub nombre_cultivo: String,
    pub id_usuario: String,
    pub nombre_usuario: String,
}

#[derive(Clone)]
pub struct SoilHistoryService {
    records: Collection<SoilRecordDoc>,
    resolver: ReferenceResolver,
}

impl SoilHistoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            records: Collection::new(Arc::clone(&store), SOIL_COLLECTION),
            resolver: ReferenceResolver::new(store),
        }
    }

    pub async fn create(&self, input: NewSoilRecord) -> Outcome<()> {
        Outcome::settle(self.try_create(input).await)
    }

    pub async fn update(&self, raw_id: &str, patch: SoilRecordPatch) -> Outcome<()> {
        Outcome::settle(self.try_update(raw_id, patch).await)
    }

    pub async fn delete(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete(raw_id).await)
    }

    pub async fn get(&self, raw_id: &str) -> Outcome<SoilRecordView> {
        Outcome::settle(self.try_get(raw_id).await)
    }

    pub async fn list(&self) -> Outcome<Vec<SoilRecordView>> {
        Outcome::settle(self.try_list().await)
    }

    async fn try_create(&self, input: NewSoilRecord) -> Result<Outcome<()>> {
        check_ph(input.ph)?;
        check_nutrients(&input.nutrientes)?;
        let crop_id = parse_object_id(&input.id_cultivo, "del cultivo")?;
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;

        self.resolver.require_crop(crop_id, &input.id_cultivo).await?;
        self.resolver.require_user(user_id).await?;

        let record = SoilRecordDoc {
            _id: None,
            fecha_medicion: input.fecha_medicion,
            ph: input.ph,
            nutrientes: input.nutrientes,
            observaciones: input.observaciones,
            id_cultivo: crop_id,
            id_usuario: user_id,
            eliminado: false,
        };
        let id = self.records.insert_one(&record).await?;
        debug!("Soil record {} stored for crop {}", id, crop_id);

        Ok(Outcome::created(format!(
            "Historial de suelo registrado exitosamente con id: {}",
            id
        )))
    }

    async fn try_update(&self, raw_id: &str, patch: SoilRecordPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del historial")?;
        if !self.records.exists(doc! { "_id": id, "eliminado": false }).await? {
            return Err(not_found(raw_id));
        }

        let mut set = SetBuilder::new("");
        if let Some(date) = patch.fecha_medicion {
            set.set_serialized("fechaMedicion", &date)?;
        }
        if let Some(ph) = patch.ph {
            check_ph(ph)?;
            set.set("pH", ph);
        }
        if let Some(nutrients) = &patch.nutrientes {
            check_nutrients(nutrients)?;
            set.set_serialized("nutrientes", nutrients)?;
        }
        if let Some(notes) = &patch.observaciones {
            set.set_serialized("observaciones", notes)?;
        }
        if let Some(raw_crop) = &patch.id_cultivo {
            let crop_id = parse_object_id(raw_crop, "del cultivo")?;
            self.resolver.require_crop(crop_id, raw_crop).await?;
            set.set("idCultivo", crop_id);
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
            .records
            .update_one(doc! { "_id": id, "eliminado": false }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;

        Ok(Outcome::ok("Historial de suelo actualizado correctamente."))
    }

    async fn try_delete(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del historial")?;
        let counts = self
            .records
            .update_one(
                doc! { "_id": id, "eliminado": false },
                doc! { "$set": { "eliminado": true } },
            )
            .await?;
        if counts.matched == 0 {
            return Err(not_found(raw_id));
        }
        debug!("Soil record {} marked as deleted", id);

        Ok(Outcome::ok("Historial eliminado lógicamente."))
    }

    async fn try_get(&self, raw_id: &str) -> Result<Outcome<SoilRecordView>> {
        let id = parse_object_id(raw_id, "del historial")?;
        let record = self
            .records
            .find_one(doc! { "_id": id, "eliminado": false })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        let view = self.view(record).await?;
        Ok(Outcome::ok_with("Historial encontrado.", view))
    }

    async fn try_list(&self) -> Result<Outcome<Vec<SoilRecordView>>> {
        let records = self.records.find_many(doc! { "eliminado": false }).await?;
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.view(record).await?);
        }

        Ok(Outcome::ok_with("Listado de historiales de suelo", views))
    }

    async fn view(&self, record: SoilRecordDoc) -> Result<SoilRecordView> {
        let id = record
            ._id
            .ok_or_else(|| AgroError::Internal("Soil record without _id".into()))?;
        Ok(SoilRecordView {
            id: id.to_hex(),
            fecha_medicion: record.fecha_medicion,
            ph: record.ph,
            nutrientes: record.nutrientes,
            observaciones: record.observaciones,
            id_cultivo: record.id_cultivo.to_hex(),
            nombre_cultivo: self.resolver.crop_name(record.id_cultivo, UNKNOWN).await,
            id_usuario: record.id_usuario.to_hex(),
            nombre_usuario: self
                .resolver
                .display_field(USER_COLLECTION, record.id_usuario, "nombre", UNKNOWN)
                .await,
        })
    }
}

fn check_nutrients(nutrients: &[Nutrient]) -> Result<()> {
    for nutrient in nutrients {
        require_text(&nutrient.nombre, "nutrientes.nombre")?;
        if !nutrient.valor.is_finite() || nutrient.valor < 0.0 {
            return Err(AgroError::Validation(format!(
                "El valor del nutriente '{}' debe ser mayor o igual a cero.",
                nutrient.nombre
            )));
        }
    }
    Ok(())
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("Historial no encontrado: {}", raw_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::test_support::insert_crop;
    use crate::db::MemoryStore;
    use crate::outcome::OutcomeKind;
    use bson::oid::ObjectId;

    struct Env {
        store: Arc<dyn DocumentStore>,
        soil: SoilHistoryService,
        crop: ObjectId,
        user: ObjectId,
    }

    async fn env() -> Env {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let user = store
            .insert_one(USER_COLLECTION, doc! { "nombre": "Luis Pérez" })
            .await
            .unwrap();
        let crop = insert_crop(&store, "Frijol", user).await;
        Env {
            soil: SoilHistoryService::new(Arc::clone(&store)),
            store,
            crop,
            user,
        }
    }

    fn sample(env: &Env, ph: f64) -> NewSoilRecord {
        NewSoilRecord {
            fecha_medicion: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ph,
            nutrientes: vec![Nutrient {
                nombre: "Nitrógeno".into(),
                valor: 12.5,
                unidad: "ppm".into(),
            }],
            observaciones: vec![],
            id_cultivo: env.crop.to_hex(),
            id_usuario: env.user.to_hex(),
        }
    }

    #[tokio::test]
    async fn test_ph_must_be_in_range() {
        let env = env().await;
        assert_eq!(env.soil.create(sample(&env, 14.5)).await.kind(), OutcomeKind::Validation);
        assert_eq!(env.soil.create(sample(&env, -0.1)).await.kind(), OutcomeKind::Validation);
        assert!(env.soil.create(sample(&env, 0.0)).await.is_ok());
        assert!(env.soil.create(sample(&env, 14.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_crop_is_rejected() {
        let env = env().await;
        let mut record = sample(&env, 6.5);
        record.id_cultivo = ObjectId::new().to_hex();
        assert_eq!(env.soil.create(record).await.kind(), OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn test_views_resolve_names_with_sentinel() {
        let env = env().await;
        env.soil.create(sample(&env, 6.5)).await;

        let listed = env.soil.list().await.data.unwrap();
        assert_eq!(listed[0].nombre_cultivo, "Frijol");
        assert_eq!(listed[0].nombre_usuario, "Luis Pérez");

        env.store
            .delete_one(USER_COLLECTION, doc! { "_id": env.user })
            .await
            .unwrap();
        let view = env.soil.get(&listed[0].id).await.data.unwrap();
        assert_eq!(view.nombre_usuario, UNKNOWN);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_record() {
        let env = env().await;
        env.soil.create(sample(&env, 6.5)).await;
        let id = env.soil.list().await.data.unwrap()[0].id.clone();

        let patch = SoilRecordPatch {
            ph: Some(7.1),
            ..Default::default()
        };
        assert!(env.soil.update(&id, patch).await.is_ok());
        assert_eq!(env.soil.get(&id).await.data.unwrap().ph, 7.1);

        assert!(env.soil.delete(&id).await.is_ok());
        assert_eq!(
            env.soil.update(&id, SoilRecordPatch::default()).await.kind(),
            OutcomeKind::NotFound
        );
        assert!(env.soil.get(&id).await.is_error());
        assert!(env.soil.list().await.data.unwrap().is_empty());
        assert!(env.soil.delete(&id).await.is_error());

        let stored = env.store.find_many(SOIL_COLLECTION, doc! {}).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].get_bool("eliminado").unwrap());
    }
}
