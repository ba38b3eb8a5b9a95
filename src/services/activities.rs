//! User activities: tasks assigned to a user on a crop

use bson::doc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{ActivityDoc, ActivityStatus, ACTIVITY_COLLECTION};
use crate::db::{nothing_to_update, settle_update, Collection, DocumentStore, SetBuilder};
use crate::outcome::Outcome;
use crate::resolver::{ReferenceResolver, UNKNOWN};
use crate::types::{AgroError, Result};
use crate::validation::{parse_label, parse_object_id, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub actividad: String,
    pub fecha_actividad: NaiveDate,
    /// Defaults to `Pendiente`
    #[serde(default)]
    pub estatus: Option<String>,
    pub id_cultivo: String,
    pub id_usuario: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    pub actividad: Option<String>,
    pub fecha_actividad: Option<NaiveDate>,
    pub estatus: Option<String>,
    pub id_cultivo: Option<String>,
    pub id_usuario: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(rename = "_id")]
    pub id: String,
    pub actividad: String,
    pub fecha_actividad: NaiveDate,
    pub estatus: ActivityStatus,
    pub id_cultivo: String,
    pub nombre_cultivo: String,
    pub id_usuario: String,
    pub nombre_usuario: String,
}

#[derive(Clone)]
pub struct ActivityService {
    activities: Collection<ActivityDoc>,
    resolver: ReferenceResolver,
}

impl ActivityService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            activities: Collection::new(Arc::clone(&store), ACTIVITY_COLLECTION),
            resolver: ReferenceResolver::new(store),
        }
    }

    pub async fn create(&self, input: NewActivity) -> Outcome<()> {
        Outcome::settle(self.try_create(input).await)
    }

    pub async fn update(&self, raw_id: &str, patch: ActivityPatch) -> Outcome<()> {
        Outcome::settle(self.try_update(raw_id, patch).await)
    }

    /// Activities are never removed, only marked `Cancelada`
    pub async fn cancel(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_cancel(raw_id).await)
    }

    pub async fn get(&self, raw_id: &str) -> Outcome<ActivityView> {
        Outcome::settle(self.try_get(raw_id).await)
    }

    pub async fn list(&self) -> Outcome<Vec<ActivityView>> {
        Outcome::settle(self.try_list().await)
    }

    async fn try_create(&self, input: NewActivity) -> Result<Outcome<()>> {
        let actividad = require_text(&input.actividad, "actividad")?;
        let estatus = match &input.estatus {
            Some(raw) => parse_label::<ActivityStatus>(raw.trim(), "estatus")?,
            None => ActivityStatus::default(),
        };
        let crop_id = parse_object_id(&input.id_cultivo, "del cultivo")?;
        let user_id = parse_object_id(&input.id_usuario, "del usuario")?;

        self.resolver.require_crop(crop_id, &input.id_cultivo).await?;
        self.resolver.require_user(user_id).await?;

        let activity = ActivityDoc {
            _id: None,
            actividad,
            fecha_actividad: input.fecha_actividad,
            estatus,
            id_cultivo: crop_id,
            id_usuario: user_id,
        };
        let id = self.activities.insert_one(&activity).await?;
        debug!("Activity {} assigned to user {}", id, user_id);

        Ok(Outcome::created(format!(
            "Actividad de usuario registrada con éxito con id: {}",
            id
        )))
    }

    async fn try_update(&self, raw_id: &str, patch: ActivityPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "de la actividad")?;
        if !self.activities.exists(doc! { "_id": id }).await? {
            return Err(not_found(raw_id));
        }

        let mut set = SetBuilder::new("");
        if let Some(text) = &patch.actividad {
            set.set("actividad", require_text(text, "actividad")?);
        }
        if let Some(date) = patch.fecha_actividad {
            set.set_serialized("fechaActividad", &date)?;
        }
        if let Some(raw) = &patch.estatus {
            let status = parse_label::<ActivityStatus>(raw.trim(), "estatus")?;
            set.set_serialized("estatus", &status)?;
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
            .activities
            .update_one(doc! { "_id": id }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;

        Ok(Outcome::ok(format!("Actividad {} actualizada con éxito.", raw_id)))
    }

    async fn try_cancel(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "de la actividad")?;
        let counts = self
            .activities
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "estatus": ActivityStatus::Cancelled.to_string() } },
            )
            .await?;
        if counts.matched == 0 {
            return Err(not_found(raw_id));
        }
        if counts.modified == 0 {
            return Ok(Outcome::info(format!(
                "La actividad {} ya estaba cancelada.",
                raw_id
            )));
        }
        debug!("Activity {} cancelled", id);

        Ok(Outcome::ok(format!("Actividad {} cancelada con éxito.", raw_id)))
    }

    async fn try_get(&self, raw_id: &str) -> Result<Outcome<ActivityView>> {
        let id = parse_object_id(raw_id, "de la actividad")?;
        let activity = self
            .activities
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        let view = self.view(activity).await?;
        Ok(Outcome::ok_with(format!("Actividad {} encontrada.", raw_id), view))
    }

    async fn try_list(&self) -> Result<Outcome<Vec<ActivityView>>> {
        let activities = self.activities.find_many(doc! {}).await?;
        let mut views = Vec::with_capacity(activities.len());
        for activity in activities {
            views.push(self.view(activity).await?);
        }

        Ok(Outcome::ok_with("Listado de actividades de usuarios", views))
    }

    async fn view(&self, activity: ActivityDoc) -> Result<ActivityView> {
        let id = activity
            ._id
            .ok_or_else(|| AgroError::Internal("Activity without _id".into()))?;
        let nombre_cultivo = self.resolver.crop_name(activity.id_cultivo, UNKNOWN).await;
        let nombre_usuario = self.resolver.user_name(activity.id_usuario).await;

        Ok(ActivityView {
            id: id.to_hex(),
            actividad: activity.actividad,
            fecha_actividad: activity.fecha_actividad,
            estatus: activity.estatus,
            id_cultivo: activity.id_cultivo.to_hex(),
            nombre_cultivo,
            id_usuario: activity.id_usuario.to_hex(),
            nombre_usuario,
        })
    }
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("No se encontró una actividad con id: {}", raw_id))
}
