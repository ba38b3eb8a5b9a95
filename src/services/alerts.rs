//! Alerts: a standalone collection with plain CRUD and hard delete

use bson::doc;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{AlertDoc, ALERT_COLLECTION};
use crate::db::{nothing_to_update, settle_update, Collection, DocumentStore, SetBuilder};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{parse_object_id, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    pub tipo_alerta: String,
    pub descripcion: String,
    pub fecha_generada: NaiveDate,
    pub estado_alerta: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPatch {
    pub tipo_alerta: Option<String>,
    pub descripcion: Option<String>,
    pub fecha_generada: Option<NaiveDate>,
    pub estado_alerta: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    #[serde(rename = "_id")]
    pub id: String,
    pub tipo_alerta: String,
    pub descripcion: String,
    pub fecha_generada: NaiveDate,
    pub estado_alerta: String,
}

impl TryFrom<AlertDoc> for AlertView {
    type Error = AgroError;

    fn try_from(doc: AlertDoc) -> Result<Self> {
        let id = doc
            ._id
            .ok_or_else(|| AgroError::Internal("Alert without _id".into()))?;
        Ok(Self {
            id: id.to_hex(),
            tipo_alerta: doc.tipo_alerta,
            descripcion: doc.descripcion,
            fecha_generada: doc.fecha_generada,
            estado_alerta: doc.estado_alerta,
        })
    }
}

#[derive(Clone)]
pub struct AlertService {
    alerts: Collection<AlertDoc>,
}

impl AlertService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            alerts: Collection::new(store, ALERT_COLLECTION),
        }
    }

    pub async fn create(&self, input: NewAlert) -> Outcome<()> {
        Outcome::settle(self.try_create(input).await)
    }

    pub async fn update(&self, raw_id: &str, patch: AlertPatch) -> Outcome<()> {
        Outcome::settle(self.try_update(raw_id, patch).await)
    }

    pub async fn delete(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_delete(raw_id).await)
    }

    pub async fn get(&self, raw_id: &str) -> Outcome<AlertView> {
        Outcome::settle(self.try_get(raw_id).await)
    }

    pub async fn list(&self) -> Outcome<Vec<AlertView>> {
        Outcome::settle(self.try_list().await)
    }

    async fn try_create(&self, input: NewAlert) -> Result<Outcome<()>> {
        let alert = AlertDoc {
            _id: None,
            tipo_alerta: require_text(&input.tipo_alerta, "tipoAlerta")?,
            descripcion: require_text(&input.descripcion, "descripcion")?,
            fecha_generada: input.fecha_generada,
            estado_alerta: require_text(&input.estado_alerta, "estadoAlerta")?,
        };
        let id = self.alerts.insert_one(&alert).await?;
        debug!("Alert {} raised", id);

        Ok(Outcome::created(format!(
            "Alerta registrada correctamente con id: {}",
            id
        )))
    }

    async fn try_update(&self, raw_id: &str, patch: AlertPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "de la alerta")?;
        if !self.alerts.exists(doc! { "_id": id }).await? {
            return Err(not_found(raw_id));
        }

        let mut set = SetBuilder::new("");
        if let Some(kind) = &patch.tipo_alerta {
            set.set("tipoAlerta", require_text(kind, "tipoAlerta")?);
        }
        if let Some(text) = &patch.descripcion {
            set.set("descripcion", require_text(text, "descripcion")?);
        }
        if let Some(date) = patch.fecha_generada {
            set.set_serialized("fechaGenerada", &date)?;
        }
        if let Some(state) = &patch.estado_alerta {
            set.set("estadoAlerta", require_text(state, "estadoAlerta")?);
        }
        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self
            .alerts
            .update_one(doc! { "_id": id }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;

        Ok(Outcome::ok("Alerta actualizada."))
    }

    async fn try_delete(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "de la alerta")?;
        if self.alerts.delete_one(doc! { "_id": id }).await? == 0 {
            return Err(not_found(raw_id));
        }
        debug!("Alert {} deleted", id);

        Ok(Outcome::ok("Alerta eliminada correctamente."))
    }

    async fn try_get(&self, raw_id: &str) -> Result<Outcome<AlertView>> {
        let id = parse_object_id(raw_id, "de la alerta")?;
        let alert = self
            .alerts
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        Ok(Outcome::ok_with("Alerta encontrada.", AlertView::try_from(alert)?))
    }

    async fn try_list(&self) -> Result<Outcome<Vec<AlertView>>> {
        let alerts = self
            .alerts
            .find_many(doc! {})
            .await?
            .into_iter()
            .map(AlertView::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Outcome::ok_with("Listado de alertas", alerts))
    }
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("No se encontró la alerta con ID: {}", raw_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::outcome::{OutcomeKind, Status};

    fn frost_alert() -> NewAlert {
        NewAlert {
            tipo_alerta: "Helada".into(),
            descripcion: "Temperatura bajo cero prevista".into(),
            fecha_generada: NaiveDate::from_ymd_opt(2024, 12, 3).unwrap(),
            estado_alerta: "Pendiente".into(),
        }
    }

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let alerts = AlertService::new(Arc::new(MemoryStore::new()));
        assert_eq!(alerts.create(frost_alert()).await.kind(), OutcomeKind::Created);

        let listed = alerts.list().await.data.unwrap();
        assert_eq!(listed.len(), 1);
        let id = listed[0].id.clone();

        let patch = AlertPatch {
            estado_alerta: Some("Atendida".into()),
            ..Default::default()
        };
        assert!(alerts.update(&id, patch).await.is_ok());
        let view = alerts.get(&id).await.data.unwrap();
        assert_eq!(view.estado_alerta, "Atendida");
        assert_eq!(view.tipo_alerta, "Helada");

        assert_eq!(alerts.update(&id, AlertPatch::default()).await.status, Status::Info);

        assert!(alerts.delete(&id).await.is_ok());
        assert_eq!(alerts.delete(&id).await.kind(), OutcomeKind::NotFound);
        assert_eq!(
            alerts.update(&id, AlertPatch::default()).await.kind(),
            OutcomeKind::NotFound
        );
        assert_eq!(alerts.get(&id).await.kind(), OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_blank_fields_and_bad_ids() {
        let alerts = AlertService::new(Arc::new(MemoryStore::new()));
        let mut blank = frost_alert();
        blank.descripcion = "   ".into();
        assert_eq!(alerts.create(blank).await.kind(), OutcomeKind::Validation);
        assert_eq!(alerts.get("no-es-un-id").await.kind(), OutcomeKind::Validation);
        assert!(alerts.update("no-es-un-id", AlertPatch::default()).await.is_error());
    }
}
