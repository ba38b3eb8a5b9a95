//! Crop aggregate
//!
//! A crop document owns three embedded sub-resources (the location, the
//! applied-input log and the irrigation log) and is referenced by tracking
//! documents kept in their own collection. Every operation here:
//!
//! 1. parses identifiers and validates the payload,
//! 2. checks that referenced documents exist,
//! 3. issues exactly one mutating store call (or one read),
//! 4. assembles the response, resolving foreign keys to display names.
//!
//! Mutations rely on the store's single-document atomicity (`$set`,
//! `$push`, `$pull`, positional `$`) instead of read-modify-write.
//!
//! ## Deletion policy
//!
//! | Resource | Delete |
//! |---|---|
//! | crop | soft, `registroActivo = false` |
//! | location | reset to `null` |
//! | applied input | `$pull` from the array |
//! | irrigation | `$pull` from the array |
//! | tracking | document removed |

mod crop;
mod inputs;
mod irrigation;
mod location;
mod tracking;

pub use crop::{CropPatch, CropView, NewCrop};
pub use inputs::{InputApplicationList, InputApplicationPatch, InputApplicationView, NewInputApplication};
pub use irrigation::{IrrigationList, IrrigationPatch, IrrigationView, NewIrrigation};
pub use location::{LocationPatch, LocationView, NewLocation};
pub use tracking::{NewTracking, TrackingList, TrackingPatch, TrackingView};

use bson::{oid::ObjectId, Document};
use std::sync::Arc;

use crate::db::schemas::{CropDoc, TrackingDoc, CROP_COLLECTION, TRACKING_COLLECTION};
use crate::db::{Collection, DocumentStore};
use crate::resolver::ReferenceResolver;

/// Entry point for every crop and crop sub-resource operation
#[derive(Clone)]
pub struct CropManager {
    crops: Collection<CropDoc>,
    tracking: Collection<TrackingDoc>,
    resolver: ReferenceResolver,
}

impl CropManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            crops: Collection::new(Arc::clone(&store), CROP_COLLECTION),
            tracking: Collection::new(Arc::clone(&store), TRACKING_COLLECTION),
            resolver: ReferenceResolver::new(store),
        }
    }
}

/// Find the raw array entry whose `_id` equals `sub_id`
fn find_entry(entries: &[Document], sub_id: ObjectId) -> Option<&Document> {
    entries
        .iter()
        .find(|entry| entry.get_object_id("_id").ok() == Some(sub_id))
}

/// Suffix appended to list messages when entries had to be skipped
pub(crate) fn skipped_note(skipped: usize) -> String {
    if skipped == 0 {
        String::new()
    } else {
        format!(
            " Algunos items no pudieron ser procesados ({} omitidos).",
            skipped
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the sub-resource tests

    use super::*;
    use crate::db::schemas::{SUPPLY_COLLECTION, USER_COLLECTION};
    use crate::db::MemoryStore;
    use bson::doc;
    use chrono::NaiveDate;

    pub struct Fixture {
        pub store: Arc<dyn DocumentStore>,
        pub manager: CropManager,
        pub user_id: ObjectId,
        pub supply_id: ObjectId,
    }

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub async fn fixture() -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let user_id = store
            .insert_one(USER_COLLECTION, doc! { "nombre": "Ana Torres", "estatus": true })
            .await
            .unwrap();
        let supply_id = store
            .insert_one(
                SUPPLY_COLLECTION,
                doc! {
                    "nombreInsumo": "Urea",
                    "tipoInsumo": "Fertilizantes",
                    "cantDisponible": 100.0,
                    "unidadMedida": "kg",
                    "estatus": "Activo",
                },
            )
            .await
            .unwrap();
        Fixture {
            manager: CropManager::new(Arc::clone(&store)),
            store,
            user_id,
            supply_id,
        }
    }

    pub fn new_crop(user_id: ObjectId, area: f64) -> NewCrop {
        NewCrop {
            nom_cultivo: "Maíz criollo".into(),
            fecha_siembra: date("2024-03-01"),
            fecha_cosecha_est: date("2024-08-15"),
            fecha_cosecha_real: None,
            area_cultivo: area,
            id_usuario: user_id.to_hex(),
        }
    }

    /// Create a crop and return its hex id
    pub async fn seeded_crop(fx: &Fixture, area: f64) -> String {
        let outcome = fx.manager.create_crop(new_crop(fx.user_id, area)).await;
        assert!(outcome.is_ok(), "{}", outcome.message);
        let crops = fx.store.find_many(CROP_COLLECTION, doc! {}).await.unwrap();
        crops
            .last()
            .and_then(|c| c.get_object_id("_id").ok())
            .unwrap()
            .to_hex()
    }

    /// Store a crop directly, for tests of services that only reference it
    pub async fn insert_crop(store: &Arc<dyn DocumentStore>, name: &str, user_id: ObjectId) -> ObjectId {
        let crop = CropDoc::new(
            name.to_string(),
            date("2024-03-01"),
            date("2024-08-15"),
            None,
            2.0,
            user_id,
        );
        store
            .insert_one(CROP_COLLECTION, bson::to_document(&crop).unwrap())
            .await
            .unwrap()
    }

    pub async fn crop_doc(fx: &Fixture, id: &str) -> Document {
        let oid = ObjectId::parse_str(id).unwrap();
        fx.store
            .find_one(CROP_COLLECTION, doc! { "_id": oid })
            .await
            .unwrap()
            .unwrap()
    }
}
