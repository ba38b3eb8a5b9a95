//! Database schemas for agrosystem
//!
//! Persisted field names are the camelCase Spanish names the collections
//! have always used; Rust fields are their snake_case spelling.

/// Declare an enum persisted as its human-readable label
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $crate::db::schemas::Labelled for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::db::schemas::Labelled::label(*self))
            }
        }
    };
}

mod activity;
mod alert;
mod crop;
mod soil;
mod supply;
mod tracking;
mod user;

pub use activity::{ActivityDoc, ActivityStatus, ACTIVITY_COLLECTION};
pub use alert::{AlertDoc, ALERT_COLLECTION};
pub use crop::{
    Coordinates, CropDoc, CropState, InputApplicationDoc, IrrigationDoc, IrrigationStatus,
    LocationDoc, CROP_COLLECTION,
};
pub use soil::{Nutrient, SoilRecordDoc, SOIL_COLLECTION};
pub use supply::{SupplyDoc, SupplyStatus, SupplyType, SUPPLY_COLLECTION};
pub use tracking::{HealthState, TrackingDoc, TRACKING_COLLECTION};
pub use user::{AddressDoc, Role, UserDoc, USER_COLLECTION};

/// Closed set of string labels stored verbatim in documents
pub trait Labelled: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn label(self) -> &'static str;

    fn from_label(raw: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.label() == raw)
    }

    /// Comma-separated list of accepted labels, for error messages
    fn accepted() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| v.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_lookup() {
        assert_eq!(CropState::from_label("Listo para Cosecha"), Some(CropState::ReadyToHarvest));
        assert_eq!(CropState::from_label("listo para cosecha"), None);
        assert_eq!(HealthState::from_label("Crítico"), Some(HealthState::Critical));
        assert_eq!(Role::Supervisor.to_string(), "Supervisor");
    }

    #[test]
    fn test_accepted_lists_every_label() {
        assert_eq!(
            IrrigationStatus::accepted(),
            "Pendiente, Aplicado, Cancelado"
        );
    }

    #[test]
    fn test_documents_keep_the_underscore_id_key() {
        let id = bson::oid::ObjectId::new();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut crop = CropDoc::new("Frijol".into(), date, date, None, 1.0, id);
        crop._id = Some(id);

        let stored = bson::to_document(&crop).unwrap();
        assert_eq!(stored.get_object_id("_id").unwrap(), id);
        assert!(!stored.contains_key("id"));
        let read: CropDoc = bson::from_document(stored).unwrap();
        assert_eq!(read._id, Some(id));

        let entry = IrrigationDoc {
            _id: id,
            fecha_esperada: date,
            fecha_aplicada: None,
            cant_agua: 300.0,
            metodo_riego: "Aspersión".into(),
            duracion_riego: 45.0,
            id_usuario: id,
            status: IrrigationStatus::Pending,
        };
        let stored = bson::to_document(&entry).unwrap();
        assert_eq!(stored.get_object_id("_id").unwrap(), id);
        assert!(!stored.contains_key("id"));

        // Inserts leave the key out so the store generates it
        let fresh = CropDoc::new("Frijol".into(), date, date, None, 1.0, id);
        assert!(!bson::to_document(&fresh).unwrap().contains_key("_id"));
    }

    #[test]
    fn test_enum_serializes_as_label() {
        let json = serde_json::to_string(&CropState::Growing).unwrap();
        assert_eq!(json, "\"En Crecimiento\"");
    }
}
