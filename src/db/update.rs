//! Sparse update helpers shared by every service
//!
//! A PUT carries only the fields to change. Services collect them into a
//! [`SetBuilder`], send one `$set`, then classify the counts with
//! [`settle_update`].

use bson::{Bson, Document};
use serde::Serialize;

use super::UpdateCounts;
use crate::types::{AgroError, Result};

/// Accumulates the `$set` payload of a sparse update.
///
/// Fields are written under `prefix` (for example `riegos.$.`) so the same
/// builder serves top-level, embedded-object and positional updates.
pub struct SetBuilder {
    prefix: &'static str,
    fields: Document,
}

impl SetBuilder {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            fields: Document::new(),
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<Bson>) {
        self.fields.insert(format!("{}{}", self.prefix, field), value.into());
    }

    pub fn set_serialized<T: Serialize>(&mut self, field: &str, value: &T) -> Result<()> {
        let bson = bson::to_bson(value)?;
        self.set(field, bson);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_update(self) -> Document {
        let mut update = Document::new();
        update.insert("$set", self.fields);
        update
    }
}

/// Classify the counts of a sparse update
pub fn settle_update(counts: UpdateCounts, not_found: impl FnOnce() -> AgroError) -> Result<()> {
    if counts.matched == 0 {
        return Err(not_found());
    }
    if counts.modified == 0 {
        return Err(AgroError::NoChange(
            "Registro encontrado, pero los datos no produjeron cambios.".into(),
        ));
    }
    Ok(())
}

/// Error for a sparse update that carried no fields
pub fn nothing_to_update() -> AgroError {
    AgroError::NoChange("No se proporcionaron datos para actualizar.".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_set_builder_applies_prefix() {
        let mut set = SetBuilder::new("riegos.$.");
        assert!(set.is_empty());
        set.set("cantAgua", 250.0);
        set.set_serialized("status", &"Aplicado").unwrap();

        assert!(!set.is_empty());
        assert_eq!(
            set.into_update(),
            doc! { "$set": { "riegos.$.cantAgua": 250.0, "riegos.$.status": "Aplicado" } }
        );
    }

    #[test]
    fn test_settle_update_classifies_counts() {
        let missing = UpdateCounts { matched: 0, modified: 0 };
        let err = settle_update(missing, || AgroError::NotFound("x".into())).unwrap_err();
        assert!(matches!(err, AgroError::NotFound(_)));

        let unchanged = UpdateCounts { matched: 1, modified: 0 };
        let err = settle_update(unchanged, || AgroError::NotFound("x".into())).unwrap_err();
        assert!(matches!(err, AgroError::NoChange(_)));

        let changed = UpdateCounts { matched: 1, modified: 1 };
        assert!(settle_update(changed, || AgroError::NotFound("x".into())).is_ok());
        assert!(matches!(nothing_to_update(), AgroError::NoChange(_)));
    }
}
