//! Input checks shared by every operation
//!
//! Pure functions: each returns the first violation as
//! [`AgroError::Validation`] and never touches the store.

use bson::oid::ObjectId;
use chrono::NaiveDate;

use crate::db::schemas::{Coordinates, Labelled};
use crate::types::{AgroError, Result};

/// Parse a 24-hex-digit identifier, echoing the raw input on failure
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| {
        AgroError::Validation(format!(
            "El ID {} proporcionado ('{}') no tiene un formato válido.",
            what, raw
        ))
    })
}

/// Trimmed, non-empty text
pub fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AgroError::Validation(format!(
            "El campo '{}' es obligatorio y no puede estar vacío.",
            field
        )));
    }
    Ok(trimmed.to_string())
}

pub fn require_positive(value: f64, field: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AgroError::Validation(format!(
            "El campo '{}' debe ser un número mayor a cero.",
            field
        )))
    }
}

pub fn require_non_negative(value: f64, field: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AgroError::Validation(format!(
            "El campo '{}' no puede ser negativo.",
            field
        )))
    }
}

/// Look up a label in a closed enumeration
pub fn parse_label<E: Labelled>(raw: &str, field: &str) -> Result<E> {
    E::from_label(raw.trim()).ok_or_else(|| {
        AgroError::Validation(format!(
            "Valor inválido para '{}': '{}'. Valores permitidos: {}.",
            field,
            raw,
            E::accepted()
        ))
    })
}

/// Estimated harvest may equal but not precede planting; an actual harvest
/// date, when known, may not precede planting either.
pub fn check_harvest_dates(
    planting: NaiveDate,
    estimated: NaiveDate,
    actual: Option<NaiveDate>,
) -> Result<()> {
    if estimated < planting {
        return Err(AgroError::Validation(
            "La fecha de cosecha estimada no puede ser anterior a la fecha de siembra.".into(),
        ));
    }
    if let Some(actual) = actual {
        if actual < planting {
            return Err(AgroError::Validation(
                "La fecha de cosecha real no puede ser anterior a la fecha de siembra.".into(),
            ));
        }
    }
    Ok(())
}

pub fn check_not_before(
    later: NaiveDate,
    earlier: NaiveDate,
    later_field: &str,
    earlier_field: &str,
) -> Result<()> {
    if later < earlier {
        return Err(AgroError::Validation(format!(
            "'{}' no puede ser anterior a '{}'.",
            later_field, earlier_field
        )));
    }
    Ok(())
}

/// Mexican postal codes: exactly five digits
pub fn check_postal_code(cp: &str) -> Result<()> {
    let cp = cp.trim();
    if cp.len() == 5 && cp.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AgroError::Validation(format!(
            "El código postal '{}' debe tener exactamente 5 dígitos.",
            cp
        )))
    }
}

pub fn check_coordinates(coords: &Coordinates) -> Result<()> {
    if !(-90.0..=90.0).contains(&coords.latitud) {
        return Err(AgroError::Validation(
            "La latitud debe estar entre -90 y 90.".into(),
        ));
    }
    if !(-180.0..=180.0).contains(&coords.longitud) {
        return Err(AgroError::Validation(
            "La longitud debe estar entre -180 y 180.".into(),
        ));
    }
    Ok(())
}

/// Location surface must cover the crop's planted area
pub fn check_surface_covers_area(superficie: f64, area: f64) -> Result<()> {
    require_positive(superficie, "superficie")?;
    if superficie < area {
        return Err(AgroError::Validation(format!(
            "La superficie de la ubicación ({}) no puede ser menor que el área del cultivo ({}).",
            superficie, area
        )));
    }
    Ok(())
}

/// Minimal shape check: one `@`, a non-empty local part and a dotted domain
pub fn check_email(email: &str) -> Result<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email.to_lowercase())
    } else {
        Err(AgroError::Validation(format!(
            "El email '{}' no tiene un formato válido.",
            email
        )))
    }
}

pub fn check_ph(ph: f64) -> Result<()> {
    if ph.is_finite() && (0.0..=14.0).contains(&ph) {
        Ok(())
    } else {
        Err(AgroError::Validation(
            "El pH debe estar entre 0 y 14.".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::CropState;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_object_id_echoes_raw_input() {
        let err = parse_object_id("not-an-id", "del cultivo").unwrap_err();
        match err {
            AgroError::Validation(msg) => assert!(msg.contains("not-an-id")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse_object_id("507f1f77bcf86cd799439011", "x").is_ok());
    }

    #[test]
    fn test_positive_rejects_zero_negative_and_nan() {
        assert!(require_positive(0.0, "area").is_err());
        assert!(require_positive(-3.5, "area").is_err());
        assert!(require_positive(f64::NAN, "area").is_err());
        assert!(require_positive(0.1, "area").is_ok());
    }

    #[test]
    fn test_harvest_dates() {
        let planted = date("2024-03-01");
        assert!(check_harvest_dates(planted, date("2024-02-28"), None).is_err());
        assert!(check_harvest_dates(planted, planted, None).is_ok());
        assert!(check_harvest_dates(planted, date("2024-07-01"), Some(date("2024-01-01"))).is_err());
        assert!(check_harvest_dates(planted, date("2024-07-01"), Some(date("2024-06-20"))).is_ok());
    }

    #[test]
    fn test_postal_code() {
        assert!(check_postal_code("58000").is_ok());
        assert!(check_postal_code("5800").is_err());
        assert!(check_postal_code("58a00").is_err());
        assert!(check_postal_code("580000").is_err());
    }

    #[test]
    fn test_surface_must_cover_area() {
        assert!(check_surface_covers_area(10.0, 10.0).is_ok());
        assert!(check_surface_covers_area(9.99, 10.0).is_err());
        assert!(check_surface_covers_area(0.0, 0.0).is_err());
    }

    #[test]
    fn test_parse_label() {
        let state: CropState = parse_label("Cosechado", "estadoActual").unwrap();
        assert_eq!(state, CropState::Harvested);
        assert!(parse_label::<CropState>("Podrido", "estadoActual").is_err());
    }

    #[test]
    fn test_email_shape() {
        assert_eq!(check_email(" Ana@Campo.mx ").unwrap(), "ana@campo.mx");
        assert!(check_email("ana.campo.mx").is_err());
        assert!(check_email("@campo.mx").is_err());
        assert!(check_email("ana@campo").is_err());
    }

    #[test]
    fn test_coordinates_and_ph() {
        assert!(check_coordinates(&Coordinates { latitud: 19.7, longitud: -101.2 }).is_ok());
        assert!(check_coordinates(&Coordinates { latitud: 91.0, longitud: 0.0 }).is_err());
        assert!(check_ph(7.0).is_ok());
        assert!(check_ph(14.5).is_err());
    }
}
