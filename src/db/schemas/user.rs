//! User document schema
//!
//! Stores account data and the argon2 hash of the user's password.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for users
pub const USER_COLLECTION: &str = "usuarios";

labelled_enum!(
    /// Access role of a user
    Role {
        Administrator => "Administrador",
        Farmer => "Agricultor",
        Supervisor => "Supervisor",
    }
);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressDoc {
    pub calle: String,
    pub numero: String,
    pub colonia: String,
    pub ciudad: String,
    pub estado: String,
    pub codigo_postal: String,
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    pub nombre: String,

    #[serde(default)]
    pub telefono: String,

    /// Whether the account may log in
    #[serde(default = "super::default_true")]
    pub estatus: bool,

    #[serde(default)]
    pub domicilio: Option<AddressDoc>,

    /// Login identifier, unique across users
    pub email: String,

    /// Argon2 password hash (PHC string)
    pub password: String,

    pub rol: Role,
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}
