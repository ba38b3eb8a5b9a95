//! User accounts: registration, profile edits, deactivation and login

use bson::doc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{check_password_strength, hash_password, verify_password, BasicCredentials, Principal};
use crate::db::schemas::{AddressDoc, Role, UserDoc, USER_COLLECTION};
use crate::db::{nothing_to_update, settle_update, Collection, DocumentStore, SetBuilder};
use crate::outcome::Outcome;
use crate::types::{AgroError, Result};
use crate::validation::{check_email, check_postal_code, parse_object_id, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub nombre: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub estatus: Option<bool>,
    #[serde(default)]
    pub domicilio: Option<AddressDoc>,
    pub email: String,
    pub password: String,
    pub rol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub nombre: Option<String>,
    pub telefono: Option<String>,
    pub estatus: Option<bool>,
    pub domicilio: Option<AddressDoc>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub rol: Option<String>,
}

/// Account data as returned to callers; the password hash stays behind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre: String,
    pub telefono: String,
    pub estatus: bool,
    pub domicilio: Option<AddressDoc>,
    pub email: String,
    pub rol: Role,
}

impl UserView {
    fn from_doc(doc: UserDoc) -> Result<Self> {
        let id = doc
            ._id
            .ok_or_else(|| AgroError::Internal("User without _id".into()))?;
        Ok(Self {
            id: id.to_hex(),
            nombre: doc.nombre,
            telefono: doc.telefono,
            estatus: doc.estatus,
            domicilio: doc.domicilio,
            email: doc.email,
            rol: doc.rol,
        })
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Collection<UserDoc>,
    /// Held while the first account is checked for and created
    bootstrap: Arc<Mutex<()>>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: Collection::new(store, USER_COLLECTION),
            bootstrap: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create(&self, input: NewUser) -> Outcome<()> {
        Outcome::settle(self.try_create(input).await)
    }

    /// Register the first account without credentials. Only an
    /// Administrator is accepted, and only while no account exists.
    pub async fn register_first_admin(&self, input: NewUser) -> Outcome<()> {
        Outcome::settle(self.try_register_first_admin(input).await)
    }

    pub async fn update(&self, raw_id: &str, patch: UserPatch) -> Outcome<()> {
        Outcome::settle(self.try_update(raw_id, patch).await)
    }

    pub async fn deactivate(&self, raw_id: &str) -> Outcome<()> {
        Outcome::settle(self.try_deactivate(raw_id).await)
    }

    pub async fn get(&self, raw_id: &str) -> Outcome<UserView> {
        Outcome::settle(self.try_get(raw_id).await)
    }

    pub async fn list(&self) -> Outcome<Vec<UserView>> {
        Outcome::settle(self.try_list().await)
    }

    pub async fn login(&self, creds: &BasicCredentials) -> Outcome<UserView> {
        Outcome::settle(self.try_login(creds).await)
    }

    /// Whether any account exists yet. An empty collection lets the very
    /// first registration through without credentials.
    pub async fn has_users(&self) -> Result<bool> {
        self.users.exists(doc! {}).await
    }

    /// Resolve Basic credentials to the acting user
    pub async fn authenticate(&self, creds: &BasicCredentials) -> Result<Principal> {
        let user = self.check_credentials(creds).await?;
        let id = user
            ._id
            .ok_or_else(|| AgroError::Internal("User without _id".into()))?;
        Ok(Principal {
            id,
            nombre: user.nombre,
            rol: user.rol,
        })
    }

    async fn try_create(&self, input: NewUser) -> Result<Outcome<()>> {
        let nombre = require_text(&input.nombre, "nombre")?;
        let email = check_email(&input.email)?;
        check_password_strength(&input.password)?;
        let rol: Role = input.rol.parse()?;
        if let Some(address) = &input.domicilio {
            check_postal_code(&address.codigo_postal)?;
        }

        if self.users.exists(doc! { "email": email.as_str() }).await? {
            return Err(AgroError::Conflict(
                "El correo electrónico ya está registrado.".into(),
            ));
        }

        let user = UserDoc {
            _id: None,
            nombre,
            telefono: input.telefono.trim().to_string(),
            estatus: input.estatus.unwrap_or(true),
            domicilio: input.domicilio,
            email,
            password: hash_password(&input.password)?,
            rol,
        };
        let id = self.users.insert_one(&user).await?;
        debug!("User {} registered", id);

        Ok(Outcome::created(format!(
            "Usuario registrado con éxito con id: {}",
            id
        )))
    }

    async fn try_register_first_admin(&self, input: NewUser) -> Result<Outcome<()>> {
        if input.rol.parse::<Role>().ok() != Some(Role::Administrator) {
            return Err(AgroError::Forbidden(
                "La primera cuenta registrada debe tener rol Administrador.".into(),
            ));
        }

        let _guard = self.bootstrap.lock().await;
        if self.has_users().await? {
            return Err(AgroError::Unauthorized(
                "Se requieren credenciales (Authorization: Basic).".into(),
            ));
        }
        info!("Registering first administrator {}", input.email);
        self.try_create(input).await
    }

    async fn try_update(&self, raw_id: &str, patch: UserPatch) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del usuario")?;
        if !self.users.exists(doc! { "_id": id }).await? {
            return Err(not_found(raw_id));
        }

        let mut set = SetBuilder::new("");
        if let Some(nombre) = &patch.nombre {
            set.set("nombre", require_text(nombre, "nombre")?);
        }
        if let Some(telefono) = &patch.telefono {
            set.set("telefono", telefono.trim());
        }
        if let Some(estatus) = patch.estatus {
            set.set("estatus", estatus);
        }
        if let Some(address) = &patch.domicilio {
            check_postal_code(&address.codigo_postal)?;
            set.set_serialized("domicilio", address)?;
        }
        if let Some(raw_email) = &patch.email {
            let email = check_email(raw_email)?;
            let taken = self
                .users
                .exists(doc! { "email": email.as_str(), "_id": { "$ne": id } })
                .await?;
            if taken {
                return Err(AgroError::Conflict(
                    "El correo electrónico ya está registrado en otro usuario.".into(),
                ));
            }
            set.set("email", email);
        }
        if let Some(password) = &patch.password {
            check_password_strength(password)?;
            set.set("password", hash_password(password)?);
        }
        if let Some(raw_role) = &patch.rol {
            let rol: Role = raw_role.parse()?;
            set.set_serialized("rol", &rol)?;
        }

        if set.is_empty() {
            return Err(nothing_to_update());
        }

        let counts = self
            .users
            .update_one(doc! { "_id": id }, set.into_update())
            .await?;
        settle_update(counts, || not_found(raw_id))?;

        Ok(Outcome::ok(format!("Usuario {} actualizado con éxito.", raw_id)))
    }

    async fn try_deactivate(&self, raw_id: &str) -> Result<Outcome<()>> {
        let id = parse_object_id(raw_id, "del usuario")?;
        let counts = self
            .users
            .update_one(doc! { "_id": id }, doc! { "$set": { "estatus": false } })
            .await?;
        if counts.matched == 0 {
            return Err(not_found(raw_id));
        }
        if counts.modified == 0 {
            return Ok(Outcome::info(format!(
                "El usuario {} ya se encontraba desactivado.",
                raw_id
            )));
        }
        debug!("User {} deactivated", id);

        Ok(Outcome::ok(format!("Usuario {} desactivado con éxito.", raw_id)))
    }

    async fn try_get(&self, raw_id: &str) -> Result<Outcome<UserView>> {
        let id = parse_object_id(raw_id, "del usuario")?;
        let user = self
            .users
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| not_found(raw_id))?;

        Ok(Outcome::ok_with(
            format!("Usuario {} encontrado.", raw_id),
            UserView::from_doc(user)?,
        ))
    }

    async fn try_list(&self) -> Result<Outcome<Vec<UserView>>> {
        let users = self
            .users
            .find_many(doc! {})
            .await?
            .into_iter()
            .map(UserView::from_doc)
            .collect::<Result<Vec<_>>>()?;

        Ok(Outcome::ok_with("Listado de usuarios", users))
    }

    async fn try_login(&self, creds: &BasicCredentials) -> Result<Outcome<UserView>> {
        let user = self.check_credentials(creds).await?;
        let view = UserView::from_doc(user)?;
        Ok(Outcome::ok_with(
            format!("Usuario {} autenticado con éxito.", view.id),
            view,
        ))
    }

    async fn check_credentials(&self, creds: &BasicCredentials) -> Result<UserDoc> {
        let email = creds.email.trim().to_lowercase();
        let Some(user) = self.users.find_one(doc! { "email": email.as_str() }).await? else {
            warn!("Login rejected: unknown email {}", email);
            return Err(invalid_credentials());
        };

        if !verify_password(&creds.password, &user.password)? {
            warn!("Login rejected: wrong password for {}", email);
            return Err(invalid_credentials());
        }
        if !user.estatus {
            warn!("Login rejected: inactive user {}", email);
            return Err(invalid_credentials());
        }
        Ok(user)
    }
}

fn invalid_credentials() -> AgroError {
    AgroError::Unauthorized("Correo electrónico o contraseña incorrectos.".into())
}

fn not_found(raw_id: &str) -> AgroError {
    AgroError::NotFound(format!("No se encontró un usuario con id: {}", raw_id))
}
