use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{
        password::{check_password_strength, hash_password, verify_password},
        AuthService, AuthUser, TokenResponse,
    },
    db::DbPool,
    entities::{cliente, usuario},
    errors::ServiceError,
    models::AuditAction,
    services::{
        audit::{AuditContext, AuditEntry, AuditService},
        customers::{get_or_create_cliente, DEFAULT_ADDRESS},
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 120))]
    pub nombre: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(max = 40))]
    pub telefono: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 120))]
    pub nombre: Option<String>,
    #[validate(length(max = 40))]
    pub telefono: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub direccion: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountView {
    pub id: i32,
    pub nombre: String,
    pub email: String,
    pub telefono: Option<String>,
    pub es_staff: bool,
    pub activo: bool,
}

impl From<usuario::Model> for AccountView {
    fn from(u: usuario::Model) -> Self {
        Self {
            id: u.id,
            nombre: u.nombre,
            email: u.email,
            telefono: u.telefono,
            es_staff: u.es_staff,
            activo: u.activo,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: TokenResponse,
    pub usuario: AccountView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub usuario: AccountView,
    pub direccion: Option<String>,
    pub roles: Vec<String>,
    pub permisos: Vec<String>,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Registration, sessions and self-service profile changes
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
    audit: Arc<AuditService>,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>, audit: Arc<AuditService>) -> Self {
        Self {
            db_pool,
            auth,
            audit,
        }
    }

    /// Creates the account and its customer record
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(
        &self,
        mut input: RegisterInput,
        ip: Option<String>,
    ) -> Result<AccountView, ServiceError> {
        input.email = normalize_email(&input.email);
        input.nombre = input.nombre.trim().to_string();
        input.validate()?;
        check_password_strength(&input.password)?;

        let hash = hash_password(&input.password)?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let taken = usuario::Entity::find()
            .filter(usuario::Column::Email.eq(input.email.clone()))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(
                "Ya existe una cuenta con ese email".to_string(),
            ));
        }

        let user = usuario::ActiveModel {
            nombre: Set(input.nombre.clone()),
            email: Set(input.email.clone()),
            hash_password: Set(hash),
            telefono: Set(input.telefono.clone()),
            activo: Set(true),
            es_staff: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        cliente::ActiveModel {
            usuario_id: Set(user.id),
            nombre: Set(user.nombre.clone()),
            telefono: Set(user.telefono.clone()),
            direccion: Set(DEFAULT_ADDRESS.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(usuario_id = user.id, "account registered");
        self.audit
            .record(
                &AuditContext::new(Some(user.id), ip),
                AuditEntry::new("Usuario", user.id, AuditAction::Crear),
            )
            .await;
        Ok(user.into())
    }

    #[instrument(skip(self, input))]
    pub async fn login(
        &self,
        input: LoginInput,
        ip: Option<String>,
    ) -> Result<LoginResponse, ServiceError> {
        let email = normalize_email(&input.email);
        let user = usuario::Entity::find()
            .filter(usuario::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let user = match user {
            Some(user) if verify_password(&input.password, &user.hash_password) => user,
            _ => {
                warn!("login rejected");
                return Err(ServiceError::Unauthorized(
                    "Credenciales inválidas".to_string(),
                ));
            }
        };
        if !user.activo {
            return Err(ServiceError::Unauthorized("Cuenta inactiva".to_string()));
        }

        let token = self.auth.generate_token(&user)?;
        self.audit
            .record(
                &AuditContext::new(Some(user.id), ip),
                AuditEntry::new("Usuario", user.id, AuditAction::Login),
            )
            .await;
        info!(usuario_id = user.id, "login succeeded");

        Ok(LoginResponse {
            token,
            usuario: user.into(),
        })
    }

    /// Revokes the presented token
    #[instrument(skip(self, user), fields(usuario_id = user.usuario_id))]
    pub async fn logout(&self, user: &AuthUser, ip: Option<String>) {
        self.auth.revoke(&user.token_id, user.token_expires_at).await;
        self.audit
            .record(
                &AuditContext::new(Some(user.usuario_id), ip),
                AuditEntry::new("Usuario", user.usuario_id, AuditAction::Logout),
            )
            .await;
    }

    #[instrument(skip(self))]
    pub async fn me(&self, usuario_id: i32) -> Result<MeResponse, ServiceError> {
        let user = self.find_user(usuario_id).await?;
        let direccion = cliente::Entity::find()
            .filter(cliente::Column::UsuarioId.eq(usuario_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .map(|c| c.direccion);
        let roles = self.auth.role_names(usuario_id).await?;
        let permisos = self.auth.effective_permissions(&user).await?;

        Ok(MeResponse {
            usuario: user.into(),
            direccion,
            roles,
            permisos,
        })
    }

    /// Updates the account and keeps the customer record in step
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        usuario_id: i32,
        input: UpdateProfileInput,
        ip: Option<String>,
    ) -> Result<MeResponse, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let user = usuario::Entity::find_by_id(usuario_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Usuario {usuario_id}")))?;
        let cliente = get_or_create_cliente(&txn, usuario_id).await?;

        let mut user = user.into_active_model();
        let mut cliente = cliente.into_active_model();
        if let Some(nombre) = input.nombre.as_deref().map(str::trim) {
            user.nombre = Set(nombre.to_string());
            cliente.nombre = Set(nombre.to_string());
        }
        if let Some(telefono) = input.telefono {
            let telefono = Some(telefono.trim().to_string()).filter(|t| !t.is_empty());
            user.telefono = Set(telefono.clone());
            cliente.telefono = Set(telefono);
        }
        if let Some(direccion) = input.direccion {
            cliente.direccion = Set(direccion.trim().to_string());
        }
        user.update(&txn).await.map_err(ServiceError::db_error)?;
        cliente.update(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(
                &AuditContext::new(Some(usuario_id), ip),
                AuditEntry::new("Usuario", usuario_id, AuditAction::Actualizar).detail("perfil"),
            )
            .await;
        self.me(usuario_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        usuario_id: i32,
        input: ChangePasswordInput,
        ip: Option<String>,
    ) -> Result<(), ServiceError> {
        let user = self.find_user(usuario_id).await?;
        if !verify_password(&input.current_password, &user.hash_password) {
            return Err(ServiceError::Unauthorized(
                "La contraseña actual no coincide".to_string(),
            ));
        }
        check_password_strength(&input.new_password)?;

        let mut active = user.into_active_model();
        active.hash_password = Set(hash_password(&input.new_password)?);
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.audit
            .record(
                &AuditContext::new(Some(usuario_id), ip),
                AuditEntry::new("Usuario", usuario_id, AuditAction::Actualizar)
                    .detail("contraseña"),
            )
            .await;
        Ok(())
    }

    async fn find_user(&self, usuario_id: i32) -> Result<usuario::Model, ServiceError> {
        usuario::Entity::find_by_id(usuario_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Usuario {usuario_id}")))
    }
}
