use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{permiso, rol, rol_permiso, usuario, usuario_rol},
    errors::ServiceError,
    models::AuditAction,
    services::audit::{AuditContext, AuditEntry, AuditService},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RoleInput {
    #[validate(length(min = 1, max = 50))]
    pub nombre: String,
    #[serde(default)]
    pub permisos: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleView {
    pub id: i32,
    pub nombre: String,
    pub permisos: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRolesView {
    pub id: i32,
    pub nombre: String,
    pub email: String,
    pub activo: bool,
    pub es_staff: bool,
    pub roles: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignRolesInput {
    pub roles: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignRolesResponse {
    pub ok: bool,
    pub roles: Vec<i32>,
}

/// Deduplicated, sorted ids that must all exist in `table`
async fn existing_ids<C, E>(conn: &C, ids: &[i32], id_col: E::Column, what: &str) -> Result<Vec<i32>, ServiceError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync,
{
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    let found = E::find()
        .filter(id_col.is_in(wanted.iter().copied()))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if found as usize != wanted.len() {
        return Err(ServiceError::ValidationError(format!("{what} inexistente")));
    }
    Ok(wanted.into_iter().collect())
}

async fn replace_role_permissions<C>(conn: &C, rol_id: i32, permisos: &[i32]) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    rol_permiso::Entity::delete_many()
        .filter(rol_permiso::Column::RolId.eq(rol_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if permisos.is_empty() {
        return Ok(());
    }
    rol_permiso::Entity::insert_many(permisos.iter().map(|permiso_id| rol_permiso::ActiveModel {
        rol_id: Set(rol_id),
        permiso_id: Set(*permiso_id),
        ..Default::default()
    }))
    .exec_without_returning(conn)
    .await
    .map_err(ServiceError::db_error)?;
    Ok(())
}

/// Role and permission administration
#[derive(Clone)]
pub struct RbacService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditService>,
}

impl RbacService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditService>) -> Self {
        Self { db_pool, audit }
    }

    #[instrument(skip(self))]
    pub async fn list_permissions(&self) -> Result<Vec<permiso::Model>, ServiceError> {
        permiso::Entity::find()
            .order_by_asc(permiso::Column::Codigo)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn list_roles(&self) -> Result<Vec<RoleView>, ServiceError> {
        let db = &*self.db_pool;
        let roles = rol::Entity::find()
            .order_by_asc(rol::Column::Nombre)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut grants: HashMap<i32, Vec<i32>> = HashMap::new();
        for link in rol_permiso::Entity::find()
            .order_by_asc(rol_permiso::Column::PermisoId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            grants.entry(link.rol_id).or_default().push(link.permiso_id);
        }
        Ok(roles
            .into_iter()
            .map(|r| RoleView {
                permisos: grants.remove(&r.id).unwrap_or_default(),
                id: r.id,
                nombre: r.nombre,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, id: i32) -> Result<RoleView, ServiceError> {
        let db = &*self.db_pool;
        let role = rol::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Rol {id}")))?;
        let permisos = rol_permiso::Entity::find()
            .filter(rol_permiso::Column::RolId.eq(id))
            .order_by_asc(rol_permiso::Column::PermisoId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|l| l.permiso_id)
            .collect();
        Ok(RoleView {
            id: role.id,
            nombre: role.nombre,
            permisos,
        })
    }

    async fn ensure_unique_name<C>(conn: &C, nombre: &str, except: Option<i32>) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut query = rol::Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(rol::Column::Nombre))).eq(nombre.to_lowercase()));
        if let Some(id) = except {
            query = query.filter(rol::Column::Id.ne(id));
        }
        if query.count(conn).await.map_err(ServiceError::db_error)? > 0 {
            return Err(ServiceError::Conflict(format!("Ya existe el rol {nombre}")));
        }
        Ok(())
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn create_role(&self, input: RoleInput, ctx: &AuditContext) -> Result<RoleView, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        Self::ensure_unique_name(&txn, &nombre, None).await?;
        let permisos =
            existing_ids::<_, permiso::Entity>(&txn, &input.permisos, permiso::Column::Id, "Permiso").await?;

        let role = rol::ActiveModel {
            nombre: Set(nombre),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        replace_role_permissions(&txn, role.id, &permisos).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(rol_id = role.id, permisos = permisos.len(), "role created");
        self.audit
            .record(ctx, AuditEntry::new("Rol", role.id, AuditAction::Crear).detail(role.nombre.clone()))
            .await;
        Ok(RoleView {
            id: role.id,
            nombre: role.nombre,
            permisos,
        })
    }

    #[instrument(skip(self, input, ctx))]
    pub async fn update_role(&self, id: i32, input: RoleInput, ctx: &AuditContext) -> Result<RoleView, ServiceError> {
        input.validate()?;
        let nombre = input.nombre.trim().to_string();
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let role = rol::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Rol {id}")))?;
        Self::ensure_unique_name(&txn, &nombre, Some(id)).await?;
        let permisos =
            existing_ids::<_, permiso::Entity>(&txn, &input.permisos, permiso::Column::Id, "Permiso").await?;

        let mut active = role.into_active_model();
        active.nombre = Set(nombre);
        let role = active.update(&txn).await.map_err(ServiceError::db_error)?;
        replace_role_permissions(&txn, id, &permisos).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        self.audit
            .record(ctx, AuditEntry::new("Rol", id, AuditAction::Actualizar))
            .await;
        Ok(RoleView {
            id: role.id,
            nombre: role.nombre,
            permisos,
        })
    }

    /// Refused while any user still holds the role
    #[instrument(skip(self, ctx))]
    pub async fn delete_role(&self, id: i32, ctx: &AuditContext) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let role = rol::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Rol {id}")))?;

        let holders = usuario_rol::Entity::find()
            .filter(usuario_rol::Column::RolId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if holders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Rol en uso por {holders} usuario(s)"
            )));
        }

        rol_permiso::Entity::delete_many()
            .filter(rol_permiso::Column::RolId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        rol::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(rol_id = id, "role deleted");
        self.audit
            .record(ctx, AuditEntry::new("Rol", id, AuditAction::Borrar).detail(role.nombre))
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserRolesView>, ServiceError> {
        let db = &*self.db_pool;
        let users = usuario::Entity::find()
            .order_by_asc(usuario::Column::Nombre)
            .order_by_asc(usuario::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut held: HashMap<i32, Vec<i32>> = HashMap::new();
        for link in usuario_rol::Entity::find()
            .order_by_asc(usuario_rol::Column::RolId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            held.entry(link.usuario_id).or_default().push(link.rol_id);
        }
        Ok(users
            .into_iter()
            .map(|u| UserRolesView {
                roles: held.remove(&u.id).unwrap_or_default(),
                id: u.id,
                nombre: u.nombre,
                email: u.email,
                activo: u.activo,
                es_staff: u.es_staff,
            })
            .collect())
    }

    /// Replaces the user's whole role set
    #[instrument(skip(self, ctx))]
    pub async fn assign_roles(
        &self,
        usuario_id: i32,
        role_ids: Vec<i32>,
        ctx: &AuditContext,
    ) -> Result<AssignRolesResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        usuario::Entity::find_by_id(usuario_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Usuario {usuario_id}")))?;
        let roles = existing_ids::<_, rol::Entity>(&txn, &role_ids, rol::Column::Id, "Rol").await?;

        usuario_rol::Entity::delete_many()
            .filter(usuario_rol::Column::UsuarioId.eq(usuario_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if !roles.is_empty() {
            usuario_rol::Entity::insert_many(roles.iter().map(|rol_id| usuario_rol::ActiveModel {
                usuario_id: Set(usuario_id),
                rol_id: Set(*rol_id),
                ..Default::default()
            }))
            .exec_without_returning(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(usuario_id, roles = ?roles, "user roles replaced");
        self.audit
            .record(
                ctx,
                AuditEntry::new("Usuario", usuario_id, AuditAction::Actualizar)
                    .detail(format!("roles {roles:?}")),
            )
            .await;
        Ok(AssignRolesResponse { ok: true, roles })
    }
}
