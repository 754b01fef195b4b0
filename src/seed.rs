//! Bootstrap data for a fresh database: the admin role, a staff account,
//! the base cookie product and a handful of flavors.
//!
//! Every step looks up what already exists first, so re-running is safe.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    auth::{password, permissions::CATALOGUE},
    entities::{permiso, producto, producto_sabor, rol, rol_permiso, sabor, usuario, usuario_rol},
    errors::ServiceError,
    services::{catalog::BASE_PRODUCT_NAME, customers::get_or_create_cliente},
};

pub const ADMIN_ROLE: &str = "Administrador";

pub const SAMPLE_FLAVORS: &[&str] = &[
    "Chispas de chocolate",
    "Avena y pasas",
    "Red velvet",
    "Mantequilla de maní",
];

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
    pub cookie_unit_price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub permisos_creados: usize,
    pub rol_admin_id: i32,
    pub usuario_admin_id: i32,
    pub usuario_admin_creado: bool,
    pub producto_id: i32,
    pub sabores_creados: usize,
}

/// Inserts any catalogue permission the table lacks. Returns how many were added.
pub async fn ensure_permissions<C: ConnectionTrait>(conn: &C) -> Result<usize, ServiceError> {
    let existing: Vec<String> = permiso::Entity::find()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|p| p.codigo)
        .collect();

    let mut created = 0;
    for (codigo, descripcion) in CATALOGUE {
        if existing.iter().any(|c| c == codigo) {
            continue;
        }
        permiso::ActiveModel {
            codigo: Set(codigo.to_string()),
            descripcion: Set(Some(descripcion.to_string())),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
        created += 1;
    }
    Ok(created)
}

async fn ensure_admin_role<C: ConnectionTrait>(conn: &C) -> Result<rol::Model, ServiceError> {
    let role = match rol::Entity::find()
        .filter(rol::Column::Nombre.eq(ADMIN_ROLE))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    {
        Some(role) => role,
        None => rol::ActiveModel {
            nombre: Set(ADMIN_ROLE.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?,
    };

    let granted: Vec<i32> = rol_permiso::Entity::find()
        .filter(rol_permiso::Column::RolId.eq(role.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|rp| rp.permiso_id)
        .collect();

    let missing: Vec<rol_permiso::ActiveModel> = permiso::Entity::find()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .filter(|p| !granted.contains(&p.id))
        .map(|p| rol_permiso::ActiveModel {
            rol_id: Set(role.id),
            permiso_id: Set(p.id),
            ..Default::default()
        })
        .collect();

    if !missing.is_empty() {
        rol_permiso::Entity::insert_many(missing)
            .exec_without_returning(conn)
            .await
            .map_err(ServiceError::db_error)?;
    }
    Ok(role)
}

async fn ensure_admin_user<C: ConnectionTrait>(
    conn: &C,
    opts: &SeedOptions,
    rol_id: i32,
) -> Result<(usuario::Model, bool), ServiceError> {
    let email = opts.admin_email.trim().to_lowercase();
    let existing = usuario::Entity::find()
        .filter(usuario::Column::Email.eq(email.clone()))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let (user, created) = match existing {
        Some(user) => (user, false),
        None => {
            password::check_password_strength(&opts.admin_password)?;
            let user = usuario::ActiveModel {
                nombre: Set(opts.admin_name.trim().to_string()),
                email: Set(email),
                hash_password: Set(password::hash_password(&opts.admin_password)?),
                telefono: Set(None),
                activo: Set(true),
                es_staff: Set(true),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)?;
            (user, true)
        }
    };

    let has_role = usuario_rol::Entity::find()
        .filter(usuario_rol::Column::UsuarioId.eq(user.id))
        .filter(usuario_rol::Column::RolId.eq(rol_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .is_some();
    if !has_role {
        usuario_rol::ActiveModel {
            usuario_id: Set(user.id),
            rol_id: Set(rol_id),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }

    get_or_create_cliente(conn, user.id).await?;
    Ok((user, created))
}

async fn ensure_base_product<C: ConnectionTrait>(
    conn: &C,
    precio: Decimal,
) -> Result<producto::Model, ServiceError> {
    let existing = producto::Entity::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(producto::Column::Nombre)))
                .eq(BASE_PRODUCT_NAME.to_lowercase()),
        )
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if let Some(product) = existing {
        return Ok(product);
    }

    producto::ActiveModel {
        nombre: Set(BASE_PRODUCT_NAME.to_string()),
        precio_unitario: Set(precio),
        activo: Set(true),
        descripcion: Set(Some("Galleta artesanal horneada el día".to_string())),
        imagen_url: Set(None),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}

async fn ensure_flavors<C: ConnectionTrait>(
    conn: &C,
    producto_id: i32,
) -> Result<usize, ServiceError> {
    let existing = sabor::Entity::find()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut created = 0;
    for nombre in SAMPLE_FLAVORS {
        if existing.iter().any(|s| s.nombre.eq_ignore_ascii_case(nombre)) {
            continue;
        }
        let flavor = sabor::ActiveModel {
            nombre: Set(nombre.to_string()),
            activo: Set(true),
            imagen: Set(None),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        producto_sabor::Entity::insert(producto_sabor::ActiveModel {
            producto_id: Set(producto_id),
            sabor_id: Set(flavor.id),
        })
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;
        created += 1;
    }
    Ok(created)
}

/// Runs every bootstrap step in one transaction
#[instrument(skip(db, opts), fields(admin_email = %opts.admin_email))]
pub async fn seed_defaults(
    db: &DatabaseConnection,
    opts: &SeedOptions,
) -> Result<SeedReport, ServiceError> {
    let txn = db.begin().await.map_err(ServiceError::db_error)?;

    let permisos_creados = ensure_permissions(&txn).await?;
    let role = ensure_admin_role(&txn).await?;
    let (admin, usuario_admin_creado) = ensure_admin_user(&txn, opts, role.id).await?;
    let product = ensure_base_product(&txn, opts.cookie_unit_price).await?;
    let sabores_creados = ensure_flavors(&txn, product.id).await?;

    txn.commit().await.map_err(ServiceError::db_error)?;

    let report = SeedReport {
        permisos_creados,
        rol_admin_id: role.id,
        usuario_admin_id: admin.id,
        usuario_admin_creado,
        producto_id: product.id,
        sabores_creados,
    };
    info!(?report, "seed completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use rust_decimal_macros::dec;
    use sea_orm::PaginatorTrait;

    fn options() -> SeedOptions {
        SeedOptions {
            admin_email: "Admin@DulceBocatto.bo".into(),
            admin_password: "horno-caliente-2024".into(),
            admin_name: "Administración".into(),
            cookie_unit_price: dec!(10),
        }
    }

    #[tokio::test]
    async fn seeding_twice_creates_nothing_new() {
        let db = establish_connection_with_config(&DbConfig::sqlite_in_memory())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();

        let first = seed_defaults(&db, &options()).await.unwrap();
        assert!(first.usuario_admin_creado);
        assert_eq!(first.sabores_creados, SAMPLE_FLAVORS.len());

        let second = seed_defaults(&db, &options()).await.unwrap();
        assert!(!second.usuario_admin_creado);
        assert_eq!(second.sabores_creados, 0);
        assert_eq!(second.permisos_creados, 0);
        assert_eq!(second.usuario_admin_id, first.usuario_admin_id);

        let grants = rol_permiso::Entity::find()
            .filter(rol_permiso::Column::RolId.eq(first.rol_admin_id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(grants as usize, CATALOGUE.len());

        let admin = usuario::Entity::find_by_id(first.usuario_admin_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.email, "admin@dulcebocatto.bo");
        assert!(admin.es_staff);
    }
}
