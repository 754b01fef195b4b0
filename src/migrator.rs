use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_identity_tables::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_order_tables::Migration),
            Box::new(m20240301_000004_create_inventory_tables::Migration),
            Box::new(m20240301_000005_create_procurement_tables::Migration),
            Box::new(m20240301_000006_create_bitacora_table::Migration),
            Box::new(m20240301_000007_seed_permissions::Migration),
        ]
    }
}

/// Identifiers shared by every migration
mod iden {
    use sea_orm_migration::prelude::*;

    #[derive(DeriveIden)]
    pub(super) enum Usuario {
        Table,
        Id,
        Nombre,
        Email,
        HashPassword,
        Telefono,
        Activo,
        EsStaff,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Cliente {
        Table,
        Id,
        UsuarioId,
        Nombre,
        Telefono,
        Direccion,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Rol {
        Table,
        Id,
        Nombre,
    }

    #[derive(DeriveIden)]
    pub(super) enum Permiso {
        Table,
        Id,
        Codigo,
        Descripcion,
    }

    #[derive(DeriveIden)]
    pub(super) enum UsuarioRol {
        Table,
        Id,
        UsuarioId,
        RolId,
    }

    #[derive(DeriveIden)]
    pub(super) enum RolPermiso {
        Table,
        Id,
        RolId,
        PermisoId,
    }

    #[derive(DeriveIden)]
    pub(super) enum Producto {
        Table,
        Id,
        Nombre,
        PrecioUnitario,
        Activo,
        Descripcion,
        ImagenUrl,
        CreadoEn,
    }

    #[derive(DeriveIden)]
    pub(super) enum Sabor {
        Table,
        Id,
        Nombre,
        Activo,
        Imagen,
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductoSabor {
        Table,
        ProductoId,
        SaborId,
    }

    #[derive(DeriveIden)]
    pub(super) enum Pedido {
        Table,
        Id,
        ClienteId,
        Estado,
        MetodoEnvio,
        CostoEnvio,
        DireccionEntrega,
        Total,
        Observaciones,
        CreatedAt,
        FechaEntregaProgramada,
    }

    #[derive(DeriveIden)]
    pub(super) enum DetallePedido {
        Table,
        PedidoId,
        ProductoId,
        SaborId,
        Cantidad,
        PrecioUnitario,
        Producido,
    }

    #[derive(DeriveIden)]
    pub(super) enum Pago {
        Table,
        Id,
        PedidoId,
        Metodo,
        Monto,
        Referencia,
        RegistradoPorId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Factura {
        Table,
        Id,
        PedidoId,
        Nro,
        Fecha,
        NitCliente,
        RazonSocial,
        Total,
    }

    #[derive(DeriveIden)]
    pub(super) enum Envio {
        Table,
        Id,
        PedidoId,
        Estado,
        NombreRepartidor,
        TelefonoRepartidor,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Calificacion {
        Table,
        Id,
        PedidoId,
        Puntaje,
        Comentario,
        Fecha,
    }

    #[derive(DeriveIden)]
    pub(super) enum Insumo {
        Table,
        Id,
        Nombre,
        UnidadMedida,
        CantidadDisponible,
        FechaActualizacion,
    }

    #[derive(DeriveIden)]
    pub(super) enum Kardex {
        Table,
        Id,
        InsumoId,
        Fecha,
        Tipo,
        Motivo,
        Cantidad,
        Observacion,
    }

    #[derive(DeriveIden)]
    pub(super) enum Receta {
        Table,
        ProductoId,
        InsumoId,
        Cantidad,
    }

    #[derive(DeriveIden)]
    pub(super) enum Proveedor {
        Table,
        Id,
        Nombre,
        Telefono,
        Direccion,
    }

    #[derive(DeriveIden)]
    pub(super) enum Compra {
        Table,
        Id,
        ProveedorId,
        Fecha,
        Total,
        Recepcionada,
        FechaRecepcion,
    }

    #[derive(DeriveIden)]
    pub(super) enum CompraDetalle {
        Table,
        Id,
        CompraId,
        InsumoId,
        Cantidad,
        CostoUnitario,
    }

    #[derive(DeriveIden)]
    pub(super) enum Bitacora {
        Table,
        Id,
        UsuarioId,
        Entidad,
        EntidadId,
        Accion,
        Ip,
        Detalle,
        Fecha,
    }
}

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn money_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).decimal_len(12, 2).not_null().to_owned()
}

fn quantity_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).decimal_len(12, 3).not_null().to_owned()
}

fn timestamp_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

mod m20240301_000001_create_identity_tables {
    use super::iden::*;
    use super::{id_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_identity_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Usuario::Table)
                        .if_not_exists()
                        .col(id_col(Usuario::Id))
                        .col(ColumnDef::new(Usuario::Nombre).string_len(120).not_null())
                        .col(
                            ColumnDef::new(Usuario::Email)
                                .string_len(160)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Usuario::HashPassword)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Usuario::Telefono).string_len(40).null())
                        .col(
                            ColumnDef::new(Usuario::Activo)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Usuario::EsStaff)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(timestamp_col(Usuario::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Cliente::Table)
                        .if_not_exists()
                        .col(id_col(Cliente::Id))
                        .col(
                            ColumnDef::new(Cliente::UsuarioId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Cliente::Nombre).string_len(120).not_null())
                        .col(ColumnDef::new(Cliente::Telefono).string_len(40).null())
                        .col(ColumnDef::new(Cliente::Direccion).string_len(200).not_null())
                        .col(timestamp_col(Cliente::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cliente_usuario")
                                .from(Cliente::Table, Cliente::UsuarioId)
                                .to(Usuario::Table, Usuario::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Rol::Table)
                        .if_not_exists()
                        .col(id_col(Rol::Id))
                        .col(
                            ColumnDef::new(Rol::Nombre)
                                .string_len(80)
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Permiso::Table)
                        .if_not_exists()
                        .col(id_col(Permiso::Id))
                        .col(
                            ColumnDef::new(Permiso::Codigo)
                                .string_len(80)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Permiso::Descripcion).string_len(200).null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UsuarioRol::Table)
                        .if_not_exists()
                        .col(id_col(UsuarioRol::Id))
                        .col(ColumnDef::new(UsuarioRol::UsuarioId).integer().not_null())
                        .col(ColumnDef::new(UsuarioRol::RolId).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usuario_rol_usuario")
                                .from(UsuarioRol::Table, UsuarioRol::UsuarioId)
                                .to(Usuario::Table, Usuario::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usuario_rol_rol")
                                .from(UsuarioRol::Table, UsuarioRol::RolId)
                                .to(Rol::Table, Rol::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_usuario_rol")
                        .table(UsuarioRol::Table)
                        .col(UsuarioRol::UsuarioId)
                        .col(UsuarioRol::RolId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RolPermiso::Table)
                        .if_not_exists()
                        .col(id_col(RolPermiso::Id))
                        .col(ColumnDef::new(RolPermiso::RolId).integer().not_null())
                        .col(ColumnDef::new(RolPermiso::PermisoId).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rol_permiso_rol")
                                .from(RolPermiso::Table, RolPermiso::RolId)
                                .to(Rol::Table, Rol::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rol_permiso_permiso")
                                .from(RolPermiso::Table, RolPermiso::PermisoId)
                                .to(Permiso::Table, Permiso::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_rol_permiso")
                        .table(RolPermiso::Table)
                        .col(RolPermiso::RolId)
                        .col(RolPermiso::PermisoId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RolPermiso::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UsuarioRol::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Permiso::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Rol::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Cliente::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Usuario::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000002_create_catalog_tables {
    use super::iden::*;
    use super::{id_col, money_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Producto::Table)
                        .if_not_exists()
                        .col(id_col(Producto::Id))
                        .col(
                            ColumnDef::new(Producto::Nombre)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(money_col(Producto::PrecioUnitario))
                        .col(
                            ColumnDef::new(Producto::Activo)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Producto::Descripcion).string_len(300).null())
                        .col(ColumnDef::new(Producto::ImagenUrl).string_len(300).null())
                        .col(timestamp_col(Producto::CreadoEn))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sabor::Table)
                        .if_not_exists()
                        .col(id_col(Sabor::Id))
                        .col(ColumnDef::new(Sabor::Nombre).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Sabor::Activo)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Sabor::Imagen).string_len(200).null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductoSabor::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ProductoSabor::ProductoId).integer().not_null())
                        .col(ColumnDef::new(ProductoSabor::SaborId).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(ProductoSabor::ProductoId)
                                .col(ProductoSabor::SaborId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_producto_sabor_producto")
                                .from(ProductoSabor::Table, ProductoSabor::ProductoId)
                                .to(Producto::Table, Producto::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_producto_sabor_sabor")
                                .from(ProductoSabor::Table, ProductoSabor::SaborId)
                                .to(Sabor::Table, Sabor::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductoSabor::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sabor::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Producto::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000003_create_order_tables {
    use super::iden::*;
    use super::{id_col, money_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Pedido::Table)
                        .if_not_exists()
                        .col(id_col(Pedido::Id))
                        .col(ColumnDef::new(Pedido::ClienteId).integer().not_null())
                        .col(ColumnDef::new(Pedido::Estado).string_len(15).not_null())
                        .col(ColumnDef::new(Pedido::MetodoEnvio).string_len(20).not_null())
                        .col(money_col(Pedido::CostoEnvio).default(0))
                        .col(
                            ColumnDef::new(Pedido::DireccionEntrega)
                                .string_len(200)
                                .null(),
                        )
                        .col(money_col(Pedido::Total).default(0))
                        .col(ColumnDef::new(Pedido::Observaciones).string_len(300).null())
                        .col(timestamp_col(Pedido::CreatedAt))
                        .col(
                            ColumnDef::new(Pedido::FechaEntregaProgramada)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pedido_cliente")
                                .from(Pedido::Table, Pedido::ClienteId)
                                .to(Cliente::Table, Cliente::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedido_estado")
                        .table(Pedido::Table)
                        .col(Pedido::Estado)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedido_cliente")
                        .table(Pedido::Table)
                        .col(Pedido::ClienteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DetallePedido::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(DetallePedido::PedidoId).integer().not_null())
                        .col(ColumnDef::new(DetallePedido::ProductoId).integer().not_null())
                        .col(ColumnDef::new(DetallePedido::SaborId).integer().not_null())
                        .col(ColumnDef::new(DetallePedido::Cantidad).integer().not_null())
                        .col(money_col(DetallePedido::PrecioUnitario))
                        .col(
                            ColumnDef::new(DetallePedido::Producido)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .primary_key(
                            Index::create()
                                .col(DetallePedido::PedidoId)
                                .col(DetallePedido::ProductoId)
                                .col(DetallePedido::SaborId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_detalle_pedido_pedido")
                                .from(DetallePedido::Table, DetallePedido::PedidoId)
                                .to(Pedido::Table, Pedido::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_detalle_pedido_producto")
                                .from(DetallePedido::Table, DetallePedido::ProductoId)
                                .to(Producto::Table, Producto::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_detalle_pedido_sabor")
                                .from(DetallePedido::Table, DetallePedido::SaborId)
                                .to(Sabor::Table, Sabor::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Pago::Table)
                        .if_not_exists()
                        .col(id_col(Pago::Id))
                        .col(ColumnDef::new(Pago::PedidoId).integer().not_null())
                        .col(ColumnDef::new(Pago::Metodo).string_len(13).not_null())
                        .col(money_col(Pago::Monto))
                        .col(ColumnDef::new(Pago::Referencia).string_len(120).null())
                        .col(ColumnDef::new(Pago::RegistradoPorId).integer().null())
                        .col(timestamp_col(Pago::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pago_pedido")
                                .from(Pago::Table, Pago::PedidoId)
                                .to(Pedido::Table, Pedido::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pago_registrado_por")
                                .from(Pago::Table, Pago::RegistradoPorId)
                                .to(Usuario::Table, Usuario::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pago_referencia")
                        .table(Pago::Table)
                        .col(Pago::Referencia)
                        .to_owned(),
                )
                .await?;

            // One STRIPE payment per checkout session; manual references may repeat
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_pago_referencia_stripe \
                     ON pago (referencia) WHERE metodo = 'STRIPE'",
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Factura::Table)
                        .if_not_exists()
                        .col(id_col(Factura::Id))
                        .col(
                            ColumnDef::new(Factura::PedidoId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Factura::Nro)
                                .string_len(60)
                                .not_null()
                                .unique_key(),
                        )
                        .col(timestamp_col(Factura::Fecha))
                        .col(ColumnDef::new(Factura::NitCliente).string_len(60).not_null())
                        .col(
                            ColumnDef::new(Factura::RazonSocial)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(money_col(Factura::Total))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_factura_pedido")
                                .from(Factura::Table, Factura::PedidoId)
                                .to(Pedido::Table, Pedido::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Envio::Table)
                        .if_not_exists()
                        .col(id_col(Envio::Id))
                        .col(
                            ColumnDef::new(Envio::PedidoId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Envio::Estado).string_len(9).not_null())
                        .col(
                            ColumnDef::new(Envio::NombreRepartidor)
                                .string_len(120)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Envio::TelefonoRepartidor)
                                .string_len(40)
                                .null(),
                        )
                        .col(timestamp_col(Envio::CreatedAt))
                        .col(
                            ColumnDef::new(Envio::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_envio_pedido")
                                .from(Envio::Table, Envio::PedidoId)
                                .to(Pedido::Table, Pedido::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Calificacion::Table)
                        .if_not_exists()
                        .col(id_col(Calificacion::Id))
                        .col(
                            ColumnDef::new(Calificacion::PedidoId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Calificacion::Puntaje).integer().not_null())
                        .col(
                            ColumnDef::new(Calificacion::Comentario)
                                .string_len(300)
                                .null(),
                        )
                        .col(timestamp_col(Calificacion::Fecha))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_calificacion_pedido")
                                .from(Calificacion::Table, Calificacion::PedidoId)
                                .to(Pedido::Table, Pedido::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Calificacion::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Envio::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Factura::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Pago::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DetallePedido::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Pedido::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000004_create_inventory_tables {
    use super::iden::*;
    use super::{id_col, quantity_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Insumo::Table)
                        .if_not_exists()
                        .col(id_col(Insumo::Id))
                        .col(
                            ColumnDef::new(Insumo::Nombre)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Insumo::UnidadMedida).string_len(10).not_null())
                        .col(quantity_col(Insumo::CantidadDisponible).default(0))
                        .col(timestamp_col(Insumo::FechaActualizacion))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Kardex::Table)
                        .if_not_exists()
                        .col(id_col(Kardex::Id))
                        .col(ColumnDef::new(Kardex::InsumoId).integer().not_null())
                        .col(timestamp_col(Kardex::Fecha))
                        .col(ColumnDef::new(Kardex::Tipo).string_len(7).not_null())
                        .col(ColumnDef::new(Kardex::Motivo).string_len(12).not_null())
                        .col(quantity_col(Kardex::Cantidad))
                        .col(ColumnDef::new(Kardex::Observacion).string_len(200).null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_kardex_insumo")
                                .from(Kardex::Table, Kardex::InsumoId)
                                .to(Insumo::Table, Insumo::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kardex_insumo")
                        .table(Kardex::Table)
                        .col(Kardex::InsumoId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Receta::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Receta::ProductoId).integer().not_null())
                        .col(ColumnDef::new(Receta::InsumoId).integer().not_null())
                        .col(quantity_col(Receta::Cantidad))
                        .primary_key(
                            Index::create()
                                .col(Receta::ProductoId)
                                .col(Receta::InsumoId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receta_producto")
                                .from(Receta::Table, Receta::ProductoId)
                                .to(Producto::Table, Producto::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receta_insumo")
                                .from(Receta::Table, Receta::InsumoId)
                                .to(Insumo::Table, Insumo::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Receta::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Kardex::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Insumo::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000005_create_procurement_tables {
    use super::iden::*;
    use super::{id_col, money_col, quantity_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Proveedor::Table)
                        .if_not_exists()
                        .col(id_col(Proveedor::Id))
                        .col(ColumnDef::new(Proveedor::Nombre).string_len(150).not_null())
                        .col(ColumnDef::new(Proveedor::Telefono).string_len(40).null())
                        .col(ColumnDef::new(Proveedor::Direccion).string_len(200).null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Compra::Table)
                        .if_not_exists()
                        .col(id_col(Compra::Id))
                        .col(ColumnDef::new(Compra::ProveedorId).integer().not_null())
                        .col(timestamp_col(Compra::Fecha))
                        .col(money_col(Compra::Total).default(0))
                        .col(
                            ColumnDef::new(Compra::Recepcionada)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Compra::FechaRecepcion)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_compra_proveedor")
                                .from(Compra::Table, Compra::ProveedorId)
                                .to(Proveedor::Table, Proveedor::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CompraDetalle::Table)
                        .if_not_exists()
                        .col(id_col(CompraDetalle::Id))
                        .col(ColumnDef::new(CompraDetalle::CompraId).integer().not_null())
                        .col(ColumnDef::new(CompraDetalle::InsumoId).integer().not_null())
                        .col(quantity_col(CompraDetalle::Cantidad))
                        .col(money_col(CompraDetalle::CostoUnitario))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_compra_detalle_compra")
                                .from(CompraDetalle::Table, CompraDetalle::CompraId)
                                .to(Compra::Table, Compra::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_compra_detalle_insumo")
                                .from(CompraDetalle::Table, CompraDetalle::InsumoId)
                                .to(Insumo::Table, Insumo::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_compra_detalle_insumo")
                        .table(CompraDetalle::Table)
                        .col(CompraDetalle::CompraId)
                        .col(CompraDetalle::InsumoId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CompraDetalle::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Compra::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Proveedor::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000006_create_bitacora_table {
    use super::iden::*;
    use super::{id_col, timestamp_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_bitacora_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // usuario_id stays a plain column: audit rows outlive the accounts they mention
            manager
                .create_table(
                    Table::create()
                        .table(Bitacora::Table)
                        .if_not_exists()
                        .col(id_col(Bitacora::Id))
                        .col(ColumnDef::new(Bitacora::UsuarioId).integer().null())
                        .col(ColumnDef::new(Bitacora::Entidad).string_len(60).not_null())
                        .col(ColumnDef::new(Bitacora::EntidadId).integer().not_null())
                        .col(ColumnDef::new(Bitacora::Accion).string_len(50).not_null())
                        .col(ColumnDef::new(Bitacora::Ip).string_len(64).null())
                        .col(ColumnDef::new(Bitacora::Detalle).string_len(300).null())
                        .col(timestamp_col(Bitacora::Fecha))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bitacora_entidad")
                        .table(Bitacora::Table)
                        .col(Bitacora::Entidad)
                        .col(Bitacora::EntidadId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bitacora::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000007_seed_permissions {
    use super::iden::Permiso;
    use crate::auth::permissions::CATALOGUE;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_seed_permissions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut insert = Query::insert();
            insert
                .into_table(Permiso::Table)
                .columns([Permiso::Codigo, Permiso::Descripcion]);
            for (codigo, descripcion) in CATALOGUE {
                insert
                    .values([(*codigo).into(), (*descripcion).into()])
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
            manager.exec_stmt(insert.to_owned()).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let codes: Vec<&str> = CATALOGUE.iter().map(|(codigo, _)| *codigo).collect();
            manager
                .exec_stmt(
                    Query::delete()
                        .from_table(Permiso::Table)
                        .and_where(Expr::col(Permiso::Codigo).is_in(codes))
                        .to_owned(),
                )
                .await
        }
    }
}
