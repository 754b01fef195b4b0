//! Permission codes checked by the router guards and seeded by the migrator.

pub mod consts {
    // Orders and payments
    pub const PEDIDO_READ: &str = "PEDIDO_READ";
    pub const PEDIDO_WRITE: &str = "PEDIDO_WRITE";
    pub const PAGO_WRITE: &str = "PAGO_WRITE";

    pub const CATALOGO_WRITE: &str = "CATALOGO_WRITE";

    // Kitchen and ingredients
    pub const PRODUCCION: &str = "PRODUCCION";
    pub const INSUMO_READ: &str = "INSUMO_READ";
    pub const INSUMO_WRITE: &str = "INSUMO_WRITE";

    // Suppliers and purchasing
    pub const PROVEEDOR_READ: &str = "PROVEEDOR_READ";
    pub const PROVEEDOR_WRITE: &str = "PROVEEDOR_WRITE";
    pub const COMPRA_READ: &str = "COMPRA_READ";
    pub const COMPRA_WRITE: &str = "COMPRA_WRITE";

    pub const FACTURA_WRITE: &str = "FACTURA_WRITE";
    pub const ENVIO_WRITE: &str = "ENVIO_WRITE";
    pub const REPORTE_READ: &str = "REPORTE_READ";

    // Administration
    pub const BITACORA_READ: &str = "BITACORA_READ";
    pub const ROL_ADMIN: &str = "ROL_ADMIN";
}

use consts::*;

/// Every permission the application knows, with its description.
pub const CATALOGUE: &[(&str, &str)] = &[
    (PEDIDO_READ, "Ver pedidos de cualquier cliente"),
    (PEDIDO_WRITE, "Cambiar el estado de los pedidos"),
    (PAGO_WRITE, "Registrar pagos"),
    (CATALOGO_WRITE, "Administrar productos y sabores"),
    (PRODUCCION, "Gestionar la cola de produccion"),
    (INSUMO_READ, "Ver insumos y kardex"),
    (INSUMO_WRITE, "Administrar insumos, recetas y movimientos"),
    (PROVEEDOR_READ, "Ver proveedores"),
    (PROVEEDOR_WRITE, "Administrar proveedores"),
    (COMPRA_READ, "Ver compras"),
    (COMPRA_WRITE, "Registrar y recepcionar compras"),
    (FACTURA_WRITE, "Emitir facturas"),
    (ENVIO_WRITE, "Asignar y actualizar envios"),
    (REPORTE_READ, "Ver reportes"),
    (BITACORA_READ, "Ver la bitacora"),
    (ROL_ADMIN, "Administrar roles, permisos y usuarios"),
];

pub fn is_known(code: &str) -> bool {
    CATALOGUE.iter().any(|(codigo, _)| *codigo == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalogue_codes_are_unique() {
        let codes: HashSet<_> = CATALOGUE.iter().map(|(c, _)| *c).collect();
        assert_eq!(codes.len(), CATALOGUE.len());
        assert!(is_known(consts::ROL_ADMIN));
        assert!(!is_known("orders:read"));
    }
}
