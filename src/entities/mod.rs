// Identity and access control
pub mod cliente;
pub mod permiso;
pub mod rol;
pub mod rol_permiso;
pub mod usuario;
pub mod usuario_rol;

// Catalog
pub mod producto;
pub mod producto_sabor;
pub mod sabor;

// Orders
pub mod calificacion;
pub mod detalle_pedido;
pub mod envio;
pub mod factura;
pub mod pago;
pub mod pedido;

// Inventory
pub mod insumo;
pub mod kardex;
pub mod receta;

// Procurement
pub mod compra;
pub mod compra_detalle;
pub mod proveedor;

pub mod bitacora;
