use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::TokenResponse,
    errors::ErrorResponse,
    handlers::{
        health::{ComponentHealth, ComponentStatus, HealthDetails, HealthResponse},
        inventory::SetRecipeRequest,
        orders::{SetStatusRequest, UpdateItemsRequest},
    },
    models::{
        EnvioStatus, MovementReason, MovementType, OrderStatus, PaymentMethod, PaymentSummary,
        ShippingMethod, Unit,
    },
    services::{
        accounts::{
            AccountView, ChangePasswordInput, LoginInput, LoginResponse, MeResponse, RegisterInput,
            UpdateProfileInput,
        },
        audit::AuditFilter,
        catalog::{CatalogView, FlavorInput, ProductInput, ProductView},
        checkout::{CheckoutOutcome, CheckoutStart},
        customers::CustomerProfile,
        deliveries::{AssignDeliveryInput, DeliveryStatusInput},
        inventory::{IngredientInput, MovementInput, StockLevel},
        invoices::IssueInvoiceInput,
        orders::{CreateOrderInput, LineItemInput, OrderDetail, OrderLineView, OrderSummary},
        payments::{PaymentReceipt, RegisterPaymentInput},
        production::{PlanLine, ProductionPlan, Requirement},
        purchases::{
            CreatePurchaseInput, PurchaseLineInput, PurchaseLineView, PurchaseSummary, PurchaseView,
        },
        ratings::RateOrderInput,
        rbac::{AssignRolesInput, AssignRolesResponse, RoleInput, RoleView, UserRolesView},
        recipes::{RecipeLineInput, RecipeLineView},
        reports::{CustomerHistory, HistoryRow, StatusCount},
        suppliers::SupplierInput,
    },
    ResponseMeta,
};

/// Registers the JWT bearer scheme referenced by `security(("Bearer" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dulce Bocatto API",
        version = "1.0.0",
        description = r#"
Order lifecycle for a cookie bakery: catalogue, customer orders, payments and invoices,
production against recipes, ingredient stock, purchasing and delivery.

Authenticate with `POST /api/v1/auth/login` and send the token as `Authorization: Bearer <token>`.
Staff accounts pass every permission check; everyone else needs a role granting the permission.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "customers", description = "Customer profile"),
        (name = "catalog", description = "Products and flavors"),
        (name = "orders", description = "Order lifecycle"),
        (name = "payments", description = "Manual payments and card checkout"),
        (name = "invoices", description = "Invoices"),
        (name = "deliveries", description = "Courier assignment and tracking"),
        (name = "production", description = "Production queue and ingredient consumption"),
        (name = "inventory", description = "Ingredients, kardex and recipes"),
        (name = "suppliers", description = "Suppliers"),
        (name = "purchases", description = "Ingredient purchases"),
        (name = "reports", description = "Reports"),
        (name = "audit", description = "Audit trail"),
        (name = "admin", description = "Roles and permissions"),
        (name = "health", description = "Health checks"),
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::update_profile,
        crate::handlers::auth::change_password,
        crate::handlers::customers::my_profile,
        crate::handlers::catalog::get_catalog,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_product,
        crate::handlers::catalog::list_flavors,
        crate::handlers::catalog::create_flavor,
        crate::handlers::catalog::update_flavor,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_items,
        crate::handlers::orders::confirm_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::pending_orders,
        crate::handlers::orders::confirmed_orders,
        crate::handlers::orders::set_status,
        crate::handlers::orders::rate_order,
        crate::handlers::orders::get_rating,
        crate::handlers::payments::register_payment,
        crate::handlers::payments::list_payments,
        crate::handlers::payments::payment_summary,
        crate::handlers::payments::start_checkout,
        crate::handlers::payments::checkout_success,
        crate::handlers::payments::checkout_cancel,
        crate::handlers::invoices::issue_invoice,
        crate::handlers::invoices::get_invoice,
        crate::handlers::deliveries::assign_delivery,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::production::production_queue,
        crate::handlers::production::production_plan,
        crate::handlers::production::start_production,
        crate::handlers::production::produce_item,
        crate::handlers::production::mark_ready,
        crate::handlers::inventory::list_ingredients,
        crate::handlers::inventory::get_ingredient,
        crate::handlers::inventory::create_ingredient,
        crate::handlers::inventory::update_ingredient,
        crate::handlers::inventory::delete_ingredient,
        crate::handlers::inventory::record_movement,
        crate::handlers::inventory::stock_level,
        crate::handlers::inventory::list_kardex,
        crate::handlers::inventory::get_recipe,
        crate::handlers::inventory::set_recipe,
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,
        crate::handlers::purchases::create_purchase,
        crate::handlers::purchases::receive_purchase,
        crate::handlers::purchases::list_purchases,
        crate::handlers::purchases::get_purchase,
        crate::handlers::reports::customer_history,
        crate::handlers::reports::status_summary,
        crate::handlers::audit::list_audit,
        crate::handlers::rbac::list_permissions,
        crate::handlers::rbac::list_roles,
        crate::handlers::rbac::get_role,
        crate::handlers::rbac::create_role,
        crate::handlers::rbac::update_role,
        crate::handlers::rbac::delete_role,
        crate::handlers::rbac::list_users,
        crate::handlers::rbac::assign_roles,
        crate::handlers::health::health,
        crate::handlers::health::status,
    ),
    components(
        schemas(
            // Common
            ErrorResponse,
            ResponseMeta,
            TokenResponse,
            // Vocabulary
            OrderStatus,
            ShippingMethod,
            PaymentMethod,
            PaymentSummary,
            EnvioStatus,
            Unit,
            MovementType,
            MovementReason,
            // Accounts
            RegisterInput,
            LoginInput,
            LoginResponse,
            AccountView,
            MeResponse,
            UpdateProfileInput,
            ChangePasswordInput,
            CustomerProfile,
            // Catalogue
            CatalogView,
            ProductInput,
            ProductView,
            FlavorInput,
            // Orders and payments
            CreateOrderInput,
            LineItemInput,
            UpdateItemsRequest,
            SetStatusRequest,
            OrderLineView,
            OrderSummary,
            OrderDetail,
            RateOrderInput,
            RegisterPaymentInput,
            PaymentReceipt,
            CheckoutStart,
            CheckoutOutcome,
            IssueInvoiceInput,
            AssignDeliveryInput,
            DeliveryStatusInput,
            // Production and stock
            Requirement,
            PlanLine,
            ProductionPlan,
            IngredientInput,
            MovementInput,
            StockLevel,
            RecipeLineInput,
            RecipeLineView,
            SetRecipeRequest,
            // Procurement
            SupplierInput,
            PurchaseLineInput,
            CreatePurchaseInput,
            PurchaseLineView,
            PurchaseView,
            PurchaseSummary,
            // Reports, audit, admin
            HistoryRow,
            CustomerHistory,
            StatusCount,
            AuditFilter,
            RoleInput,
            RoleView,
            UserRolesView,
            AssignRolesInput,
            AssignRolesResponse,
            // Health
            ComponentStatus,
            ComponentHealth,
            HealthDetails,
            HealthResponse,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_order_paths_and_bearer_scheme() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Dulce Bocatto API"));
        assert!(json.contains("/api/v1/orders/{id}/payments"));
        assert!(json.contains("/api/v1/production/orders/{id}/items/{producto_id}/{sabor_id}"));
        assert!(json.contains("\"Bearer\""));
    }
}
