use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    services::{
        accounts::AccountService,
        audit::AuditService,
        catalog::CatalogService,
        checkout::{CheckoutGateway, CheckoutService},
        customers::CustomerService,
        deliveries::DeliveryService,
        inventory::InventoryService,
        invoices::InvoiceService,
        orders::{OrderPricing, OrderService},
        payments::PaymentService,
        production::ProductionService,
        purchases::PurchaseService,
        ratings::RatingService,
        rbac::RbacService,
        recipes::RecipeService,
        reports::ReportService,
        suppliers::SupplierService,
    },
};

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod common;
pub mod customers;
pub mod deliveries;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod production;
pub mod purchases;
pub mod rbac;
pub mod reports;
pub mod suppliers;

/// Every service the HTTP layer talks to, built once at startup
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub audit: Arc<AuditService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub customers: Arc<CustomerService>,
    pub deliveries: Arc<DeliveryService>,
    pub inventory: Arc<InventoryService>,
    pub invoices: Arc<InvoiceService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub production: Arc<ProductionService>,
    pub purchases: Arc<PurchaseService>,
    pub ratings: Arc<RatingService>,
    pub rbac: Arc<RbacService>,
    pub recipes: Arc<RecipeService>,
    pub reports: Arc<ReportService>,
    pub suppliers: Arc<SupplierService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        auth_service: Arc<AuthService>,
        checkout_gateway: Option<Arc<dyn CheckoutGateway>>,
    ) -> Self {
        let audit = Arc::new(AuditService::new(db_pool.clone()));

        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                auth_service,
                audit.clone(),
            )),
            catalog: Arc::new(CatalogService::new(
                db_pool.clone(),
                config.cookie_unit_price,
            )),
            checkout: Arc::new(CheckoutService::new(
                db_pool.clone(),
                checkout_gateway,
                config.site_url.clone(),
                config.stripe_currency.clone(),
                audit.clone(),
            )),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            deliveries: Arc::new(DeliveryService::new(db_pool.clone(), audit.clone())),
            inventory: Arc::new(InventoryService::new(db_pool.clone(), audit.clone())),
            invoices: Arc::new(InvoiceService::new(db_pool.clone(), audit.clone())),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                OrderPricing::from(config),
                audit.clone(),
            )),
            payments: Arc::new(PaymentService::new(db_pool.clone(), audit.clone())),
            production: Arc::new(ProductionService::new(db_pool.clone(), audit.clone())),
            purchases: Arc::new(PurchaseService::new(db_pool.clone(), audit.clone())),
            ratings: Arc::new(RatingService::new(db_pool.clone(), audit.clone())),
            rbac: Arc::new(RbacService::new(db_pool.clone(), audit.clone())),
            recipes: Arc::new(RecipeService::new(db_pool.clone(), audit.clone())),
            reports: Arc::new(ReportService::new(db_pool.clone(), config.report_row_limit)),
            suppliers: Arc::new(SupplierService::new(
                db_pool,
                config.supplier_page_size,
                audit.clone(),
            )),
            audit,
        }
    }
}
