// Identity and customers
pub mod accounts;
pub mod audit;
pub mod customers;
pub mod rbac;

// Catalog and orders
pub mod catalog;
pub mod orders;

// Money
pub mod checkout;
pub mod invoices;
pub mod payments;

// Fulfilment
pub mod deliveries;
pub mod production;
pub mod ratings;

// Stock and purchasing
pub mod inventory;
pub mod purchases;
pub mod recipes;
pub mod suppliers;

// Analytics and Reporting
pub mod reports;
