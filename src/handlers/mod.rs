pub mod branches;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod quotes;
pub mod stock;
pub mod suppliers;
pub mod tasks;
pub mod users;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    activity::ActivityService, bom::BomService, branches::BranchService,
    customers::CustomerService, dashboard::DashboardService, production::ProductionService,
    projects::ProjectService, quotes::QuoteService, stock::StockService,
    suppliers::SupplierService, tasks::TaskService, users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub branches: Arc<BranchService>,
    pub customers: Arc<CustomerService>,
    pub activity: Arc<ActivityService>,
    pub suppliers: Arc<SupplierService>,
    pub quotes: Arc<QuoteService>,
    pub projects: Arc<ProjectService>,
    pub tasks: Arc<TaskService>,
    pub stock: Arc<StockService>,
    pub bom: Arc<BomService>,
    pub production: Arc<ProductionService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, config: &AppConfig) -> Self {
        let stock = StockService::new(db.clone(), event_sender.clone());

        Self {
            users: Arc::new(UserService::new(db.clone(), event_sender.clone())),
            branches: Arc::new(BranchService::new(db.clone())),
            customers: Arc::new(CustomerService::new(db.clone(), event_sender.clone())),
            activity: Arc::new(ActivityService::new(db.clone())),
            suppliers: Arc::new(SupplierService::new(db.clone())),
            quotes: Arc::new(QuoteService::new(
                db.clone(),
                event_sender.clone(),
                config.default_currency.clone(),
            )),
            projects: Arc::new(ProjectService::new(db.clone(), event_sender.clone())),
            tasks: Arc::new(TaskService::new(db.clone(), event_sender.clone())),
            bom: Arc::new(BomService::new(db.clone(), event_sender.clone())),
            production: Arc::new(ProductionService::new(
                db.clone(),
                event_sender,
                stock.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(db, stock.clone())),
            stock: Arc::new(stock),
        }
    }
}
