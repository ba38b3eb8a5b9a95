//! Services around the crop aggregate
//!
//! ## Services
//!
//! - **Users**: accounts, argon2 credentials and login
//! - **Supplies**: the insumo catalogue referenced by applied inputs
//! - **Alerts**: free-standing notices, hard delete
//! - **SoilHistory**: pH and nutrient measurements per crop
//! - **Activities**: tasks assigned to a user on a crop

pub mod activities;
pub mod alerts;
pub mod soil;
pub mod supplies;
pub mod users;

pub use activities::{ActivityPatch, ActivityService, ActivityView, NewActivity};
pub use alerts::{AlertPatch, AlertService, AlertView, NewAlert};
pub use soil::{NewSoilRecord, SoilHistoryService, SoilRecordPatch, SoilRecordView};
pub use supplies::{NewSupply, SupplyPatch, SupplyService, SupplyView};
pub use users::{NewUser, UserPatch, UserService, UserView};

use std::sync::Arc;

use crate::db::DocumentStore;

/// Every service, sharing one store handle
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub supplies: SupplyService,
    pub alerts: AlertService,
    pub soil: SoilHistoryService,
    pub activities: ActivityService,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: UserService::new(Arc::clone(&store)),
            supplies: SupplyService::new(Arc::clone(&store)),
            alerts: AlertService::new(Arc::clone(&store)),
            soil: SoilHistoryService::new(Arc::clone(&store)),
            activities: ActivityService::new(store),
        }
    }
}
