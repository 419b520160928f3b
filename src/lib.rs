pub mod application;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod storage;

pub use application::{AppError, CampaignsService, GroupsService, LeadsService, Services};
pub use domain::*;
