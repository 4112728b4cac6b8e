pub mod account;
pub mod analytics;
pub mod approval;
pub mod disclosure;
pub mod fraud;
pub mod publication;
pub mod transaction;
