pub mod agents;
pub mod http;
pub mod startup;
pub mod subsystems;
