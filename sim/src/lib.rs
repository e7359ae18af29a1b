pub mod aim;
pub mod collision;
pub mod config;
pub mod flight;
pub mod nest_registry;
pub mod nesting;
pub mod pilot;
pub mod session;
pub mod sim_loop;
pub mod sphere;
