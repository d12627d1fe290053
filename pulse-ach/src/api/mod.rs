//! HTTP and WebSocket API handlers for pulse-ach

pub mod achievements;
pub mod badges;
pub mod health;
pub mod identity;
pub mod records;
pub mod ws;

pub use achievements::{get_achievements, reconcile_now};
pub use badges::list_badges;
pub use health::health_routes;
pub use identity::CurrentUser;
pub use records::{
    complete_goal, create_dose, create_goal, create_meal, create_metric, create_workout,
    take_dose, update_profile,
};
pub use ws::ws_handler;
