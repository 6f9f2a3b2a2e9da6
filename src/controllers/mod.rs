pub mod advice_controller;
pub mod auth_controller;
