pub mod advice;
pub mod auth_service;
pub mod email_service;
pub mod field_cipher;
pub mod token_service;
