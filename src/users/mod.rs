pub mod dto;
pub mod form;
pub mod services;

pub use form::Field;
pub use services::UserDirectory;
