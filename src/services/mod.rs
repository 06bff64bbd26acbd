pub mod auth_service;
pub mod blob_service;
pub mod captcha_service;
pub mod cla_service;
pub mod directory_service;
pub mod image_service;
pub mod import_service;
pub mod mail_service;
pub mod token_service;

pub use auth_service::AuthService;
pub use cla_service::ClaService;
pub use directory_service::DirectoryService;
pub use import_service::ImportService;
pub use token_service::TokenSigner;
