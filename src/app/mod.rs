pub mod export;
pub mod services;
