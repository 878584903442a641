//! HTTP translation providers.

pub mod azure;
pub mod http;
pub mod libre_translate;

pub use azure::AzureTranslatorProvider;
pub use libre_translate::LibreTranslateProvider;
