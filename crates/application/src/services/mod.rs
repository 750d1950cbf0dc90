mod messaging_service;
mod messaging_service_tests;

pub use messaging_service::{MessagingService, MessagingServiceDependencies};
