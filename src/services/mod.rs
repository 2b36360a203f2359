pub mod admin_service;
pub mod assignment_service;
pub mod catalog_service;
pub mod complaint_service;
pub mod directory_service;
pub mod messaging_service;
pub mod rating_service;
pub mod report_service;
pub mod store_service;
pub mod triage_service;
