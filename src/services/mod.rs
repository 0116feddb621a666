pub mod chart_service;
pub mod page_service;
