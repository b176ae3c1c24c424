pub mod documents_request;
pub mod documents_route;
