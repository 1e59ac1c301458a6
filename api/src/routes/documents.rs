pub mod documents_route;
