pub mod response;
pub mod routes;
pub mod server;
